use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::flatten::FlatLine;
use crate::text::strip_block_ids;

static DATED_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})-(.*)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    pub date: String,
    pub title: String,
}

/// Derive publish date and title from a namespaced page name.
///
/// A `YYYY-MM-DD-` prefix on the last path segment wins, then the root block's
/// `blogdate` property, then `today`. Dashes left in the title become spaces.
pub fn front_matter(page_name: &str, blog_date: Option<&str>, today: NaiveDate) -> FrontMatter {
    let last = page_name.rsplit('/').next().unwrap_or(page_name);

    let (date, title) = match DATED_TITLE_RE.captures(last) {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        None => match blog_date {
            Some(d) => (d.to_string(), last.to_string()),
            None => (today.format("%Y-%m-%d").to_string(), last.to_string()),
        },
    };

    FrontMatter {
        date,
        title: title.replace('-', " "),
    }
}

/// Front matter plus one line per flattened block.
///
/// Only the content is emitted; levels are not turned into indentation.
pub fn render(front: &FrontMatter, lines: &[FlatLine]) -> String {
    let mut text = vec![
        "---".to_string(),
        format!("date: {}", front.date),
        format!("title: {}", front.title),
        "---".to_string(),
    ];
    text.extend(lines.iter().map(|l| l.content.clone()));
    strip_block_ids(&text.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn dated_page_name() {
        let fm = front_matter("journal/2024-03-05-My Trip", None, today());
        assert_eq!(fm.date, "2024-03-05");
        assert_eq!(fm.title, "My Trip");
    }

    #[test]
    fn date_prefix_beats_blogdate() {
        let fm = front_matter("blog/2024-03-05-day-one", Some("2020-01-01"), today());
        assert_eq!(fm.date, "2024-03-05");
        assert_eq!(fm.title, "day one");
    }

    #[test]
    fn blogdate_property() {
        let fm = front_matter("journal/my-page", Some("2023-01-01"), today());
        assert_eq!(fm.date, "2023-01-01");
        assert_eq!(fm.title, "my page");
    }

    #[test]
    fn falls_back_to_today() {
        let fm = front_matter("plain-page", None, today());
        assert_eq!(fm.date, "2026-10-16");
        assert_eq!(fm.title, "plain page");
    }

    #[test]
    fn renders_content_only() {
        let fm = FrontMatter {
            date: "2024-03-05".into(),
            title: "My Trip".into(),
        };
        let lines = vec![
            FlatLine { level: 1, content: "Day one".into() },
            FlatLine { level: 2, content: "Nested\nid:: 6488a947-a217-4062-bce9-cacfc9cb0336".into() },
        ];
        assert_eq!(
            render(&fm, &lines),
            "---\ndate: 2024-03-05\ntitle: My Trip\n---\nDay one\nNested\n"
        );
    }

    #[test]
    fn renders_empty_page() {
        let fm = FrontMatter {
            date: "2024-03-05".into(),
            title: "Empty".into(),
        };
        assert_eq!(render(&fm, &[]), "---\ndate: 2024-03-05\ntitle: Empty\n---");
    }
}
