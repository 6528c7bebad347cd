use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static BLOCK_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"id:: [a-z0-9]{8}-[a-z0-9]{4}-[a-z0-9]{4}-[a-z0-9]{4}-[a-z0-9]{12}").unwrap()
});

/// Remove `id:: <uuid>` block properties left behind by referenced blocks.
pub fn strip_block_ids(text: &str) -> String {
    BLOCK_ID_RE.replace_all(text, "").into_owned()
}

/// Make sure `text` ends with a newline unless it is empty.
pub fn ensure_trailing_newline(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// Clip `s` to at most `width` chars for a table column, marking the cut with `~`.
pub fn fit_column(s: &str, width: usize) -> Cow<'_, str> {
    match s.char_indices().nth(width) {
        None => Cow::Borrowed(s),
        Some(_) if width == 0 => Cow::Borrowed(""),
        Some(_) => {
            let (cut, _) = s.char_indices().nth(width - 1).unwrap_or((0, ' '));
            Cow::Owned(format!("{}~", &s[..cut]))
        }
    }
}
