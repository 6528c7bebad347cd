use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use tracing::{debug, info};

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CLOCK: \[(.*?)\]--\[(.*?)\]").unwrap());
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}) (?i:Mon|Tue|Wed|Thu|Fri|Sat|Sun) (\d{2}:\d{2}:\d{2})$").unwrap()
});
static BRACKET_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());
static HASH_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#([a-zA-Z0-9/_\-]+)").unwrap());

/// One tracked interval, attributed to the task line above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntry {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub duration_mins: i64,
    pub task: Option<String>,
    pub tags: Vec<String>,
}

/// `YYYY-MM-DD Ddd HH:MM:SS`. The weekday must be an English abbreviation but is not checked against the date.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let caps = TIMESTAMP_RE.captures(s.trim())?;
    NaiveDateTime::parse_from_str(&format!("{} {}", &caps[1], &caps[2]), "%Y-%m-%d %H:%M:%S").ok()
}

/// Start and end of a `CLOCK: [..]--[..]` line, or `None` when either stamp is malformed.
pub fn parse_clock_line(line: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let caps = CLOCK_RE.captures(line)?;
    Some((parse_timestamp(&caps[1])?, parse_timestamp(&caps[2])?))
}

/// Whole minutes, ties rounded to even.
fn rounded_minutes(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    let secs = (end - start).num_seconds();
    (secs as f64 / 60.0).round_ties_even() as i64
}

/// `[[bracket tags]]` in order, followed by `#hash` tags in order. Duplicates are kept.
pub fn parse_tags(task: &str) -> Vec<String> {
    BRACKET_TAG_RE
        .captures_iter(task)
        .chain(HASH_TAG_RE.captures_iter(task))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Walk a journal's lines, pairing each clock line with the latest `- ` task line.
pub fn extract_entries(text: &str) -> Vec<TimeEntry> {
    let mut rows = Vec::new();
    let mut current_task: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(task) = line.strip_prefix("- ") {
            current_task = Some(task.to_string());
        } else if line.starts_with("CLOCK:") {
            let Some((start, end)) = parse_clock_line(line) else {
                debug!(line, "skipping malformed clock line");
                continue;
            };
            rows.push(TimeEntry {
                date: start.date(),
                start: start.time(),
                end: end.time(),
                duration_mins: rounded_minutes(start, end),
                tags: current_task.as_deref().map(parse_tags).unwrap_or_default(),
                task: current_task.clone(),
            });
        }
    }
    rows
}

pub fn extract_file(path: &Path) -> Result<Vec<TimeEntry>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok(extract_entries(&text))
}

/// Entries from every file under `dir` matching `pattern`, files taken in path order.
pub fn collect_entries(dir: &Path, pattern: &str) -> Result<Vec<TimeEntry>> {
    let full = format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), pattern);
    let mut files: Vec<PathBuf> = glob::glob(&full)?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut out = Vec::new();
    for file in &files {
        let rows = extract_file(file)?;
        debug!("{:?}: {} clock entries", file, rows.len());
        out.extend(rows);
    }
    info!("Collected {} clock entries from {} files", out.len(), files.len());
    Ok(out)
}

/// CSV with a header row; tags are joined with `, `.
pub fn write_csv<W: Write>(writer: W, entries: &[TimeEntry]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["date", "start", "end", "duration_mins", "task", "tags"])?;
    for e in entries {
        wtr.write_record([
            e.date.format("%Y-%m-%d").to_string(),
            e.start.format("%H:%M:%S").to_string(),
            e.end.format("%H:%M:%S").to_string(),
            e.duration_mins.to_string(),
            e.task.clone().unwrap_or_default(),
            e.tags.join(", "),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Total minutes per tag; untagged entries are grouped under `(untagged)`.
pub fn minutes_by_tag(entries: &[TimeEntry]) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for e in entries {
        if e.tags.is_empty() {
            *totals.entry("(untagged)".to_string()).or_insert(0) += e.duration_mins;
        }
        for tag in &e.tags {
            *totals.entry(tag.clone()).or_insert(0) += e.duration_mins;
        }
    }
    totals
}
