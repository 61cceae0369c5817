//! Follows cleaning: the Facebook follows export is a near-free-form file
//! with metadata preamble, so cleanup happens line by line before any
//! tabular interpretation.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::table::{Table, Value};

use super::parse_date;

pub const COLUMNS: &[&str] = &["date", "follows"];

static HAS_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());

/// Cleans the raw follows export text into `(date, follows)` rows. Rows with
/// non-positive follow counts are dropped; output is chronologically sorted.
pub fn clean_follows(text: &str) -> Table {
    let mut out = Table::empty(COLUMNS);
    for line in text.lines() {
        let line = line.replace(['\u{feff}', '"'], "");
        let line = line.trim();

        // Skip metadata/header noise
        let lower = line.to_lowercase();
        if lower.starts_with("sep=") || lower.starts_with("facebook") || !HAS_DIGIT.is_match(line)
        {
            continue;
        }
        let mut parts = line.split(',').map(str::trim);
        let (Some(date_str), Some(follow_str)) = (parts.next(), parts.next()) else {
            continue;
        };
        let (Some(date), Ok(follows)) = (parse_date(date_str, false), follow_str.parse::<i64>())
        else {
            continue;
        };
        if follows > 0 {
            out.push_row(vec![Value::Date(date), Value::Int(follows)]);
        }
    }
    out.sort_by_column("date");
    out
}

/// Reads and cleans the follows export. A missing file degrades to the empty
/// schema'd table.
pub fn process(path: &Path) -> Table {
    match std::fs::read(path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let cleaned = clean_follows(&text);
            info!(path = %path.display(), rows = cleaned.len(), "cleaned follows");
            cleaned
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "follows source missing; producing empty table");
            Table::empty(COLUMNS)
        }
    }
}
