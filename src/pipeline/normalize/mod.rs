//! Source Normalizer: turns heterogeneous raw exports into the cleaned
//! canonical tables the rest of the pipeline consumes.
//!
//! Shared primitives live here; one submodule per source domain.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::enrich::{FallbackReason, Resolved};
use crate::error::Result;
use crate::table::{Table, Value};

pub mod audience;
pub mod content;
pub mod follows;
pub mod metrics;
pub mod reviews;
pub mod subratings;

/// Identifier-style view of a column name used for synonym matching:
/// lowercase with whitespace, underscores and quotes removed.
pub fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '"')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Canonical header form for cleaned tables: trimmed, lowercased,
/// spaces replaced with underscores, stray quotes removed.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace('"', "")
}

/// First column whose squashed name matches any synonym, in synonym order.
/// Pure lookup; no hidden iteration-order dependency.
pub fn resolve_field(table: &Table, synonyms: &[&str]) -> Option<usize> {
    for syn in synonyms {
        let want = squash(syn);
        if let Some(idx) = table.columns.iter().position(|c| squash(c) == want) {
            return Some(idx);
        }
    }
    None
}

/// Cell for a resolved field, with a declared default when the field is
/// missing from the source or the cell is null.
pub fn field_or<'a>(table: &'a Table, row: &'a [Value], idx: Option<usize>, default: &str) -> Value {
    match idx.and_then(|i| row.get(i)) {
        Some(v) if !v.is_null() => v.clone(),
        _ => Value::Str(default.to_string()),
    }
}

static EXPORT_NOISE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(sep=|facebook)").unwrap());
static SMART_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new("[\u{201c}\u{201d}]").unwrap());
static QUOTE_COMMA_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r#""+\s*,\s*"+"#).unwrap());
static TAB_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+").unwrap());

/// Strips the export noise social-media CSV downloads carry: `sep=` and
/// vendor preamble lines, smart quotes, BOM/bidi control characters,
/// quote-comma-quote runs and tab-delimited remnants.
pub fn clean_raw_export(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for line in text.lines() {
        if line.trim().is_empty() || EXPORT_NOISE_LINE.is_match(line) {
            continue;
        }
        cleaned.push_str(&SMART_QUOTES.replace_all(line, "\""));
        cleaned.push('\n');
    }
    let cleaned = cleaned.replace(['\u{202c}', '\u{feff}'], "");
    let cleaned = QUOTE_COMMA_RUN.replace_all(&cleaned, ",");
    TAB_RUN.replace_all(&cleaned, ",").into_owned()
}

/// Reads a raw export: decode, pre-clean, parse, canonicalize headers.
pub fn read_raw_table(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path)?;
    let stripped = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(&bytes);
    let text = match std::str::from_utf8(stripped) {
        Ok(s) => s.to_string(),
        Err(_) => encoding_rs::WINDOWS_1252.decode(stripped).0.into_owned(),
    };
    let mut table = Table::from_csv_str(&clean_raw_export(&text))?;
    table.columns = table.columns.iter().map(|c| normalize_header(c)).collect();
    Ok(table)
}

const DATE_FORMATS_MONTH_FIRST: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];
const DATE_FORMATS_DAY_FIRST: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Locale-tolerant date parse over the formats seen in the exports.
pub fn parse_date(raw: &str, day_first: bool) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let formats = if day_first {
        DATE_FORMATS_DAY_FIRST
    } else {
        DATE_FORMATS_MONTH_FIRST
    };
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(d);
        }
    }
    // Last resort: ISO timestamps with fractional seconds or zone suffix
    trimmed
        .get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Date view of a cell regardless of whether it was coerced upstream.
pub fn value_as_date(v: &Value, day_first: bool) -> Option<NaiveDate> {
    match v {
        Value::Date(d) => Some(*d),
        Value::Str(s) => parse_date(s, day_first),
        _ => None,
    }
}

/// Coerces a raw date cell, substituting the configured fallback on parse
/// failure or implausible year. The row is never dropped for a bad date.
pub fn coerce_date(v: &Value, year_floor: i32, fallback: NaiveDate) -> Resolved<NaiveDate> {
    match value_as_date(v, false) {
        Some(d) if d.year() >= year_floor => Resolved::Ok(d),
        Some(_) => Resolved::Fallback {
            value: fallback,
            reason: FallbackReason::ParseFailure,
        },
        None => Resolved::Fallback {
            value: fallback,
            reason: if v.is_null() {
                FallbackReason::EmptyInput
            } else {
                FallbackReason::ParseFailure
            },
        },
    }
}

pub fn round_dp(v: f64, dp: u32) -> f64 {
    let m = 10f64.powi(dp as i32);
    (v * m).round() / m
}

/// Rescales a raw score from its original scale (5 or 10) onto the common
/// 0-10 scale, one decimal.
pub fn normalize_score(score: f64, original_scale: f64) -> f64 {
    round_dp(score / original_scale * 10.0, 1)
}

/// Review identifiers come in as numbers or opaque strings; numbers are
/// canonicalized so joins match across sources.
pub fn coerce_id(v: &Value) -> Value {
    match v {
        Value::Str(s) => match s.trim().parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Str(s.trim().to_string()),
        },
        other => other.clone(),
    }
}
