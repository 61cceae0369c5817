//! Subrating extraction: flattens the per-review structural rating columns
//! (`subratings/N/name` + `/value`, `hotelRatingScores/N/name` + `/score`)
//! into one long-format table.

use std::path::Path;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::table::{Table, Value};

use super::{coerce_date, coerce_id, read_raw_table, resolve_field, squash};

pub const COLUMNS: &[&str] = &[
    "review_id",
    "reviewer_name",
    "date",
    "subrating_name",
    "subrating_value",
];

const ID_SYNONYMS: &[&str] = &["review_id", "id"];
const REVIEWER_SYNONYMS: &[&str] = &["reviewer_name", "username", "user_name"];
const DATE_SYNONYMS: &[&str] = &["date", "review_date", "published_date"];

/// Offset for minted review ids when the source carries none.
const MINTED_ID_BASE: i64 = 100_000;

/// Pairs of (name column, value column) for structural subrating fields:
/// any `*/name` column with a sibling `*/value` or `*/score` column,
/// covering TripAdvisor's `subratings/` and Booking's `hotelRatingScores/`
/// layouts plus any same-shaped variant. Sorted for determinism.
fn subrating_pairs(table: &Table) -> Vec<(usize, usize)> {
    let mut name_cols: Vec<(String, usize)> = table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(idx, col)| {
            let lower = squash(col);
            lower
                .strip_suffix("/name")
                .map(|stem| (stem.to_string(), idx))
        })
        .collect();
    name_cols.sort();

    let mut pairs = Vec::new();
    for (stem, name_idx) in name_cols {
        let value_idx = table.columns.iter().position(|c| {
            let lower = squash(c);
            lower == format!("{}/value", stem) || lower == format!("{}/score", stem)
        });
        if let Some(value_idx) = value_idx {
            pairs.push((name_idx, value_idx));
        }
    }
    pairs
}

/// Extracts subrating rows from one raw review export. Rows are emitted only
/// for populated (name, value) pairs.
pub fn process_subratings(raw: &Table, config: &PipelineConfig) -> Table {
    let mut out = Table::empty(COLUMNS);
    let id_idx = resolve_field(raw, ID_SYNONYMS);
    let reviewer_idx = resolve_field(raw, REVIEWER_SYNONYMS);
    let date_idx = resolve_field(raw, DATE_SYNONYMS);
    let pairs = subrating_pairs(raw);

    for (row_idx, row) in raw.rows.iter().enumerate() {
        let review_id = match id_idx.and_then(|i| row.get(i)) {
            Some(v) if !v.is_null() => coerce_id(v),
            _ => Value::Int(MINTED_ID_BASE + row_idx as i64),
        };
        let reviewer = match reviewer_idx.and_then(|i| row.get(i)) {
            Some(v) if !v.is_null() => v.clone(),
            _ => Value::Str("Unknown".to_string()),
        };
        let date = match date_idx.and_then(|i| row.get(i)) {
            Some(v) => match coerce_date(v, config.year_floor, config.fallback_date) {
                crate::enrich::Resolved::Ok(d) => Value::Date(d),
                // Unlike review dates, an unparseable subrating date stays
                // explicitly absent rather than being backfilled.
                crate::enrich::Resolved::Fallback { .. } => Value::Null,
            },
            None => Value::Date(config.fallback_date),
        };

        for &(name_idx, value_idx) in &pairs {
            let name = &row[name_idx];
            let value = row[value_idx].as_f64();
            if let (Value::Str(name), Some(value)) = (name, value) {
                out.push_row(vec![
                    review_id.clone(),
                    reviewer.clone(),
                    date.clone(),
                    Value::Str(name.clone()),
                    Value::Float(value),
                ]);
            }
        }
    }
    out
}

/// Scans every CSV under the raw reviews directory and concatenates their
/// subrating rows. Always yields the schema, even with no data at all.
pub fn combine_sources(config: &PipelineConfig) -> Table {
    let mut combined = Table::empty(COLUMNS);
    let dir: &Path = &config.raw_reviews_dir;
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "raw reviews directory unreadable");
            return combined;
        }
    };
    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();
    for path in paths {
        match read_raw_table(&path) {
            Ok(raw) => {
                let rows = process_subratings(&raw, config);
                info!(path = %path.display(), rows = rows.len(), "extracted subratings");
                combined.rows.extend(rows.rows);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable review file");
            }
        }
    }
    combined
}
