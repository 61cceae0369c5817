//! Facebook page KPI metrics cleaning: header drift reconciliation, date
//! windowing, and the sentinel-zero policy applied before any downstream
//! margin computation.

use std::path::Path;

use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::config::{PipelineConfig, ZeroPolicy};
use crate::table::{Table, Value};

use super::{read_raw_table, resolve_field, value_as_date};

pub const COLUMNS: &[&str] = &[
    "date",
    "interactions",
    "link_clicks",
    "reach",
    "views",
    "visits",
    "follows",
];

/// KPI columns subject to the zero policy and integer coercion.
pub const KPI_COLUMNS: &[&str] = &[
    "interactions",
    "link_clicks",
    "reach",
    "views",
    "visits",
    "follows",
];

/// Raw header synonyms per KPI, first match wins.
const KPI_SYNONYMS: &[(&str, &[&str])] = &[
    ("interactions", &["interactions"]),
    ("link_clicks", &["link_clicks", "link clicks"]),
    ("reach", &["reach", "total_reach", "total reach"]),
    ("views", &["views", "page_views", "page views"]),
    ("visits", &["visits"]),
    ("follows", &["follows", "followers", "page_likes", "page likes"]),
];

/// Applies the configured zero policy to one KPI column in place.
pub fn apply_zero_policy(table: &mut Table, column: &str, policy: ZeroPolicy) {
    let Some(idx) = table.column_index(column) else {
        return;
    };
    match policy {
        ZeroPolicy::Keep => {}
        ZeroPolicy::ReplaceWithOne => {
            for row in &mut table.rows {
                if row[idx].as_i64() == Some(0) {
                    row[idx] = Value::Int(1);
                }
            }
        }
        ZeroPolicy::SampleNonZero => {
            let non_zero: Vec<i64> = table
                .rows
                .iter()
                .filter_map(|r| r[idx].as_i64())
                .filter(|v| *v > 0)
                .collect();
            if non_zero.is_empty() {
                return;
            }
            let mut rng = rand::thread_rng();
            for row in &mut table.rows {
                if row[idx].as_i64() == Some(0) {
                    if let Some(sampled) = non_zero.choose(&mut rng) {
                        row[idx] = Value::Int(*sampled);
                    }
                }
            }
        }
    }
}

/// Cleans one raw metrics export: requires a date column, filters to the
/// configured window, and projects rows as `(date, kpi values)` with every
/// KPI present (absent ones default to 1, as the source system did).
fn clean_one(raw: &Table, config: &PipelineConfig) -> Option<Table> {
    let date_idx = resolve_field(raw, &["date", "datetime", "day"])?;
    let kpi_indices: Vec<(usize, Option<usize>)> = KPI_SYNONYMS
        .iter()
        .enumerate()
        .map(|(out_idx, (_, synonyms))| (out_idx, resolve_field(raw, synonyms)))
        .collect();

    let mut out = Table::empty(COLUMNS);
    for row in &raw.rows {
        // Metrics exports are day-first locale
        let Some(date) = value_as_date(&row[date_idx], true) else {
            continue;
        };
        if !config.metrics_window.contains(date) {
            continue;
        }
        let mut cells = vec![Value::Date(date)];
        for &(_, raw_idx) in &kpi_indices {
            let value = raw_idx
                .and_then(|i| row.get(i))
                .and_then(|v| v.as_i64())
                .unwrap_or(1);
            cells.push(Value::Int(value));
        }
        out.push_row(cells);
    }
    Some(out)
}

/// Combines every metrics export under the Facebook raw directory, skipping
/// files without a date column (e.g. the follows export handled elsewhere).
pub fn combine_sources(config: &PipelineConfig) -> Table {
    let mut combined = Table::empty(COLUMNS);
    let dir: &Path = &config.raw_facebook_dir.join("metrics");
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "metrics directory unreadable; producing empty table");
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
            Ok(raw) => match clean_one(&raw, config) {
                Some(cleaned) => {
                    info!(path = %path.display(), rows = cleaned.len(), "cleaned metrics file");
                    combined.rows.extend(cleaned.rows);
                }
                None => {
                    warn!(path = %path.display(), "metrics file has no date column; skipped");
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable metrics file");
            }
        }
    }
    for kpi in KPI_COLUMNS {
        apply_zero_policy(&mut combined, kpi, config.zero_policy);
    }
    combined.sort_by_column("date");
    combined
}
