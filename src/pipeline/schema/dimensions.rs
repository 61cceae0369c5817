//! Dimension Builder: deduplicated natural keys, deterministically sorted,
//! with dense 1-based surrogate keys assigned by ordinal position.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

use crate::pipeline::normalize::value_as_date;
use crate::pipeline::CleanedTables;
use crate::table::{cmp_values, Table, Value};

/// All dimension tables produced in one run.
#[derive(Debug, Clone)]
pub struct Dimensions {
    pub date: Table,
    pub content_type: Table,
    pub audience: Table,
    pub reviews: Table,
    pub reviewer: Table,
    pub subrating: Table,
    pub platform: Table,
    pub stay_type: Table,
}

impl Dimensions {
    /// Destination-name/table pairs, in load order.
    pub fn tables(&self) -> Vec<(&'static str, &Table)> {
        vec![
            ("Dim_Date", &self.date),
            ("Dim_Content_Type", &self.content_type),
            ("Dim_Audience", &self.audience),
            ("Dim_Reviews", &self.reviews),
            ("Dim_Reviewer", &self.reviewer),
            ("Dim_Subrating", &self.subrating),
            ("Dim_Platform", &self.platform),
            ("Dim_StayType", &self.stay_type),
        ]
    }
}

/// Generic single-attribute dimension: distinct non-null values of one
/// column, lexicographically sorted, keyed 1..=n. An empty source yields an
/// empty table that still carries the schema.
fn dim_from_column(source: &Table, natural_col: &str, id_col: &str, out_col: &str) -> Table {
    let mut values = source.distinct(natural_col);
    values.sort_by(cmp_values);
    let mut out = Table::empty(&[id_col, out_col]);
    for (ordinal, value) in values.into_iter().enumerate() {
        out.push_row(vec![Value::Int(ordinal as i64 + 1), value]);
    }
    out
}

/// Date dimension: the union of every date-like column across all cleaned
/// tables, deduplicated and chronologically sorted. The dependency on every
/// table is explicit here rather than an incidental directory scan.
pub fn dim_date(date_bearing: &[&Table]) -> Table {
    let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
    for table in date_bearing {
        for (idx, col) in table.columns.iter().enumerate() {
            if !col.to_lowercase().contains("date") {
                continue;
            }
            for row in &table.rows {
                if let Some(d) = row.get(idx).and_then(|v| value_as_date(v, false)) {
                    dates.insert(d);
                }
            }
        }
    }
    let mut out = Table::empty(&["date_id", "date", "day", "month", "year"]);
    for (ordinal, d) in dates.into_iter().enumerate() {
        out.push_row(vec![
            Value::Int(ordinal as i64 + 1),
            Value::Date(d),
            Value::Int(d.day() as i64),
            Value::Int(d.month() as i64),
            Value::Int(d.year() as i64),
        ]);
    }
    out
}

/// Audience dimension: distinct (gender, age_range, country) tuples sorted
/// lexicographically on the tuple.
pub fn dim_audience(audience: &Table) -> Table {
    let cols = ["gender", "age_range", "country"];
    let indices: Vec<Option<usize>> = cols.iter().map(|c| audience.column_index(c)).collect();
    let mut tuples: Vec<Vec<Value>> = Vec::new();
    for row in &audience.rows {
        let tuple: Vec<Value> = indices
            .iter()
            .map(|idx| idx.and_then(|i| row.get(i)).cloned().unwrap_or(Value::Null))
            .collect();
        if !tuples.contains(&tuple) {
            tuples.push(tuple);
        }
    }
    tuples.sort_by(|a, b| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| cmp_values(x, y))
            .find(|o| *o != std::cmp::Ordering::Equal)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut out = Table::empty(&["audience_id", "gender", "age_range", "country"]);
    for (ordinal, tuple) in tuples.into_iter().enumerate() {
        let mut row = vec![Value::Int(ordinal as i64 + 1)];
        row.extend(tuple);
        out.push_row(row);
    }
    out
}

/// Reviewer dimension: natural key is the reviewer name; the country
/// attribute is the first one observed for that name in input order.
pub fn dim_reviewer(reviews: &Table) -> Table {
    let mut entries: Vec<(String, Value)> = Vec::new();
    let name_idx = reviews.column_index("reviewer_name");
    let country_idx = reviews.column_index("country");
    for row in &reviews.rows {
        let Some(Value::Str(name)) = name_idx.and_then(|i| row.get(i)) else {
            continue;
        };
        if entries.iter().any(|(n, _)| n == name) {
            continue;
        }
        let country = country_idx
            .and_then(|i| row.get(i))
            .cloned()
            .unwrap_or(Value::Null);
        entries.push((name.clone(), country));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out = Table::empty(&["reviewer_id", "reviewer_name", "country"]);
    for (ordinal, (name, country)) in entries.into_iter().enumerate() {
        out.push_row(vec![
            Value::Int(ordinal as i64 + 1),
            Value::Str(name),
            country,
        ]);
    }
    out
}

/// Review text dimension: one row per review id with its translated text and
/// sentiment. Natural-keyed; no surrogate is assigned.
pub fn dim_reviews(reviews: &Table) -> Table {
    let mut out = Table::empty(&["review_id", "translated_text", "sentiment"]);
    let mut seen: Vec<Value> = Vec::new();
    let id_idx = reviews.column_index("id");
    let text_idx = reviews.column_index("translated_review_text");
    let sentiment_idx = reviews.column_index("sentiment");
    for row in &reviews.rows {
        let id = id_idx.and_then(|i| row.get(i)).cloned().unwrap_or(Value::Null);
        if id.is_null() || seen.contains(&id) {
            continue;
        }
        seen.push(id.clone());
        out.push_row(vec![
            id,
            text_idx.and_then(|i| row.get(i)).cloned().unwrap_or(Value::Null),
            sentiment_idx
                .and_then(|i| row.get(i))
                .cloned()
                .unwrap_or(Value::Null),
        ]);
    }
    out
}

/// Builds every dimension from the cleaned tables. Fully deterministic:
/// identical inputs always produce identical surrogate assignments.
pub fn build_dimensions(cleaned: &CleanedTables) -> Dimensions {
    Dimensions {
        date: dim_date(&cleaned.date_bearing()),
        content_type: dim_from_column(
            &cleaned.content,
            "content_type",
            "content_type_id",
            "content_type",
        ),
        audience: dim_audience(&cleaned.audience),
        reviews: dim_reviews(&cleaned.reviews),
        reviewer: dim_reviewer(&cleaned.reviews),
        subrating: dim_from_column(
            &cleaned.subratings,
            "subrating_name",
            "subrating_id",
            "subrating_name",
        ),
        platform: dim_from_column(&cleaned.reviews, "platform", "platform_id", "platform_name"),
        stay_type: dim_from_column(&cleaned.reviews, "stay_type", "stay_type_id", "stay_type"),
    }
}
