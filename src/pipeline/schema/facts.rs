//! Fact Assembler: left outer joins from cleaned tables to dimensions,
//! replacing natural keys with surrogate keys. Unresolved keys become null
//! foreign keys; rows are never dropped for a failed join.

use std::collections::HashMap;

use tracing::warn;

use crate::pipeline::normalize::value_as_date;
use crate::pipeline::CleanedTables;
use crate::table::{Table, Value};

use super::Dimensions;

pub const FACT_FACEBOOK_COLUMNS: &[&str] = &[
    "date_id",
    "content_type_id",
    "audience_id",
    "reach",
    "views",
    "interactions",
    "link_clicks",
    "visits",
    "follows",
];

pub const FACT_REVIEWS_COLUMNS: &[&str] = &[
    "review_id",
    "reviewer_id",
    "subrating_id",
    "platform_id",
    "date_id",
    "stay_type_id",
    "rating",
    "subrating_value",
];

/// Fact tables produced in one run.
#[derive(Debug, Clone)]
pub struct Facts {
    pub facebook: Table,
    pub reviews: Table,
}

impl Facts {
    pub fn tables(&self) -> Vec<(&'static str, &Table)> {
        vec![
            ("Fact_Facebook", &self.facebook),
            ("Fact_Reviews", &self.reviews),
        ]
    }
}

/// Canonical join representation of a natural key value. Dates and
/// date-shaped strings collapse to one form so joins work whether a table
/// came from memory or was re-read from disk.
fn join_key(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Str(s) => match value_as_date(v, false) {
            Some(d) => Some(d.format("%Y-%m-%d").to_string()),
            None => Some(s.trim().to_string()),
        },
    }
}

fn composite_key(values: &[&Value]) -> Option<String> {
    let parts: Option<Vec<String>> = values.iter().map(|v| join_key(v)).collect();
    parts.map(|p| p.join("\u{1f}"))
}

/// Natural-key -> surrogate-key lookup built from a dimension table.
fn dim_key_map(dim: &Table, natural_cols: &[&str], id_col: &str) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    let id_idx = dim.column_index(id_col);
    let natural_indices: Vec<Option<usize>> =
        natural_cols.iter().map(|c| dim.column_index(c)).collect();
    for row in &dim.rows {
        let naturals: Vec<&Value> = natural_indices
            .iter()
            .map(|idx| idx.and_then(|i| row.get(i)).unwrap_or(&Value::Null))
            .collect();
        let (Some(key), Some(id_idx)) = (composite_key(&naturals), id_idx) else {
            continue;
        };
        map.entry(key).or_insert_with(|| row[id_idx].clone());
    }
    map
}

/// Surrogate key for a natural value, or an explicit null FK when the key
/// does not resolve (JoinMismatch policy).
fn resolve(map: &HashMap<String, Value>, key: Option<String>) -> Value {
    key.and_then(|k| map.get(&k).cloned()).unwrap_or(Value::Null)
}

/// First value of `col` per date key, in input order. Used to attach the
/// content/audience context tables to metrics rows without fanning out the
/// fact (one fact row per metrics row, always).
fn first_per_date(table: &Table, cols: &[&str]) -> HashMap<String, Vec<Value>> {
    let mut map: HashMap<String, Vec<Value>> = HashMap::new();
    let date_idx = table.column_index("date");
    let col_indices: Vec<Option<usize>> = cols.iter().map(|c| table.column_index(c)).collect();
    for row in &table.rows {
        let Some(key) = date_idx.and_then(|i| join_key(&row[i])) else {
            continue;
        };
        map.entry(key).or_insert_with(|| {
            col_indices
                .iter()
                .map(|idx| idx.and_then(|i| row.get(i)).cloned().unwrap_or(Value::Null))
                .collect()
        });
    }
    map
}

/// Facebook KPI fact: one row per cleaned metrics row, every natural key
/// replaced by its surrogate.
pub fn fact_facebook(cleaned: &CleanedTables, dims: &Dimensions) -> Table {
    let date_map = dim_key_map(&dims.date, &["date"], "date_id");
    let content_map = dim_key_map(&dims.content_type, &["content_type"], "content_type_id");
    let audience_map = dim_key_map(
        &dims.audience,
        &["gender", "age_range", "country"],
        "audience_id",
    );
    let content_by_date = first_per_date(&cleaned.content, &["content_type"]);
    let audience_by_date = first_per_date(&cleaned.audience, &["gender", "age_range", "country"]);

    let mut out = Table::empty(FACT_FACEBOOK_COLUMNS);
    let metrics = &cleaned.metrics;
    for row in &metrics.rows {
        let date_key = join_key(metrics.get(row, "date"));

        let content_type_id = date_key
            .as_ref()
            .and_then(|k| content_by_date.get(k))
            .map(|ctx| resolve(&content_map, join_key(&ctx[0])))
            .unwrap_or(Value::Null);

        let audience_id = date_key
            .as_ref()
            .and_then(|k| audience_by_date.get(k))
            .map(|ctx| {
                let refs: Vec<&Value> = ctx.iter().collect();
                resolve(&audience_map, composite_key(&refs))
            })
            .unwrap_or(Value::Null);

        out.push_row(vec![
            resolve(&date_map, date_key),
            content_type_id,
            audience_id,
            metrics.get(row, "reach").clone(),
            metrics.get(row, "views").clone(),
            metrics.get(row, "interactions").clone(),
            metrics.get(row, "link_clicks").clone(),
            metrics.get(row, "visits").clone(),
            metrics.get(row, "follows").clone(),
        ]);
    }
    out
}

/// Review fact: subratings left-joined to reviews by review id, then to the
/// reviewer/subrating/platform/stay-type/date dimensions. When the primary
/// join yields zero rows, a single all-null placeholder row preserves the
/// schema for downstream loaders (EmptyJoinResult policy).
pub fn fact_reviews(cleaned: &CleanedTables, dims: &Dimensions) -> Table {
    let reviews = &cleaned.reviews;
    let subratings = &cleaned.subratings;

    let mut reviews_by_id: HashMap<String, &Vec<Value>> = HashMap::new();
    for row in &reviews.rows {
        if let Some(key) = join_key(reviews.get(row, "id")) {
            reviews_by_id.entry(key).or_insert(row);
        }
    }

    let reviewer_map = dim_key_map(&dims.reviewer, &["reviewer_name"], "reviewer_id");
    let subrating_map = dim_key_map(&dims.subrating, &["subrating_name"], "subrating_id");
    let platform_map = dim_key_map(&dims.platform, &["platform_name"], "platform_id");
    let stay_map = dim_key_map(&dims.stay_type, &["stay_type"], "stay_type_id");
    let date_map = dim_key_map(&dims.date, &["date"], "date_id");

    let mut out = Table::empty(FACT_REVIEWS_COLUMNS);
    let mut mismatches = 0usize;
    for row in &subratings.rows {
        let review_id = subratings.get(row, "review_id").clone();
        let review = join_key(&review_id).and_then(|k| reviews_by_id.get(&k));
        if review.is_none() {
            mismatches += 1;
        }

        let (platform_id, stay_type_id, rating) = match review {
            Some(review_row) => (
                resolve(&platform_map, join_key(reviews.get(review_row, "platform"))),
                resolve(&stay_map, join_key(reviews.get(review_row, "stay_type"))),
                reviews.get(review_row, "normalized_rating").clone(),
            ),
            None => (Value::Null, Value::Null, Value::Null),
        };

        out.push_row(vec![
            review_id,
            resolve(
                &reviewer_map,
                join_key(subratings.get(row, "reviewer_name")),
            ),
            resolve(
                &subrating_map,
                join_key(subratings.get(row, "subrating_name")),
            ),
            platform_id,
            resolve(&date_map, join_key(subratings.get(row, "date"))),
            stay_type_id,
            rating,
            subratings.get(row, "subrating_value").clone(),
        ]);
    }
    if mismatches > 0 {
        warn!(
            mismatches,
            "subrating rows with no matching review; emitted with null foreign keys"
        );
    }
    if out.is_empty() {
        warn!("review fact derivation produced zero rows; emitting schema placeholder");
        out.push_row(vec![Value::Null; FACT_REVIEWS_COLUMNS.len()]);
    }
    out
}

/// Detects the schema-stability placeholder emitted for an empty join result:
/// exactly one row with every column null. Consumers must treat such a table
/// as empty rather than load the row as data.
pub fn is_placeholder(table: &Table) -> bool {
    table.len() == 1 && table.rows[0].iter().all(Value::is_null)
}

pub fn build_facts(cleaned: &CleanedTables, dims: &Dimensions) -> Facts {
    Facts {
        facebook: fact_facebook(cleaned, dims),
        reviews: fact_reviews(cleaned, dims),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::schema::build_dimensions;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cleaned_fixture() -> CleanedTables {
        let mut cleaned = CleanedTables::empty();

        cleaned.reviews.push_row(vec![
            Value::Int(11),
            Value::Str("Alice".into()),
            Value::Str("Google".into()),
            Value::Str("great".into()),
            Value::Str("great".into()),
            Value::Float(8.0),
            Value::Date(date(2024, 1, 1)),
            Value::Str("France".into()),
            Value::Str("Positive".into()),
            Value::Str("Couple".into()),
        ]);

        cleaned.subratings.push_row(vec![
            Value::Int(11),
            Value::Str("Alice".into()),
            Value::Date(date(2024, 1, 1)),
            Value::Str("Cleanliness".into()),
            Value::Float(5.0),
        ]);
        cleaned.subratings.push_row(vec![
            Value::Int(99),
            Value::Str("Ghost".into()),
            Value::Date(date(2024, 1, 2)),
            Value::Str("Service".into()),
            Value::Float(4.0),
        ]);

        cleaned.metrics.push_row(vec![
            Value::Date(date(2024, 1, 1)),
            Value::Int(3),
            Value::Int(2),
            Value::Int(100),
            Value::Int(20),
            Value::Int(10),
            Value::Int(7),
        ]);

        cleaned.audience.push_row(vec![
            Value::Date(date(2024, 1, 1)),
            Value::Str("Female".into()),
            Value::Str("25-34".into()),
            Value::Str("France".into()),
            Value::Int(4),
        ]);
        cleaned.content.push_row(vec![
            Value::Date(date(2024, 1, 1)),
            Value::Str("Photos".into()),
            Value::Int(1),
            Value::Int(1),
            Value::Int(65),
        ]);
        cleaned
    }

    #[test]
    fn test_fact_reviews_preserves_left_rows_and_nulls_mismatches() {
        let cleaned = cleaned_fixture();
        let dims = build_dimensions(&cleaned);
        let fact = fact_reviews(&cleaned, &dims);

        // one fact row per subrating row, mismatch included
        assert_eq!(fact.len(), cleaned.subratings.len());

        let matched = &fact.rows[0];
        assert_eq!(*fact.get(matched, "review_id"), Value::Int(11));
        assert_eq!(*fact.get(matched, "reviewer_id"), Value::Int(1));
        assert_eq!(*fact.get(matched, "rating"), Value::Float(8.0));
        assert!(!fact.get(matched, "date_id").is_null());

        let unmatched = &fact.rows[1];
        assert_eq!(*fact.get(unmatched, "review_id"), Value::Int(99));
        // the "Ghost" reviewer is not in the reviewer dimension
        assert!(fact.get(unmatched, "reviewer_id").is_null());
        assert!(fact.get(unmatched, "platform_id").is_null());
        assert!(fact.get(unmatched, "rating").is_null());
        // but the subrating itself still resolves
        assert!(!fact.get(unmatched, "subrating_id").is_null());
    }

    #[test]
    fn test_zero_overlap_yields_flagged_placeholder() {
        let mut cleaned = CleanedTables::empty();
        cleaned.reviews.push_row(vec![
            Value::Int(1),
            Value::Str("A".into()),
            Value::Str("Google".into()),
            Value::Null,
            Value::Null,
            Value::Float(5.0),
            Value::Date(date(2024, 1, 1)),
            Value::Str("Unknown".into()),
            Value::Str("Neutral".into()),
            Value::Str("Unknown".into()),
        ]);
        // no subrating rows at all
        let dims = build_dimensions(&cleaned);
        let fact = fact_reviews(&cleaned, &dims);
        assert_eq!(fact.len(), 1);
        assert!(fact.rows[0].iter().all(Value::is_null));
        assert!(is_placeholder(&fact));

        // a real table is not flagged
        let real = fact_reviews(&cleaned_fixture(), &dims);
        assert!(!is_placeholder(&real));
    }

    #[test]
    fn test_fact_facebook_resolves_all_keys() {
        let cleaned = cleaned_fixture();
        let dims = build_dimensions(&cleaned);
        let fact = fact_facebook(&cleaned, &dims);
        assert_eq!(fact.len(), 1);
        let row = &fact.rows[0];
        assert!(!fact.get(row, "date_id").is_null());
        assert!(!fact.get(row, "content_type_id").is_null());
        assert!(!fact.get(row, "audience_id").is_null());
        assert_eq!(fact.get(row, "reach").as_i64(), Some(100));
    }

    #[test]
    fn test_fact_facebook_null_fk_for_unknown_date() {
        let mut cleaned = cleaned_fixture();
        cleaned.metrics.push_row(vec![
            Value::Date(date(2030, 12, 31)),
            Value::Int(1),
            Value::Int(1),
            Value::Int(1),
            Value::Int(1),
            Value::Int(1),
            Value::Int(1),
        ]);
        let dims = build_dimensions(&cleaned);
        let fact = fact_facebook(&cleaned, &dims);
        assert_eq!(fact.len(), 2);
        // the 2030 date resolves (metrics feeds Dim_Date) but there is no
        // content or audience context for it
        let row = &fact.rows[1];
        assert!(!fact.get(row, "date_id").is_null());
        assert!(fact.get(row, "content_type_id").is_null());
        assert!(fact.get(row, "audience_id").is_null());
    }
}
