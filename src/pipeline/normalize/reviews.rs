//! Review cleaning across the three scraped platforms (TripAdvisor,
//! Booking.com, Google), reconciling their column-name drift into one table.

use std::path::Path;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::enrich::{Sentiment, SentimentClassifier, Translator};
use crate::table::{Table, Value};

use super::{coerce_date, coerce_id, field_or, normalize_score, read_raw_table, resolve_field};

pub const COLUMNS: &[&str] = &[
    "id",
    "reviewer_name",
    "platform",
    "review_text",
    "translated_review_text",
    "normalized_rating",
    "date",
    "country",
    "sentiment",
    "stay_type",
];

const REVIEWER_SYNONYMS: &[&str] = &[
    "reviewer_name",
    "user_name",
    "author",
    "name",
    "user/name",
    "username",
];
const TEXT_SYNONYMS: &[&str] = &["text", "review", "review_text", "comment"];
const ID_SYNONYMS: &[&str] = &["id", "reviewid", "review_id"];
const DATE_SYNONYMS: &[&str] = &[
    "date",
    "publisheddate",
    "review_date",
    "reviewdate",
    "publishedatdate",
    "day",
    "datetime",
];
const COUNTRY_SYNONYMS: &[&str] = &[
    "country",
    "location",
    "placeinfo/addressobj/country",
    "userlocation",
    "user/userlocation/name",
    "countrycode",
];
const STAY_TYPE_SYNONYMS: &[&str] = &[
    "stay_type",
    "room_type",
    "triptype",
    "travelertype",
    "reviewcontext/trip type",
];
const RATING_SYNONYMS: &[&str] = &["rating", "score", "stars", "totalscore"];

/// Offset for minted review ids when the source carries none.
const MINTED_ID_BASE: i64 = 1_000_000;

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Booking exports split the review into liked/disliked halves.
fn booking_text(table: &Table, row: &[Value]) -> Value {
    let liked = resolve_field(table, &["likedtext", "liked_text"]);
    let disliked = resolve_field(table, &["dislikedtext", "disliked_text"]);
    let mut parts = Vec::new();
    for idx in [liked, disliked].into_iter().flatten() {
        if let Some(Value::Str(s)) = row.get(idx) {
            if !s.trim().is_empty() {
                parts.push(s.trim().to_string());
            }
        }
    }
    if parts.is_empty() {
        Value::Null
    } else {
        Value::Str(parts.join(" "))
    }
}

/// Cleans one platform's raw review export into the canonical review schema.
/// One output row per input row; missing optional fields never drop a row.
pub fn process_reviews(
    raw: &Table,
    source_type: &str,
    translator: &dyn Translator,
    classifier: &dyn SentimentClassifier,
    config: &PipelineConfig,
) -> Table {
    let mut out = Table::empty(COLUMNS);

    let reviewer_idx = resolve_field(raw, REVIEWER_SYNONYMS);
    let text_idx = resolve_field(raw, TEXT_SYNONYMS);
    let id_idx = resolve_field(raw, ID_SYNONYMS);
    let date_idx = resolve_field(raw, DATE_SYNONYMS);
    let country_idx = resolve_field(raw, COUNTRY_SYNONYMS);
    let stay_idx = resolve_field(raw, STAY_TYPE_SYNONYMS);
    let rating_idx = resolve_field(raw, RATING_SYNONYMS);
    let scale = if source_type == "booking" { 10.0 } else { 5.0 };
    let platform = capitalize(source_type);

    for (row_idx, row) in raw.rows.iter().enumerate() {
        let id = match id_idx.and_then(|i| row.get(i)) {
            Some(v) if !v.is_null() => coerce_id(v),
            _ => Value::Int(MINTED_ID_BASE + row_idx as i64),
        };

        let reviewer = field_or(raw, row, reviewer_idx, "Unknown");

        let review_text = if source_type == "booking" {
            booking_text(raw, row)
        } else {
            match text_idx.and_then(|i| row.get(i)) {
                Some(Value::Str(s)) if !s.trim().is_empty() => Value::Str(s.trim().to_string()),
                _ => Value::Null,
            }
        };

        let (translated, sentiment) = match &review_text {
            Value::Str(text) => {
                let translated = translator.translate(text).into_value();
                let label = classifier.classify(&translated).into_value();
                (Value::Str(translated), label)
            }
            _ => (Value::Null, Sentiment::Neutral),
        };

        let date = match date_idx.and_then(|i| row.get(i)) {
            Some(v) => coerce_date(v, config.year_floor, config.fallback_date).into_value(),
            None => config.fallback_date,
        };

        let country = field_or(raw, row, country_idx, "Unknown");
        let stay_type = field_or(raw, row, stay_idx, "Unknown");

        let rating = rating_idx
            .and_then(|i| row.get(i))
            .and_then(|v| v.as_f64())
            .map(|score| normalize_score(score, scale))
            .unwrap_or_else(|| Sentiment::default_rating(sentiment.label()) as f64);

        out.push_row(vec![
            id,
            reviewer,
            Value::Str(platform.clone()),
            review_text,
            translated,
            Value::Float(rating),
            Value::Date(date),
            country,
            Value::Str(sentiment.label().to_string()),
            stay_type,
        ]);
    }
    out
}

/// Combines the per-platform exports under `raw_reviews_dir` into one cleaned
/// table. A missing source file is reported and contributes zero rows; the
/// run continues (MissingSource policy).
pub fn combine_sources(
    translator: &dyn Translator,
    classifier: &dyn SentimentClassifier,
    config: &PipelineConfig,
) -> Table {
    let mut combined = Table::empty(COLUMNS);
    for source_type in ["tripadvisor", "booking", "google"] {
        let path: &Path = &config.raw_reviews_dir.join(format!("{}.csv", source_type));
        match read_raw_table(path) {
            Ok(raw) => {
                let cleaned = process_reviews(&raw, source_type, translator, classifier, config);
                info!(
                    source = source_type,
                    rows = cleaned.len(),
                    "cleaned review source"
                );
                combined.rows.extend(cleaned.rows);
            }
            Err(e) => {
                warn!(source = source_type, path = %path.display(), error = %e,
                    "review source missing or unreadable; contributing no rows");
            }
        }
    }
    combined
}
