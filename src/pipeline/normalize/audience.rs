//! Synthetic audience breakdown: the page export carries only daily follow
//! totals, so the gender/age/country split is derived from a configured
//! weight distribution.

use crate::config::AudienceModel;
use crate::table::{Table, Value};

pub const COLUMNS: &[&str] = &["date", "gender", "age_range", "country", "followers"];

/// Expands each follows row into one row per (gender, age_range, country)
/// cell: `followers = max(1, round(total * weight / total_weight))`.
pub fn derive_audience(follows: &Table, model: &AudienceModel) -> Table {
    let mut out = Table::empty(COLUMNS);
    let total_weight = model.total_weight();
    if total_weight == 0 {
        return out;
    }
    let date_idx = follows.column_index("date");
    let follows_idx = follows.column_index("follows");
    for row in &follows.rows {
        let date = date_idx.map(|i| row[i].clone()).unwrap_or(Value::Null);
        let total = follows_idx
            .and_then(|i| row[i].as_i64())
            .filter(|v| *v > 0)
            .unwrap_or(1);
        for weight in &model.weights {
            for country in &model.countries {
                let followers =
                    ((total as f64 * weight.weight as f64 / total_weight as f64).round() as i64)
                        .max(1);
                out.push_row(vec![
                    date.clone(),
                    Value::Str(weight.gender.clone()),
                    Value::Str(weight.age_range.clone()),
                    Value::Str(country.clone()),
                    Value::Int(followers),
                ]);
            }
        }
    }
    out
}
