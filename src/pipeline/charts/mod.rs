//! Aggregation/Chart Engine: grouped aggregates over the cleaned tables,
//! period-over-period margins, and the chart catalog consumed by the
//! dashboard. Every chart is a pure function of its cleaned inputs and can be
//! regenerated in any order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ChartTypeMap;
use crate::pipeline::normalize::{round_dp, value_as_date};
use crate::pipeline::CleanedTables;
use crate::table::{cmp_values, Table, Value};

/// Rendering hint attached to every chart table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    SummaryCard,
    Line,
    Bar,
    Pie,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::SummaryCard => "summary_card",
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Pie => "pie",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping granularity for time-indexed aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Year,
    YearMonth,
}

impl Period {
    pub fn column_name(&self) -> &'static str {
        match self {
            Period::Year => "Year",
            Period::YearMonth => "Month",
        }
    }

    /// Period key for a date cell; rows without a parseable date fall out of
    /// the grouping, matching coerce-then-drop-key semantics upstream.
    pub fn key(&self, date: &Value) -> Option<Value> {
        use chrono::Datelike;
        let d = value_as_date(date, false)?;
        Some(match self {
            Period::Year => Value::Int(d.year() as i64),
            Period::YearMonth => Value::Str(format!("{:04}-{:02}", d.year(), d.month())),
        })
    }
}

/// One produced chart: identifier plus the tagged table.
#[derive(Debug, Clone)]
pub struct ChartTable {
    pub id: String,
    pub table: Table,
}

impl ChartTable {
    /// Destination name for the sink, `chart_<id>` under the charts prefix.
    pub fn destination(&self) -> String {
        format!("charts/chart_{}", self.id)
    }

    pub fn chart_type(&self) -> Option<&str> {
        self.table
            .rows
            .first()
            .map(|row| self.table.get(row, "chart_type"))
            .and_then(Value::as_str)
    }
}

/// Groups rows by (period key, category values...), sorted ascending by the
/// full key tuple. Row indices within a group stay in input order, which is
/// what gives mode/arg-max their first-encountered tie-break.
fn grouped(
    table: &Table,
    date_col: &str,
    period: Period,
    category_cols: &[&str],
) -> Vec<(Vec<Value>, Vec<usize>)> {
    let date_idx = table.column_index(date_col);
    let cat_indices: Vec<Option<usize>> = category_cols
        .iter()
        .map(|c| table.column_index(c))
        .collect();

    let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
    'rows: for (row_idx, row) in table.rows.iter().enumerate() {
        let Some(period_key) = date_idx.and_then(|i| period.key(&row[i])) else {
            continue;
        };
        let mut key = vec![period_key];
        for idx in &cat_indices {
            match idx.and_then(|i| row.get(i)) {
                Some(v) if !v.is_null() => key.push(v.clone()),
                // null grouping keys drop the row from the aggregate
                _ => continue 'rows,
            }
        }
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, indices)) => indices.push(row_idx),
            None => groups.push((key, vec![row_idx])),
        }
    }
    groups.sort_by(|(a, _), (b, _)| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| cmp_values(x, y))
            .find(|o| *o != std::cmp::Ordering::Equal)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    groups
}

fn numeric(v: f64) -> Value {
    if v.fract() == 0.0 {
        Value::Int(v as i64)
    } else {
        Value::Float(v)
    }
}

fn sum_measure(table: &Table, indices: &[usize], measure: &str) -> f64 {
    let Some(col) = table.column_index(measure) else {
        return 0.0;
    };
    indices
        .iter()
        .filter_map(|&i| table.rows[i][col].as_f64())
        .sum()
}

fn mean_measure(table: &Table, indices: &[usize], measure: &str) -> Option<f64> {
    let col = table.column_index(measure)?;
    let values: Vec<f64> = indices
        .iter()
        .filter_map(|&i| table.rows[i][col].as_f64())
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(round_dp(values.iter().sum::<f64>() / values.len() as f64, 2))
}

/// Grouped sum: `[period, categories..., out_name]`.
pub fn group_sum(
    table: &Table,
    date_col: &str,
    period: Period,
    category_cols: &[&str],
    measure: &str,
    out_name: &str,
) -> Table {
    let mut columns = vec![period.column_name()];
    columns.extend_from_slice(category_cols);
    columns.push(out_name);
    let mut out = Table::empty(&columns);
    for (key, indices) in grouped(table, date_col, period, category_cols) {
        let mut row = key;
        row.push(numeric(sum_measure(table, &indices, measure)));
        out.push_row(row);
    }
    out
}

/// Grouped mean, rounded to two decimals: `[period, categories..., out_name]`.
pub fn group_mean(
    table: &Table,
    date_col: &str,
    period: Period,
    category_cols: &[&str],
    measure: &str,
    out_name: &str,
) -> Table {
    let mut columns = vec![period.column_name()];
    columns.extend_from_slice(category_cols);
    columns.push(out_name);
    let mut out = Table::empty(&columns);
    for (key, indices) in grouped(table, date_col, period, category_cols) {
        let mut row = key;
        row.push(
            mean_measure(table, &indices, measure)
                .map(Value::Float)
                .unwrap_or(Value::Null),
        );
        out.push_row(row);
    }
    out
}

/// Grouped row count: `[period, categories..., out_name]`.
pub fn group_count(
    table: &Table,
    date_col: &str,
    period: Period,
    category_cols: &[&str],
    out_name: &str,
) -> Table {
    let mut columns = vec![period.column_name()];
    columns.extend_from_slice(category_cols);
    columns.push(out_name);
    let mut out = Table::empty(&columns);
    for (key, indices) in grouped(table, date_col, period, category_cols) {
        let mut row = key;
        row.push(Value::Int(indices.len() as i64));
        out.push_row(row);
    }
    out
}

/// Most frequent value of `category_col` per period, ties broken by
/// first-encountered order: `[period, out_name]`.
pub fn group_mode(
    table: &Table,
    date_col: &str,
    period: Period,
    category_col: &str,
    out_name: &str,
) -> Table {
    let mut out = Table::empty(&[period.column_name(), out_name]);
    let Some(cat_idx) = table.column_index(category_col) else {
        return out;
    };
    for (key, indices) in grouped(table, date_col, period, &[]) {
        let mut candidates: Vec<(&Value, usize)> = Vec::new();
        for &i in &indices {
            let v = &table.rows[i][cat_idx];
            if v.is_null() {
                continue;
            }
            match candidates.iter_mut().find(|(c, _)| *c == v) {
                Some((_, count)) => *count += 1,
                None => candidates.push((v, 1)),
            }
        }
        // candidates are in first-encountered order, so a strict > keeps the
        // earliest value on ties
        let mut best: Option<(&Value, usize)> = None;
        for (v, count) in &candidates {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((v, *count));
            }
        }
        let mut row = key;
        row.push(best.map(|(v, _)| v.clone()).unwrap_or(Value::Null));
        out.push_row(row);
    }
    out
}

/// Per period, the `category_col` value with the highest row count:
/// `[period, category_col, count_name]`.
pub fn group_arg_max(
    table: &Table,
    date_col: &str,
    period: Period,
    category_col: &str,
    count_name: &str,
) -> Table {
    let counts = group_count(table, date_col, period, &[category_col], count_name);
    let mut out = Table::empty(&[period.column_name(), category_col, count_name]);
    let mut current: Option<(Value, Vec<Value>, i64)> = None;
    for row in &counts.rows {
        let period_key = row[0].clone();
        let count = row[2].as_i64().unwrap_or(0);
        match &mut current {
            Some((p, best, best_count)) if *p == period_key => {
                if count > *best_count {
                    *best = row.clone();
                    *best_count = count;
                }
            }
            _ => {
                if let Some((_, best, _)) = current.take() {
                    out.push_row(best);
                }
                current = Some((period_key, row.clone(), count));
            }
        }
    }
    if let Some((_, best, _)) = current {
        out.push_row(best);
    }
    out
}

/// Appends `Margin (%)` and `Margin (Abs)` columns to a period-sorted
/// aggregate. First period margins are 0; a zero previous value makes the
/// percentage margin null rather than infinite.
pub fn add_margin(mut table: Table, value_col: &str) -> Table {
    let Some(value_idx) = table.column_index(value_col) else {
        return table;
    };
    let values: Vec<f64> = table
        .rows
        .iter()
        .map(|r| r[value_idx].as_f64().unwrap_or(0.0))
        .collect();
    table.columns.push("Margin (%)".to_string());
    table.columns.push("Margin (Abs)".to_string());
    for (i, row) in table.rows.iter_mut().enumerate() {
        if i == 0 {
            row.push(Value::Int(0));
            row.push(Value::Int(0));
            continue;
        }
        let (prev, curr) = (values[i - 1], values[i]);
        let pct = if prev == 0.0 {
            Value::Null
        } else {
            // ratio rounded to 4 decimals before the x100 scaling
            Value::Float(round_dp(round_dp((curr - prev) / prev, 4) * 100.0, 2))
        };
        row.push(pct);
        row.push(numeric(round_dp(curr - prev, 2)));
    }
    table
}

/// Inserts the `chart_type` column (position 1, as the dashboard expects)
/// resolved from the configured map with an optional per-call override.
pub fn tag_chart_type(
    mut table: Table,
    chart_id: &str,
    types: &ChartTypeMap,
    override_type: Option<ChartType>,
) -> Table {
    let resolved = types
        .resolve(chart_id, override_type)
        .map(|t| Value::Str(t.as_str().to_string()))
        .unwrap_or(Value::Null);
    let insert_at = 1.min(table.columns.len());
    table.columns.insert(insert_at, "chart_type".to_string());
    for row in &mut table.rows {
        row.insert(insert_at, resolved.clone());
    }
    table
}

/// The KPI columns summarized by `facebook_metrics_summary`.
const SUMMARY_KPIS: &[&str] = &["visits", "views", "link_clicks", "interactions", "reach"];

/// Yearly sums with margins for every KPI, stacked in long format:
/// `[Year, KPI, Value, Margin (%), Margin (Abs)]`.
pub fn facebook_metrics_summary(metrics: &Table) -> Table {
    let mut out = Table::empty(&["Year", "KPI", "Value", "Margin (%)", "Margin (Abs)"]);
    for kpi in SUMMARY_KPIS {
        let agg = add_margin(
            group_sum(metrics, "date", Period::Year, &[], kpi, "Value"),
            "Value",
        );
        for row in &agg.rows {
            out.push_row(vec![
                row[0].clone(),
                Value::Str(kpi.to_string()),
                row[1].clone(),
                row[2].clone(),
                row[3].clone(),
            ]);
        }
    }
    out
}

/// Generates the full chart catalog from the cleaned tables. Charts over an
/// empty source degrade to empty tagged tables; nothing aborts the batch.
pub fn generate_all(cleaned: &CleanedTables, types: &ChartTypeMap) -> Vec<ChartTable> {
    use Period::{Year, YearMonth};
    let reviews = &cleaned.reviews;
    let subratings = &cleaned.subratings;
    let metrics = &cleaned.metrics;
    let follows = &cleaned.follows;
    let audience = &cleaned.audience;
    let content = &cleaned.content;

    let yearly_sum_margin =
        |t: &Table, measure: &str, out: &str| add_margin(group_sum(t, "date", Year, &[], measure, out), out);
    let yearly_mean_margin =
        |t: &Table, measure: &str, out: &str| add_margin(group_mean(t, "date", Year, &[], measure, out), out);
    let yearly_count_margin =
        |t: &Table, out: &str| add_margin(group_count(t, "date", Year, &[], out), out);

    let charts: Vec<(&str, Table)> = vec![
        ("facebook_metrics_summary", facebook_metrics_summary(metrics)),
        ("follower_growth", yearly_sum_margin(follows, "follows", "Follows")),
        (
            "engagement_over_time",
            yearly_sum_margin(metrics, "interactions", "interactions"),
        ),
        ("reach_over_time", yearly_sum_margin(metrics, "reach", "reach")),
        (
            "content_type_performance",
            group_sum(content, "date", Year, &["content_type"], "interactions", "interactions"),
        ),
        (
            "audience_gender_age",
            group_sum(audience, "date", Year, &["gender", "age_range"], "followers", "followers"),
        ),
        (
            "audience_country",
            group_sum(audience, "date", Year, &["country"], "followers", "followers"),
        ),
        (
            "avg_rating_over_time",
            yearly_mean_margin(reviews, "normalized_rating", "Average Rating"),
        ),
        (
            "review_volume_over_time",
            yearly_count_margin(reviews, "Review Count"),
        ),
        (
            "sentiment_distribution",
            group_count(reviews, "date", Year, &["sentiment"], "Review Count"),
        ),
        (
            "subratings_analysis",
            group_mean(subratings, "date", Year, &["subrating_name"], "subrating_value", "subrating_value"),
        ),
        (
            "reviews_by_country",
            group_count(reviews, "date", Year, &["country"], "Review Count"),
        ),
        (
            "reviews_by_stay_type",
            group_count(reviews, "date", Year, &["stay_type"], "Review Count"),
        ),
        ("total_reviews", yearly_count_margin(reviews, "Total Reviews")),
        (
            "average_rating",
            yearly_mean_margin(reviews, "normalized_rating", "Average Rating"),
        ),
        (
            "most_common_sentiment",
            group_mode(reviews, "date", Year, "sentiment", "Most Common Sentiment"),
        ),
        (
            "top_country_reviews",
            group_arg_max(reviews, "date", Year, "country", "Review Count"),
        ),
        (
            "top_stay_type",
            group_arg_max(reviews, "date", Year, "stay_type", "Review Count"),
        ),
        (
            "most_reviewed_platform",
            group_arg_max(reviews, "date", Year, "platform", "Review Count"),
        ),
        (
            "review_volume_monthly",
            group_count(reviews, "date", YearMonth, &[], "Review Count"),
        ),
        (
            "avg_rating_monthly",
            group_mean(reviews, "date", YearMonth, &[], "normalized_rating", "Average Rating"),
        ),
    ];

    charts
        .into_iter()
        .map(|(id, table)| ChartTable {
            id: id.to_string(),
            table: tag_chart_type(table, id, types, None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn follows_series(values: &[(i32, i64)]) -> Table {
        let mut t = Table::empty(&["date", "follows"]);
        for (year, v) in values {
            t.push_row(vec![Value::Date(date(*year, 6, 1)), Value::Int(*v)]);
        }
        t
    }

    #[test]
    fn test_follows_margin_scenario() {
        // 3-year series [100, 150, 120] -> abs [0, 50, -30], pct [0, 50, -20]
        let follows = follows_series(&[(2022, 100), (2023, 150), (2024, 120)]);
        let agg = add_margin(
            group_sum(&follows, "date", Period::Year, &[], "follows", "Follows"),
            "Follows",
        );
        assert_eq!(
            agg.columns,
            vec!["Year", "Follows", "Margin (%)", "Margin (Abs)"]
        );
        let abs: Vec<&Value> = agg.rows.iter().map(|r| &r[3]).collect();
        assert_eq!(abs, vec![&Value::Int(0), &Value::Int(50), &Value::Int(-30)]);
        let pct: Vec<&Value> = agg.rows.iter().map(|r| &r[2]).collect();
        assert_eq!(
            pct,
            vec![&Value::Int(0), &Value::Float(50.0), &Value::Float(-20.0)]
        );
    }

    #[test]
    fn test_margin_pct_null_when_previous_is_zero() {
        let follows = follows_series(&[(2022, 0), (2023, 50)]);
        let agg = add_margin(
            group_sum(&follows, "date", Period::Year, &[], "follows", "Follows"),
            "Follows",
        );
        assert_eq!(agg.rows[0][2], Value::Int(0));
        assert!(agg.rows[1][2].is_null());
        assert_eq!(agg.rows[1][3], Value::Int(50));
    }

    #[test]
    fn test_group_mean_rounds_to_two_decimals() {
        let mut t = Table::empty(&["date", "normalized_rating"]);
        t.push_row(vec![Value::Date(date(2024, 1, 1)), Value::Float(7.0)]);
        t.push_row(vec![Value::Date(date(2024, 2, 1)), Value::Float(8.0)]);
        t.push_row(vec![Value::Date(date(2024, 3, 1)), Value::Float(8.0)]);
        let agg = group_mean(&t, "date", Period::Year, &[], "normalized_rating", "Average Rating");
        assert_eq!(agg.rows[0][1], Value::Float(7.67));
    }

    #[test]
    fn test_group_mode_first_encountered_tie_break() {
        let mut t = Table::empty(&["date", "sentiment"]);
        for label in ["Neutral", "Positive", "Positive", "Neutral"] {
            t.push_row(vec![Value::Date(date(2024, 1, 1)), Value::Str(label.into())]);
        }
        let agg = group_mode(&t, "date", Period::Year, "sentiment", "Most Common Sentiment");
        assert_eq!(agg.rows[0][1], Value::Str("Neutral".into()));
    }

    #[test]
    fn test_group_arg_max_picks_top_category_per_period() {
        let mut t = Table::empty(&["date", "country"]);
        for (y, c) in [
            (2023, "France"),
            (2023, "France"),
            (2023, "Canada"),
            (2024, "Canada"),
        ] {
            t.push_row(vec![Value::Date(date(y, 1, 1)), Value::Str(c.into())]);
        }
        let agg = group_arg_max(&t, "date", Period::Year, "country", "Review Count");
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.rows[0][1], Value::Str("France".into()));
        assert_eq!(agg.rows[0][2], Value::Int(2));
        assert_eq!(agg.rows[1][1], Value::Str("Canada".into()));
    }

    #[test]
    fn test_year_month_grouping() {
        let mut t = Table::empty(&["date", "x"]);
        t.push_row(vec![Value::Date(date(2024, 1, 5)), Value::Int(1)]);
        t.push_row(vec![Value::Date(date(2024, 1, 20)), Value::Int(1)]);
        t.push_row(vec![Value::Date(date(2024, 2, 1)), Value::Int(1)]);
        let agg = group_count(&t, "date", Period::YearMonth, &[], "Review Count");
        assert_eq!(agg.columns[0], "Month");
        assert_eq!(agg.rows[0][0], Value::Str("2024-01".into()));
        assert_eq!(agg.rows[0][1], Value::Int(2));
        assert_eq!(agg.rows[1][0], Value::Str("2024-02".into()));
    }

    #[test]
    fn test_chart_type_tag_inserted_at_position_one() {
        let types = crate::config::ChartTypeMap::default();
        let mut t = Table::empty(&["Year", "Follows"]);
        t.push_row(vec![Value::Int(2024), Value::Int(10)]);
        let tagged = tag_chart_type(t, "follower_growth", &types, None);
        assert_eq!(tagged.columns[1], "chart_type");
        assert_eq!(tagged.rows[0][1], Value::Str("line".into()));

        let mut t2 = Table::empty(&["Year"]);
        t2.push_row(vec![Value::Int(2024)]);
        let overridden = tag_chart_type(t2, "follower_growth", &types, Some(ChartType::Pie));
        assert_eq!(overridden.rows[0][1], Value::Str("pie".into()));
    }

    #[test]
    fn test_generate_all_covers_catalog_even_when_empty() {
        let cleaned = CleanedTables::empty();
        let types = crate::config::ChartTypeMap::default();
        let charts = generate_all(&cleaned, &types);
        assert_eq!(charts.len(), 21);
        for chart in &charts {
            assert!(chart.table.column_index("chart_type").is_some());
            assert!(chart.destination().starts_with("charts/chart_"));
        }
    }
}
