use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::charts::ChartType;

/// How sentinel zero values in numeric KPI columns are treated before any
/// period-over-period computation. The source system shipped `ReplaceWithOne`;
/// `SampleNonZero` redraws zeros from the column's non-zero values;
/// `Keep` carries true zeros and relies on the margin engine's zero guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPolicy {
    #[default]
    ReplaceWithOne,
    SampleNonZero,
    Keep,
}

/// Inclusive date window applied to the Facebook metrics exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One cell of the audience weight table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceWeight {
    pub gender: String,
    pub age_range: String,
    pub weight: u32,
}

/// Parameters of the synthetic audience breakdown derived from follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceModel {
    pub countries: Vec<String>,
    pub weights: Vec<AudienceWeight>,
}

impl AudienceModel {
    pub fn total_weight(&self) -> u64 {
        let per_country: u64 = self.weights.iter().map(|w| w.weight as u64).sum();
        per_country * self.countries.len() as u64
    }
}

impl Default for AudienceModel {
    fn default() -> Self {
        let countries = [
            "Tunisie",
            "Algérie",
            "France",
            "Libye",
            "Canada",
            "Italie",
            "Allemagne",
            "Qatar",
            "Arabie Saoudite",
            "Émirats arabes unis",
        ];
        let weights = [
            ("Male", "18-24", 1),
            ("Male", "25-34", 4),
            ("Male", "35-44", 5),
            ("Male", "45-54", 2),
            ("Male", "55-64", 1),
            ("Male", "65+", 1),
            ("Female", "18-24", 2),
            ("Female", "25-34", 12),
            ("Female", "35-44", 9),
            ("Female", "45-54", 3),
            ("Female", "55-64", 1),
            ("Female", "65+", 1),
        ];
        Self {
            countries: countries.iter().map(|c| c.to_string()).collect(),
            weights: weights
                .iter()
                .map(|(g, a, w)| AudienceWeight {
                    gender: g.to_string(),
                    age_range: a.to_string(),
                    weight: *w,
                })
                .collect(),
        }
    }
}

/// Parameters of the synthetic content-type breakdown derived from follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentModel {
    pub content_types: Vec<String>,
    pub reach_cycle: Vec<i64>,
}

impl Default for ContentModel {
    fn default() -> Self {
        let types = [
            "Links",
            "Multi media",
            "Multi photo",
            "Others",
            "Photos",
            "Reels",
            "Stories",
            "Text",
            "Videos",
        ];
        Self {
            content_types: types.iter().map(|t| t.to_string()).collect(),
            reach_cycle: vec![12, 1, 7, 67, 65, 12, 4, 5, 3],
        }
    }
}

static DEFAULT_CHART_TYPES: Lazy<Vec<(&'static str, ChartType)>> = Lazy::new(|| {
    use ChartType::*;
    vec![
        ("facebook_metrics_summary", SummaryCard),
        ("follower_growth", Line),
        ("engagement_over_time", Line),
        ("reach_over_time", Line),
        ("content_type_performance", Bar),
        ("audience_gender_age", Bar),
        ("audience_country", Bar),
        ("avg_rating_over_time", Line),
        ("review_volume_over_time", Bar),
        ("sentiment_distribution", Bar),
        ("subratings_analysis", Bar),
        ("reviews_by_country", Bar),
        ("reviews_by_stay_type", Bar),
        ("total_reviews", SummaryCard),
        ("average_rating", SummaryCard),
        ("most_common_sentiment", SummaryCard),
        ("top_country_reviews", SummaryCard),
        ("top_stay_type", SummaryCard),
        ("most_reviewed_platform", SummaryCard),
        ("review_volume_monthly", Line),
        ("avg_rating_monthly", Line),
    ]
});

/// Chart identifier to chart type lookup, overridable from configuration and
/// per call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartTypeMap(pub BTreeMap<String, ChartType>);

impl ChartTypeMap {
    pub fn resolve(&self, chart_id: &str, override_type: Option<ChartType>) -> Option<ChartType> {
        override_type.or_else(|| self.0.get(chart_id).copied())
    }
}

impl Default for ChartTypeMap {
    fn default() -> Self {
        Self(
            DEFAULT_CHART_TYPES
                .iter()
                .map(|(id, t)| (id.to_string(), *t))
                .collect(),
        )
    }
}

/// Everything the pipeline needs to run, in one explicit structure. Loaded
/// from a TOML file when present, otherwise the built-in defaults apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub raw_reviews_dir: PathBuf,
    pub raw_facebook_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Substituted for unparseable or implausible review dates.
    pub fallback_date: NaiveDate,
    /// Years below this are treated as parse noise.
    pub year_floor: i32,
    pub metrics_window: DateWindow,
    pub zero_policy: ZeroPolicy,
    pub audience: AudienceModel,
    pub content: ContentModel,
    pub chart_types: ChartTypeMap,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_reviews_dir: PathBuf::from("data/raw/reviews"),
            raw_facebook_dir: PathBuf::from("data/raw/facebook"),
            output_dir: PathBuf::from("output"),
            fallback_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            year_floor: 2000,
            metrics_window: DateWindow {
                start: NaiveDate::from_ymd_opt(2022, 2, 4).unwrap_or_default(),
                end: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap_or_default(),
            },
            zero_policy: ZeroPolicy::default(),
            audience: AudienceModel::default(),
            content: ContentModel::default(),
            chart_types: ChartTypeMap::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Directory chart tables are written into.
    pub fn charts_dir(&self) -> PathBuf {
        self.output_dir.join("charts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_complete() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.year_floor, 2000);
        assert_eq!(cfg.audience.countries.len(), 10);
        assert_eq!(cfg.audience.weights.len(), 12);
        assert_eq!(cfg.content.content_types.len(), 9);
        assert_eq!(
            cfg.chart_types.resolve("follower_growth", None),
            Some(ChartType::Line)
        );
    }

    #[test]
    fn test_override_beats_lookup() {
        let cfg = PipelineConfig::default();
        assert_eq!(
            cfg.chart_types
                .resolve("follower_growth", Some(ChartType::Bar)),
            Some(ChartType::Bar)
        );
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let cfg: PipelineConfig =
            toml::from_str("output_dir = \"warehouse\"\nyear_floor = 1990\n").unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("warehouse"));
        assert_eq!(cfg.year_floor, 1990);
        assert_eq!(cfg.zero_policy, ZeroPolicy::ReplaceWithOne);
    }

    #[test]
    fn test_audience_total_weight() {
        let cfg = PipelineConfig::default();
        // 42 weight units across 10 countries, as in the source distribution
        assert_eq!(cfg.audience.total_weight(), 420);
    }
}
