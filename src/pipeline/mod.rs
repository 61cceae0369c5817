//! Pipeline orchestration: runs the normalizer, the schema builder and the
//! chart engine in order, loading each produced table through the configured
//! sink. Each stage is restartable on its own; the later stages read the
//! earlier stages' output from the sink directory when run separately.

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::enrich::{SentimentClassifier, Translator};
use crate::error::Result;
use crate::sink::Sink;
use crate::table::Table;

pub mod charts;
pub mod normalize;
pub mod schema;

pub const SCRAPPED_REVIEWS_CLEANED: &str = "Scrapped_reviews_cleaned";
pub const SUBRATINGS_REVIEWS: &str = "Subratings_reviews";
pub const FOLLOWS_CLEANED: &str = "Follows_cleaned";
pub const FACEBOOK_METRICS_TABLE: &str = "Facebook_metrics_table";
pub const FACEBOOK_AUDIENCE_DETAILS: &str = "Facebook_Audience_details";
pub const FACEBOOK_CONTENT_TYPE_TABLE: &str = "Facebook_content_type_table";

/// The six cleaned tables every downstream stage consumes.
#[derive(Debug, Clone)]
pub struct CleanedTables {
    pub reviews: Table,
    pub subratings: Table,
    pub follows: Table,
    pub metrics: Table,
    pub audience: Table,
    pub content: Table,
}

impl CleanedTables {
    /// Schema-only tables, the shape downstream code sees when every source
    /// is missing.
    pub fn empty() -> Self {
        Self {
            reviews: Table::empty(normalize::reviews::COLUMNS),
            subratings: Table::empty(normalize::subratings::COLUMNS),
            follows: Table::empty(normalize::follows::COLUMNS),
            metrics: Table::empty(normalize::metrics::COLUMNS),
            audience: Table::empty(normalize::audience::COLUMNS),
            content: Table::empty(normalize::content::COLUMNS),
        }
    }

    pub fn tables(&self) -> Vec<(&'static str, &Table)> {
        vec![
            (SCRAPPED_REVIEWS_CLEANED, &self.reviews),
            (SUBRATINGS_REVIEWS, &self.subratings),
            (FOLLOWS_CLEANED, &self.follows),
            (FACEBOOK_METRICS_TABLE, &self.metrics),
            (FACEBOOK_AUDIENCE_DETAILS, &self.audience),
            (FACEBOOK_CONTENT_TYPE_TABLE, &self.content),
        ]
    }

    /// Every cleaned table; the calendar dimension unions date-like columns
    /// across all of them.
    pub fn date_bearing(&self) -> Vec<&Table> {
        self.tables().into_iter().map(|(_, t)| t).collect()
    }
}

/// Loads one table through the sink, logging and swallowing the failure so a
/// bad destination never aborts the rest of a stage.
async fn load_table(sink: &dyn Sink, destination: &str, table: &Table) {
    match sink.bulk_load(destination, table).await {
        Ok(()) => info!(destination, rows = table.len(), "loaded table"),
        Err(e) => error!(destination, error = %e, "failed to load table; continuing"),
    }
}

/// Stage 1: raw exports to cleaned tables, loaded through the sink.
pub async fn run_normalize(
    config: &PipelineConfig,
    translator: &dyn Translator,
    classifier: &dyn SentimentClassifier,
    sink: &dyn Sink,
) -> Result<CleanedTables> {
    let reviews = normalize::reviews::combine_sources(translator, classifier, config);
    let subratings = normalize::subratings::combine_sources(config);
    let follows = normalize::follows::process(&config.raw_facebook_dir.join("Follows.csv"));
    let metrics = normalize::metrics::combine_sources(config);
    let audience = normalize::audience::derive_audience(&follows, &config.audience);
    let content = normalize::content::derive_content(&follows, &config.content);

    let cleaned = CleanedTables {
        reviews,
        subratings,
        follows,
        metrics,
        audience,
        content,
    };
    for (name, table) in cleaned.tables() {
        load_table(sink, name, table).await;
    }
    Ok(cleaned)
}

/// Reads previously produced cleaned tables back from the output directory.
/// A missing table degrades to its empty schema so schema and chart runs
/// stay total.
pub fn load_cleaned(config: &PipelineConfig) -> CleanedTables {
    let mut cleaned = CleanedTables::empty();
    let slots: [(&str, &mut Table); 6] = [
        (SCRAPPED_REVIEWS_CLEANED, &mut cleaned.reviews),
        (SUBRATINGS_REVIEWS, &mut cleaned.subratings),
        (FOLLOWS_CLEANED, &mut cleaned.follows),
        (FACEBOOK_METRICS_TABLE, &mut cleaned.metrics),
        (FACEBOOK_AUDIENCE_DETAILS, &mut cleaned.audience),
        (FACEBOOK_CONTENT_TYPE_TABLE, &mut cleaned.content),
    ];
    for (name, slot) in slots {
        let path = config.output_dir.join(format!("{}.csv", name));
        match Table::from_csv_path(&path) {
            Ok(table) => {
                info!(table = name, rows = table.len(), "loaded cleaned table");
                *slot = table;
            }
            Err(e) => {
                warn!(table = name, path = %path.display(), error = %e,
                    "cleaned table unavailable; using empty schema");
            }
        }
    }
    cleaned
}

/// Stage 2: cleaned tables to the star schema.
pub async fn run_schema(cleaned: &CleanedTables, sink: &dyn Sink) -> Result<()> {
    let (dimensions, facts) = schema::build_schema(cleaned);
    for (name, table) in dimensions.tables() {
        load_table(sink, name, table).await;
    }
    for (name, table) in facts.tables() {
        if schema::is_placeholder(table) {
            warn!(table = name, "fact table is an all-null placeholder; no rows joined");
        }
        load_table(sink, name, table).await;
    }
    Ok(())
}

/// Stage 3: cleaned tables to the chart catalog.
pub async fn run_charts(
    cleaned: &CleanedTables,
    config: &PipelineConfig,
    sink: &dyn Sink,
) -> Result<()> {
    let charts = charts::generate_all(cleaned, &config.chart_types);
    for chart in &charts {
        load_table(sink, &chart.destination(), &chart.table).await;
    }
    info!(charts = charts.len(), "chart catalog generated");
    Ok(())
}

/// Full pipeline: normalize, schema, charts, in order, one run id across the
/// whole batch.
pub async fn run_full(
    config: &PipelineConfig,
    translator: &dyn Translator,
    classifier: &dyn SentimentClassifier,
    sink: &dyn Sink,
) -> Result<()> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("pipeline_run", %run_id);
    let _guard = span.enter();

    info!("starting full pipeline run");
    let cleaned = run_normalize(config, translator, classifier, sink).await?;
    run_schema(&cleaned, sink).await?;
    run_charts(&cleaned, config, sink).await?;
    info!("pipeline run complete");
    Ok(())
}
