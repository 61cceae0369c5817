use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use guestpulse_etl::config::PipelineConfig;
use guestpulse_etl::enrich::{LexiconClassifier, PassthroughTranslator};
use guestpulse_etl::logging;
use guestpulse_etl::pipeline;
use guestpulse_etl::sink::CsvDirSink;

#[derive(Parser)]
#[command(name = "guestpulse_etl")]
#[command(about = "Guest review and social media ETL pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the raw review and Facebook exports into the cleaned tables
    Normalize,
    /// Build the dimension and fact tables from the cleaned tables
    Schema,
    /// Generate the chart tables from the cleaned tables
    Charts,
    /// Run the full pipeline (normalize + schema + charts)
    Run,
}

fn load_config(path: Option<&PathBuf>) -> PipelineConfig {
    let path = path
        .cloned()
        .or_else(|| std::env::var("GUESTPULSE_CONFIG").ok().map(PathBuf::from));
    let mut config = match path {
        Some(p) => match PipelineConfig::load(&p) {
            Ok(c) => {
                info!(path = %p.display(), "configuration loaded");
                c
            }
            Err(e) => {
                error!(path = %p.display(), error = %e, "failed to load configuration; using defaults");
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };
    if let Ok(dir) = std::env::var("GUESTPULSE_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }
    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    let sink = CsvDirSink::new(config.output_dir.clone());
    let translator = PassthroughTranslator;
    let classifier = LexiconClassifier;

    match cli.command {
        Commands::Normalize => {
            println!("🔄 Normalizing raw exports...");
            let cleaned = pipeline::run_normalize(&config, &translator, &classifier, &sink).await?;
            println!("✅ Cleaned tables written to {}", config.output_dir.display());
            for (name, table) in cleaned.tables() {
                println!("   {}: {} rows", name, table.len());
            }
        }
        Commands::Schema => {
            println!("🔨 Building the star schema...");
            let cleaned = pipeline::load_cleaned(&config);
            match pipeline::run_schema(&cleaned, &sink).await {
                Ok(()) => println!("✅ Schema build completed"),
                Err(e) => {
                    error!("Schema build failed: {}", e);
                    println!("❌ Schema build failed: {}", e);
                }
            }
        }
        Commands::Charts => {
            println!("📊 Generating chart tables...");
            let cleaned = pipeline::load_cleaned(&config);
            match pipeline::run_charts(&cleaned, &config, &sink).await {
                Ok(()) => println!("✅ Charts written to {}", config.charts_dir().display()),
                Err(e) => {
                    error!("Chart generation failed: {}", e);
                    println!("❌ Chart generation failed: {}", e);
                }
            }
        }
        Commands::Run => {
            println!("🚀 Running full pipeline (normalize + schema + charts)...");
            match pipeline::run_full(&config, &translator, &classifier, &sink).await {
                Ok(()) => println!("✅ Full pipeline completed successfully!"),
                Err(e) => {
                    error!("Pipeline run failed: {}", e);
                    println!("❌ Pipeline run failed: {}", e);
                }
            }
        }
    }
    Ok(())
}
