use anyhow::Result;
use chrono::NaiveDate;
use tempfile::tempdir;

use guestpulse_etl::config::PipelineConfig;
use guestpulse_etl::enrich::{LexiconClassifier, PassthroughTranslator};
use guestpulse_etl::pipeline;
use guestpulse_etl::sink::CsvDirSink;
use guestpulse_etl::table::{Table, Value};

const TRIPADVISOR_CSV: &str = "\
reviewId,user/name,text,publishedDate,user/userLocation/name,reviewContext/Trip Type,rating,subratings/0/name,subratings/0/value
101,Alice,Great clean friendly hotel,2024-03-05,France,Couple,4,Cleanliness,5
102,Bob,Terrible dirty awful room,2024-06-10,Canada,Business,1,Cleanliness,2
";

const BOOKING_CSV: &str = "\
id,userName,likedText,dislikedText,reviewDate,country,room_type,score,hotelRatingScores/0/name,hotelRatingScores/0/score
201,Claire,Lovely comfortable stay,,2023-08-15,Belgium,Double Room,8,Location,9
";

const GOOGLE_CSV: &str = "\
name,review,publishedAtDate,stars
Dan,Nice helpful staff,2024-01-20T14:30:00,5
";

const FOLLOWS_CSV: &str = "\
sep=,
Facebook follows export for page
\"2023-05-01\",100
2024-05-01,150
2025-01-01,120
";

const METRICS_CSV: &str = "\
Date,Interactions,Link clicks,Total Reach,Page Views,Visits,Followers
04/02/2024,10,5,0,20,15,8
05/03/2024,12,6,200,25,18,9
";

/// Writes the raw fixtures and returns a config rooted in the temp dir.
fn setup(root: &std::path::Path) -> Result<PipelineConfig> {
    let reviews_dir = root.join("raw/reviews");
    let facebook_dir = root.join("raw/facebook");
    std::fs::create_dir_all(&reviews_dir)?;
    std::fs::create_dir_all(facebook_dir.join("metrics"))?;

    std::fs::write(reviews_dir.join("tripadvisor.csv"), TRIPADVISOR_CSV)?;
    std::fs::write(reviews_dir.join("booking.csv"), BOOKING_CSV)?;
    std::fs::write(reviews_dir.join("google.csv"), GOOGLE_CSV)?;
    std::fs::write(facebook_dir.join("Follows.csv"), FOLLOWS_CSV)?;
    std::fs::write(facebook_dir.join("metrics").join("metrics.csv"), METRICS_CSV)?;

    Ok(PipelineConfig {
        raw_reviews_dir: reviews_dir,
        raw_facebook_dir: facebook_dir,
        output_dir: root.join("output"),
        ..PipelineConfig::default()
    })
}

fn read_output(config: &PipelineConfig, name: &str) -> Result<Table> {
    Ok(Table::from_csv_path(
        &config.output_dir.join(format!("{}.csv", name)),
    )?)
}

async fn run(config: &PipelineConfig) -> Result<()> {
    let sink = CsvDirSink::new(config.output_dir.clone());
    pipeline::run_full(
        config,
        &PassthroughTranslator,
        &LexiconClassifier,
        &sink,
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn test_cleaned_tables_from_raw_exports() -> Result<()> {
    let dir = tempdir()?;
    let config = setup(dir.path())?;
    run(&config).await?;

    let reviews = read_output(&config, "Scrapped_reviews_cleaned")?;
    assert_eq!(reviews.len(), 4);
    let row = &reviews.rows[0];
    assert_eq!(reviews.get(row, "id").as_i64(), Some(101));
    assert_eq!(reviews.get(row, "platform").as_str(), Some("Tripadvisor"));
    // 4 on a 5 scale lands on 8 on the common 0-10 scale
    assert_eq!(reviews.get(row, "normalized_rating").as_f64(), Some(8.0));
    assert_eq!(reviews.get(row, "sentiment").as_str(), Some("Positive"));
    assert_eq!(reviews.get(row, "date").as_str(), Some("2024-03-05"));

    let negative = &reviews.rows[1];
    assert_eq!(reviews.get(negative, "sentiment").as_str(), Some("Negative"));
    assert_eq!(reviews.get(negative, "normalized_rating").as_f64(), Some(2.0));

    // Booking scores are already on a 10 scale; liked/disliked halves merge
    let booking = &reviews.rows[2];
    assert_eq!(reviews.get(booking, "platform").as_str(), Some("Booking"));
    assert_eq!(reviews.get(booking, "normalized_rating").as_f64(), Some(8.0));
    assert_eq!(
        reviews.get(booking, "review_text").as_str(),
        Some("Lovely comfortable stay")
    );
    assert_eq!(reviews.get(booking, "stay_type").as_str(), Some("Double Room"));

    // Google carries no review id, so one is minted; no country either
    let google = &reviews.rows[3];
    assert_eq!(reviews.get(google, "id").as_i64(), Some(1_000_000));
    assert_eq!(reviews.get(google, "country").as_str(), Some("Unknown"));
    assert_eq!(reviews.get(google, "normalized_rating").as_f64(), Some(10.0));

    let subratings = read_output(&config, "Subratings_reviews")?;
    assert_eq!(subratings.len(), 3);

    let follows = read_output(&config, "Follows_cleaned")?;
    assert_eq!(follows.len(), 3);
    assert_eq!(follows.get(&follows.rows[0], "date").as_str(), Some("2023-05-01"));

    let metrics = read_output(&config, "Facebook_metrics_table")?;
    assert_eq!(metrics.len(), 2);
    // sentinel zero reach replaced by 1 under the default policy
    assert_eq!(metrics.get(&metrics.rows[0], "reach").as_i64(), Some(1));
    assert_eq!(metrics.get(&metrics.rows[1], "reach").as_i64(), Some(200));

    let audience = read_output(&config, "Facebook_Audience_details")?;
    assert!(!audience.is_empty());
    for row in &audience.rows {
        assert!(audience.get(row, "followers").as_i64().unwrap() >= 1);
    }

    let content = read_output(&config, "Facebook_content_type_table")?;
    assert!(!content.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_star_schema_keys_and_joins() -> Result<()> {
    let dir = tempdir()?;
    let config = setup(dir.path())?;
    run(&config).await?;

    let platform = read_output(&config, "Dim_Platform")?;
    assert_eq!(platform.len(), 3);
    let names: Vec<Option<&str>> = platform
        .rows
        .iter()
        .map(|r| platform.get(r, "platform_name").as_str())
        .collect();
    assert_eq!(names, vec![Some("Booking"), Some("Google"), Some("Tripadvisor")]);
    let ids: Vec<Option<i64>> = platform
        .rows
        .iter()
        .map(|r| platform.get(r, "platform_id").as_i64())
        .collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);

    // union of dates across every cleaned table, chronologically keyed
    let dim_date = read_output(&config, "Dim_Date")?;
    assert_eq!(dim_date.len(), 8);
    assert_eq!(dim_date.get(&dim_date.rows[0], "date").as_str(), Some("2023-05-01"));
    assert_eq!(dim_date.get(&dim_date.rows[0], "date_id").as_i64(), Some(1));
    assert_eq!(dim_date.get(&dim_date.rows[7], "date").as_str(), Some("2025-01-01"));

    let reviewer = read_output(&config, "Dim_Reviewer")?;
    assert_eq!(reviewer.len(), 4);
    assert_eq!(
        reviewer.get(&reviewer.rows[0], "reviewer_name").as_str(),
        Some("Alice")
    );
    assert_eq!(reviewer.get(&reviewer.rows[0], "country").as_str(), Some("France"));

    let subrating = read_output(&config, "Dim_Subrating")?;
    assert_eq!(subrating.len(), 2);
    assert_eq!(
        subrating.get(&subrating.rows[0], "subrating_name").as_str(),
        Some("Cleanliness")
    );

    // every subrating row finds its review: no null foreign keys
    let fact_reviews = read_output(&config, "Fact_Reviews")?;
    assert_eq!(fact_reviews.len(), 3);
    for row in &fact_reviews.rows {
        assert!(!fact_reviews.get(row, "reviewer_id").is_null());
        assert!(!fact_reviews.get(row, "platform_id").is_null());
        assert!(!fact_reviews.get(row, "date_id").is_null());
        assert!(!fact_reviews.get(row, "rating").is_null());
    }

    // one fact row per metrics row
    let fact_facebook = read_output(&config, "Fact_Facebook")?;
    assert_eq!(fact_facebook.len(), 2);
    for row in &fact_facebook.rows {
        assert!(!fact_facebook.get(row, "date_id").is_null());
    }
    Ok(())
}

#[tokio::test]
async fn test_chart_catalog_and_margins() -> Result<()> {
    let dir = tempdir()?;
    let config = setup(dir.path())?;
    run(&config).await?;

    let growth = read_output(&config, "charts/chart_follower_growth")?;
    assert_eq!(
        growth.columns,
        vec!["Year", "chart_type", "Follows", "Margin (%)", "Margin (Abs)"]
    );
    assert_eq!(growth.len(), 3);
    assert_eq!(growth.get(&growth.rows[0], "chart_type").as_str(), Some("line"));

    // yearly follows [100, 150, 120] -> abs [0, 50, -30], pct [0, 50, -20]
    let follows: Vec<Option<i64>> = growth
        .rows
        .iter()
        .map(|r| growth.get(r, "Follows").as_i64())
        .collect();
    assert_eq!(follows, vec![Some(100), Some(150), Some(120)]);
    let abs: Vec<Option<i64>> = growth
        .rows
        .iter()
        .map(|r| growth.get(r, "Margin (Abs)").as_i64())
        .collect();
    assert_eq!(abs, vec![Some(0), Some(50), Some(-30)]);
    let pct: Vec<Option<f64>> = growth
        .rows
        .iter()
        .map(|r| growth.get(r, "Margin (%)").as_f64())
        .collect();
    assert_eq!(pct, vec![Some(0.0), Some(50.0), Some(-20.0)]);

    let summary = read_output(&config, "charts/chart_facebook_metrics_summary")?;
    assert_eq!(
        summary.columns,
        vec!["Year", "chart_type", "KPI", "Value", "Margin (%)", "Margin (Abs)"]
    );
    // one 2024 row per KPI with the yearly sums
    assert_eq!(summary.len(), 5);
    let reach_row = summary
        .rows
        .iter()
        .find(|r| summary.get(r, "KPI").as_str() == Some("reach"))
        .unwrap();
    assert_eq!(summary.get(reach_row, "Value").as_i64(), Some(201));

    let sentiment = read_output(&config, "charts/chart_most_common_sentiment")?;
    assert!(sentiment
        .rows
        .iter()
        .all(|r| !sentiment.get(r, "Most Common Sentiment").is_null()));

    let monthly = read_output(&config, "charts/chart_review_volume_monthly")?;
    assert_eq!(monthly.columns[0], "Month");
    assert!(monthly
        .rows
        .iter()
        .any(|r| monthly.get(r, "Month").as_str() == Some("2024-03")));
    Ok(())
}

#[tokio::test]
async fn test_reruns_are_deterministic() -> Result<()> {
    let dir = tempdir()?;
    let config = setup(dir.path())?;
    run(&config).await?;
    let first = read_output(&config, "Dim_Date")?;
    run(&config).await?;
    let second = read_output(&config, "Dim_Date")?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_missing_sources_degrade_to_schema_only_outputs() -> Result<()> {
    let dir = tempdir()?;
    let config = PipelineConfig {
        raw_reviews_dir: dir.path().join("raw/reviews"),
        raw_facebook_dir: dir.path().join("raw/facebook"),
        output_dir: dir.path().join("output"),
        ..PipelineConfig::default()
    };
    run(&config).await?;

    let reviews = read_output(&config, "Scrapped_reviews_cleaned")?;
    assert!(reviews.is_empty());
    assert_eq!(reviews.columns.len(), 10);

    // a fact table with nothing to join carries a single all-null row
    let fact = read_output(&config, "Fact_Reviews")?;
    assert_eq!(fact.len(), 1);
    assert!(fact.rows[0].iter().all(Value::is_null));

    let growth = read_output(&config, "charts/chart_follower_growth")?;
    assert!(growth.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_review_dates_below_year_floor_fall_back() -> Result<()> {
    let dir = tempdir()?;
    let config = setup(dir.path())?;
    std::fs::write(
        config.raw_reviews_dir.join("google.csv"),
        "name,review,publishedAtDate,stars\nDan,Nice helpful staff,1970-01-05,5\n",
    )?;
    run(&config).await?;

    let reviews = read_output(&config, "Scrapped_reviews_cleaned")?;
    let google = &reviews.rows[3];
    let fallback = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    assert_eq!(
        reviews.get(google, "date").as_str(),
        Some(fallback.format("%Y-%m-%d").to_string().as_str())
    );
    Ok(())
}
