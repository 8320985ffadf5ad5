//! Trendwatch — binary entrypoint.
//! Wires the configured adapters, sentiment model and history store into one
//! pipeline, executes a single extraction run and prints the ranked list.
//! Scheduling (cron, systemd timers) is left to the operator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use trendwatch::categorize::Categorizer;
use trendwatch::config::PipelineConfig;
use trendwatch::history::HistoryStore;
use trendwatch::ingest::providers::{google_trends::GoogleTrendsAdapter, reddit::RedditAdapter};
use trendwatch::ingest::types::SourceAdapter;
use trendwatch::pipeline::Pipeline;
use trendwatch::retry::RetryPolicy;
use trendwatch::sentiment::{DisabledModel, DynSentimentModel, GeminiModel};

const DB_PATH: &str = "trends.db";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op elsewhere. API keys and config path
    // overrides come from the environment.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = PipelineConfig::load_default()?;
    let retry = RetryPolicy::from(config.retry);
    let delay = Duration::from_millis(config.min_call_delay_ms);

    let adapters: Vec<Box<dyn SourceAdapter>> = vec![
        Box::new(GoogleTrendsAdapter::from_http(
            "https://trends.google.com",
            config.keywords.clone(),
            delay,
            retry,
        )),
        Box::new(RedditAdapter::from_http(
            "https://www.reddit.com",
            config.subreddits.clone(),
            config.reddit_limit,
            delay,
            retry,
        )),
    ];

    // Sentiment is an enrichment: without a key the run proceeds unscored.
    let model: DynSentimentModel = if std::env::var("GEMINI_API_KEY").is_ok() {
        Arc::new(GeminiModel::new(None))
    } else {
        tracing::warn!("GEMINI_API_KEY not set, sentiment scoring disabled");
        Arc::new(DisabledModel)
    };

    let store = HistoryStore::open(Path::new(DB_PATH)).await?;
    let pipeline = Pipeline::new(adapters, model, Categorizer::default(), store, config);

    let report = pipeline.run().await?;

    println!(
        "\n{:<4} {:<40} {:<24} {:>10} {:>10}",
        "#", "Trend", "Category", "Score", "Sentiment"
    );
    println!("{}", "-".repeat(92));
    for (idx, trend) in report.trends.iter().enumerate() {
        let keyword = if trend.keyword.chars().count() > 37 {
            let head: String = trend.keyword.chars().take(37).collect();
            format!("{head}...")
        } else {
            trend.keyword.clone()
        };
        let sentiment = trend
            .sentiment_score
            .map(|s| format!("{s:+.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<4} {:<40} {:<24} {:>10.1} {:>10}",
            idx + 1,
            keyword,
            trend.category.as_str(),
            trend.composite_score,
            sentiment
        );
    }
    println!(
        "\nrun {}: {} trends ranked, {} raw observations, {} merged, {} malformed, {} scoring failures",
        report.run_ts.format("%Y-%m-%d %H:%M:%S"),
        report.summary.trends_ranked,
        report.summary.raw_observations,
        report.summary.duplicates_merged,
        report.summary.malformed_dropped,
        report.summary.scoring_failures,
    );
    if !report.summary.sources_unavailable.is_empty() {
        println!(
            "warning: sources unavailable this run: {}",
            report.summary.sources_unavailable.join(", ")
        );
    }

    Ok(())
}
