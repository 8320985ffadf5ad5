// tests/pipeline_run.rs
// Full runs against mock adapters: merging across platforms, degraded
// sources, and the scoring-unavailable policy.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

use trendwatch::categorize::Categorizer;
use trendwatch::config::PipelineConfig;
use trendwatch::error::PipelineError;
use trendwatch::history::HistoryStore;
use trendwatch::ingest::types::SourceAdapter;
use trendwatch::pipeline::Pipeline;
use trendwatch::sentiment::{DisabledModel, MockModel};
use trendwatch::trend::RawObservation;

struct MockAdapter {
    name: &'static str,
    observations: Vec<RawObservation>,
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    async fn fetch(&self, _window_days: u32) -> Result<Vec<RawObservation>, PipelineError> {
        Ok(self.observations.clone())
    }
    fn name(&self) -> &'static str {
        self.name
    }
}

struct DownAdapter;

#[async_trait]
impl SourceAdapter for DownAdapter {
    async fn fetch(&self, _window_days: u32) -> Result<Vec<RawObservation>, PipelineError> {
        Err(PipelineError::source_unavailable("platform_b", "timeout"))
    }
    fn name(&self) -> &'static str {
        "platform_b"
    }
}

fn raw(platform: &str, text: &str, volume: f64, ts: i64) -> RawObservation {
    RawObservation {
        platform: platform.to_string(),
        text: text.to_string(),
        volume,
        observed_at: Utc.timestamp_opt(ts, 0).unwrap(),
        metadata: None,
    }
}

fn quiet_config() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.sentiment.call_delay_ms = 0;
    cfg.min_call_delay_ms = 0;
    cfg
}

#[tokio::test]
async fn observations_of_one_keyword_merge_across_platforms() {
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![
        Box::new(MockAdapter {
            name: "platform_a",
            observations: vec![raw("platform_a", "ai marketing", 100.0, 1_000)],
        }),
        Box::new(MockAdapter {
            name: "platform_b",
            observations: vec![raw("platform_b", "AI Marketing", 50.0, 2_000)],
        }),
    ];
    let store = HistoryStore::open_in_memory().await.unwrap();
    let pipeline = Pipeline::new(
        adapters,
        Arc::new(MockModel { fixed: 0.4 }),
        Categorizer::default(),
        store,
        quiet_config(),
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.trends.len(), 1);

    let trend = &report.trends[0];
    assert_eq!(trend.keyword, "ai marketing");
    assert_eq!(trend.sources.len(), 2);
    assert_eq!(trend.total_volume(), 150.0);
    // combined volume with the two-platform breadth bonus (default 0.25)
    assert_eq!(trend.composite_score, 150.0 * 1.25);
    assert_eq!(trend.first_seen.timestamp(), 1_000);
    assert_eq!(trend.last_seen.timestamp(), 2_000);
    assert_eq!(trend.sentiment_score, Some(0.4));
    assert_eq!(report.summary.duplicates_merged, 1);
}

#[tokio::test]
async fn unavailable_source_degrades_but_run_completes() {
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![
        Box::new(MockAdapter {
            name: "platform_a",
            observations: vec![
                raw("platform_a", "seo tips", 40.0, 1_000),
                raw("platform_a", "growth hacking", 30.0, 1_000),
            ],
        }),
        Box::new(DownAdapter),
    ];
    let store = HistoryStore::open_in_memory().await.unwrap();
    let pipeline = Pipeline::new(
        adapters,
        Arc::new(MockModel { fixed: 0.0 }),
        Categorizer::default(),
        store,
        quiet_config(),
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.trends.len(), 2);
    assert!(report
        .trends
        .iter()
        .all(|t| t.sources.iter().all(|s| s.platform == "platform_a")));
    assert_eq!(report.summary.sources_unavailable, vec!["platform_b".to_string()]);
}

#[tokio::test]
async fn scoring_unavailable_keeps_every_trend_unscored() {
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(MockAdapter {
        name: "platform_a",
        observations: vec![
            raw("platform_a", "email marketing", 60.0, 1_000),
            raw("platform_a", "seo", 80.0, 1_000),
        ],
    })];
    let store = HistoryStore::open_in_memory().await.unwrap();
    let pipeline = Pipeline::new(
        adapters,
        Arc::new(DisabledModel),
        Categorizer::default(),
        store,
        quiet_config(),
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.trends.len(), 2);
    for trend in &report.trends {
        assert_eq!(trend.sentiment_score, None);
        assert!(trend.composite_score > 0.0);
    }
    assert_eq!(report.summary.scoring_failures, 2);
}

#[tokio::test]
async fn run_output_is_persisted_and_queryable() {
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(MockAdapter {
        name: "platform_a",
        observations: vec![raw("platform_a", "lead generation", 25.0, 1_000)],
    })];
    let store = HistoryStore::open_in_memory().await.unwrap();
    let pipeline = Pipeline::new(
        adapters,
        Arc::new(MockModel { fixed: -0.2 }),
        Categorizer::default(),
        store,
        quiet_config(),
    );

    let report = pipeline.run().await.unwrap();
    let records = pipeline
        .store()
        .query(None, report.run_ts, report.run_ts)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].keyword, "lead generation");
    assert_eq!(records[0].sentiment_score, Some(-0.2));
    assert_eq!(records[0].run_ts.timestamp(), report.run_ts.timestamp());
}

#[tokio::test]
async fn malformed_records_are_counted_not_fatal() {
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(MockAdapter {
        name: "platform_a",
        observations: vec![
            raw("platform_a", "  <p></p> ", 10.0, 1_000),
            raw("platform_a", "valid topic", f64::NAN, 1_000),
            raw("platform_a", "kpi dashboards", 15.0, 1_000),
        ],
    })];
    let store = HistoryStore::open_in_memory().await.unwrap();
    let pipeline = Pipeline::new(
        adapters,
        Arc::new(MockModel { fixed: 0.0 }),
        Categorizer::default(),
        store,
        quiet_config(),
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.summary.malformed_dropped, 2);
    assert_eq!(report.trends.len(), 1);
    assert_eq!(report.trends[0].keyword, "kpi dashboards");
}
