// tests/categorize_rules.rs
// Category assignment through the pipeline and from a TOML rule table.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::io::Write;
use std::sync::Arc;

use trendwatch::categorize::Categorizer;
use trendwatch::config::PipelineConfig;
use trendwatch::error::PipelineError;
use trendwatch::history::HistoryStore;
use trendwatch::ingest::types::SourceAdapter;
use trendwatch::pipeline::Pipeline;
use trendwatch::sentiment::MockModel;
use trendwatch::trend::{Category, RawObservation};

struct OneShotAdapter {
    observations: Vec<RawObservation>,
}

#[async_trait]
impl SourceAdapter for OneShotAdapter {
    async fn fetch(&self, _window_days: u32) -> Result<Vec<RawObservation>, PipelineError> {
        Ok(self.observations.clone())
    }
    fn name(&self) -> &'static str {
        "platform_a"
    }
}

fn raw(text: &str, volume: f64) -> RawObservation {
    RawObservation {
        platform: "platform_a".to_string(),
        text: text.to_string(),
        volume,
        observed_at: Utc.timestamp_opt(1_690_000_000, 0).unwrap(),
        metadata: None,
    }
}

#[tokio::test]
async fn unmatched_trends_are_kept_as_uncategorized() {
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(OneShotAdapter {
        observations: vec![
            raw("quarterly offsite planning", 30.0),
            raw("tiktok growth tricks", 20.0),
        ],
    })];
    let mut cfg = PipelineConfig::default();
    cfg.sentiment.call_delay_ms = 0;
    let store = HistoryStore::open_in_memory().await.unwrap();
    let pipeline = Pipeline::new(
        adapters,
        Arc::new(MockModel { fixed: 0.0 }),
        Categorizer::default(),
        store,
        cfg,
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.trends.len(), 2);
    let unmatched = report
        .trends
        .iter()
        .find(|t| t.keyword == "quarterly offsite planning")
        .expect("unmatched trend must not be dropped");
    assert_eq!(unmatched.category, Category::Uncategorized);
    let matched = report
        .trends
        .iter()
        .find(|t| t.keyword == "tiktok growth tricks")
        .unwrap();
    assert_eq!(matched.category, Category::SocialMediaMarketing);
}

#[test]
fn rule_table_loads_from_toml_in_declared_order() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[rules]]
category = "Emerging Tech"
patterns = ["ai"]

[[rules]]
category = "Email Marketing"
patterns = ["email"]
"#
    )
    .unwrap();

    let categorizer = Categorizer::from_toml_path(file.path()).unwrap();
    // "email" contains "ai": the Emerging Tech rule is declared first and
    // shadows the email rule, which is exactly why order is part of the
    // contract.
    assert_eq!(categorizer.assign("email campaigns"), Category::EmergingTech);
    assert_eq!(categorizer.assign("seo"), Category::Uncategorized);
}
