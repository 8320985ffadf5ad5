//! Google Trends-style interest adapter.
//!
//! Queries an interest-over-time endpoint for the configured seed keywords,
//! at most five keywords per request (upstream payload limit). The mean
//! interest over the returned timeline becomes the raw volume (already a
//! 0-100 index); peak interest and trend direction ride along as metadata.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::PipelineError;
use crate::ingest::types::SourceAdapter;
use crate::retry::RetryPolicy;
use crate::trend::RawObservation;

pub const PLATFORM: &str = "google_trends";

/// Upstream accepts at most five keywords per interest query.
const MAX_KEYWORDS_PER_REQUEST: usize = 5;

#[derive(Debug, Deserialize)]
struct InterestResponse {
    default: InterestDefault,
}

#[derive(Debug, Deserialize)]
struct InterestDefault {
    #[serde(rename = "timelineData")]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
struct TimelinePoint {
    /// Unix seconds as a string, the way the widget API ships it.
    time: String,
    /// One interest value per keyword of the request, request order.
    value: Vec<f64>,
}

pub struct GoogleTrendsAdapter {
    mode: Mode,
    keywords: Vec<String>,
    min_delay: Duration,
    retry: RetryPolicy,
}

enum Mode {
    /// Parse from an embedded payload; no network. Tests and keyless runs.
    Fixture(String),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl GoogleTrendsAdapter {
    pub fn from_fixture(payload: &str, keywords: Vec<String>) -> Self {
        Self {
            mode: Mode::Fixture(payload.to_string()),
            keywords,
            min_delay: Duration::ZERO,
            retry: RetryPolicy::new(1, Duration::ZERO),
        }
    }

    pub fn from_http(
        base_url: impl Into<String>,
        keywords: Vec<String>,
        min_delay: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("trendwatch/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            mode: Mode::Http {
                base_url: base_url.into(),
                client,
            },
            keywords,
            min_delay,
            retry,
        }
    }

    /// Map one interest payload onto observations for `batch`, request order.
    /// Keywords missing from the value arrays are skipped, not failed.
    fn parse_interest(body: &str, batch: &[String]) -> Result<Vec<RawObservation>> {
        let t0 = std::time::Instant::now();
        let resp: InterestResponse =
            serde_json::from_str(body).context("parsing interest payload")?;
        let points = &resp.default.timeline_data;

        let mut out = Vec::with_capacity(batch.len());
        for (idx, keyword) in batch.iter().enumerate() {
            let values: Vec<f64> = points
                .iter()
                .filter_map(|p| p.value.get(idx).copied())
                .collect();
            if values.is_empty() {
                continue;
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let peak = values.iter().cloned().fold(f64::MIN, f64::max);
            let direction = if values.last() > values.first() {
                "rising"
            } else {
                "falling"
            };
            let observed_at = points
                .last()
                .and_then(|p| parse_unix_str(&p.time))
                .unwrap_or_else(Utc::now);

            out.push(RawObservation {
                platform: PLATFORM.to_string(),
                text: keyword.clone(),
                volume: mean,
                observed_at,
                metadata: Some(json!({
                    "max_interest": peak,
                    "trend_direction": direction,
                })),
            });
        }

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

fn parse_unix_str(s: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = s.parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

#[async_trait]
impl SourceAdapter for GoogleTrendsAdapter {
    async fn fetch(&self, window_days: u32) -> Result<Vec<RawObservation>, PipelineError> {
        match &self.mode {
            Mode::Fixture(payload) => Self::parse_interest(payload, &self.keywords)
                .map_err(|e| PipelineError::source_unavailable(PLATFORM, e)),

            Mode::Http { base_url, client } => {
                let mut out = Vec::new();
                let mut batches_failed = 0usize;
                let mut last_err = String::new();
                let timeframe = format!("now {window_days}-d");

                for (i, batch) in self.keywords.chunks(MAX_KEYWORDS_PER_REQUEST).enumerate() {
                    if i > 0 {
                        tokio::time::sleep(self.min_delay).await;
                    }
                    let url = format!("{base_url}/trends/api/widgetdata/multiline");
                    let query = [("keywords", batch.join(",")), ("timeframe", timeframe.clone())];

                    let body = self
                        .retry
                        .run(|| {
                            let client = client.clone();
                            let url = url.clone();
                            let query = query.clone();
                            async move {
                                let resp = client
                                    .get(&url)
                                    .query(&query)
                                    .send()
                                    .await
                                    .context("interest http get")?;
                                let resp =
                                    resp.error_for_status().context("interest http status")?;
                                resp.text().await.context("interest http body")
                            }
                        })
                        .await;

                    match body.and_then(|b| Self::parse_interest(&b, batch)) {
                        Ok(mut observations) => out.append(&mut observations),
                        Err(e) => {
                            // One failed keyword batch is skipped, not fatal.
                            tracing::warn!(provider = PLATFORM, error = ?e, batch = ?batch, "keyword batch failed");
                            counter!("ingest_batch_errors_total").increment(1);
                            batches_failed += 1;
                            last_err = e.to_string();
                        }
                    }
                }

                if out.is_empty() && batches_failed > 0 {
                    return Err(PipelineError::source_unavailable(PLATFORM, last_err));
                }
                Ok(out)
            }
        }
    }

    fn name(&self) -> &'static str {
        PLATFORM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "default": {
            "timelineData": [
                {"time": "1690000000", "value": [60, 10]},
                {"time": "1690086400", "value": [80, 30]}
            ]
        }
    }"#;

    #[test]
    fn mean_peak_and_direction_per_keyword() {
        let batch = vec!["seo".to_string(), "email marketing".to_string()];
        let obs = GoogleTrendsAdapter::parse_interest(FIXTURE, &batch).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].volume, 70.0);
        assert_eq!(obs[1].volume, 20.0);
        let meta = obs[0].metadata.as_ref().unwrap();
        assert_eq!(meta["max_interest"], 80.0);
        assert_eq!(meta["trend_direction"], "rising");
        assert_eq!(obs[0].observed_at.timestamp(), 1_690_086_400);
    }

    #[test]
    fn keywords_beyond_value_width_are_skipped() {
        let batch = vec!["a".to_string(), "b".into(), "c".into()];
        let obs = GoogleTrendsAdapter::parse_interest(FIXTURE, &batch).unwrap();
        // fixture carries two value columns; the third keyword has no data
        assert_eq!(obs.len(), 2);
    }

    #[tokio::test]
    async fn fixture_adapter_fetches_without_network() {
        let adapter = GoogleTrendsAdapter::from_fixture(FIXTURE, vec!["seo".to_string()]);
        let obs = adapter.fetch(7).await.unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].platform, PLATFORM);
    }
}
