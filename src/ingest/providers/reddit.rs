//! Reddit listing adapter.
//!
//! Scans the hot listing of each configured subreddit over the public JSON
//! API. Raw volume is post score + comment count (engagement); subreddit,
//! permalink and upvote ratio ride along as metadata. Hot listings carry no
//! server-side time window, so the window parameter only shapes the other
//! adapters' queries; a hot listing is inherently current.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::PipelineError;
use crate::ingest::types::SourceAdapter;
use crate::retry::RetryPolicy;
use crate::trend::RawObservation;

pub const PLATFORM: &str = "reddit";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: Option<String>,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    num_comments: f64,
    #[serde(default)]
    created_utc: f64,
    permalink: Option<String>,
    upvote_ratio: Option<f64>,
}

pub struct RedditAdapter {
    mode: Mode,
    subreddits: Vec<String>,
    limit: u32,
    min_delay: Duration,
    retry: RetryPolicy,
}

enum Mode {
    Fixture(String),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl RedditAdapter {
    pub fn from_fixture(payload: &str, subreddits: Vec<String>) -> Self {
        Self {
            mode: Mode::Fixture(payload.to_string()),
            subreddits,
            limit: 50,
            min_delay: Duration::ZERO,
            retry: RetryPolicy::new(1, Duration::ZERO),
        }
    }

    pub fn from_http(
        base_url: impl Into<String>,
        subreddits: Vec<String>,
        limit: u32,
        min_delay: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let client = reqwest::Client::builder()
            // Reddit rejects default library user agents.
            .user_agent("trendwatch/0.1 (trend extraction pipeline)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            mode: Mode::Http {
                base_url: base_url.into(),
                client,
            },
            subreddits,
            limit,
            min_delay,
            retry,
        }
    }

    fn parse_listing(body: &str, subreddit: &str) -> Result<Vec<RawObservation>> {
        let t0 = std::time::Instant::now();
        let listing: Listing = serde_json::from_str(body).context("parsing listing json")?;

        let mut out = Vec::with_capacity(listing.data.children.len());
        for child in listing.data.children {
            let post = child.data;
            let title = match post.title {
                Some(t) if !t.trim().is_empty() => t,
                _ => continue,
            };
            let engagement = post.score + post.num_comments;
            let observed_at = Utc
                .timestamp_opt(post.created_utc as i64, 0)
                .single()
                .unwrap_or_else(Utc::now);

            out.push(RawObservation {
                platform: PLATFORM.to_string(),
                text: title,
                volume: engagement,
                observed_at,
                metadata: Some(json!({
                    "subreddit": subreddit,
                    "url": post
                        .permalink
                        .map(|p| format!("https://reddit.com{p}")),
                    "comments": post.num_comments,
                    "upvote_ratio": post.upvote_ratio,
                })),
            });
        }

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    async fn fetch(&self, _window_days: u32) -> Result<Vec<RawObservation>, PipelineError> {
        match &self.mode {
            Mode::Fixture(payload) => {
                let mut out = Vec::new();
                for sub in &self.subreddits {
                    let mut observations = Self::parse_listing(payload, sub)
                        .map_err(|e| PipelineError::source_unavailable(PLATFORM, e))?;
                    out.append(&mut observations);
                }
                Ok(out)
            }

            Mode::Http { base_url, client } => {
                let mut out = Vec::new();
                let mut subs_failed = 0usize;
                let mut last_err = String::new();

                for (i, sub) in self.subreddits.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(self.min_delay).await;
                    }
                    let url = format!("{base_url}/r/{sub}/hot.json");

                    let body = self
                        .retry
                        .run(|| {
                            let client = client.clone();
                            let url = url.clone();
                            let limit = self.limit.to_string();
                            async move {
                                let resp = client
                                    .get(&url)
                                    .query(&[("limit", limit.as_str()), ("raw_json", "1")])
                                    .send()
                                    .await
                                    .context("listing http get")?;
                                let resp =
                                    resp.error_for_status().context("listing http status")?;
                                resp.text().await.context("listing http body")
                            }
                        })
                        .await;

                    match body.and_then(|b| Self::parse_listing(&b, sub)) {
                        Ok(mut observations) => out.append(&mut observations),
                        Err(e) => {
                            // One failed subreddit is skipped, not fatal.
                            tracing::warn!(provider = PLATFORM, error = ?e, subreddit = %sub, "subreddit fetch failed");
                            counter!("ingest_batch_errors_total").increment(1);
                            subs_failed += 1;
                            last_err = e.to_string();
                        }
                    }
                }

                if out.is_empty() && subs_failed > 0 {
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
