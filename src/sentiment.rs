//! Sentiment scoring: model abstraction + batching wrapper.
//!
//! The upstream service is a hosted generative model asked to score text in
//! [-1, 1]. The `SentimentModel` trait isolates the wire call so production
//! and tests share the same batching/fallback wrapper. Sentiment is an
//! enrichment, not a gate: any failure leaves `sentiment_score` absent and
//! the trend survives.

use crate::config::SentimentConfig;
use crate::error::PipelineError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Upstream prompt cap per text; long listing titles add nothing past this.
const MAX_TEXT_CHARS: usize = 500;

/// One upstream scoring call for a batch of texts. Implementations must
/// return exactly one score per input, in order.
#[async_trait]
pub trait SentimentModel: Send + Sync {
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<f64>, PipelineError>;
    /// Model name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynSentimentModel = Arc<dyn SentimentModel>;

// ------------------------------------------------------------
// Concrete models
// ------------------------------------------------------------

/// Hosted generative-model scorer (Gemini-style `generateContent` endpoint).
/// Requires an API key; reads `GEMINI_API_KEY` when none is given.
pub struct GeminiModel {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("trendwatch/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model: "gemini-pro".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }

    /// Point the client at a different host (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_prompt(texts: &[String]) -> String {
        let mut prompt = String::from(
            "Score the sentiment of each numbered text between -1 (very negative) \
             and 1 (very positive). Reply with ONLY a JSON array of numbers, one per \
             text, in input order.\n\n",
        );
        for (i, text) in texts.iter().enumerate() {
            let short: String = text.chars().take(MAX_TEXT_CHARS).collect();
            prompt.push_str(&format!("{}. {}\n", i + 1, short));
        }
        prompt
    }
}

#[async_trait]
impl SentimentModel for GeminiModel {
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<f64>, PipelineError> {
        if self.api_key.is_empty() {
            return Err(PipelineError::ScoringUnavailable("no API key".into()));
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        struct GenerationConfig {
            temperature: f32,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            contents: Vec<Content<'a>>,
            #[serde(rename = "generationConfig")]
            generation_config: GenerationConfig,
        }
        #[derive(Deserialize)]
        struct Resp {
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: RespContent,
        }
        #[derive(Deserialize)]
        struct RespContent {
            parts: Vec<RespPart>,
        }
        #[derive(Deserialize)]
        struct RespPart {
            text: String,
        }

        let prompt = Self::build_prompt(texts);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };

        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| PipelineError::ScoringUnavailable(format!("transport: {e}")))?;
        if !resp.status().is_success() {
            return Err(PipelineError::ScoringUnavailable(format!(
                "status {}",
                resp.status()
            )));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| PipelineError::ScoringUnavailable(format!("body: {e}")))?;
        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or("");

        parse_score_array(text, texts.len())
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Extract a JSON array of scores from model output, tolerating surrounding
/// prose or code fences. Length must match the input count.
fn parse_score_array(text: &str, expected: usize) -> Result<Vec<f64>, PipelineError> {
    static RE_ARRAY: OnceCell<Regex> = OnceCell::new();
    let re = RE_ARRAY.get_or_init(|| Regex::new(r"\[[^\[\]]*\]").unwrap());
    let raw = re
        .find(text)
        .map(|m| m.as_str())
        .ok_or_else(|| PipelineError::ScoringUnavailable("no array in reply".into()))?;
    let scores: Vec<f64> = serde_json::from_str(raw)
        .map_err(|e| PipelineError::ScoringUnavailable(format!("malformed array: {e}")))?;
    if scores.len() != expected {
        return Err(PipelineError::ScoringUnavailable(format!(
            "expected {expected} scores, got {}",
            scores.len()
        )));
    }
    Ok(scores.into_iter().map(|s| s.clamp(-1.0, 1.0)).collect())
}

/// Deterministic model for tests and keyless local runs.
#[derive(Debug, Clone)]
pub struct MockModel {
    pub fixed: f64,
}

#[async_trait]
impl SentimentModel for MockModel {
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<f64>, PipelineError> {
        Ok(vec![self.fixed.clamp(-1.0, 1.0); texts.len()])
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always unavailable; used when no scoring backend is configured.
pub struct DisabledModel;

#[async_trait]
impl SentimentModel for DisabledModel {
    async fn score_batch(&self, _texts: &[String]) -> Result<Vec<f64>, PipelineError> {
        Err(PipelineError::ScoringUnavailable("scoring disabled".into()))
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

// ------------------------------------------------------------
// Batching wrapper
// ------------------------------------------------------------

/// Bounds batch size to the upstream limit, retries a failed batch once, then
/// falls back to per-item scoring for that batch only.
pub struct SentimentScorer {
    model: DynSentimentModel,
    batch_size: usize,
    call_delay: Duration,
}

impl SentimentScorer {
    pub fn new(model: DynSentimentModel, cfg: &SentimentConfig) -> Self {
        Self {
            model,
            batch_size: cfg.batch_size.max(1),
            call_delay: Duration::from_millis(cfg.call_delay_ms),
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Score one text. Single-item batch under the same contract.
    pub async fn score(&self, text: &str) -> Result<f64, PipelineError> {
        let scores = self.model.score_batch(&[text.to_string()]).await?;
        scores
            .first()
            .copied()
            .map(|s| s.clamp(-1.0, 1.0))
            .ok_or_else(|| PipelineError::ScoringUnavailable("empty reply".into()))
    }

    /// Score every text, preserving order. Returns one `Option<f64>` per
    /// input (`None` where scoring failed) and the failure count.
    pub async fn score_all(&self, texts: &[String]) -> (Vec<Option<f64>>, usize) {
        let retry = RetryPolicy::new(2, self.call_delay);
        let mut out: Vec<Option<f64>> = Vec::with_capacity(texts.len());
        let mut failures = 0usize;
        let mut first_call = true;

        for chunk in texts.chunks(self.batch_size) {
            if !first_call {
                tokio::time::sleep(self.call_delay).await;
            }
            first_call = false;

            let batch_attempt = retry
                .run(|| {
                    let model = Arc::clone(&self.model);
                    let texts = chunk.to_vec();
                    async move { model.score_batch(&texts).await }
                })
                .await;
            match batch_attempt {
                Ok(scores) => {
                    out.extend(scores.into_iter().map(|s| Some(s.clamp(-1.0, 1.0))));
                }
                Err(e) => {
                    tracing::warn!(
                        model = self.model.name(),
                        error = %e,
                        batch = chunk.len(),
                        "batch scoring failed, falling back to per-item"
                    );
                    for text in chunk {
                        tokio::time::sleep(self.call_delay).await;
                        match self.model.score_batch(std::slice::from_ref(text)).await {
                            Ok(scores) if scores.len() == 1 => {
                                out.push(Some(scores[0].clamp(-1.0, 1.0)));
                            }
                            Ok(_) | Err(_) => {
                                failures += 1;
                                out.push(None);
                            }
                        }
                    }
                }
            }
        }

        (out, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn score_array_parsing_tolerates_prose() {
        let scores = parse_score_array("Here you go:\n[0.5, -0.2, 1.4]", 3).unwrap();
        assert_eq!(scores, vec![0.5, -0.2, 1.0]);
        assert!(parse_score_array("no numbers here", 2).is_err());
        assert!(parse_score_array("[0.1]", 2).is_err());
    }

    #[test]
    fn prompt_numbers_and_truncates() {
        let long = "x".repeat(600);
        let prompt = GeminiModel::build_prompt(&["first".to_string(), long]);
        assert!(prompt.contains("1. first"));
        assert!(prompt.contains("2. "));
        assert!(prompt.chars().filter(|c| *c == 'x').count() == MAX_TEXT_CHARS);
    }

    /// Fails wholesale on batches, succeeds on single items.
    struct FlakyBatches {
        batch_calls: AtomicU32,
    }

    #[async_trait]
    impl SentimentModel for FlakyBatches {
        async fn score_batch(&self, texts: &[String]) -> Result<Vec<f64>, PipelineError> {
            if texts.len() > 1 {
                self.batch_calls.fetch_add(1, Ordering::SeqCst);
                return Err(PipelineError::ScoringUnavailable("batch too big".into()));
            }
            Ok(vec![0.3])
        }
        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn failed_batch_retries_once_then_goes_per_item() {
        let model = Arc::new(FlakyBatches {
            batch_calls: AtomicU32::new(0),
        });
        let scorer = SentimentScorer::new(
            model.clone(),
            &SentimentConfig {
                batch_size: 4,
                call_delay_ms: 0,
            },
        );
        let texts: Vec<String> = (0..4).map(|i| format!("t{i}")).collect();
        let (scores, failures) = scorer.score_all(&texts).await;
        assert_eq!(failures, 0);
        assert_eq!(scores, vec![Some(0.3); 4]);
        // one initial batch attempt + one retry, then per-item
        assert_eq!(model.batch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_model_leaves_scores_absent() {
        let scorer = SentimentScorer::new(
            Arc::new(DisabledModel),
            &SentimentConfig {
                batch_size: 2,
                call_delay_ms: 0,
            },
        );
        let texts: Vec<String> = (0..3).map(|i| format!("t{i}")).collect();
        let (scores, failures) = scorer.score_all(&texts).await;
        assert_eq!(scores, vec![None, None, None]);
        assert_eq!(failures, 3);
    }
}
