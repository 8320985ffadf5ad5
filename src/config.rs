//! Pipeline configuration.
//!
//! An explicit `PipelineConfig` is passed into pipeline construction so runs
//! are reproducible and testable in isolation. The documented default matches
//! `config/pipeline.toml`; a TOML file can override it, resolved from
//! `$TRENDWATCH_CONFIG_PATH` first and the default path second.

use crate::error::PipelineError;
use crate::ranking::RankingWeights;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_CONFIG_PATH: &str = "TRENDWATCH_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed keywords queried against the interest API.
    pub keywords: Vec<String>,
    /// Subreddits whose hot listings are scanned.
    pub subreddits: Vec<String>,
    /// Posts fetched per subreddit listing.
    pub reddit_limit: u32,
    /// Observation window for one run, in days.
    pub window_days: u32,
    /// Size of the ranked list a run produces.
    pub top_n: usize,
    /// Per-platform factors coercing raw volume to the common 0-100-style
    /// scale. Platforms missing here scale by 1.0.
    pub volume_scale: HashMap<String, f64>,
    pub ranking: RankingWeights,
    pub sentiment: SentimentConfig,
    pub fuzzy: FuzzyConfig,
    pub retry: RetryConfig,
    /// Minimum delay between successive upstream calls of one adapter.
    pub min_call_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Upstream documented batch limit; larger inputs are chunked.
    pub batch_size: usize,
    /// Delay between successive scoring calls.
    pub call_delay_ms: u64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            call_delay_ms: 500,
        }
    }
}

/// Fuzzy keyword merging is an extension point, off by default: exact-match
/// dedup keeps merge semantics deterministic and testable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    pub enabled: bool,
    /// Jaro-Winkler similarity two keywords must reach to merge.
    pub threshold: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.92,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let keywords = [
            "digital marketing",
            "social media marketing",
            "content marketing",
            "SEO",
            "SEM",
            "email marketing",
            "influencer marketing",
            "brand awareness",
            "lead generation",
            "conversion rate",
            "marketing automation",
            "analytics",
            "engagement",
            "viral marketing",
            "growth hacking",
            "marketing strategy",
            "customer acquisition",
            "retention",
            "ROI",
            "KPI",
        ];
        let subreddits = [
            "marketing",
            "digital_marketing",
            "SEO",
            "socialmedia",
            "content_marketing",
        ];
        let mut volume_scale = HashMap::new();
        volume_scale.insert("google_trends".to_string(), 1.0);
        volume_scale.insert("reddit".to_string(), 0.05);

        Self {
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            subreddits: subreddits.iter().map(|s| s.to_string()).collect(),
            reddit_limit: 50,
            window_days: 7,
            top_n: 20,
            volume_scale,
            ranking: RankingWeights::default(),
            sentiment: SentimentConfig::default(),
            fuzzy: FuzzyConfig::default(),
            retry: RetryConfig::default(),
            min_call_delay_ms: 2_000,
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit TOML path.
    pub fn load_from(path: &Path) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("reading {}: {e}", path.display())))?;
        let mut cfg: PipelineConfig = toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("parsing {}: {e}", path.display())))?;
        cfg.keywords = clean_list(cfg.keywords);
        cfg.subreddits = clean_list(cfg.subreddits);
        cfg.fuzzy.threshold = cfg.fuzzy.threshold.clamp(0.0, 1.0);
        Ok(cfg)
    }

    /// Resolve config using env var + fallbacks:
    /// 1) $TRENDWATCH_CONFIG_PATH (must exist)
    /// 2) config/pipeline.toml
    /// 3) built-in default
    pub fn load_default() -> Result<Self, PipelineError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(PipelineError::Config(format!(
                "{ENV_CONFIG_PATH} points to non-existent path"
            )));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }

    /// Scale factor for a platform, 1.0 when unconfigured.
    pub fn scale_for(&self, platform: &str) -> f64 {
        self.volume_scale.get(platform).copied().unwrap_or(1.0)
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|s| s == t) {
            out.push(t.to_string());
        }
    }
    out
}
