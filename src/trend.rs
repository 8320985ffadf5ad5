//! Canonical trend shapes shared by every pipeline stage.
//!
//! `RawObservation` is ephemeral adapter output. `PartialTrend` is what the
//! normalizer emits and the deduplicator merges. `Trend` is the finished,
//! annotated unit that gets ranked and persisted. `HistoryRecord` is the
//! persisted snapshot the store hands back to queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw record straight from a platform adapter, in source-specific units.
/// Created per fetch, consumed by the normalizer, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Adapter name, e.g. "google_trends", "reddit".
    pub platform: String,
    /// Raw keyword or post title as the platform returned it.
    pub text: String,
    /// Volume/engagement in the platform's own units (interest index,
    /// score + comments, ...).
    pub volume: f64,
    pub observed_at: DateTime<Utc>,
    /// Platform extras worth keeping (subreddit, permalink, peak interest).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// One contributing observation after volume coercion to the common scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceObservation {
    pub platform: String,
    /// Volume on the common 0-100-style interest scale.
    pub volume: f64,
    pub observed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Normalized record before category/sentiment annotation. The dedup key is
/// `keyword`; `sources` grows as observations of the same keyword merge in.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialTrend {
    pub keyword: String,
    pub sources: Vec<SourceObservation>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl PartialTrend {
    pub fn from_observation(keyword: String, obs: SourceObservation) -> Self {
        let ts = obs.observed_at;
        Self {
            keyword,
            sources: vec![obs],
            first_seen: ts,
            last_seen: ts,
        }
    }

    /// Merge another partial record for the same keyword into this one.
    /// Sources union; the observation window widens to cover both.
    pub fn merge(&mut self, other: PartialTrend) {
        debug_assert_eq!(self.keyword, other.keyword);
        self.sources.extend(other.sources);
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);
    }
}

/// Fixed marketing taxonomy. `Uncategorized` is the reserved no-match bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Social Media Marketing")]
    SocialMediaMarketing,
    #[serde(rename = "Content Marketing")]
    ContentMarketing,
    #[serde(rename = "SEO & SEM")]
    SeoSem,
    #[serde(rename = "Email Marketing")]
    EmailMarketing,
    #[serde(rename = "Analytics & Data")]
    AnalyticsData,
    #[serde(rename = "Emerging Tech")]
    EmergingTech,
    #[serde(rename = "Uncategorized")]
    Uncategorized,
}

impl Category {
    /// Stable label used in the history schema and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SocialMediaMarketing => "Social Media Marketing",
            Category::ContentMarketing => "Content Marketing",
            Category::SeoSem => "SEO & SEM",
            Category::EmailMarketing => "Email Marketing",
            Category::AnalyticsData => "Analytics & Data",
            Category::EmergingTech => "Emerging Tech",
            Category::Uncategorized => "Uncategorized",
        }
    }

    /// Inverse of `as_str`. Unknown labels land in `Uncategorized` so that
    /// additive schema changes never break old readers.
    pub fn from_label(s: &str) -> Self {
        match s {
            "Social Media Marketing" => Category::SocialMediaMarketing,
            "Content Marketing" => Category::ContentMarketing,
            "SEO & SEM" => Category::SeoSem,
            "Email Marketing" => Category::EmailMarketing,
            "Analytics & Data" => Category::AnalyticsData,
            "Emerging Tech" => Category::EmergingTech,
            _ => Category::Uncategorized,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical deduplicated trend with its computed attributes.
///
/// `composite_score` is derived from `sources` by the ranking engine and is
/// never set directly; it is recomputed whenever `sources` changes. A trend
/// becomes immutable once written to the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub keyword: String,
    pub category: Category,
    /// AI sentiment in [-1.0, 1.0]; `None` when scoring was unavailable.
    pub sentiment_score: Option<f64>,
    pub sources: Vec<SourceObservation>,
    pub composite_score: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Trend {
    pub fn from_partial(partial: PartialTrend, category: Category) -> Self {
        Self {
            keyword: partial.keyword,
            category,
            sentiment_score: None,
            sources: partial.sources,
            composite_score: 0.0,
            first_seen: partial.first_seen,
            last_seen: partial.last_seen,
        }
    }

    /// Sum of normalized volume over all contributing observations.
    pub fn total_volume(&self) -> f64 {
        self.sources.iter().map(|s| s.volume).sum()
    }

    /// Number of distinct platforms that observed this trend.
    pub fn platform_count(&self) -> usize {
        let mut platforms: Vec<&str> = self.sources.iter().map(|s| s.platform.as_str()).collect();
        platforms.sort_unstable();
        platforms.dedup();
        platforms.len()
    }
}

/// Persisted snapshot of a `Trend` at a specific run, keyed by
/// (keyword, run_ts). Owned by the history store; append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub keyword: String,
    pub category: Category,
    pub sentiment_score: Option<f64>,
    pub composite_score: f64,
    pub total_volume: f64,
    pub sources: Vec<SourceObservation>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub run_ts: DateTime<Utc>,
}
