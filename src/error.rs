//! Pipeline error taxonomy.
//!
//! Per-item failures (one keyword batch, one subreddit, one scoring call) are
//! recovered locally and aggregated into the run summary — they never show up
//! here. Malformed records are dropped and counted at the normalizer, not
//! raised. Only failures that would break the all-or-nothing persistence
//! invariant are fatal for a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// One adapter failed wholesale (timeout, rate-limit, auth, transport).
    /// The run continues with whatever the other adapters returned.
    #[error("source '{name}' unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    /// The upstream text-scoring service is unreachable or returned a
    /// malformed response. Trends are kept with sentiment absent.
    #[error("sentiment scoring unavailable: {0}")]
    ScoringUnavailable(String),

    /// History write failed; nothing was persisted and the run is failed.
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn source_unavailable(source: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            name: source.into(),
            reason: reason.to_string(),
        }
    }
}
