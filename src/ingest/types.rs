// src/ingest/types.rs
use crate::error::PipelineError;
use crate::trend::RawObservation;

/// Per-platform fetch boundary. One implementation per external API; each
/// owns its connection, rate-limit state and retry policy, so adapters can
/// run as independent concurrent tasks.
///
/// `fetch` returns a finite batch for the run's observation window and is
/// restartable per call. A failure for a single keyword batch or subreddit
/// is recorded and skipped inside the adapter; only whole-adapter failure
/// (timeout, auth, rate-limit, transport) surfaces as `SourceUnavailable`.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, window_days: u32) -> Result<Vec<RawObservation>, PipelineError>;
    fn name(&self) -> &'static str;
}
