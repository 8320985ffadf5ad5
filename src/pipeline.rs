//! One extraction run, end to end.
//!
//! Adapters fetch concurrently; normalization, dedup, categorization and
//! ranking are synchronous transformations over the complete in-memory set
//! (dedup and ranking must see every record, so no streaming); sentiment runs
//! in bounded batches; the history write is the single final side effect.
//! Cancelling a run before persistence therefore leaves the store untouched.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::categorize::Categorizer;
use crate::config::PipelineConfig;
use crate::dedup::dedup;
use crate::error::PipelineError;
use crate::history::HistoryStore;
use crate::ingest::{self, types::SourceAdapter};
use crate::normalize::normalize_all;
use crate::ranking::RankingEngine;
use crate::sentiment::{DynSentimentModel, SentimentScorer};
use crate::trend::Trend;

/// One-time metrics registration (so series carry descriptions).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_observations_total",
            "Raw observations fetched from adapters."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Adapters that were unavailable for a whole run."
        );
        describe_counter!(
            "ingest_batch_errors_total",
            "Keyword batches / subreddits skipped inside an adapter."
        );
        describe_counter!(
            "ingest_malformed_total",
            "Records dropped by the normalizer."
        );
        describe_counter!(
            "ingest_dedup_merged_total",
            "Records merged away by deduplication."
        );
        describe_counter!(
            "sentiment_failures_total",
            "Trends left without a sentiment score."
        );
        describe_counter!("history_persisted_total", "Trends written to history.");
        describe_counter!("pipeline_runs_total", "Completed extraction runs.");
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last completed a run."
        );
    });
}

/// Per-item skip counts aggregated over one run. Degraded input is reported
/// here (and logged), never swallowed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub raw_observations: usize,
    pub malformed_dropped: usize,
    pub duplicates_merged: usize,
    pub sources_unavailable: Vec<String>,
    pub scoring_failures: usize,
    pub trends_ranked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_ts: DateTime<Utc>,
    /// The ranked top-N list, as persisted.
    pub trends: Vec<Trend>,
    pub summary: RunSummary,
}

pub struct Pipeline {
    adapters: Vec<Box<dyn SourceAdapter>>,
    scorer: SentimentScorer,
    categorizer: Categorizer,
    ranking: RankingEngine,
    store: HistoryStore,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        adapters: Vec<Box<dyn SourceAdapter>>,
        model: DynSentimentModel,
        categorizer: Categorizer,
        store: HistoryStore,
        config: PipelineConfig,
    ) -> Self {
        let scorer = SentimentScorer::new(model, &config.sentiment);
        let ranking = RankingEngine::new(config.ranking);
        Self {
            adapters,
            scorer,
            categorizer,
            ranking,
            store,
            config,
        }
    }

    /// The underlying history store, for downstream queries.
    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Execute one run. Always yields either a ranked (possibly reduced)
    /// list with its history written, or a fatal error with nothing written.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();
        let run_ts = Utc::now();

        // 1) Fetch, concurrently per adapter.
        let (raw, sources_unavailable) =
            ingest::fetch_all(&self.adapters, self.config.window_days).await;
        let raw_observations = raw.len();

        // 2) Normalize (pure; malformed records are counted, not raised).
        let (partials, malformed_dropped) = normalize_all(raw, &self.config);
        counter!("ingest_malformed_total").increment(malformed_dropped as u64);

        // 3) Dedup over the full set.
        let (deduped, duplicates_merged) = dedup(partials, &self.config.fuzzy);
        counter!("ingest_dedup_merged_total").increment(duplicates_merged as u64);

        // 4) Categorize; assignment happens exactly once per trend.
        let mut trends: Vec<Trend> = deduped
            .into_iter()
            .map(|p| {
                let category = self.categorizer.assign(&p.keyword);
                Trend::from_partial(p, category)
            })
            .collect();

        // 5) Sentiment enrichment in bounded batches. Failures leave the
        //    score absent; the trend stays.
        let texts: Vec<String> = trends.iter().map(|t| t.keyword.clone()).collect();
        let (scores, scoring_failures) = self.scorer.score_all(&texts).await;
        counter!("sentiment_failures_total").increment(scoring_failures as u64);
        for (trend, score) in trends.iter_mut().zip(scores) {
            trend.sentiment_score = score;
        }

        // 6) Rank; composite is recomputed from sources here and only here.
        let ranked = self.ranking.rank(trends, self.config.top_n);

        // 7) Persist, atomically; the only fatal failure point.
        self.store.persist(run_ts, &ranked).await?;

        counter!("pipeline_runs_total").increment(1);
        gauge!("pipeline_last_run_ts").set(run_ts.timestamp() as f64);

        let summary = RunSummary {
            raw_observations,
            malformed_dropped,
            duplicates_merged,
            sources_unavailable,
            scoring_failures,
            trends_ranked: ranked.len(),
        };

        if !summary.sources_unavailable.is_empty() || ranked.is_empty() {
            tracing::warn!(
                sources_unavailable = ?summary.sources_unavailable,
                trends = ranked.len(),
                "run completed with degraded input"
            );
        }
        tracing::info!(
            raw = summary.raw_observations,
            malformed = summary.malformed_dropped,
            merged = summary.duplicates_merged,
            scoring_failures = summary.scoring_failures,
            ranked = summary.trends_ranked,
            model = self.scorer.model_name(),
            "extraction run complete"
        );

        Ok(RunReport {
            run_ts,
            trends: ranked,
            summary,
        })
    }
}
