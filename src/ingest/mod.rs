// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::SourceAdapter;
use crate::trend::RawObservation;
use metrics::counter;

/// Run every adapter concurrently and collect whatever they returned.
///
/// Adapters share no mutable state, so their fetches are simply joined.
/// Returns the raw observations plus the names of adapters that were
/// unavailable this run; the caller folds those into the run summary.
pub async fn fetch_all(
    adapters: &[Box<dyn SourceAdapter>],
    window_days: u32,
) -> (Vec<RawObservation>, Vec<String>) {
    let fetches = adapters
        .iter()
        .map(|a| async move { (a.name(), a.fetch(window_days).await) });
    let results = futures::future::join_all(fetches).await;

    let mut raw = Vec::new();
    let mut unavailable = Vec::new();
    for (name, res) in results {
        match res {
            Ok(mut observations) => {
                counter!("ingest_observations_total").increment(observations.len() as u64);
                tracing::info!(source = name, count = observations.len(), "source fetched");
                raw.append(&mut observations);
            }
            Err(e) => {
                tracing::warn!(source = name, error = %e, "source unavailable");
                counter!("ingest_source_errors_total").increment(1);
                unavailable.push(name.to_string());
            }
        }
    }
    (raw, unavailable)
}
