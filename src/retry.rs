//! Bounded retry with backoff for external-call boundaries.
//!
//! Both adapters and the sentiment scorer wrap their upstream calls in a
//! `RetryPolicy` instead of ad hoc sleeps, so attempt counts and delays are
//! explicit and configurable.

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            // A zero-attempt policy would never call the operation.
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run `op` up to `max_attempts` times, sleeping `backoff * 2^n` between
    /// attempts. Returns the first success or the last error.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    let delay = self.backoff * 2u32.saturating_pow(attempt - 1);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying after failure");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(cfg: RetryConfig) -> Self {
        Self::new(cfg.max_attempts, Duration::from_millis(cfg.backoff_ms))
    }
}
