//! Retry loop for optimistic transactions.
//!
//! Every engine transaction is read-verify-write: a commit can fail with a
//! version conflict when a concurrent writer got there first, or with a
//! transient store outage. Those failures are re-run against fresh reads a
//! bounded number of times with exponential backoff; terminal business
//! failures surface immediately.

use std::future::Future;
use std::time::Duration;
use ticketline_core::EngineError;
use tokio::time::sleep;

/// Backoff configuration for transaction retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the initial try.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following the given zero-based attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(
            (self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32)) as u64,
        );

        delay.min(self.max_delay)
    }
}

/// Runs a transaction, re-running it on transient failure.
///
/// The operation is called afresh for every attempt, so each retry re-reads
/// the documents it depends on. Terminal errors (business-rule failures,
/// malformed payloads, oversized batches) are returned on first occurrence.
///
/// # Errors
///
/// The last error once retries are exhausted, or the first terminal error.
pub async fn retry_transient<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempt, "transaction succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "transient failure, re-running transaction"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!(attempt, error = %err, "transaction failed after max retries");
                }
                return Err(err);
            }
        }
    }
}
