//! Capped retries for transient ledger failures.
//!
//! Only `LedgerUnavailable` is retried — a rejection means the chain made
//! a decision and repeating the call cannot change it. Retries are capped
//! and backed off linearly; the last error is surfaced to the caller
//! rather than looping forever.

use std::time::Duration;

use mandi_types::Result;

/// Run `op` up to `attempts` times, sleeping `backoff * attempt` between
/// transient failures.
///
/// # Errors
/// The first non-transient error immediately, or the final transient
/// error once attempts are exhausted.
pub async fn with_retries<T, F, Fut>(attempts: u32, backoff: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                tracing::debug!(attempt, %err, "transient ledger failure, retrying");
                tokio::time::sleep(backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
