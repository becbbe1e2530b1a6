//! Linear-backoff retry for transient backend errors (§4.3 SCRIBE, §5).
//!
//! Grounded in the same shape as the reference implementation's SQLite-busy
//! retry helper: bounded attempts, a fixed delay between them, and a
//! `Fn() -> Future` so the caller's whole request (not just the transport) is
//! retried. Here the delay is linear rather than exponential, and a retry
//! does not reset the stage-level timeout.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::Result;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retry_max: u32,
    pub retry_delay_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retry_max: 3, retry_delay_seconds: 2 }
    }
}

/// Run `op`, retrying up to `policy.retry_max` times with a constant delay of
/// `policy.retry_delay_seconds` on transient errors. Permanent errors are
/// returned immediately. Returns the number of attempts made alongside the
/// result so callers can populate `UsageRecord.request_count`.
pub async fn retry_transient<T, F, Fut>(op_name: &'static str, policy: RetryPolicy, mut op: F) -> (Result<T>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return (Ok(value), attempts),
            Err(err) if err.is_transient() && attempts <= policy.retry_max => {
                warn!(op_name, attempt = attempts, max = policy.retry_max, error = %err, "transient error, retrying");
                tokio::time::sleep(Duration::from_secs(policy.retry_delay_seconds)).await;
            }
            Err(err) => {
                debug!(op_name, attempts, "giving up after non-retryable or exhausted error");
                return (Err(err), attempts);
            }
        }
    }
}
