//! Retry policy: bounded exponential backoff with cancellation.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Decides whether and when a failed attempt is repeated.
#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    /// Additional attempts after the first one.
    pub retries: u32,
    /// Delay before the first retry; doubled for each subsequent one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self { retries, base_delay }
    }

    /// `base_delay * 2^attempt`, saturating.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    pub fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        attempt < self.retries && error.is_retryable()
    }
}

/// Runs `attempt_fn` until it succeeds, the policy is exhausted, the failure
/// is final, or `cancel` fires. Cancellation wins over a pending backoff
/// sleep, so an aborted request never schedules another attempt.
pub(crate) async fn retry_loop<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt_fn: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !policy.should_retry(attempt, &err) {
                    return Err(err);
                }
                let delay = policy.backoff_delay(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after backoff"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
