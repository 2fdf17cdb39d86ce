//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use ratefeed_common::{constants, DurationExt};
use tracing::warn;

use crate::error::{FxError, FxResult};

/// How often, and how patiently, to call a flaky upstream.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after each further failure.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Deadline for each attempt. An attempt that overruns counts as failed.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: constants::default_initial_backoff().as_std(),
            max_backoff: constants::default_max_backoff().as_std(),
            attempt_timeout: constants::default_fetch_timeout().as_std(),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget is spent.
///
/// Exhausting the budget yields [`FxError::UpstreamUnavailable`] carrying the
/// last error. Non-retryable errors are returned unchanged on first sight.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> FxResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FxResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let outcome = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(FxError::Timeout(policy.attempt_timeout.as_millis() as u64)),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        if attempt >= max_attempts {
            warn!(
                operation,
                attempts = attempt,
                error = %err,
                "Giving up after final attempt"
            );
            return Err(FxError::UpstreamUnavailable {
                attempts: attempt,
                reason: err.to_string(),
            });
        }

        let delay = policy.backoff_for(attempt);
        warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
