//! Exponential backoff retry wrapper for broker calls (spec §4.2).

use crate::error::{BrokerErrorKind, Error, Result};
use std::future::Future;
use std::time::Duration;

/// Retry policy for transient broker failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries; useful for tests against a stub broker.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(0),
            backoff_factor: 1.0,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt as i32);
        Duration::from_secs_f64(self.base_delay.as_secs_f64() * factor)
    }
}

/// Only `Timeout`, `RateLimited`, and `Upstream` are worth retrying;
/// `Malformed` means the model itself produced bad output and another
/// identical call is unlikely to help without a stricter prompt.
fn is_retryable(kind: BrokerErrorKind) -> bool {
    matches!(
        kind,
        BrokerErrorKind::Timeout | BrokerErrorKind::RateLimited | BrokerErrorKind::Upstream
    )
}

/// Run `attempt` up to `policy.max_attempts` times, sleeping with
/// exponential backoff between retryable failures. Returns the last error
/// if every attempt fails, or immediately on a non-retryable error.
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err: Option<Error> = None;
    for n in 0..policy.max_attempts.max(1) {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = matches!(&err, Error::Broker { kind, .. } if is_retryable(*kind));
                last_err = Some(err);
                if !retryable || n + 1 >= policy.max_attempts {
                    break;
                }
                tokio::time::sleep(policy.delay_for(n)).await;
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}
