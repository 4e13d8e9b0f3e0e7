//! Bounded retry with exponential backoff and equal jitter.
//!
//! Only transient failures are retried: connection errors, timeouts and 5xx
//! answers. Permanent answers and malformed bodies return immediately.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use verity_core::RegistryConfig;

use crate::error::RegistryError;

/// Retry budget for a single registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }

    /// Backoff before retry `retry` (1-based). The exponential delay is
    /// capped at `max_delay`; half of it is fixed and half is random.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let half = capped / 2;
        let jitter_ms = rand::thread_rng().gen_range(0..=half.as_millis() as u64);
        half + Duration::from_millis(jitter_ms)
    }
}

/// Outcome of one attempt.
#[derive(Debug)]
pub(crate) enum Failure {
    Transient(String),
    /// Response arrived but did not match the schema or the requested id.
    Malformed(String),
    Permanent(RegistryError),
}

/// Run `f` under `policy`.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    f: F,
) -> Result<T, RegistryError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, Failure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_reason = String::new();

    for attempt in 1..=max_attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(Failure::Permanent(e)) => return Err(e),
            Err(Failure::Malformed(reason)) => {
                tracing::warn!(operation, attempt, reason = %reason, "malformed registry response");
                return Err(RegistryError::Unavailable {
                    attempts: attempt,
                    reason,
                });
            }
            Err(Failure::Transient(reason)) => {
                if attempt < max_attempts {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "registry call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_reason = reason;
            }
        }
    }

    tracing::warn!(operation, attempts = max_attempts, reason = %last_reason, "registry retries exhausted");
    Err(RegistryError::Unavailable {
        attempts: max_attempts,
        reason: last_reason,
    })
}
