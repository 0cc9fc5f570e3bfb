//! Retry with exponential backoff for transient collaborator failures
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. If the error is transient and attempts remain: log WARN, back off, retry
//! 4. Otherwise return the error immediately (permanent and validation
//!    failures are never retried)
//!
//! **Backoff Strategy:** `base_delay * multiplier^(attempt-1)`, capped at
//! `max_delay`.

use crate::types::ServiceError;
use argtree_common::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Policy allowing exactly one attempt
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1` (attempts are 1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Result of a retried operation plus the number of attempts made
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, ServiceError>,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., agent identifier)
/// * `policy` - Backoff parameters
/// * `operation` - Async closure performing one attempt
pub async fn retry_transient<F, Fut, T>(operation_name: &str, policy: &RetryPolicy, mut operation: F) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(err) => {
                if !err.is_transient() {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Non-transient failure, not retrying"
                    );
                    return Attempted {
                        result: Err(err),
                        attempts: attempt,
                    };
                }

                if attempt >= policy.max_attempts {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Transient failure, retries exhausted"
                    );
                    return Attempted {
                        result: Err(err),
                        attempts: attempt,
                    };
                }

                let backoff = policy.delay_after(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
