//! Resilience primitives shared across concurrent research fan-outs
//!
//! - **Rate limiting**: one governor limiter per agent identifier
//! - **Circuit breaking**: one breaker per agent identifier
//! - **Retry**: exponential backoff for transient failures only
//!
//! A single [`Resilience`] instance is shared (via `Arc`) by every thesis
//! in a run, so concurrent theses contend for the same per-agent budget.

pub mod circuit_breaker;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerRegistry, Permit};
pub use rate_limiter::RateLimiterRegistry;
pub use retry::{retry_transient, Attempted, RetryPolicy};

use argtree_common::config::ResearchConfig;
use std::time::Duration;

/// Registries plus the retry policy
pub struct Resilience {
    pub rate_limiters: RateLimiterRegistry,
    pub breakers: CircuitBreakerRegistry,
    pub retry: RetryPolicy,
}

impl Resilience {
    pub fn new(rate_limiters: RateLimiterRegistry, breakers: CircuitBreakerRegistry, retry: RetryPolicy) -> Self {
        Self {
            rate_limiters,
            breakers,
            retry,
        }
    }

    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            rate_limiters: RateLimiterRegistry::from_config(config),
            breakers: CircuitBreakerRegistry::new(
                config.breaker_failure_threshold,
                Duration::from_secs(config.breaker_cooldown_secs),
            ),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}
