//! Per-agent rate limiting
//!
//! One governor limiter per agent identifier, created lazily and shared by
//! every thesis being researched. Rates are calls per second and may be
//! fractional (0.5 = one call every two seconds).

use argtree_common::config::ResearchConfig;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Registry of per-agent limiters
pub struct RateLimiterRegistry {
    default_rate: f64,
    agent_rates: HashMap<String, f64>,
    limiters: Mutex<HashMap<String, Arc<DirectLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new(default_rate: f64, agent_rates: HashMap<String, f64>) -> Self {
        Self {
            default_rate,
            agent_rates,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ResearchConfig) -> Self {
        Self::new(config.default_calls_per_second, config.agent_calls_per_second.clone())
    }

    /// Configured rate for an agent
    pub fn rate_for(&self, agent_id: &str) -> f64 {
        self.agent_rates.get(agent_id).copied().unwrap_or(self.default_rate)
    }

    /// Shared limiter for an agent (created on first use)
    pub fn limiter(&self, agent_id: &str) -> Arc<DirectLimiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        limiters
            .entry(agent_id.to_string())
            .or_insert_with(|| {
                let rate = self.rate_for(agent_id);
                debug!(agent = agent_id, rate, "Creating rate limiter");
                Arc::new(RateLimiter::direct(quota_for_rate(rate)))
            })
            .clone()
    }

    /// Wait until the agent's limiter allows one more call
    pub async fn acquire(&self, agent_id: &str) {
        let limiter = self.limiter(agent_id);
        limiter.until_ready().await;
    }
}

/// Quota spacing calls evenly at `rate` per second with a burst of one
fn quota_for_rate(rate: f64) -> Quota {
    if rate.is_finite() && rate > 0.0 {
        if let Some(quota) = Quota::with_period(Duration::from_secs_f64(1.0 / rate)) {
            return quota;
        }
    }
    Quota::per_second(NonZeroU32::MIN)
}
