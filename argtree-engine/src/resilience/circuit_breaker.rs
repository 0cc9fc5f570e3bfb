//! Per-agent circuit breaker
//!
//! Closed → Open after `failure_threshold` consecutive failures. Open rejects
//! every call without touching the network until `cooldown` has elapsed,
//! then moves to HalfOpen and grants exactly one probe. A successful probe
//! closes the breaker; a failed probe reopens it and restarts the cooldown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Kind of call the breaker allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Normal,
    /// Single trial call after cooldown; must not be retried
    Probe,
}

#[derive(Debug)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { probe_started: Instant },
}

/// Breaker guarding one agent
#[derive(Debug)]
pub struct CircuitBreaker {
    agent_id: String,
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(agent_id: &str, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(State::Closed { consecutive_failures: 0 }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask to make a call; `None` means short-circuit (no network attempt)
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut state = self.lock();
        match *state {
            State::Closed { .. } => Some(Permit::Normal),
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.cooldown {
                    info!(agent = %self.agent_id, "Circuit half-open, allowing probe call");
                    *state = State::HalfOpen { probe_started: Instant::now() };
                    Some(Permit::Probe)
                } else {
                    None
                }
            }
            State::HalfOpen { probe_started } => {
                // A probe whose caller vanished must not wedge the breaker
                if probe_started.elapsed() >= self.cooldown {
                    *state = State::HalfOpen { probe_started: Instant::now() };
                    Some(Permit::Probe)
                } else {
                    None
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        if matches!(*state, State::HalfOpen { .. }) {
            info!(agent = %self.agent_id, "Probe succeeded, circuit closed");
        }
        *state = State::Closed { consecutive_failures: 0 };
    }

    pub fn record_failure(&self) {
        let mut state = self.lock();
        match *state {
            State::Closed { consecutive_failures } => {
                let failures = consecutive_failures + 1;
                if failures >= self.failure_threshold {
                    warn!(
                        agent = %self.agent_id,
                        failures,
                        cooldown_secs = self.cooldown.as_secs_f64(),
                        "Circuit opened after consecutive failures"
                    );
                    *state = State::Open { opened_at: Instant::now() };
                } else {
                    *state = State::Closed { consecutive_failures: failures };
                }
            }
            State::HalfOpen { .. } => {
                warn!(agent = %self.agent_id, "Probe failed, circuit reopened");
                *state = State::Open { opened_at: Instant::now() };
            }
            State::Open { .. } => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        match *self.lock() {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        match *self.lock() {
            State::Closed { consecutive_failures } => consecutive_failures,
            _ => self.failure_threshold,
        }
    }
}

/// Registry of per-agent breakers shared across concurrent theses
pub struct CircuitBreakerRegistry {
    failure_threshold: u32,
    cooldown: Duration,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn breaker(&self, agent_id: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        breakers
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(agent_id, self.failure_threshold, self.cooldown)))
            .clone()
    }

    /// Snapshot of every known breaker's state
    pub fn states(&self) -> HashMap<String, BreakerState> {
        let breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        breakers.iter().map(|(id, b)| (id.clone(), b.state())).collect()
    }
}
