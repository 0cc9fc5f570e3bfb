//! Research fan-out / fan-in
//!
//! Every selected agent is called concurrently; the join waits for each call
//! to complete, fail, or be short-circuited by its breaker. Per call:
//! 1. Breaker: open → short-circuit (no network attempt); half-open → probe
//!    with a single attempt
//! 2. Rate limiter: wait for the agent's shared budget before each attempt
//! 3. Timeout: bounded by the agent's own timeout
//! 4. Retry: transient failures back off and retry; others stop immediately
//! 5. Breaker records the call's final outcome
//!
//! One agent's failure never affects the others. A thesis with zero
//! successful agents gets an empty pool, not an error.

use crate::resilience::{retry_transient, Permit, Resilience, RetryPolicy};
use crate::types::{AgentOutcome, AgentReport, ResearchAgent, ServiceError, SourceRecord};
use argtree_common::config::ResearchConfig;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fan-in result for one thesis
#[derive(Debug, Clone, Default)]
pub struct ResearchOutcome {
    /// Unified pool, deduplicated by URL, in agent order
    pub sources: Vec<SourceRecord>,
    pub reports: Vec<AgentReport>,
}

impl ResearchOutcome {
    pub fn succeeded_agents(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, AgentOutcome::Succeeded { .. }))
            .count()
    }
}

pub struct ResearchOrchestrator {
    agents: HashMap<String, Arc<dyn ResearchAgent>>,
    resilience: Arc<Resilience>,
    config: ResearchConfig,
}

impl ResearchOrchestrator {
    pub fn new(agents: Vec<Arc<dyn ResearchAgent>>, resilience: Arc<Resilience>, config: ResearchConfig) -> Self {
        let agents = agents.into_iter().map(|a| (a.id().to_string(), a)).collect();
        Self {
            agents,
            resilience,
            config,
        }
    }

    pub fn has_agent(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// Identifiers of registered agents, sorted
    pub fn registered_agents(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Call every `(agent_id, query)` pair concurrently and merge the results
    pub async fn fan_out(&self, queries: &[(String, String)]) -> ResearchOutcome {
        let calls = queries.iter().map(|(agent_id, query)| self.call_agent(agent_id, query));
        let results = join_all(calls).await;

        let mut outcome = ResearchOutcome::default();
        let mut seen_urls = HashSet::new();
        for (report, sources) in results {
            for source in sources {
                let key = normalize_url(&source.url);
                if key.is_empty() || seen_urls.insert(key) {
                    outcome.sources.push(source);
                }
            }
            outcome.reports.push(report);
        }

        info!(
            agents = queries.len(),
            succeeded = outcome.succeeded_agents(),
            sources = outcome.sources.len(),
            "Research fan-out complete"
        );
        outcome
    }

    async fn call_agent(&self, agent_id: &str, query: &str) -> (AgentReport, Vec<SourceRecord>) {
        let report = |outcome| AgentReport {
            agent_id: agent_id.to_string(),
            query: query.to_string(),
            outcome,
        };

        let Some(agent) = self.agents.get(agent_id).cloned() else {
            debug!(agent = agent_id, "Agent not registered, skipping");
            return (report(AgentOutcome::Unavailable), Vec::new());
        };

        let breaker = self.resilience.breakers.breaker(agent_id);
        let policy = match breaker.try_acquire() {
            None => {
                debug!(agent = agent_id, "Circuit open, short-circuiting call");
                return (report(AgentOutcome::ShortCircuited), Vec::new());
            }
            Some(Permit::Probe) => RetryPolicy {
                max_attempts: 1,
                ..self.resilience.retry.clone()
            },
            Some(Permit::Normal) => self.resilience.retry.clone(),
        };

        let max_results = self.config.max_results(agent_id);
        let timeout = agent
            .timeout()
            .min(Duration::from_secs(self.config.agent_timeout_secs.max(1)));

        let attempted = retry_transient(agent_id, &policy, || {
            let agent = agent.clone();
            async move {
                self.resilience.rate_limiters.acquire(agent.id()).await;
                match tokio::time::timeout(timeout, agent.search(query, max_results)).await {
                    Ok(result) => result,
                    Err(_) => Err(ServiceError::Timeout(timeout)),
                }
            }
        })
        .await;

        match attempted.result {
            Ok(mut sources) => {
                breaker.record_success();
                sources.truncate(max_results);
                for source in &mut sources {
                    if source.source_name.is_empty() {
                        source.source_name = agent_id.to_string();
                    }
                }
                debug!(agent = agent_id, results = sources.len(), attempts = attempted.attempts, "Agent call succeeded");
                let outcome = AgentOutcome::Succeeded {
                    results: sources.len(),
                    attempts: attempted.attempts,
                };
                (report(outcome), sources)
            }
            Err(e) => {
                breaker.record_failure();
                warn!(
                    agent = agent_id,
                    error = %e,
                    attempts = attempted.attempts,
                    "Agent call failed (per-agent error isolation)"
                );
                let outcome = AgentOutcome::Failed {
                    error: e.to_string(),
                    kind: e.kind(),
                    attempts: attempted.attempts,
                };
                (report(outcome), Vec::new())
            }
        }
    }
}

/// Key used to merge the same source returned by several agents
pub(crate) fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.to_lowercase()
}
