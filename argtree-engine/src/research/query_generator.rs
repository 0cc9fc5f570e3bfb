//! Per-agent query generation
//!
//! One batched call returns a query for every agent. Agents the response
//! omits (or a failed call) fall back to the claim text itself.

use crate::prompts;
use crate::types::{complete_as, LlmClient};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_QUERY_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct QueriesResponse {
    queries: HashMap<String, String>,
}

pub struct QueryGenerator {
    llm: Arc<dyn LlmClient>,
}

impl QueryGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// `(agent_id, query)` pairs in `agents` order
    pub async fn generate(&self, claim: &str, agents: &[String]) -> Vec<(String, String)> {
        if agents.is_empty() {
            return Vec::new();
        }

        let mut generated =
            match complete_as::<QueriesResponse>(self.llm.as_ref(), &prompts::generate_queries(claim, &agents.join(", "))).await {
                Ok(response) => response.queries,
                Err(e) => {
                    warn!(error = %e, "Query generation failed, using claim text for every agent");
                    HashMap::new()
                }
            };

        agents
            .iter()
            .map(|agent| {
                let query = generated
                    .remove(agent)
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .unwrap_or_else(|| {
                        debug!(agent = %agent, "No generated query, falling back to claim text");
                        fallback_query(claim)
                    });
                (agent.clone(), query)
            })
            .collect()
    }
}

/// Claim text without trailing punctuation, bounded in length
pub fn fallback_query(claim: &str) -> String {
    let trimmed = claim.trim().trim_end_matches(['.', '!', '?']);
    prompts::truncate_chars(trimmed, MAX_QUERY_CHARS)
        .trim_end_matches("...")
        .to_string()
}
