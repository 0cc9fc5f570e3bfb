//! End-to-end analysis workflow
//!
//! Extraction, then per-thesis research (bounded parallelism), then report
//! rendering and persistence. Progress is optionally streamed as
//! [`WorkflowEvent`]s over an `mpsc` channel.

pub mod pipeline;
pub mod thesis;

pub use pipeline::{AnalysisResponse, AnalysisWorkflow};
pub use thesis::{ThesisOutcome, ThesisResearcher};

use crate::enrichment::ContentCache;
use crate::types::{AnalysisMode, AnalysisStore, EmbeddingClient, FullTextFetcher, LlmClient, ResearchAgent};
use std::sync::Arc;

/// External collaborators of a workflow
#[derive(Clone)]
pub struct Services {
    pub llm: Arc<dyn LlmClient>,
    pub embedder: Arc<dyn EmbeddingClient>,
    pub agents: Vec<Arc<dyn ResearchAgent>>,
    pub fetcher: Arc<dyn FullTextFetcher>,
    pub store: Arc<dyn AnalysisStore>,
    pub content_cache: Arc<ContentCache>,
}

impl Services {
    /// Collaborators with an in-memory content cache
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingClient>,
        agents: Vec<Arc<dyn ResearchAgent>>,
        fetcher: Arc<dyn FullTextFetcher>,
        store: Arc<dyn AnalysisStore>,
    ) -> Self {
        Self {
            llm,
            embedder,
            agents,
            fetcher,
            store,
            content_cache: Arc::new(ContentCache::in_memory()),
        }
    }

    pub fn with_content_cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.content_cache = cache;
        self
    }
}

/// Progress events of one run
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum WorkflowEvent {
    RunStarted {
        run_id: uuid::Uuid,
        input_id: String,
        mode: AnalysisMode,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },

    ExtractionCompleted {
        chains: usize,
        claims: usize,
        reclassified: usize,
    },

    ThesisStarted {
        chain_id: usize,
        total_theses: usize,
    },

    /// Breaker was open, so the agent was skipped for this thesis
    AgentShortCircuited {
        chain_id: usize,
        agent_id: String,
    },

    ThesisResearched {
        chain_id: usize,
        sources: usize,
        full_texts: usize,
        evidence_items: usize,
        /// `None` when unverifiable
        reliability: Option<f64>,
        label: String,
    },

    RunCompleted {
        run_id: uuid::Uuid,
        theses: usize,
        unverifiable: usize,
        timestamp: i64,
    },

    RunFailed {
        run_id: uuid::Uuid,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = WorkflowEvent::ThesisResearched {
            chain_id: 2,
            sources: 5,
            full_texts: 1,
            evidence_items: 0,
            reliability: None,
            label: "unverifiable".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ThesisResearched");
        assert!(json["reliability"].is_null());

        let back: WorkflowEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
