//! Adaptive research for one thesis
//!
//! Topic Router → Query Generator → Research Orchestrator. The orchestrator
//! shares one [`crate::resilience::Resilience`] across all theses of a run.

pub mod orchestrator;
pub mod query_generator;
pub mod topic_router;

pub use orchestrator::{ResearchOrchestrator, ResearchOutcome};
pub use query_generator::QueryGenerator;
pub use topic_router::{strategy_for, ResearchStrategy, TopicCategory, TopicRouter};
