//! argtree engine
//!
//! Turns a spoken transcript into an argument tree, researches every thesis
//! against external evidence sources, and scores its reliability.
//!
//! - [`extraction`]: transcript → [`types::ArgumentStructure`]
//! - [`research`], [`enrichment`], [`analysis`]: thesis → [`types::EnrichedThesis`]
//! - [`resilience`]: per-agent rate limiting, circuit breaking and retry
//! - [`cache`]: stored analyses and quality-aware selection
//! - [`workflow`]: the end-to-end run
//! - [`services`]: HTTP implementations of the collaborator traits

pub mod analysis;
pub mod cache;
pub mod enrichment;
pub mod error;
pub mod extraction;
pub mod prompts;
pub mod research;
pub mod resilience;
pub mod services;
pub mod types;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{EngineError, EngineResult};
pub use workflow::{AnalysisWorkflow, Services, WorkflowEvent};
