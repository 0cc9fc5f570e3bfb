//! Stored analyses and quality-aware cache selection

pub mod selector;
pub mod store;

pub use selector::{
    choose_best, composite_score, AvailableAnalysis, CacheDecision, CacheReason, CacheSelector,
};
pub use store::{validate_rating, InMemoryAnalysisStore};
