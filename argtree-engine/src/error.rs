//! Engine error types
//!
//! Collaborator failures ([`ServiceError`]) are absorbed at their call
//! sites. `EngineError` is what remains: failures that stop a whole run.

use crate::types::ServiceError;
use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Transcript too short to contain an argument
    #[error("Transcript too short: {length} characters (minimum {minimum})")]
    TranscriptTooShort { length: usize, minimum: usize },

    /// Embedding service unreachable; deduplication cannot run
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(ServiceError),

    /// Store or configuration failure
    #[error(transparent)]
    Common(#[from] argtree_common::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
