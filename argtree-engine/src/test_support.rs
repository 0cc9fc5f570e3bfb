//! Deterministic collaborator doubles for unit tests

use crate::types::{
    CompletionRequest, ConsolidatedClaim, EmbeddingClient, LlmClient, RawClaim, ServiceError, Stance, TranslatedClaim,
    ValidatedClaim, ValidationCriteria,
};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

type Handler = dyn Fn(&CompletionRequest) -> Result<serde_json::Value, ServiceError> + Send + Sync;

/// LLM answering through a closure
pub struct FnLlm(Box<Handler>);

#[async_trait]
impl LlmClient for FnLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<serde_json::Value, ServiceError> {
        (self.0)(request)
    }
}

pub fn llm<F>(handler: F) -> Arc<dyn LlmClient>
where
    F: Fn(&CompletionRequest) -> Result<serde_json::Value, ServiceError> + Send + Sync + 'static,
{
    Arc::new(FnLlm(Box::new(handler)))
}

/// LLM whose every call fails transiently
pub fn failing_llm() -> Arc<dyn LlmClient> {
    llm(|_| Err(ServiceError::Server {
        status: 503,
        message: "unavailable".into(),
    }))
}

/// `(id, text)` pairs of the `[id] text` lines in a prompt
pub fn listed(prompt: &str) -> Vec<(usize, String)> {
    prompt
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix('[')?;
            let (id, text) = rest.split_once("] ")?;
            Some((id.parse().ok()?, text.to_string()))
        })
        .collect()
}

pub const EMBEDDING_DIMS: usize = 64;

/// Bag-of-words embedder: shared words mean similar vectors
pub struct WordHashEmbedder;

pub fn word_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; EMBEDDING_DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[(hasher.finish() % EMBEDDING_DIMS as u64) as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingClient for WordHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        Ok(word_vector(text))
    }
}

pub fn raw(text: &str, language: &str) -> RawClaim {
    RawClaim {
        text: text.to_string(),
        stance: Stance::Affirmative,
        segment_index: 0,
        source_language: language.to_string(),
    }
}

pub fn consolidated(text: &str, language: &str) -> ConsolidatedClaim {
    let claim = raw(text, language);
    ConsolidatedClaim {
        claim: claim.clone(),
        merged_from: vec![claim],
        embedding: word_vector(text),
    }
}

pub fn validated(text: &str, language: &str) -> ValidatedClaim {
    ValidatedClaim {
        claim: consolidated(text, language),
        is_valid: true,
        criteria: ValidationCriteria::default(),
        rejection_reason: None,
    }
}

pub fn translated(text: &str) -> TranslatedClaim {
    TranslatedClaim {
        claim: validated(text, "en"),
        pivot_text: text.to_string(),
        pivot_language: "en".to_string(),
    }
}
