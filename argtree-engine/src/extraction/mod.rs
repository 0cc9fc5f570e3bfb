//! Hierarchical argument extraction
//!
//! transcript → Segmenter → Claim Extractor (parallel per segment)
//! → Deduplicator → Validator → Translator → Hierarchy Builder
//! → [`ArgumentStructure`]
//!
//! # Error Handling
//! - Per-segment isolation: a failed extraction yields zero claims for that
//!   segment only
//! - LLM-backed stages fall back per their own policy and never fail the run
//! - The embedding service is the one hard dependency: if it is unreachable
//!   the run fails with [`EngineError::EmbeddingUnavailable`]
//!
//! # Example
//! ```rust,ignore
//! let pipeline = ExtractionPipeline::new(config, llm, embedder);
//! let output = pipeline.run(&transcript, None).await?;
//! println!("{} chains", output.structure.chain_count());
//! ```

pub mod claim_extractor;
pub mod deduplicator;
pub mod hierarchy;
pub mod language;
pub mod segmenter;
pub mod translator;
pub mod tree_builder;
pub mod validator;

pub use claim_extractor::ClaimExtractor;
pub use deduplicator::Deduplicator;
pub use hierarchy::HierarchyBuilder;
pub use language::LanguageDetector;
pub use segmenter::{segment_stats, segment_transcript, SegmentStats, SegmenterConfig};
pub use translator::ClaimTranslator;
pub use validator::ClaimValidator;

use crate::error::{EngineError, EngineResult};
use crate::types::{ArgumentStructure, EmbeddingClient, LlmClient};
use argtree_common::config::ExtractionConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-stage counts of one extraction run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionStats {
    pub segments: SegmentStats,
    pub raw_claims: usize,
    pub consolidated_claims: usize,
    pub accepted_claims: usize,
    pub rejected_claims: usize,
    pub chains: usize,
    pub reclassified: usize,
}

/// Result of one extraction run
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    pub structure: ArgumentStructure,
    pub stats: ExtractionStats,
}

pub struct ExtractionPipeline {
    config: ExtractionConfig,
    language_detector: LanguageDetector,
    extractor: ClaimExtractor,
    deduplicator: Deduplicator,
    validator: ClaimValidator,
    translator: ClaimTranslator,
    hierarchy: HierarchyBuilder,
}

impl ExtractionPipeline {
    pub fn new(config: ExtractionConfig, llm: Arc<dyn LlmClient>, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            language_detector: LanguageDetector::new(llm.clone()),
            extractor: ClaimExtractor::new(llm.clone(), config.min_extractable_chars),
            deduplicator: Deduplicator::new(embedder.clone(), config.dedup_threshold),
            validator: ClaimValidator::new(llm.clone(), config.validation_batch_size),
            translator: ClaimTranslator::new(llm.clone(), &config.pivot_language, config.translation_batch_size),
            hierarchy: HierarchyBuilder::new(llm, embedder, config.parent_match_threshold),
            config,
        }
    }

    /// Replace the embedding retry policy (tests use short backoffs)
    pub fn with_embedding_retry(mut self, retry: crate::resilience::RetryPolicy) -> Self {
        self.deduplicator = self.deduplicator.with_retry(retry);
        self
    }

    /// Run the full extraction
    ///
    /// # Arguments
    /// * `transcript` - Raw transcript text
    /// * `language_hint` - Transcript language if known; detected otherwise
    pub async fn run(&self, transcript: &str, language_hint: Option<&str>) -> EngineResult<ExtractionOutput> {
        let length = transcript.trim().chars().count();
        if length < self.config.min_transcript_chars {
            return Err(EngineError::TranscriptTooShort {
                length,
                minimum: self.config.min_transcript_chars,
            });
        }

        let language = match language_hint.and_then(language::normalize_language_code) {
            Some(code) => code,
            None => self.language_detector.detect(transcript).await,
        };

        // Stage 1: segmentation
        let segments = segment_transcript(transcript, &SegmenterConfig::from(&self.config));
        let mut stats = ExtractionStats {
            segments: segment_stats(&segments),
            ..Default::default()
        };
        info!(segments = segments.len(), language = %language, "Transcript segmented");

        // Stage 2: per-segment extraction
        let raw_claims = self
            .extractor
            .extract_all(&segments, &language, self.config.max_concurrent_segments)
            .await;
        stats.raw_claims = raw_claims.len();
        if raw_claims.is_empty() {
            warn!("No claims extracted from transcript");
            return Ok(ExtractionOutput {
                structure: ArgumentStructure::empty(&language, &self.config.pivot_language),
                stats,
            });
        }

        // Stage 3: deduplication
        let consolidated = self
            .deduplicator
            .deduplicate(raw_claims)
            .await
            .map_err(EngineError::EmbeddingUnavailable)?;
        stats.consolidated_claims = consolidated.len();

        // Stage 4: validation
        let validation = self.validator.validate(consolidated).await;
        stats.accepted_claims = validation.accepted.len();
        stats.rejected_claims = validation.rejected.len();

        // Stage 5: translation
        let translated = self.translator.translate(validation.accepted).await;

        // Stage 6: hierarchy
        let structure = if translated.is_empty() {
            ArgumentStructure::empty(&language, self.translator.pivot_language())
        } else {
            self.hierarchy.build(translated, &language).await
        };
        stats.chains = structure.chain_count();
        stats.reclassified = structure.reclassified_count;

        info!(
            raw = stats.raw_claims,
            consolidated = stats.consolidated_claims,
            accepted = stats.accepted_claims,
            chains = stats.chains,
            reclassified = stats.reclassified,
            "Extraction complete"
        );

        Ok(ExtractionOutput { structure, stats })
    }
}
