//! Per-segment claim extraction
//!
//! Fail-closed: a failed call or a response that does not have the expected
//! shape yields zero claims for that segment. Individual malformed items are
//! skipped without discarding the rest of the segment.

use crate::prompts;
use crate::types::{LlmClient, RawClaim, Segment, Stance};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    #[serde(alias = "claims")]
    arguments: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ExtractedItem {
    #[serde(alias = "claim", alias = "text")]
    argument: String,
    stance: Stance,
}

pub struct ClaimExtractor {
    llm: Arc<dyn LlmClient>,
    min_segment_chars: usize,
}

impl ClaimExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, min_segment_chars: usize) -> Self {
        Self { llm, min_segment_chars }
    }

    /// Extract claims from one segment
    pub async fn extract(&self, segment: &Segment, language: &str) -> Vec<RawClaim> {
        if segment.text.trim().chars().count() < self.min_segment_chars {
            debug!(segment_index = segment.index, "Segment too short, skipping extraction");
            return Vec::new();
        }

        let request = prompts::extract_claims(&segment.text, language);
        let value = match self.llm.complete(&request).await {
            Ok(v) => v,
            Err(e) => {
                warn!(segment_index = segment.index, error = %e, "Claim extraction failed, segment yields no claims");
                return Vec::new();
            }
        };

        let response: ExtractionResponse = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(segment_index = segment.index, error = %e, "Malformed extraction response, segment yields no claims");
                return Vec::new();
            }
        };

        let mut claims = Vec::new();
        for item in response.arguments {
            match serde_json::from_value::<ExtractedItem>(item) {
                Ok(item) => {
                    let text = item.argument.trim();
                    if text.is_empty() {
                        continue;
                    }
                    claims.push(RawClaim {
                        text: text.to_string(),
                        stance: item.stance,
                        segment_index: segment.index,
                        source_language: language.to_string(),
                    });
                }
                Err(e) => {
                    debug!(segment_index = segment.index, error = %e, "Skipping malformed extracted item");
                }
            }
        }

        debug!(segment_index = segment.index, claims = claims.len(), "Segment extracted");
        claims
    }

    /// Extract from every segment, at most `max_concurrent` calls in flight
    ///
    /// Claims are returned in segment order.
    pub async fn extract_all(&self, segments: &[Segment], language: &str, max_concurrent: usize) -> Vec<RawClaim> {
        let per_segment: Vec<Vec<RawClaim>> = stream::iter(segments)
            .map(|segment| self.extract(segment, language))
            .buffered(max_concurrent.max(1))
            .collect()
            .await;

        let empty_segments = per_segment.iter().filter(|c| c.is_empty()).count();
        let claims: Vec<RawClaim> = per_segment.into_iter().flatten().collect();
        info!(
            segments = segments.len(),
            empty_segments,
            claims = claims.len(),
            "Claim extraction complete"
        );
        claims
    }
}
