//! Relevance screening of a thesis's source pool
//!
//! One batched scoring call for the whole pool. Sources are ranked by score
//! and the top N at or above the minimum are selected for full-text
//! enrichment; the rest keep their score and are marked abstract-only.
//!
//! Every non-empty pool is scored, even when N is zero, so shallow runs
//! still carry relevance scores.
//!
//! Fail-open: if the call fails or returns no usable score, the first N
//! sources in pool order are selected instead.

use crate::prompts;
use crate::types::{complete_as, AnalysisMode, LlmClient, SourceRecord};
use argtree_common::config::ScreeningConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const UNSCORED_DEFAULT: f32 = 0.5;
const UNSCORED_REASON: &str = "Not evaluated";

/// Selection parameters for one screening pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreeningParams {
    pub top_n: usize,
    pub min_score: f32,
}

impl ScreeningParams {
    /// Shallow scores but fetches nothing, deep fetches twice as many with a lower bar
    pub fn for_mode(mode: AnalysisMode, config: &ScreeningConfig) -> Self {
        match mode {
            AnalysisMode::Shallow => Self {
                top_n: 0,
                min_score: config.min_score,
            },
            AnalysisMode::Balanced => Self {
                top_n: config.top_n,
                min_score: config.min_score,
            },
            AnalysisMode::Deep => Self {
                top_n: config.top_n * 2,
                min_score: (config.min_score - 0.1).max(0.0),
            },
        }
    }
}

/// How the selection was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningMode {
    Scored,
    /// Scoring failed; first N in pool order
    Fallback,
    /// Empty pool
    Skipped,
}

/// Score distribution of one pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreeningStats {
    pub total: usize,
    pub scored: usize,
    pub avg_score: f32,
    pub min_score: f32,
    pub max_score: f32,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningOutcome {
    /// Indices into the pool, best first
    pub selected: Vec<usize>,
    pub mode: ScreeningMode,
    pub stats: ScreeningStats,
}

#[derive(Debug, Deserialize)]
struct ScreeningResponse {
    scores: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ScoreItem {
    /// 1-based position in the prompt listing
    source_id: usize,
    score: f32,
    #[serde(default)]
    reason: Option<String>,
}

pub struct RelevanceScreener {
    llm: Arc<dyn LlmClient>,
    config: ScreeningConfig,
}

impl RelevanceScreener {
    pub fn new(llm: Arc<dyn LlmClient>, config: ScreeningConfig) -> Self {
        Self { llm, config }
    }

    /// Score the pool in place and pick the enrichment subset
    pub async fn screen(&self, claim: &str, sources: &mut [SourceRecord], params: ScreeningParams) -> ScreeningOutcome {
        if sources.is_empty() {
            return ScreeningOutcome {
                selected: Vec::new(),
                mode: ScreeningMode::Skipped,
                stats: ScreeningStats::default(),
            };
        }

        match self.score(claim, sources).await {
            Some(scores) => {
                for (source, (score, reason)) in sources.iter_mut().zip(scores) {
                    source.relevance_score = Some(score);
                    source.relevance_reason = Some(reason);
                }
                let selected = select_top(sources, params);
                mark_abstract_only(sources, &selected);
                let stats = screening_stats(sources);
                info!(
                    total = stats.total,
                    selected = selected.len(),
                    avg_score = stats.avg_score,
                    high = stats.high,
                    "Screening complete"
                );
                ScreeningOutcome {
                    selected,
                    mode: ScreeningMode::Scored,
                    stats,
                }
            }
            None => {
                let selected: Vec<usize> = (0..sources.len().min(params.top_n)).collect();
                mark_abstract_only(sources, &selected);
                ScreeningOutcome {
                    selected,
                    mode: ScreeningMode::Fallback,
                    stats: ScreeningStats {
                        total: sources.len(),
                        ..Default::default()
                    },
                }
            }
        }
    }

    /// One `(score, reason)` per source, or `None` when nothing usable came back
    async fn score(&self, claim: &str, sources: &[SourceRecord]) -> Option<Vec<(f32, String)>> {
        let listing = sources
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "[{}] Title: {}\n    Source: {}\n    Summary: {}",
                    i + 1,
                    prompts::truncate_chars(&s.title, self.config.max_title_chars),
                    s.source_name,
                    prompts::truncate_chars(&s.snippet, self.config.max_snippet_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let response = match complete_as::<ScreeningResponse>(self.llm.as_ref(), &prompts::screen_sources(claim, &listing)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(sources = sources.len(), error = %e, "Screening failed, falling back to source order");
                return None;
            }
        };

        let mut scores: Vec<Option<(f32, String)>> = vec![None; sources.len()];
        for value in response.scores {
            match serde_json::from_value::<ScoreItem>(value) {
                Ok(item) if (1..=sources.len()).contains(&item.source_id) && item.score.is_finite() => {
                    scores[item.source_id - 1] = Some((item.score.clamp(0.0, 1.0), item.reason.unwrap_or_default()));
                }
                Ok(item) => debug!(source_id = item.source_id, "Ignoring score for unknown source"),
                Err(e) => debug!(error = %e, "Skipping malformed score item"),
            }
        }

        if scores.iter().all(Option::is_none) {
            warn!("Screening returned no usable scores, falling back to source order");
            return None;
        }

        Some(
            scores
                .into_iter()
                .map(|s| s.unwrap_or_else(|| (UNSCORED_DEFAULT, UNSCORED_REASON.to_string())))
                .collect(),
        )
    }
}

/// Highest scores first; ties keep pool order
fn select_top(sources: &[SourceRecord], params: ScreeningParams) -> Vec<usize> {
    let mut ranked: Vec<(usize, f32)> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.relevance_score.unwrap_or(0.0)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .filter(|(_, score)| *score >= params.min_score)
        .take(params.top_n)
        .map(|(i, _)| i)
        .collect()
}

fn mark_abstract_only(sources: &mut [SourceRecord], selected: &[usize]) {
    for (i, source) in sources.iter_mut().enumerate() {
        source.abstract_only = !selected.contains(&i);
    }
}

pub fn screening_stats(sources: &[SourceRecord]) -> ScreeningStats {
    let scores: Vec<f32> = sources.iter().filter_map(|s| s.relevance_score).collect();
    if scores.is_empty() {
        return ScreeningStats {
            total: sources.len(),
            ..Default::default()
        };
    }
    ScreeningStats {
        total: sources.len(),
        scored: scores.len(),
        avg_score: scores.iter().sum::<f32>() / scores.len() as f32,
        min_score: scores.iter().copied().fold(f32::INFINITY, f32::min),
        max_score: scores.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        high: scores.iter().filter(|&&s| s >= 0.7).count(),
        medium: scores.iter().filter(|&&s| (0.4..0.7).contains(&s)).count(),
        low: scores.iter().filter(|&&s| s < 0.4).count(),
    }
}
