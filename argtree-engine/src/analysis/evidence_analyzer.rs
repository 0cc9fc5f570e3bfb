//! Evidence extraction from a thesis's source corpus
//!
//! The corpus mixes full texts (capped per source) with abstracts, under a
//! total cap. The model lists pro and con findings, each citing a source URL;
//! findings whose citation is not in the pool are dropped. Fail-closed: any
//! failure yields no evidence, which the aggregator reports as unverifiable.

use crate::prompts;
use crate::research::orchestrator::normalize_url;
use crate::types::{complete_as, EvidenceItem, LlmClient, Polarity, SourceRecord};
use argtree_common::config::AnalysisConfig;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
struct EvidenceResponse {
    #[serde(default)]
    pros: Vec<serde_json::Value>,
    #[serde(default)]
    cons: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FindingItem {
    #[serde(alias = "finding", alias = "text")]
    claim: String,
    #[serde(default, alias = "url", alias = "source_url")]
    source: Option<String>,
}

/// Build the prompt corpus from the pool
///
/// Sources with full text come first. A source that does not fit is cut to
/// the remaining budget if at least `min_partial_chars` remain; otherwise the
/// corpus stops there.
pub fn build_corpus(sources: &[SourceRecord], config: &AnalysisConfig) -> String {
    let mut ordered: Vec<(usize, &SourceRecord)> = sources.iter().enumerate().collect();
    ordered.sort_by_key(|(i, s)| (!s.has_fulltext(), *i));

    let mut blocks = Vec::new();
    let mut used = 0usize;
    for (i, source) in ordered {
        let body = match &source.fulltext {
            Some(text) if !text.is_empty() => {
                format!("Full text:\n{}", prompts::truncate_chars(text, config.per_source_chars))
            }
            _ => format!("Abstract: {}", source.snippet),
        };
        let block = format!(
            "[{}] {}\nURL: {}\nSource: {}\n{}\n",
            i + 1,
            source.title,
            source.url,
            source.source_name,
            body
        );

        let len = block.chars().count();
        let remaining = config.corpus_chars.saturating_sub(used);
        if len <= remaining {
            used += len;
            blocks.push(block);
        } else if remaining >= config.min_partial_chars {
            blocks.push(prompts::truncate_chars(&block, remaining));
            break;
        } else {
            break;
        }
    }
    blocks.join("\n")
}

pub struct EvidenceAnalyzer {
    llm: Arc<dyn LlmClient>,
    config: AnalysisConfig,
}

impl EvidenceAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>, config: AnalysisConfig) -> Self {
        Self { llm, config }
    }

    /// Cited pro and con findings for `claim`; empty when the pool is empty
    pub async fn analyze(&self, claim: &str, sources: &[SourceRecord]) -> Vec<EvidenceItem> {
        if sources.is_empty() {
            return Vec::new();
        }

        let corpus = build_corpus(sources, &self.config);
        let response = match complete_as::<EvidenceResponse>(self.llm.as_ref(), &prompts::analyze_evidence(claim, &corpus)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(sources = sources.len(), error = %e, "Evidence analysis failed, no evidence recorded");
                return Vec::new();
            }
        };

        let pool = CitationIndex::new(sources);
        let mut items = self.collect(response.pros, Polarity::Pro, &pool);
        items.extend(self.collect(response.cons, Polarity::Con, &pool));

        info!(
            pros = items.iter().filter(|e| e.polarity == Polarity::Pro).count(),
            cons = items.iter().filter(|e| e.polarity == Polarity::Con).count(),
            "Evidence analyzed"
        );
        items
    }

    fn collect(&self, values: Vec<serde_json::Value>, polarity: Polarity, pool: &CitationIndex) -> Vec<EvidenceItem> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for value in values {
            if items.len() >= self.config.max_items_per_polarity {
                break;
            }
            let finding = match serde_json::from_value::<FindingItem>(value) {
                Ok(f) => f,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed finding");
                    continue;
                }
            };
            let text = finding.claim.trim();
            if text.is_empty() || !seen.insert(text.to_lowercase()) {
                continue;
            }
            let Some(url) = finding.source.as_deref().and_then(|s| pool.resolve(s)) else {
                debug!(source = ?finding.source, "Dropping finding without a citation in the pool");
                continue;
            };
            items.push(EvidenceItem {
                claim_text: text.to_string(),
                source_url: url,
                polarity,
            });
        }
        items
    }
}

/// Maps a citation (URL or `[n]` reference) back to a pool URL
struct CitationIndex {
    by_url: HashMap<String, String>,
    by_position: Vec<String>,
}

impl CitationIndex {
    fn new(sources: &[SourceRecord]) -> Self {
        Self {
            by_url: sources
                .iter()
                .filter(|s| !s.url.trim().is_empty())
                .map(|s| (normalize_url(&s.url), s.url.clone()))
                .collect(),
            by_position: sources.iter().map(|s| s.url.clone()).collect(),
        }
    }

    fn resolve(&self, citation: &str) -> Option<String> {
        let citation = citation.trim();
        if let Some(url) = self.by_url.get(&normalize_url(citation)) {
            return Some(url.clone());
        }
        let position: usize = citation.trim_start_matches('[').trim_end_matches(']').parse().ok()?;
        self.by_position
            .get(position.checked_sub(1)?)
            .filter(|u| !u.is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Vec<SourceRecord> {
        vec![
            SourceRecord::new("pubmed", "Coffee and HCC", "https://pubmed.ncbi.nlm.nih.gov/1/", "Cohort study"),
            SourceRecord::new("arxiv", "Polyphenols", "https://arxiv.org/abs/2", "Model"),
        ]
    }

    #[test]
    fn test_citation_resolution() {
        let index = CitationIndex::new(&pool());
        assert_eq!(
            index.resolve("http://PUBMED.ncbi.nlm.nih.gov/1").as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/1/")
        );
        assert_eq!(index.resolve("[2]").as_deref(), Some("https://arxiv.org/abs/2"));
        assert_eq!(index.resolve("https://elsewhere.org/x"), None);
        assert_eq!(index.resolve("[7]"), None);
    }

    #[test]
    fn test_corpus_prefers_fulltext_and_respects_cap() {
        let mut sources = pool();
        sources[1].fulltext = Some("x".repeat(5000));
        let config = AnalysisConfig {
            per_source_chars: 1000,
            corpus_chars: 1500,
            min_partial_chars: 100,
            max_items_per_polarity: 5,
        };
        let corpus = build_corpus(&sources, &config);
        assert!(corpus.starts_with("[2] Polyphenols"));
        assert!(corpus.contains("[1] Coffee and HCC"));
        assert!(corpus.chars().count() <= 1500 + 10);
    }

    #[test]
    fn test_corpus_stops_when_partial_too_small() {
        let sources = pool();
        let config = AnalysisConfig {
            per_source_chars: 1000,
            corpus_chars: 110,
            min_partial_chars: 500,
            max_items_per_polarity: 5,
        };
        let corpus = build_corpus(&sources, &config);
        assert!(corpus.contains("[1] Coffee and HCC"));
        assert!(!corpus.contains("[2]"));
    }
}
