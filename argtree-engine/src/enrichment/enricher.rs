//! Full-text enrichment of screened sources
//!
//! Each selected source gets at most one fetch: the URL is resolved from the
//! source type, the cache is consulted, and on a miss a single bounded fetch
//! is made. Any failure leaves the source abstract-only.

use super::content_cache::ContentCache;
use crate::types::{FullTextFetcher, SourceRecord};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TRUNCATION_MARKER: &str = "\n\n[... truncated ...]";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentStats {
    pub attempted: usize,
    pub fetched: usize,
    pub cache_hits: usize,
    pub failed: usize,
    /// Selected sources with no fetchable URL
    pub unresolved: usize,
}

enum FetchResult {
    Cached(String),
    Fetched(String),
    Failed,
}

/// Where the full text of a source can be fetched, if anywhere
pub fn resolve_fetch_url(source: &SourceRecord) -> Option<String> {
    let name = source.source_name.to_lowercase();
    let meta = |key: &str| source.metadata.get(key).filter(|v| !v.trim().is_empty()).cloned();

    if name.contains("arxiv") {
        if let Some(pdf) = meta("pdf_url") {
            return Some(pdf);
        }
        if source.url.contains("/abs/") {
            let pdf = source.url.replacen("/abs/", "/pdf/", 1);
            return Some(if pdf.ends_with(".pdf") { pdf } else { format!("{}.pdf", pdf) });
        }
    } else if name.contains("pubmed") || name.contains("europepmc") {
        if let Some(pmcid) = meta("pmcid") {
            let pmcid = pmcid.trim();
            let pmcid = if pmcid.to_uppercase().starts_with("PMC") {
                pmcid.to_string()
            } else {
                format!("PMC{}", pmcid)
            };
            return Some(format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{}/", pmcid));
        }
    } else if name.contains("semantic_scholar") {
        if let Some(pdf) = meta("pdf_url") {
            return Some(pdf);
        }
    } else if name == "core" {
        if let Some(download) = meta("download_url") {
            return Some(download);
        }
    } else if name.contains("doaj") {
        if let Some(fulltext) = meta("fulltext_url") {
            return Some(fulltext);
        }
    }

    if let Some(pdf) = meta("pdf_url") {
        return Some(pdf);
    }
    let lower = source.url.to_lowercase();
    if lower.ends_with(".pdf") || lower.contains(".pdf?") || lower.contains("/pdf/") {
        return Some(source.url.clone());
    }
    None
}

/// Cap content at `max_chars` characters, marking the cut
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

pub struct Enricher {
    fetcher: Arc<dyn FullTextFetcher>,
    cache: Arc<ContentCache>,
    fetch_timeout: Duration,
    max_content_chars: usize,
}

impl Enricher {
    pub fn new(
        fetcher: Arc<dyn FullTextFetcher>,
        cache: Arc<ContentCache>,
        fetch_timeout: Duration,
        max_content_chars: usize,
    ) -> Self {
        Self {
            fetcher,
            cache,
            fetch_timeout,
            max_content_chars,
        }
    }

    /// Fetch full text for `selected` sources concurrently
    pub async fn enrich(&self, sources: &mut [SourceRecord], selected: &[usize]) -> EnrichmentStats {
        let mut stats = EnrichmentStats::default();
        let mut targets = Vec::new();
        for &idx in selected {
            let Some(source) = sources.get_mut(idx) else {
                continue;
            };
            match resolve_fetch_url(source) {
                Some(url) => targets.push((idx, url)),
                None => {
                    debug!(url = %source.url, source = %source.source_name, "No full-text URL, keeping abstract");
                    source.abstract_only = true;
                    stats.unresolved += 1;
                }
            }
        }

        stats.attempted = targets.len();
        let results = join_all(targets.iter().map(|(_, url)| self.fetch_one(url))).await;

        for ((idx, _), result) in targets.into_iter().zip(results) {
            let source = &mut sources[idx];
            match result {
                FetchResult::Cached(text) => {
                    stats.cache_hits += 1;
                    source.fulltext = Some(text);
                    source.abstract_only = false;
                }
                FetchResult::Fetched(text) => {
                    stats.fetched += 1;
                    source.fulltext = Some(text);
                    source.abstract_only = false;
                }
                FetchResult::Failed => {
                    stats.failed += 1;
                    source.fulltext = None;
                    source.abstract_only = true;
                }
            }
        }

        info!(
            attempted = stats.attempted,
            fetched = stats.fetched,
            cache_hits = stats.cache_hits,
            failed = stats.failed,
            "Enrichment complete"
        );
        stats
    }

    async fn fetch_one(&self, url: &str) -> FetchResult {
        if let Some(cached) = self.cache.get(url).await {
            return FetchResult::Cached(cached);
        }

        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(Ok(content)) if !content.trim().is_empty() => {
                let content = truncate_content(&content, self.max_content_chars);
                self.cache.put(url, &content).await;
                FetchResult::Fetched(content)
            }
            Ok(Ok(_)) => {
                debug!(url, "Fetched empty content");
                FetchResult::Failed
            }
            Ok(Err(e)) => {
                debug!(url, error = %e, "Full-text fetch failed");
                FetchResult::Failed
            }
            Err(_) => {
                debug!(url, timeout_secs = self.fetch_timeout.as_secs(), "Full-text fetch timed out");
                FetchResult::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        body: Option<&'static str>,
    }

    #[async_trait]
    impl FullTextFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body
                .map(str::to_string)
                .ok_or(ServiceError::Server {
                    status: 503,
                    message: "unavailable".into(),
                })
        }
    }

    fn enricher(body: Option<&'static str>) -> (Enricher, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            body,
        });
        let enricher = Enricher::new(
            fetcher.clone(),
            Arc::new(ContentCache::in_memory()),
            Duration::from_secs(5),
            10,
        );
        (enricher, fetcher)
    }

    #[test]
    fn test_resolve_arxiv_abs_to_pdf() {
        let source = SourceRecord::new("arxiv", "t", "https://arxiv.org/abs/2301.00001", "");
        assert_eq!(
            resolve_fetch_url(&source).as_deref(),
            Some("https://arxiv.org/pdf/2301.00001.pdf")
        );
    }

    #[test]
    fn test_resolve_pubmed_pmcid() {
        let source =
            SourceRecord::new("pubmed", "t", "https://pubmed.ncbi.nlm.nih.gov/1/", "").with_metadata("pmcid", "123456");
        assert_eq!(
            resolve_fetch_url(&source).as_deref(),
            Some("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/")
        );
    }

    #[test]
    fn test_resolve_unfetchable_source() {
        let source = SourceRecord::new("crossref", "t", "https://doi.org/10.1/x", "");
        assert_eq!(resolve_fetch_url(&source), None);
        let pdf = SourceRecord::new("crossref", "t", "https://example.org/paper.pdf", "");
        assert!(resolve_fetch_url(&pdf).is_some());
    }

    #[test]
    fn test_truncate_content_marks_cut() {
        assert_eq!(truncate_content("abcdef", 3), "abc\n\n[... truncated ...]");
        assert_eq!(truncate_content("abc", 3), "abc");
    }

    #[tokio::test]
    async fn test_second_enrichment_hits_cache() {
        let (enricher, fetcher) = enricher(Some("full text body"));
        let mut sources = vec![SourceRecord::new("arxiv", "t", "https://arxiv.org/abs/1", "")];

        let first = enricher.enrich(&mut sources, &[0]).await;
        assert_eq!(first.fetched, 1);
        assert_eq!(sources[0].fulltext.as_deref(), Some("full text\n\n[... truncated ...]"));

        let second = enricher.enrich(&mut sources, &[0]).await;
        assert_eq!(second.cache_hits, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_abstract_only() {
        let (enricher, fetcher) = enricher(None);
        let mut sources = vec![
            SourceRecord::new("arxiv", "t", "https://arxiv.org/abs/1", ""),
            SourceRecord::new("crossref", "t", "https://doi.org/10.1/x", ""),
        ];
        let stats = enricher.enrich(&mut sources, &[0, 1]).await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.unresolved, 1);
        assert!(sources.iter().all(|s| s.abstract_only && s.fulltext.is_none()));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
