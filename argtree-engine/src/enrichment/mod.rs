//! Source screening and full-text enrichment

pub mod content_cache;
pub mod enricher;
pub mod screener;

pub use content_cache::{cache_key, ContentCache, ContentCacheStats};
pub use enricher::{resolve_fetch_url, Enricher, EnrichmentStats};
pub use screener::{RelevanceScreener, ScreeningMode, ScreeningOutcome, ScreeningParams, ScreeningStats};
