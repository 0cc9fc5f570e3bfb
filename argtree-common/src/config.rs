//! Configuration loading and validation
//!
//! Configuration file resolution follows this priority order:
//! 1. Explicit path (caller supplied)
//! 2. `ARGTREE_CONFIG` environment variable
//! 3. Platform config directory: `<config_dir>/argtree/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing or unreadable file is never fatal: a warning is logged and the
//! compiled defaults are used. A file that parses but fails validation is a
//! configuration error.
//!
//! Individual values can then be overridden from the environment:
//! - `ARGTREE_LLM_API_KEY`
//! - `ARGTREE_LLM_BASE_URL`
//! - `ARGTREE_LOG_LEVEL`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "ARGTREE_CONFIG";
/// Environment variable overriding the LLM API key
pub const LLM_API_KEY_ENV: &str = "ARGTREE_LLM_API_KEY";
/// Environment variable overriding the LLM base URL
pub const LLM_BASE_URL_ENV: &str = "ARGTREE_LLM_BASE_URL";
/// Environment variable overriding the log level
pub const LOG_LEVEL_ENV: &str = "ARGTREE_LOG_LEVEL";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub extraction: ExtractionConfig,
    pub research: ResearchConfig,
    pub screening: ScreeningConfig,
    pub enrichment: EnrichmentConfig,
    pub analysis: AnalysisConfig,
    pub cache: CacheConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by RUST_LOG)
    pub level: String,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
        }
    }
}

/// LLM and embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API root (e.g. `https://api.openai.com/v1`)
    pub base_url: String,
    /// API key (prefer `ARGTREE_LLM_API_KEY` over storing it in the file)
    pub api_key: Option<String>,
    /// Model used for high-volume calls (extraction, screening)
    pub fast_model: String,
    /// Model used for structural reasoning (hierarchy, evidence analysis)
    pub smart_model: String,
    /// Embedding model
    pub embedding_model: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            fast_model: "gpt-4o-mini".to_string(),
            smart_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Argument extraction pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum segment length in characters
    pub max_segment_chars: usize,
    /// Overlap between consecutive segments in characters
    pub overlap_chars: usize,
    /// Paragraph cuts closer than this to the segment start are skipped
    pub min_segment_chars: usize,
    /// Transcripts shorter than this are rejected
    pub min_transcript_chars: usize,
    /// Segments shorter than this are not sent to the extractor
    pub min_extractable_chars: usize,
    /// Cosine similarity at or above which two claims are duplicates
    pub dedup_threshold: f32,
    /// Embedding similarity required to resolve a parent given by text
    pub parent_match_threshold: f32,
    /// Pivot language used for research queries
    pub pivot_language: String,
    /// Claims per validation request
    pub validation_batch_size: usize,
    /// Claims per translation request
    pub translation_batch_size: usize,
    /// Maximum concurrent extraction calls
    pub max_concurrent_segments: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_segment_chars: 2000,
            overlap_chars: 200,
            min_segment_chars: 500,
            min_transcript_chars: 50,
            min_extractable_chars: 50,
            dedup_threshold: 0.85,
            parent_match_threshold: 0.70,
            pivot_language: "en".to_string(),
            validation_batch_size: 10,
            translation_batch_size: 10,
            max_concurrent_segments: 8,
        }
    }
}

/// Retry policy for transient failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 60_000,
        }
    }
}

/// Research fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResearchConfig {
    /// Calls per second for agents without an explicit rate
    pub default_calls_per_second: f64,
    /// Per-agent calls per second, keyed by agent identifier
    pub agent_calls_per_second: HashMap<String, f64>,
    /// Default results requested per agent
    pub default_max_results: usize,
    /// Per-agent result limits, keyed by agent identifier
    pub agent_max_results: HashMap<String, usize>,
    /// Consecutive failures that trip an agent's circuit breaker
    pub breaker_failure_threshold: u32,
    /// Seconds an open breaker waits before allowing a probe
    pub breaker_cooldown_secs: u64,
    /// Upper bound on any single agent search call
    pub agent_timeout_secs: u64,
    /// General-purpose agents always added to a strategy
    pub fallback_agents: Vec<String>,
    /// Maximum theses researched concurrently
    pub max_concurrent_theses: usize,
    pub retry: RetryConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        let agent_calls_per_second = HashMap::from([
            ("semantic_scholar".to_string(), 1.0),
            ("crossref".to_string(), 3.0),
            ("pubmed".to_string(), 3.0),
            ("arxiv".to_string(), 1.0),
        ]);
        let agent_max_results = HashMap::from([
            ("pubmed".to_string(), 5),
            ("arxiv".to_string(), 5),
            ("semantic_scholar".to_string(), 5),
            ("crossref".to_string(), 3),
            ("oecd".to_string(), 3),
            ("world_bank".to_string(), 3),
        ]);
        Self {
            default_calls_per_second: 1.0,
            agent_calls_per_second,
            default_max_results: 5,
            agent_max_results,
            breaker_failure_threshold: 5,
            breaker_cooldown_secs: 60,
            agent_timeout_secs: 15,
            fallback_agents: vec!["semantic_scholar".to_string(), "crossref".to_string()],
            max_concurrent_theses: 4,
            retry: RetryConfig::default(),
        }
    }
}

impl ResearchConfig {
    /// Rate for one agent (falls back to the default rate)
    pub fn calls_per_second(&self, agent_id: &str) -> f64 {
        self.agent_calls_per_second
            .get(agent_id)
            .copied()
            .unwrap_or(self.default_calls_per_second)
    }

    /// Result limit for one agent (falls back to the default limit)
    pub fn max_results(&self, agent_id: &str) -> usize {
        self.agent_max_results
            .get(agent_id)
            .copied()
            .unwrap_or(self.default_max_results)
    }
}

/// Relevance screening configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Sources selected for full-text enrichment
    pub top_n: usize,
    /// Minimum relevance score for selection
    pub min_score: f32,
    /// Titles longer than this are truncated in the scoring prompt
    pub max_title_chars: usize,
    /// Snippets longer than this are truncated in the scoring prompt
    pub max_snippet_chars: usize,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            min_score: 0.6,
            max_title_chars: 150,
            max_snippet_chars: 300,
        }
    }
}

/// Full-text enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    /// Timeout for a single full-text fetch
    pub fetch_timeout_secs: u64,
    /// Full texts longer than this are truncated
    pub max_content_chars: usize,
    /// Optional on-disk mirror of the content cache
    pub cache_dir: Option<PathBuf>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fetch_timeout_secs: 30,
            max_content_chars: 50_000,
            cache_dir: None,
        }
    }
}

/// Evidence analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Per-source cap applied to full texts
    pub per_source_chars: usize,
    /// Total corpus cap across all sources
    pub corpus_chars: usize,
    /// A partially fitting source is included only if this much still fits
    pub min_partial_chars: usize,
    /// Evidence items kept per polarity
    pub max_items_per_polarity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            per_source_chars: 8000,
            corpus_chars: 40_000,
            min_partial_chars: 500,
            max_items_per_polarity: 5,
        }
    }
}

/// Analysis cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Window over which freshness decays linearly to zero
    pub max_age_days: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_age_days: 7.0 }
    }
}

impl TomlConfig {
    /// Check value ranges that would otherwise surface as odd runtime behavior
    pub fn validate(&self) -> Result<()> {
        let e = &self.extraction;
        if e.max_segment_chars == 0 {
            return Err(Error::Config("extraction.max_segment_chars must be > 0".to_string()));
        }
        if e.overlap_chars >= e.min_segment_chars || e.min_segment_chars > e.max_segment_chars {
            return Err(Error::Config(format!(
                "extraction requires overlap_chars ({}) < min_segment_chars ({}) <= max_segment_chars ({})",
                e.overlap_chars, e.min_segment_chars, e.max_segment_chars
            )));
        }
        for (name, value) in [
            ("extraction.dedup_threshold", e.dedup_threshold),
            ("extraction.parent_match_threshold", e.parent_match_threshold),
            ("screening.min_score", self.screening.min_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within 0.0-1.0, got {}", name, value)));
            }
        }
        if e.validation_batch_size == 0 || e.translation_batch_size == 0 {
            return Err(Error::Config("batch sizes must be > 0".to_string()));
        }

        let r = &self.research;
        let rates = std::iter::once(r.default_calls_per_second).chain(r.agent_calls_per_second.values().copied());
        for rate in rates {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(Error::Config(format!("research rates must be positive, got {}", rate)));
            }
        }
        if r.breaker_failure_threshold == 0 {
            return Err(Error::Config("research.breaker_failure_threshold must be > 0".to_string()));
        }
        if r.retry.max_attempts == 0 || r.retry.multiplier < 1.0 {
            return Err(Error::Config(
                "research.retry requires max_attempts > 0 and multiplier >= 1.0".to_string(),
            ));
        }
        if !(self.cache.max_age_days > 0.0) {
            return Err(Error::Config("cache.max_age_days must be > 0".to_string()));
        }
        Ok(())
    }

    /// Apply `ARGTREE_*` environment overrides in place
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(LLM_API_KEY_ENV) {
            if !key.trim().is_empty() {
                debug!("Using LLM API key from {}", LLM_API_KEY_ENV);
                self.llm.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(url) = std::env::var(LLM_BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.llm.base_url = url.trim().to_string();
            }
        }
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.logging.level = level.trim().to_string();
            }
        }
    }
}

/// Default configuration file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("argtree").join("config.toml"))
}

/// Resolve which configuration file to read, if any
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: explicit path
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config dir
    default_config_path()
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load configuration with graceful degradation
///
/// Missing or unparseable files fall back to compiled defaults with a
/// warning. ENV overrides are applied last, then the result is validated.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(explicit) {
        Some(path) if path.exists() => match load_toml_config(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read configuration file, using compiled defaults"
                );
                TomlConfig::default()
            }
        },
        Some(path) => {
            warn!(
                path = %path.display(),
                "Configuration file not found, using compiled defaults"
            );
            TomlConfig::default()
        }
        None => {
            warn!("No configuration directory available, using compiled defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
