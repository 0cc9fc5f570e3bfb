//! Core Types and Trait Definitions for the argument-tree engine
//!
//! Defines the data model shared by both pipelines and the collaborator
//! contracts the core consumes:
//! - **LlmClient**: structured completion
//! - **EmbeddingClient**: text → fixed-length vector
//! - **ResearchAgent**: uniform search contract over external evidence APIs
//! - **FullTextFetcher**: best-effort document fetch
//! - **AnalysisStore**: read/write contract of the analysis bundle store
//!
//! # Architecture
//! transcript → segments → raw claims → consolidated → validated → translated
//! → role claims → reasoning chains. Each thesis then becomes an
//! [`EnrichedThesis`] carrying its sources, evidence items and reliability.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Extraction Types
// ============================================================================

/// One window of the transcript
///
/// Offsets are byte offsets into the original transcript; `text` is exactly
/// `transcript[start_offset..end_offset]`. The first `overlap_len` bytes are
/// shared with the previous segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// Bytes at the start of `text` repeated from the previous segment
    pub overlap_len: usize,
}

impl Segment {
    /// Portion of this segment not shared with the previous one
    pub fn non_overlap(&self) -> &str {
        &self.text[self.overlap_len..]
    }
}

/// Claim stance
///
/// Extraction models sometimes answer in the transcript language, so the
/// French labels are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    /// Asserted as fact
    #[serde(alias = "affirmatif")]
    Affirmative,
    /// Asserted as possible or contingent
    #[serde(alias = "conditionnel")]
    Conditional,
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stance::Affirmative => write!(f, "affirmative"),
            Stance::Conditional => write!(f, "conditional"),
        }
    }
}

/// Candidate claim extracted from one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawClaim {
    pub text: String,
    pub stance: Stance,
    pub segment_index: usize,
    pub source_language: String,
}

/// Cluster of near-duplicate raw claims collapsed to one representative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedClaim {
    /// Longest member of the cluster
    pub claim: RawClaim,
    /// Every member of the cluster, representative included, in input order
    pub merged_from: Vec<RawClaim>,
    /// Embedding of the representative text
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl ConsolidatedClaim {
    pub fn text(&self) -> &str {
        &self.claim.text
    }
}

/// Criteria reported by the validator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCriteria {
    pub causal: bool,
    pub mechanistic: bool,
    pub substantive: bool,
}

impl ValidationCriteria {
    /// A claim qualifies when at least one criterion holds
    pub fn any(&self) -> bool {
        self.causal || self.mechanistic || self.substantive
    }
}

/// Consolidated claim plus the validator's verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedClaim {
    pub claim: ConsolidatedClaim,
    pub is_valid: bool,
    pub criteria: ValidationCriteria,
    pub rejection_reason: Option<String>,
}

/// Validated claim plus its pivot-language rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedClaim {
    pub claim: ValidatedClaim,
    /// Text in the pivot language (equal to the original when no translation ran)
    pub pivot_text: String,
    pub pivot_language: String,
}

impl TranslatedClaim {
    /// Original-language text, never modified by translation
    pub fn original_text(&self) -> &str {
        self.claim.claim.text()
    }

    pub fn stance(&self) -> Stance {
        self.claim.claim.claim.stance
    }

    pub fn segment_index(&self) -> usize {
        self.claim.claim.claim.segment_index
    }

    pub fn source_language(&self) -> &str {
        &self.claim.claim.claim.source_language
    }

    pub fn embedding(&self) -> &[f32] {
        &self.claim.claim.embedding
    }
}

/// Rhetorical role of a claim in a reasoning chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Thesis,
    #[serde(alias = "sub-argument", alias = "subargument", alias = "support")]
    SubArgument,
    Evidence,
    #[serde(alias = "counter-argument", alias = "counterargument", alias = "counter")]
    CounterArgument,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Thesis => "thesis",
            Role::SubArgument => "sub_argument",
            Role::Evidence => "evidence",
            Role::CounterArgument => "counter_argument",
        };
        write!(f, "{}", label)
    }
}

/// Arena index of a claim within one extraction run
pub type ClaimId = usize;

/// Why a claim was promoted to a standalone thesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    /// Non-thesis claim without any parent reference
    MissingParent,
    /// Parent reference does not name a claim in this run
    UnresolvedParent,
    /// Parent reference points to the claim itself
    SelfReference,
    /// Following parent references loops back without reaching a thesis
    Cycle,
}

/// Marker carried by claims promoted to thesis during tree assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reclassification {
    pub original_role: Role,
    pub reason: OrphanReason,
}

/// Translated claim plus its role and parent link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleClaim {
    pub id: ClaimId,
    pub claim: TranslatedClaim,
    pub role: Role,
    pub parent: Option<ClaimId>,
    /// Classifier confidence for `role` (0.0-1.0)
    pub role_confidence: f32,
    /// Set when tree assembly changed the role to thesis
    pub reclassified: Option<Reclassification>,
}

/// Flattened view of a claim placed in a reasoning chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainNode {
    pub claim_id: ClaimId,
    pub role: Role,
    /// Original-language text
    pub text: String,
    /// Pivot-language text
    pub pivot_text: String,
    pub stance: Stance,
    pub segment_index: usize,
    pub role_confidence: f32,
    pub reclassified: Option<Reclassification>,
}

impl From<&RoleClaim> for ChainNode {
    fn from(claim: &RoleClaim) -> Self {
        Self {
            claim_id: claim.id,
            role: claim.role,
            text: claim.claim.original_text().to_string(),
            pivot_text: claim.claim.pivot_text.clone(),
            stance: claim.claim.stance(),
            segment_index: claim.claim.segment_index(),
            role_confidence: claim.role_confidence,
            reclassified: claim.reclassified,
        }
    }
}

/// Sub-argument or counter-argument with the evidence attached under it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchNode {
    pub node: ChainNode,
    pub evidence: Vec<ChainNode>,
}

/// One thesis and everything linked beneath it (at most three levels)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub chain_id: usize,
    pub thesis: ChainNode,
    pub sub_arguments: Vec<BranchNode>,
    pub counter_arguments: Vec<BranchNode>,
    /// Evidence attached directly to the thesis
    pub evidence: Vec<ChainNode>,
}

impl ReasoningChain {
    /// Number of claims placed in this chain, thesis included
    pub fn total_claims(&self) -> usize {
        let branch_claims: usize = self
            .sub_arguments
            .iter()
            .chain(self.counter_arguments.iter())
            .map(|b| 1 + b.evidence.len())
            .sum();
        1 + self.evidence.len() + branch_claims
    }

    pub fn is_reclassified(&self) -> bool {
        self.thesis.reclassified.is_some()
    }
}

/// Output of the extraction pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentStructure {
    pub chains: Vec<ReasoningChain>,
    pub source_language: String,
    pub pivot_language: String,
    pub total_claims: usize,
    pub reclassified_count: usize,
}

impl ArgumentStructure {
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn empty(source_language: &str, pivot_language: &str) -> Self {
        Self {
            chains: Vec::new(),
            source_language: source_language.to_string(),
            pivot_language: pivot_language.to_string(),
            total_claims: 0,
            reclassified_count: 0,
        }
    }
}

// ============================================================================
// Research Types
// ============================================================================

/// Source returned by a research agent
///
/// `relevance_score`, `relevance_reason`, `abstract_only` and `fulltext` are
/// filled in place by the screener and enricher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Identifier of the agent that produced this record
    pub source_name: String,
    pub published_date: Option<String>,
    /// Agent-specific identifiers (`pmcid`, `pdf_url`, `download_url`, ...)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub relevance_score: Option<f32>,
    pub relevance_reason: Option<String>,
    #[serde(default)]
    pub abstract_only: bool,
    pub fulltext: Option<String>,
}

impl SourceRecord {
    pub fn new(source_name: &str, title: &str, url: &str, snippet: &str) -> Self {
        Self {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
            source_name: source_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn has_fulltext(&self) -> bool {
        self.fulltext.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// Polarity of an evidence item relative to the thesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Pro,
    Con,
}

/// Pro or con finding with a citation into the source pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub claim_text: String,
    pub source_url: String,
    pub polarity: Polarity,
}

/// Reliability of a thesis after evidence aggregation
///
/// `Unverifiable` is not a score: it is rendered and stored distinctly from
/// any numeric value, including 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reliability {
    Scored {
        score: f64,
        pro_count: usize,
        con_count: usize,
    },
    Unverifiable,
}

impl Reliability {
    pub fn score(&self) -> Option<f64> {
        match self {
            Reliability::Scored { score, .. } => Some(*score),
            Reliability::Unverifiable => None,
        }
    }

    pub fn is_unverifiable(&self) -> bool {
        matches!(self, Reliability::Unverifiable)
    }

    /// Band label used in reports
    pub fn label(&self) -> &'static str {
        match self.score() {
            None => "unverifiable",
            Some(s) if s >= 0.7 => "high",
            Some(s) if s >= 0.4 => "medium",
            Some(_) => "low",
        }
    }
}

/// Per-agent outcome of one research fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    Succeeded { results: usize, attempts: u32 },
    Failed { error: String, kind: ErrorKind, attempts: u32 },
    /// Breaker open: no network attempt was made
    ShortCircuited,
    /// Strategy named an agent that is not registered
    Unavailable,
}

/// Research report for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub agent_id: String,
    pub query: String,
    pub outcome: AgentOutcome,
}

/// Thesis with its research results and reliability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedThesis {
    pub chain_id: usize,
    pub thesis: ChainNode,
    pub categories: Vec<String>,
    pub sources: Vec<SourceRecord>,
    pub evidence: Vec<EvidenceItem>,
    pub reliability: Reliability,
    pub agent_reports: Vec<AgentReport>,
}

impl EnrichedThesis {
    pub fn pros(&self) -> impl Iterator<Item = &EvidenceItem> {
        self.evidence.iter().filter(|e| e.polarity == Polarity::Pro)
    }

    pub fn cons(&self) -> impl Iterator<Item = &EvidenceItem> {
        self.evidence.iter().filter(|e| e.polarity == Polarity::Con)
    }
}

// ============================================================================
// Analysis Bundle Types
// ============================================================================

/// Analysis depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[serde(alias = "simple")]
    Shallow,
    #[serde(alias = "medium")]
    Balanced,
    #[serde(alias = "hard")]
    Deep,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 3] = [AnalysisMode::Shallow, AnalysisMode::Balanced, AnalysisMode::Deep];

    /// Quality tier used by the cache selector (1-3)
    pub fn tier(&self) -> u8 {
        match self {
            AnalysisMode::Shallow => 1,
            AnalysisMode::Balanced => 2,
            AnalysisMode::Deep => 3,
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Shallow => write!(f, "shallow"),
            AnalysisMode::Balanced => write!(f, "balanced"),
            AnalysisMode::Deep => write!(f, "deep"),
        }
    }
}

/// Lifecycle of a stored analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Failed,
}

/// User rating counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    pub rating_count: u32,
    pub ratings_sum: f64,
}

impl RatingStats {
    pub fn average(&self) -> f64 {
        if self.rating_count == 0 {
            0.0
        } else {
            self.ratings_sum / self.rating_count as f64
        }
    }
}

/// Complete result of one pipeline run, persisted per (input_id, mode)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBundle {
    pub run_id: uuid::Uuid,
    pub input_id: String,
    pub mode: AnalysisMode,
    pub status: AnalysisStatus,
    pub structure: ArgumentStructure,
    pub theses: Vec<EnrichedThesis>,
    pub generated_report: String,
    pub ratings: RatingStats,
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl AnalysisBundle {
    /// Fresh bundle for a run that has not produced anything yet
    pub fn pending(input_id: &str, mode: AnalysisMode) -> Self {
        let now = chrono::Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4(),
            input_id: input_id.to_string(),
            mode,
            status: AnalysisStatus::Pending,
            structure: ArgumentStructure::empty("", ""),
            theses: Vec::new(),
            generated_report: String::new(),
            ratings: RatingStats::default(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Days since the analysis was produced (never negative)
    pub fn age_days(&self, now: chrono::DateTime<chrono::Utc>) -> f64 {
        let seconds = (now - self.created_at).num_seconds().max(0);
        seconds as f64 / 86_400.0
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Classification of collaborator failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Retried with backoff, then treated as a partial failure
    Transient,
    /// Not retried, treated as a partial failure
    Permanent,
    /// Unparseable structure: caller falls back to an empty/default result
    Validation,
}

/// Error raised by an external collaborator call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request rejected {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Circuit open for agent {0}")]
    CircuitOpen(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Timeout(_)
            | ServiceError::RateLimited(_)
            | ServiceError::Server { .. }
            | ServiceError::Network(_) => ErrorKind::Transient,
            ServiceError::Auth(_) | ServiceError::Rejected { .. } | ServiceError::CircuitOpen(_) => {
                ErrorKind::Permanent
            }
            ServiceError::Malformed(_) => ErrorKind::Validation,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => ServiceError::RateLimited(message),
            401 | 403 => ServiceError::Auth(message),
            408 => ServiceError::Timeout(Duration::ZERO),
            500..=599 => ServiceError::Server { status, message },
            _ => ServiceError::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout(Duration::ZERO)
        } else if let Some(status) = err.status() {
            ServiceError::from_status(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            ServiceError::Malformed(err.to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Malformed(err.to_string())
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Model size requested for a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTier {
    Fast,
    Smart,
}

/// Unit of work a completion belongs to (used for logging and routing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmTask {
    DetectLanguage,
    ExtractClaims,
    ValidateClaims,
    TranslateClaims,
    ClassifyRoles,
    LinkParents,
    ClassifyTopic,
    GenerateQueries,
    ScreenSources,
    AnalyzeEvidence,
}

/// Structured completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub task: LlmTask,
    pub system: String,
    pub prompt: String,
    /// JSON shape the response must follow
    pub schema_hint: &'static str,
    pub tier: ModelTier,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// LLM completion service
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Return the model's JSON response
    async fn complete(&self, request: &CompletionRequest) -> Result<serde_json::Value, ServiceError>;
}

/// Complete and deserialize in one step; schema violations become `Malformed`
pub async fn complete_as<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    request: &CompletionRequest,
) -> Result<T, ServiceError> {
    let value = llm.complete(request).await?;
    serde_json::from_value(value).map_err(ServiceError::from)
}

/// Embedding service
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Fixed-length vector, deterministic per text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    /// Embed several texts; providers with a batch endpoint override this
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// External research agent (PubMed, arXiv, Semantic Scholar, ...)
#[async_trait::async_trait]
pub trait ResearchAgent: Send + Sync {
    /// Agent identifier used for routing, rate limiting and breakers
    fn id(&self) -> &str;

    /// Per-call timeout enforced by the orchestrator
    fn timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SourceRecord>, ServiceError>;
}

/// Full-text document fetch
#[async_trait::async_trait]
pub trait FullTextFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ServiceError>;
}

/// Analysis bundle store
#[async_trait::async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn get(&self, input_id: &str, mode: AnalysisMode) -> argtree_common::Result<Option<AnalysisBundle>>;

    /// Upsert the bundle for `(input_id, mode)`. An existing entry keeps its
    /// rating counters and `created_at`; only `increment_rating` changes them.
    async fn put(&self, input_id: &str, mode: AnalysisMode, bundle: AnalysisBundle) -> argtree_common::Result<()>;

    /// Add one rating (0.0-5.0) to the bundle's counters
    async fn increment_rating(&self, input_id: &str, mode: AnalysisMode, rating: f64) -> argtree_common::Result<()>;

    /// Every stored mode for an input
    async fn get_all(&self, input_id: &str) -> argtree_common::Result<Vec<AnalysisBundle>> {
        let mut bundles = Vec::new();
        for mode in AnalysisMode::ALL {
            if let Some(bundle) = self.get(input_id, mode).await? {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stance_accepts_french_labels() {
        let s: Stance = serde_json::from_str("\"affirmatif\"").unwrap();
        assert_eq!(s, Stance::Affirmative);
        let s: Stance = serde_json::from_str("\"conditionnel\"").unwrap();
        assert_eq!(s, Stance::Conditional);
    }

    #[test]
    fn test_role_aliases() {
        let r: Role = serde_json::from_str("\"sub-argument\"").unwrap();
        assert_eq!(r, Role::SubArgument);
        let r: Role = serde_json::from_str("\"counter_argument\"").unwrap();
        assert_eq!(r, Role::CounterArgument);
    }

    #[test]
    fn test_error_classification_from_status() {
        assert_eq!(ServiceError::from_status(429, "slow down").kind(), ErrorKind::Transient);
        assert_eq!(ServiceError::from_status(503, "down").kind(), ErrorKind::Transient);
        assert_eq!(ServiceError::from_status(401, "bad key").kind(), ErrorKind::Permanent);
        assert_eq!(ServiceError::from_status(404, "missing").kind(), ErrorKind::Permanent);
        assert_eq!(ServiceError::Malformed("x".into()).kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_reliability_labels() {
        let high = Reliability::Scored { score: 0.8, pro_count: 4, con_count: 0 };
        let low = Reliability::Scored { score: 0.0, pro_count: 0, con_count: 3 };
        assert_eq!(high.label(), "high");
        assert_eq!(low.label(), "low");
        assert_eq!(Reliability::Unverifiable.label(), "unverifiable");
        assert_eq!(Reliability::Unverifiable.score(), None);
        assert_ne!(low, Reliability::Unverifiable);
    }

    #[test]
    fn test_mode_tiers_and_aliases() {
        let m: AnalysisMode = serde_json::from_str("\"hard\"").unwrap();
        assert_eq!(m, AnalysisMode::Deep);
        assert_eq!(AnalysisMode::Shallow.tier(), 1);
        assert_eq!(AnalysisMode::Deep.tier(), 3);
    }

    #[test]
    fn test_chain_total_claims() {
        let node = ChainNode {
            claim_id: 0,
            role: Role::Thesis,
            text: "t".into(),
            pivot_text: "t".into(),
            stance: Stance::Affirmative,
            segment_index: 0,
            role_confidence: 1.0,
            reclassified: None,
        };
        let chain = ReasoningChain {
            chain_id: 0,
            thesis: node.clone(),
            sub_arguments: vec![BranchNode { node: node.clone(), evidence: vec![node.clone(), node.clone()] }],
            counter_arguments: vec![BranchNode { node: node.clone(), evidence: vec![] }],
            evidence: vec![node],
        };
        assert_eq!(chain.total_claims(), 6);
    }
}
