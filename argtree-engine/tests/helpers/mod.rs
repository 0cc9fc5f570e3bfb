//! Scripted collaborators shared by the integration tests
//!
//! The LLM answers by task, reading claim lines (`[id] text`) back out of the
//! prompt so answers line up with whatever the pipeline actually sent.

#![allow(dead_code)]

use argtree_common::config::TomlConfig;
use argtree_engine::types::{
    CompletionRequest, EmbeddingClient, FullTextFetcher, LlmClient, LlmTask, ResearchAgent, ServiceError,
    SourceRecord,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// LLM
// ============================================================================

type Handler = Box<dyn Fn(&CompletionRequest) -> Result<Value, ServiceError> + Send + Sync>;

/// LLM with one handler per task; unscripted tasks fail as malformed
#[derive(Default)]
pub struct ScriptedLlm {
    handlers: HashMap<LlmTask, Handler>,
    calls: Mutex<Vec<LlmTask>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, task: LlmTask, handler: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<Value, ServiceError> + Send + Sync + 'static,
    {
        self.handlers.insert(task, Box::new(handler));
        self
    }

    pub fn calls(&self, task: LlmTask) -> usize {
        self.calls
            .lock()
            .map(|c| c.iter().filter(|t| **t == task).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ServiceError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.task);
        }
        match self.handlers.get(&request.task) {
            Some(handler) => handler(request),
            None => Err(ServiceError::Malformed(format!("unscripted task {:?}", request.task))),
        }
    }
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

/// The `CLAIM: ...` line of a research prompt
pub fn claim_line(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|l| l.strip_prefix("CLAIM: "))
        .unwrap_or_default()
        .to_string()
}

pub const COFFEE_THESIS: &str = "Coffee reduces liver cancer risk";
pub const COFFEE_SUB: &str = "Polyphenols have an antioxidant effect";
pub const COFFEE_EVIDENCE: &str = "Smith et al. 2023 confirms this";

pub const COFFEE_TRANSCRIPT: &str = "Today I want to talk about coffee and health. \
    Many people worry about their daily cup, but the research is encouraging. \
    Coffee reduces liver cancer risk, and this is one of the most robust findings we have. \
    Why would that be? Polyphenols have an antioxidant effect that protects liver cells \
    from oxidative damage. And this is not just theory: Smith et al. 2023 confirms this \
    with a large cohort followed over two decades.";

pub fn role_of(text: &str) -> &'static str {
    if text.contains("Polyphenols") {
        "sub_argument"
    } else if text.contains("Smith") {
        "evidence"
    } else {
        "thesis"
    }
}

/// LLM scripted for the coffee transcript end to end
///
/// Research sources come from agents; screening scores every source 0.9,
/// and evidence analysis cites the first source as a pro finding.
pub fn coffee_llm() -> ScriptedLlm {
    ScriptedLlm::new()
        .on(LlmTask::DetectLanguage, |_| Ok(json!({"language": "en"})))
        .on(LlmTask::ExtractClaims, |_| {
            Ok(json!({"arguments": [
                {"argument": COFFEE_THESIS, "stance": "affirmative"},
                {"argument": COFFEE_SUB, "stance": "affirmative"},
                {"argument": COFFEE_EVIDENCE, "stance": "affirmative"}
            ]}))
        })
        .on(LlmTask::ValidateClaims, |r| {
            let verdicts: Vec<Value> = listed(&r.prompt)
                .into_iter()
                .map(|(id, _)| json!({"id": id, "causal": true, "mechanistic": false, "substantive": true}))
                .collect();
            Ok(json!({ "verdicts": verdicts }))
        })
        .on(LlmTask::ClassifyRoles, |r| {
            let roles: Vec<Value> = listed(&r.prompt)
                .into_iter()
                .map(|(id, text)| json!({"id": id, "role": role_of(&text), "confidence": 0.9}))
                .collect();
            Ok(json!({ "roles": roles }))
        })
        .on(LlmTask::LinkParents, |r| {
            let claims = listed(&r.prompt);
            let id_of = |needle: &str| claims.iter().find(|(_, t)| t.contains(needle)).map(|(id, _)| *id);
            let mut links = Vec::new();
            if let (Some(sub), Some(thesis)) = (id_of("Polyphenols"), id_of("Coffee reduces")) {
                links.push(json!({"id": sub, "parent_id": thesis}));
            }
            if let Some(evidence) = id_of("Smith") {
                links.push(json!({"id": evidence, "parent_text": COFFEE_SUB}));
            }
            Ok(json!({ "links": links }))
        })
        .on(LlmTask::ClassifyTopic, |_| Ok(json!({"categories": ["medicine"]})))
        .on(LlmTask::GenerateQueries, |r| {
            let claim = claim_line(&r.prompt);
            Ok(json!({"queries": {"pubmed": format!("{} MeSH", claim)}}))
        })
        .on(LlmTask::ScreenSources, |r| {
            let scores: Vec<Value> = listed(&r.prompt)
                .into_iter()
                .map(|(id, _)| json!({"source_id": id, "score": 0.9, "reason": "on topic"}))
                .collect();
            Ok(json!({ "scores": scores }))
        })
        .on(LlmTask::AnalyzeEvidence, |r| {
            let url = r
                .prompt
                .lines()
                .find_map(|l| l.strip_prefix("URL: "))
                .unwrap_or_default()
                .to_string();
            if url.is_empty() {
                return Ok(json!({"pros": [], "cons": []}));
            }
            Ok(json!({
                "pros": [{"claim": "Coffee drinkers had lower HCC incidence", "source": url}],
                "cons": []
            }))
        })
}

// ============================================================================
// Embeddings
// ============================================================================

pub const EMBEDDING_DIMS: usize = 64;

/// Bag-of-words embedder: texts sharing words get similar vectors
pub struct WordHashEmbedder;

pub fn word_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; EMBEDDING_DIMS];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
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

/// Embedding service that is down
pub struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingClient for UnreachableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        Err(ServiceError::Network("connection refused".into()))
    }
}

// ============================================================================
// Research agents and fetcher
// ============================================================================

/// Agent returning fixed results or a fixed error, counting every call
pub struct StubAgent {
    id: String,
    response: Result<Vec<SourceRecord>, ServiceError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubAgent {
    pub fn ok(id: &str, results: Vec<SourceRecord>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            response: Ok(results),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(id: &str, error: ServiceError) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            response: Err(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            response: Ok(Vec::new()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResearchAgent for StubAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(200)
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SourceRecord>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.clone()
    }
}

pub fn source(agent: &str, n: usize) -> SourceRecord {
    SourceRecord::new(
        agent,
        &format!("{} study {}", agent, n),
        &format!("https://{}.example.org/{}", agent, n),
        "Cohort study of coffee consumption and hepatocellular carcinoma",
    )
}

/// Fetcher serving documents from a map
#[derive(Default)]
pub struct MapFetcher {
    pages: HashMap<String, String>,
}

impl MapFetcher {
    pub fn with(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }
}

#[async_trait]
impl FullTextFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ServiceError> {
        self.pages.get(url).cloned().ok_or(ServiceError::Rejected {
            status: 404,
            message: url.to_string(),
        })
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Defaults with millisecond backoffs and unthrottled agents
pub fn fast_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.extraction.min_segment_chars = 100;
    config.extraction.max_segment_chars = 400;
    config.extraction.overlap_chars = 40;
    config.extraction.min_extractable_chars = 10;
    config.research.default_calls_per_second = 1000.0;
    config.research.agent_calls_per_second.clear();
    config.research.retry.base_delay_ms = 1;
    config.research.retry.max_delay_ms = 5;
    config
}
