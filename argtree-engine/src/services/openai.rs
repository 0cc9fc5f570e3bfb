//! OpenAI-compatible completion and embedding client
//!
//! Talks to any server exposing `/chat/completions` and `/embeddings` in the
//! OpenAI format. JSON mode is requested for every completion; the schema
//! hint is appended to the system prompt.

use crate::error::{EngineError, EngineResult};
use crate::types::{CompletionRequest, EmbeddingClient, LlmClient, ModelTier, ServiceError};
use argtree_common::config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    fast_model: String,
    smart_model: String,
    embedding_model: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            fast_model: config.fast_model.clone(),
            smart_model: config.smart_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    fn model(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Smart => &self.smart_model,
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T, ServiceError> {
        let mut request = self.client.post(format!("{}{}", self.base_url, path)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), message));
        }
        Ok(response.json::<T>().await?)
    }
}

/// Strip a markdown code fence some models wrap around JSON
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<serde_json::Value, ServiceError> {
        let body = json!({
            "model": self.model(request.tier),
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "{}\nRespond with a single JSON object shaped like:\n{}",
                        request.system, request.schema_hint
                    ),
                },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "response_format": { "type": "json_object" },
        });

        debug!(task = ?request.task, model = self.model(request.tier), "Sending completion request");
        let response: ChatResponse = self.post("/chat/completions", body).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::Malformed("completion has no content".to_string()))?;

        Ok(serde_json::from_str(strip_code_fence(&content))?)
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ServiceError::Malformed("embedding response is empty".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({ "model": self.embedding_model, "input": texts });
        let mut response: EmbeddingResponse = self.post("/embeddings", body).await?;
        if response.data.len() != texts.len() {
            return Err(ServiceError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}
