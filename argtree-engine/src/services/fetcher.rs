//! HTTP full-text fetcher
//!
//! PDFs are converted with `pdf-extract` on the blocking pool; HTML is
//! reduced to its visible text; anything else textual is returned as is.

use crate::error::{EngineError, EngineResult};
use crate::types::{FullTextFetcher, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("argtree/", env!("CARGO_PKG_VERSION"));

pub struct HttpFullTextFetcher {
    client: Client,
}

impl HttpFullTextFetcher {
    pub fn new(timeout: Duration) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EngineError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Visible text of an HTML document, whitespace collapsed
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len() / 2);
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        text.push_str(&rest[..start]);
        text.push(' ');
        let tag = &rest[start..];
        let lower = tag.chars().take(8).collect::<String>().to_ascii_lowercase();
        let skip_to = if lower.starts_with("<script") {
            "</script>"
        } else if lower.starts_with("<style") {
            "</style>"
        } else {
            ">"
        };
        let tag_lower = tag.to_ascii_lowercase();
        match tag_lower.find(skip_to) {
            Some(end) => rest = &tag[end + skip_to.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    text.push_str(rest);

    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl FullTextFetcher for HttpFullTextFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ServiceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::from_status(status.as_u16(), format!("GET {}", url)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        debug!(url, content_type = %content_type, "Fetched full text");

        if content_type.contains("pdf") || url.to_lowercase().ends_with(".pdf") {
            let bytes = response.bytes().await?;
            return tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| ServiceError::Malformed(format!("PDF extraction task failed: {}", e)))?
                .map_err(|e| ServiceError::Malformed(format!("PDF extraction failed: {}", e)));
        }

        let body = response.text().await?;
        if content_type.contains("html") {
            Ok(html_to_text(&body))
        } else {
            Ok(body)
        }
    }
}
