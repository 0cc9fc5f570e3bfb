//! Transcript language detection
//!
//! Only the first 1000 characters are sent. Any failure or implausible
//! answer falls back to English.

use crate::prompts;
use crate::types::{complete_as, LlmClient};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_LANGUAGE: &str = "en";
const SAMPLE_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
struct LanguageResponse {
    #[serde(alias = "lang", alias = "code")]
    language: String,
}

pub struct LanguageDetector {
    llm: Arc<dyn LlmClient>,
}

impl LanguageDetector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn detect(&self, text: &str) -> String {
        let sample: String = text.chars().take(SAMPLE_CHARS).collect();
        if sample.trim().is_empty() {
            return DEFAULT_LANGUAGE.to_string();
        }

        match complete_as::<LanguageResponse>(self.llm.as_ref(), &prompts::detect_language(&sample)).await {
            Ok(response) => match normalize_language_code(&response.language) {
                Some(code) => {
                    debug!(language = %code, "Detected transcript language");
                    code
                }
                None => {
                    warn!(answer = %response.language, "Unrecognized language code, defaulting to en");
                    DEFAULT_LANGUAGE.to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "Language detection failed, defaulting to en");
                DEFAULT_LANGUAGE.to_string()
            }
        }
    }
}

/// Accept `fr`, `FR`, `fr-FR`, `fr_CA`; reject anything else
pub fn normalize_language_code(raw: &str) -> Option<String> {
    let primary = raw.trim().split(['-', '_']).next()?.to_ascii_lowercase();
    if primary.len() == 2 && primary.chars().all(|c| c.is_ascii_lowercase()) {
        Some(primary)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{failing_llm, llm};
    use serde_json::json;

    #[test]
    fn test_normalize_language_code() {
        assert_eq!(normalize_language_code("fr"), Some("fr".to_string()));
        assert_eq!(normalize_language_code(" EN-us "), Some("en".to_string()));
        assert_eq!(normalize_language_code("pt_BR"), Some("pt".to_string()));
        assert_eq!(normalize_language_code("French"), None);
        assert_eq!(normalize_language_code(""), None);
    }

    #[tokio::test]
    async fn test_detect_uses_model_answer() {
        let detector = LanguageDetector::new(llm(|request| {
            assert!(request.prompt.chars().count() < 1200);
            Ok(json!({"language": "FR"}))
        }));
        assert_eq!(detector.detect(&"Le café ".repeat(500)).await, "fr");
    }

    #[tokio::test]
    async fn test_detect_falls_back_to_english() {
        assert_eq!(LanguageDetector::new(failing_llm()).detect("Bonjour").await, "en");
        let odd = LanguageDetector::new(llm(|_| Ok(json!({"language": "Klingon"}))));
        assert_eq!(odd.detect("Qapla'").await, "en");
    }
}
