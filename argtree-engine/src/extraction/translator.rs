//! Pivot-language translation of validated claims
//!
//! Translation is a rewrite of the extracted text, never a re-extraction:
//! the original text, stance and segment are carried through untouched.
//! Claims already in the pivot language skip the call. Any missing or failed
//! translation falls back to the original text.

use crate::prompts;
use crate::types::{complete_as, LlmClient, TranslatedClaim, ValidatedClaim};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct TranslationResponse {
    translations: Vec<TranslationItem>,
}

#[derive(Debug, Deserialize)]
struct TranslationItem {
    id: usize,
    translation: String,
}

pub struct ClaimTranslator {
    llm: Arc<dyn LlmClient>,
    pivot_language: String,
    batch_size: usize,
}

impl ClaimTranslator {
    pub fn new(llm: Arc<dyn LlmClient>, pivot_language: &str, batch_size: usize) -> Self {
        Self {
            llm,
            pivot_language: pivot_language.to_string(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn pivot_language(&self) -> &str {
        &self.pivot_language
    }

    pub async fn translate(&self, claims: Vec<ValidatedClaim>) -> Vec<TranslatedClaim> {
        let mut pivot_texts: Vec<Option<String>> = vec![None; claims.len()];

        // Group claims needing translation by source language
        let mut by_language: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, claim) in claims.iter().enumerate() {
            let language = claim.claim.claim.source_language.as_str();
            if !language.eq_ignore_ascii_case(&self.pivot_language) {
                by_language.entry(language).or_default().push(i);
            }
        }

        let mut translated = 0;
        for (language, indices) in &by_language {
            for chunk in indices.chunks(self.batch_size) {
                let listing = prompts::numbered(chunk.iter().enumerate().map(|(i, &idx)| (i, claims[idx].claim.text())));
                let request = prompts::translate_claims(&listing, language, &self.pivot_language);
                match complete_as::<TranslationResponse>(self.llm.as_ref(), &request).await {
                    Ok(response) => {
                        for item in response.translations {
                            let text = item.translation.trim();
                            if let (Some(&idx), false) = (chunk.get(item.id), text.is_empty()) {
                                pivot_texts[idx] = Some(text.to_string());
                                translated += 1;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            source_language = %language,
                            batch = chunk.len(),
                            error = %e,
                            "Translation failed, keeping original text"
                        );
                    }
                }
            }
        }

        info!(total = claims.len(), translated, pivot = %self.pivot_language, "Translation complete");

        claims
            .into_iter()
            .zip(pivot_texts)
            .map(|(claim, pivot)| {
                let pivot_text = pivot.unwrap_or_else(|| claim.claim.text().to_string());
                TranslatedClaim {
                    claim,
                    pivot_text,
                    pivot_language: self.pivot_language.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{failing_llm, listed, llm, validated};
    use serde_json::json;

    #[tokio::test]
    async fn test_translates_only_non_pivot_claims() {
        let llm = llm(|request| {
            let translations: Vec<_> = listed(&request.prompt)
                .into_iter()
                .map(|(id, text)| json!({"id": id, "translation": format!("EN: {}", text)}))
                .collect();
            Ok(json!({ "translations": translations }))
        });
        let translator = ClaimTranslator::new(llm, "en", 10);
        let out = translator
            .translate(vec![
                validated("Le café réduit le risque", "fr"),
                validated("Coffee is popular", "en"),
            ])
            .await;

        assert_eq!(out[0].pivot_text, "EN: Le café réduit le risque");
        assert_eq!(out[0].original_text(), "Le café réduit le risque");
        assert_eq!(out[1].pivot_text, "Coffee is popular");
        assert!(out.iter().all(|c| c.pivot_language == "en"));
    }

    #[tokio::test]
    async fn test_failure_keeps_original_text() {
        let translator = ClaimTranslator::new(failing_llm(), "en", 10);
        let out = translator.translate(vec![validated("Le café réduit le risque", "fr")]).await;
        assert_eq!(out[0].pivot_text, "Le café réduit le risque");
    }

    #[tokio::test]
    async fn test_pivot_only_input_makes_no_call() {
        let translator = ClaimTranslator::new(llm(|_| panic!("no translation needed")), "en", 10);
        let out = translator.translate(vec![validated("Coffee is popular", "EN")]).await;
        assert_eq!(out.len(), 1);
    }
}
