//! Extraction pipeline behavior across stages

mod helpers;

use argtree_common::config::ExtractionConfig;
use argtree_engine::extraction::deduplicator::cosine_similarity;
use argtree_engine::extraction::{segment_transcript, Deduplicator, ExtractionPipeline, SegmenterConfig};
use argtree_engine::resilience::RetryPolicy;
use argtree_engine::types::{LlmTask, RawClaim, Role, Stance};
use argtree_engine::EngineError;
use helpers::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn pipeline(llm: Arc<ScriptedLlm>, config: ExtractionConfig) -> ExtractionPipeline {
    let retry = RetryPolicy::from(&fast_config().research.retry);
    ExtractionPipeline::new(config, llm, Arc::new(WordHashEmbedder)).with_embedding_retry(retry)
}

fn long_transcript() -> String {
    let mut text = String::new();
    for i in 0..40 {
        text.push_str(&format!(
            "Phrase numéro {i} : le café réduit l'inflammation hépatique chez les adultes. "
        ));
        if i % 7 == 6 {
            text.push_str("\n\n");
        }
        if i % 11 == 10 {
            text.push('\n');
        }
    }
    text
}

#[test]
fn test_segments_reconstruct_transcript() {
    let text = long_transcript();
    let config = SegmenterConfig {
        max_chars: 300,
        overlap_chars: 50,
        min_chars: 120,
    };
    let segments = segment_transcript(&text, &config);
    assert!(segments.len() > 5);

    let rebuilt: String = segments.iter().map(|s| s.non_overlap()).collect();
    assert_eq!(rebuilt, text);

    assert_eq!(segments[0].start_offset, 0);
    assert_eq!(segments[0].overlap_len, 0);
    for pair in segments.windows(2) {
        assert_eq!(pair[1].start_offset + pair[1].overlap_len, pair[0].end_offset);
        let overlap = &pair[1].text[..pair[1].overlap_len];
        assert!(overlap.chars().count() <= config.overlap_chars);
    }
    for (i, segment) in segments.iter().enumerate() {
        assert_eq!(segment.index, i);
        assert!(segment.text.chars().count() <= config.max_chars);
        assert_eq!(&text[segment.start_offset..segment.end_offset], segment.text);
    }
}

fn raw(text: &str, segment_index: usize) -> RawClaim {
    RawClaim {
        text: text.to_string(),
        stance: Stance::Affirmative,
        segment_index,
        source_language: "en".to_string(),
    }
}

#[tokio::test]
async fn test_deduplication_is_idempotent() {
    let deduplicator = Deduplicator::new(Arc::new(WordHashEmbedder), 0.85);
    let claims = vec![
        raw("Coffee reduces liver cancer risk", 0),
        raw("Coffee reduces the liver cancer risk", 1),
        raw("Polyphenols have an antioxidant effect", 1),
        raw("Sleep deprivation impairs memory consolidation", 2),
        raw("Sleep deprivation impairs memory consolidation", 3),
    ];

    let first = deduplicator.deduplicate(claims.clone()).await.unwrap();
    assert_eq!(first.len(), 3);
    let merged: usize = first.iter().map(|c| c.merged_from.len()).sum();
    assert_eq!(merged, claims.len());
    assert_eq!(first[0].text(), "Coffee reduces the liver cancer risk");

    for (i, a) in first.iter().enumerate() {
        for b in &first[i + 1..] {
            assert!(cosine_similarity(&a.embedding, &b.embedding) < 0.85);
        }
    }

    let representatives: Vec<RawClaim> = first.iter().map(|c| c.claim.clone()).collect();
    let second = deduplicator.deduplicate(representatives).await.unwrap();
    let texts = |claims: &[argtree_engine::types::ConsolidatedClaim]| {
        claims.iter().map(|c| c.text().to_string()).collect::<Vec<_>>()
    };
    assert_eq!(texts(&second), texts(&first));
}

#[tokio::test]
async fn test_coffee_transcript_builds_one_chain() {
    let llm = Arc::new(coffee_llm());
    let output = pipeline(llm.clone(), fast_config().extraction)
        .run(COFFEE_TRANSCRIPT, None)
        .await
        .unwrap();

    let structure = output.structure;
    assert_eq!(structure.source_language, "en");
    assert_eq!(structure.chain_count(), 1);
    assert_eq!(structure.total_claims, 3);
    assert_eq!(structure.reclassified_count, 0);

    let chain = &structure.chains[0];
    assert_eq!(chain.thesis.text, COFFEE_THESIS);
    assert_eq!(chain.sub_arguments.len(), 1);
    assert_eq!(chain.sub_arguments[0].node.text, COFFEE_SUB);
    assert_eq!(chain.sub_arguments[0].evidence.len(), 1);
    assert_eq!(chain.sub_arguments[0].evidence[0].role, Role::Evidence);

    assert!(output.stats.segments.count >= 2);
    assert!(output.stats.raw_claims > output.stats.consolidated_claims);
    assert_eq!(output.stats.consolidated_claims, 3);
    assert_eq!(llm.calls(LlmTask::TranslateClaims), 0);
}

const FR_THESIS: &str = "Le café réduit le risque de cancer du foie";
const FR_SUB: &str = "Les polyphénols ont un effet antioxydant";
const FR_EVIDENCE: &str = "Smith et al. 2023 le confirme";

fn to_english(text: &str) -> &'static str {
    match text {
        FR_THESIS => COFFEE_THESIS,
        FR_SUB => COFFEE_SUB,
        _ => COFFEE_EVIDENCE,
    }
}

#[tokio::test]
async fn test_french_claims_are_translated_to_pivot() {
    let transcript = "Aujourd'hui je veux parler du café et de la santé. Le café réduit le risque \
        de cancer du foie, c'est l'un des résultats les plus solides. Pourquoi ? Les polyphénols \
        ont un effet antioxydant qui protège les cellules du foie. Smith et al. 2023 le confirme \
        avec une grande cohorte suivie pendant vingt ans.";

    let llm = Arc::new(
        coffee_llm()
            .on(LlmTask::ExtractClaims, |_| {
                Ok(json!({"arguments": [
                    {"argument": FR_THESIS, "stance": "affirmatif"},
                    {"argument": FR_SUB, "stance": "affirmatif"},
                    {"argument": FR_EVIDENCE, "stance": "affirmatif"}
                ]}))
            })
            .on(LlmTask::TranslateClaims, |r| {
                let translations: Vec<Value> = listed(&r.prompt)
                    .into_iter()
                    .map(|(id, text)| json!({"id": id, "translation": to_english(&text)}))
                    .collect();
                Ok(json!({ "translations": translations }))
            }),
    );

    let output = pipeline(llm.clone(), fast_config().extraction)
        .run(transcript, Some("FR"))
        .await
        .unwrap();

    assert_eq!(llm.calls(LlmTask::DetectLanguage), 0);
    assert!(llm.calls(LlmTask::TranslateClaims) >= 1);

    let structure = output.structure;
    assert_eq!(structure.source_language, "fr");
    assert_eq!(structure.pivot_language, "en");
    assert_eq!(structure.chain_count(), 1);

    let thesis = &structure.chains[0].thesis;
    assert_eq!(thesis.text, FR_THESIS);
    assert_eq!(thesis.pivot_text, COFFEE_THESIS);
    assert_eq!(thesis.stance, Stance::Affirmative);
    assert_eq!(structure.chains[0].sub_arguments[0].node.text, FR_SUB);
}

#[tokio::test]
async fn test_failed_segment_extraction_yields_empty_structure() {
    let llm = Arc::new(coffee_llm().on(LlmTask::ExtractClaims, |_| {
        Err(argtree_engine::types::ServiceError::Server {
            status: 500,
            message: "boom".into(),
        })
    }));
    let output = pipeline(llm.clone(), fast_config().extraction)
        .run(COFFEE_TRANSCRIPT, Some("en"))
        .await
        .unwrap();

    assert_eq!(output.structure.chain_count(), 0);
    assert_eq!(output.stats.raw_claims, 0);
    assert_eq!(llm.calls(LlmTask::ValidateClaims), 0);
}

#[tokio::test]
async fn test_short_transcript_is_rejected_before_any_call() {
    let llm = Arc::new(coffee_llm());
    let result = pipeline(llm.clone(), fast_config().extraction).run("Too short.", None).await;

    assert!(matches!(result, Err(EngineError::TranscriptTooShort { length: 10, .. })));
    for task in [LlmTask::DetectLanguage, LlmTask::ExtractClaims] {
        assert_eq!(llm.calls(task), 0);
    }
}

#[tokio::test]
async fn test_unreachable_embedding_service_fails_extraction() {
    let retry = RetryPolicy::from(&fast_config().research.retry);
    let result = ExtractionPipeline::new(fast_config().extraction, Arc::new(coffee_llm()), Arc::new(UnreachableEmbedder))
        .with_embedding_retry(retry)
        .run(COFFEE_TRANSCRIPT, Some("en"))
        .await;

    assert!(matches!(result, Err(EngineError::EmbeddingUnavailable(_))));
}
