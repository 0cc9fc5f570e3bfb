//! Prompt templates and response shapes for every LLM-backed step
//!
//! Claims are always listed one per line as `[id] text` so responses can
//! refer back to them by id.

use crate::types::{CompletionRequest, LlmTask, ModelTier};

/// Render `(id, text)` pairs as numbered lines
pub fn numbered<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    items
        .into_iter()
        .map(|(id, text)| format!("[{}] {}", id, text.replace('\n', " ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

fn request(
    task: LlmTask,
    system: &str,
    prompt: String,
    schema_hint: &'static str,
    tier: ModelTier,
    max_tokens: u32,
) -> CompletionRequest {
    CompletionRequest {
        task,
        system: system.to_string(),
        prompt,
        schema_hint,
        tier,
        temperature: 0.1,
        max_tokens,
    }
}

// ============================================================================
// Extraction
// ============================================================================

pub const LANGUAGE_SCHEMA: &str = r#"{"language": "<ISO 639-1 code>"}"#;

pub fn detect_language(sample: &str) -> CompletionRequest {
    request(
        LlmTask::DetectLanguage,
        "You identify the language of a text.",
        format!(
            "Identify the language of the following text. Answer with its two-letter ISO 639-1 code.\n\nTEXT:\n{}",
            sample
        ),
        LANGUAGE_SCHEMA,
        ModelTier::Fast,
        20,
    )
}

pub const EXTRACT_SCHEMA: &str = r#"{"arguments": [{"argument": "<claim>", "stance": "affirmative|conditional"}]}"#;

pub fn extract_claims(segment_text: &str, language: &str) -> CompletionRequest {
    request(
        LlmTask::ExtractClaims,
        "You extract arguments from spoken transcripts. You never invent content.",
        format!(
            "Extract the arguments made in this transcript excerpt (language: {language}).\n\
             Keep ONLY statements that express a causal relationship, a mechanism, or a \
             non-trivial theoretical or empirical assertion. Reject descriptions, narration, \
             anecdotes, vague opinions and bare statistics without causal framing.\n\
             Write each argument as one self-contained sentence in {language}.\n\
             stance = \"affirmative\" when asserted as fact, \"conditional\" when asserted as \
             possible or contingent (may, could, might).\n\n\
             EXCERPT:\n{segment_text}"
        ),
        EXTRACT_SCHEMA,
        ModelTier::Fast,
        2000,
    )
}

pub const VALIDATE_SCHEMA: &str = r#"{"verdicts": [{"id": 0, "causal": true, "mechanistic": false, "substantive": true, "reason": "<short>"}]}"#;

pub fn validate_claims(numbered_claims: &str) -> CompletionRequest {
    request(
        LlmTask::ValidateClaims,
        "You are a strict reviewer of argument quality.",
        format!(
            "For each numbered claim, report which criteria it meets:\n\
             - causal: states an explicit causal or logical relation\n\
             - mechanistic: explains a mechanism\n\
             - substantive: makes a substantive factual or theoretical assertion\n\
             Pure description, narration, vague opinion and bare statistics meet none.\n\
             Give a short reason when a claim meets no criterion.\n\n\
             CLAIMS:\n{numbered_claims}"
        ),
        VALIDATE_SCHEMA,
        ModelTier::Fast,
        1500,
    )
}

pub const TRANSLATE_SCHEMA: &str = r#"{"translations": [{"id": 0, "translation": "<text>"}]}"#;

pub fn translate_claims(numbered_claims: &str, source_language: &str, target_language: &str) -> CompletionRequest {
    request(
        LlmTask::TranslateClaims,
        "You are a faithful translator.",
        format!(
            "Translate each numbered claim from {source_language} to {target_language}.\n\
             Preserve stance, causal content and scope exactly. Do not summarize, \
             strengthen, weaken or add anything.\n\n\
             CLAIMS:\n{numbered_claims}"
        ),
        TRANSLATE_SCHEMA,
        ModelTier::Fast,
        2000,
    )
}

pub const ROLES_SCHEMA: &str = r#"{"roles": [{"id": 0, "role": "thesis|sub_argument|evidence|counter_argument", "confidence": 0.9}]}"#;

pub fn classify_roles(numbered_claims: &str) -> CompletionRequest {
    request(
        LlmTask::ClassifyRoles,
        "You analyze the rhetorical structure of arguments.",
        format!(
            "Assign a role to each numbered claim:\n\
             - thesis: a main claim the speaker defends\n\
             - sub_argument: a reason supporting a thesis\n\
             - evidence: a study, figure or example backing a sub-argument\n\
             - counter_argument: a reason against a thesis\n\
             confidence is between 0.0 and 1.0.\n\n\
             CLAIMS:\n{numbered_claims}"
        ),
        ROLES_SCHEMA,
        ModelTier::Smart,
        1500,
    )
}

pub const LINKS_SCHEMA: &str = r#"{"links": [{"id": 1, "parent_id": 0, "parent_text": null}]}"#;

pub fn link_parents(numbered_claims_with_roles: &str) -> CompletionRequest {
    request(
        LlmTask::LinkParents,
        "You analyze the rhetorical structure of arguments.",
        format!(
            "For each claim that is not a thesis, identify the claim it directly supports or \
             attacks. sub_argument and counter_argument claims attach to a thesis; evidence \
             attaches to the sub_argument or counter_argument it backs. Use parent_id when the \
             parent is in the list; otherwise give parent_text.\n\n\
             CLAIMS:\n{numbered_claims_with_roles}"
        ),
        LINKS_SCHEMA,
        ModelTier::Smart,
        1500,
    )
}

// ============================================================================
// Research
// ============================================================================

pub const TOPIC_SCHEMA: &str = r#"{"categories": ["medicine", "biology"]}"#;

pub fn classify_topic(claim: &str, categories: &str) -> CompletionRequest {
    request(
        LlmTask::ClassifyTopic,
        "You route scientific and factual claims to research databases.",
        format!(
            "Classify the claim into 1 to 3 categories, most relevant first.\n\
             Allowed categories: {categories}\n\n\
             CLAIM: {claim}"
        ),
        TOPIC_SCHEMA,
        ModelTier::Fast,
        100,
    )
}

pub const QUERIES_SCHEMA: &str = r#"{"queries": {"<agent_id>": "<query>"}}"#;

pub fn generate_queries(claim: &str, agents: &str) -> CompletionRequest {
    request(
        LlmTask::GenerateQueries,
        "You write search queries for research databases.",
        format!(
            "Write one search query per agent to find evidence for or against the claim.\n\
             Use keywords, not sentences. Adapt to each database (MeSH-style terms for \
             pubmed, technical terms for arxiv, indicator names for oecd/world_bank).\n\
             Agents: {agents}\n\n\
             CLAIM: {claim}"
        ),
        QUERIES_SCHEMA,
        ModelTier::Fast,
        500,
    )
}

pub const SCREEN_SCHEMA: &str = r#"{"scores": [{"source_id": 1, "score": 0.8, "reason": "<short>"}]}"#;

pub fn screen_sources(claim: &str, numbered_sources: &str) -> CompletionRequest {
    request(
        LlmTask::ScreenSources,
        "You assess how relevant research sources are to a claim.",
        format!(
            "Score each numbered source from 0.0 (irrelevant) to 1.0 (directly tests the claim).\n\
             Give a short reason for each score.\n\n\
             CLAIM: {claim}\n\n\
             SOURCES:\n{numbered_sources}"
        ),
        SCREEN_SCHEMA,
        ModelTier::Fast,
        800,
    )
}

pub const EVIDENCE_SCHEMA: &str = r#"{"pros": [{"claim": "<finding>", "source": "<url>"}], "cons": [{"claim": "<finding>", "source": "<url>"}]}"#;

pub fn analyze_evidence(claim: &str, corpus: &str) -> CompletionRequest {
    request(
        LlmTask::AnalyzeEvidence,
        "You are a careful scientific analyst. You only report what the sources say.",
        format!(
            "Using ONLY the sources below, list findings that support (pros) or contradict \
             (cons) the claim. Cite each finding with the exact URL of its source. Omit \
             findings you cannot attribute to a listed source.\n\n\
             CLAIM: {claim}\n\n\
             SOURCES:\n{corpus}"
        ),
        EVIDENCE_SCHEMA,
        ModelTier::Smart,
        2000,
    )
}
