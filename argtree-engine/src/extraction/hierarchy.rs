//! Role classification and parent linking
//!
//! Two sequential LLM calls over the whole claim batch:
//! 1. assign a role to every claim (missing or failed → thesis, confidence 0.5)
//! 2. for non-thesis claims, name a parent by id or by text
//!
//! Parent text is resolved against the batch by exact match, then
//! bidirectional substring, then near-exact edit similarity, then embedding
//! similarity. Anything unresolved is left without a parent and the tree
//! builder promotes it.

use super::deduplicator::cosine_similarity;
use super::tree_builder;
use crate::prompts;
use crate::types::{
    complete_as, ArgumentStructure, ClaimId, EmbeddingClient, LlmClient, Role, RoleClaim, TranslatedClaim,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_ROLE_CONFIDENCE: f32 = 0.5;
const EDIT_SIMILARITY_THRESHOLD: f64 = 0.9;

#[derive(Debug, Deserialize)]
struct RolesResponse {
    roles: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RoleItem {
    id: usize,
    role: Role,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct LinksResponse {
    links: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LinkItem {
    id: usize,
    #[serde(default)]
    parent_id: Option<usize>,
    #[serde(default, alias = "parent_argument")]
    parent_text: Option<String>,
}

pub struct HierarchyBuilder {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingClient>,
    parent_match_threshold: f32,
}

impl HierarchyBuilder {
    pub fn new(llm: Arc<dyn LlmClient>, embedder: Arc<dyn EmbeddingClient>, parent_match_threshold: f32) -> Self {
        Self {
            llm,
            embedder,
            parent_match_threshold,
        }
    }

    /// Classify, link and assemble
    pub async fn build(&self, claims: Vec<TranslatedClaim>, source_language: &str) -> ArgumentStructure {
        let pivot_language = claims
            .first()
            .map(|c| c.pivot_language.clone())
            .unwrap_or_else(|| source_language.to_string());
        let role_claims = self.classify(claims).await;
        tree_builder::assemble(role_claims, source_language, &pivot_language)
    }

    /// Assign roles and parent references; ids are positions in `claims`
    pub async fn classify(&self, claims: Vec<TranslatedClaim>) -> Vec<RoleClaim> {
        if claims.is_empty() {
            return Vec::new();
        }

        let roles = self.classify_roles(&claims).await;
        let parents = self.link_parents(&claims, &roles).await;

        claims
            .into_iter()
            .zip(roles)
            .zip(parents)
            .enumerate()
            .map(|(id, ((claim, (role, role_confidence)), parent))| RoleClaim {
                id,
                claim,
                role,
                parent: if role == Role::Thesis { None } else { parent },
                role_confidence,
                reclassified: None,
            })
            .collect()
    }

    async fn classify_roles(&self, claims: &[TranslatedClaim]) -> Vec<(Role, f32)> {
        let mut roles = vec![(Role::Thesis, DEFAULT_ROLE_CONFIDENCE); claims.len()];
        let listing = prompts::numbered(claims.iter().enumerate().map(|(i, c)| (i, c.pivot_text.as_str())));

        match complete_as::<RolesResponse>(self.llm.as_ref(), &prompts::classify_roles(&listing)).await {
            Ok(response) => {
                for value in response.roles {
                    match serde_json::from_value::<RoleItem>(value) {
                        Ok(item) if item.id < claims.len() => {
                            let confidence = item.confidence.unwrap_or(DEFAULT_ROLE_CONFIDENCE).clamp(0.0, 1.0);
                            roles[item.id] = (item.role, confidence);
                        }
                        Ok(item) => debug!(id = item.id, "Role for unknown claim id ignored"),
                        Err(e) => debug!(error = %e, "Skipping malformed role item"),
                    }
                }
            }
            Err(e) => {
                warn!(claims = claims.len(), error = %e, "Role classification failed, defaulting every claim to thesis");
            }
        }

        let theses = roles.iter().filter(|(r, _)| *r == Role::Thesis).count();
        info!(claims = claims.len(), theses, "Roles classified");
        roles
    }

    async fn link_parents(&self, claims: &[TranslatedClaim], roles: &[(Role, f32)]) -> Vec<Option<ClaimId>> {
        let mut parents = vec![None; claims.len()];
        if roles.iter().all(|(r, _)| *r == Role::Thesis) {
            return parents;
        }

        let annotated: Vec<String> = claims
            .iter()
            .zip(roles)
            .map(|(c, (role, _))| format!("({}) {}", role, c.pivot_text))
            .collect();
        let listing = prompts::numbered(annotated.iter().enumerate().map(|(i, t)| (i, t.as_str())));

        let links = match complete_as::<LinksResponse>(self.llm.as_ref(), &prompts::link_parents(&listing)).await {
            Ok(response) => response.links,
            Err(e) => {
                warn!(error = %e, "Parent linking failed, non-thesis claims will be promoted");
                return parents;
            }
        };

        for value in links {
            let item = match serde_json::from_value::<LinkItem>(value) {
                Ok(item) if item.id < claims.len() => item,
                Ok(_) => continue,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed link item");
                    continue;
                }
            };
            if roles[item.id].0 == Role::Thesis {
                continue;
            }

            // Dangling ids are kept so tree assembly reports them as unresolved
            parents[item.id] = match (item.parent_id, item.parent_text.as_deref()) {
                (Some(parent_id), _) => Some(parent_id),
                (None, Some(text)) if !text.trim().is_empty() => self.resolve_parent_text(text, item.id, claims).await,
                _ => None,
            };
        }

        let linked = parents.iter().filter(|p| p.is_some()).count();
        info!(linked, "Parents linked");
        parents
    }

    /// Map a parent given as text to a claim id
    async fn resolve_parent_text(&self, text: &str, child: ClaimId, claims: &[TranslatedClaim]) -> Option<ClaimId> {
        if let Some(id) = match_parent_text(text, child, claims) {
            return Some(id);
        }

        let vector = match self.embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Embedding parent text failed, leaving parent unresolved");
                return None;
            }
        };
        let best = claims
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != child)
            .map(|(i, c)| (i, cosine_similarity(&vector, c.embedding())))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match best {
            Some((id, similarity)) if similarity > self.parent_match_threshold => {
                debug!(child, parent = id, similarity, "Parent resolved by embedding similarity");
                Some(id)
            }
            _ => None,
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().trim_end_matches(['.', '!', '?']).trim().to_lowercase()
}

/// Text-only parent resolution (exact, substring, edit similarity)
pub fn match_parent_text(text: &str, child: ClaimId, claims: &[TranslatedClaim]) -> Option<ClaimId> {
    let target = normalize(text);
    if target.is_empty() {
        return None;
    }

    let candidates: Vec<(ClaimId, [String; 2])> = claims
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != child)
        .map(|(i, c)| (i, [normalize(&c.pivot_text), normalize(c.original_text())]))
        .collect();

    if let Some((id, _)) = candidates.iter().find(|(_, texts)| texts.iter().any(|t| *t == target)) {
        return Some(*id);
    }

    if let Some((id, _)) = candidates
        .iter()
        .find(|(_, texts)| texts.iter().any(|t| !t.is_empty() && (t.contains(&target) || target.contains(t.as_str()))))
    {
        return Some(*id);
    }

    let mut scored: HashMap<ClaimId, f64> = HashMap::new();
    for (id, texts) in &candidates {
        let best = texts
            .iter()
            .map(|t| strsim::normalized_levenshtein(t, &target))
            .fold(0.0, f64::max);
        scored.insert(*id, best);
    }
    scored
        .into_iter()
        .filter(|(_, s)| *s >= EDIT_SIMILARITY_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{failing_llm, llm, WordHashEmbedder};
    use serde_json::json;
    use crate::types::{ConsolidatedClaim, RawClaim, Stance, ValidatedClaim, ValidationCriteria};

    fn translated(text: &str) -> TranslatedClaim {
        let raw = RawClaim {
            text: text.to_string(),
            stance: Stance::Affirmative,
            segment_index: 0,
            source_language: "en".to_string(),
        };
        TranslatedClaim {
            claim: ValidatedClaim {
                claim: ConsolidatedClaim {
                    claim: raw.clone(),
                    merged_from: vec![raw],
                    embedding: Vec::new(),
                },
                is_valid: true,
                criteria: ValidationCriteria::default(),
                rejection_reason: None,
            },
            pivot_text: text.to_string(),
            pivot_language: "en".to_string(),
        }
    }

    #[test]
    fn test_match_parent_exact_ignores_case_and_period() {
        let claims = vec![translated("Coffee reduces liver cancer risk."), translated("Polyphenols are antioxidants")];
        assert_eq!(match_parent_text("coffee reduces liver cancer risk", 1, &claims), Some(0));
    }

    #[test]
    fn test_match_parent_substring() {
        let claims = vec![translated("Coffee reduces liver cancer risk"), translated("Polyphenols are antioxidants")];
        assert_eq!(match_parent_text("reduces liver cancer", 1, &claims), Some(0));
        assert_eq!(
            match_parent_text("Polyphenols are antioxidants that protect cells", 0, &claims),
            Some(1)
        );
    }

    #[test]
    fn test_match_parent_edit_similarity() {
        let claims = vec![translated("Coffee reduces liver cancer risk"), translated("Sleep matters")];
        assert_eq!(match_parent_text("Cofee reduces livr cancer risk", 1, &claims), Some(0));
    }

    #[test]
    fn test_match_parent_never_returns_child() {
        let claims = vec![translated("Coffee reduces liver cancer risk")];
        assert_eq!(match_parent_text("Coffee reduces liver cancer risk", 0, &claims), None);
    }

    #[test]
    fn test_match_parent_unrelated_text() {
        let claims = vec![translated("Coffee reduces liver cancer risk"), translated("Sleep matters")];
        assert_eq!(match_parent_text("Inflation erodes savings", 1, &claims), None);
    }

    fn coffee_claims() -> Vec<TranslatedClaim> {
        vec![
            translated("Coffee reduces liver cancer risk"),
            translated("Polyphenols have an antioxidant effect"),
            translated("Smith et al. 2023 confirms this"),
        ]
    }

    fn coffee_llm() -> Arc<dyn LlmClient> {
        llm(|request| match request.task {
            crate::types::LlmTask::ClassifyRoles => Ok(json!({"roles": [
                {"id": 0, "role": "thesis", "confidence": 0.95},
                {"id": 1, "role": "sub_argument", "confidence": 0.8},
                {"id": 2, "role": "evidence"}
            ]})),
            crate::types::LlmTask::LinkParents => Ok(json!({"links": [
                {"id": 1, "parent_id": 0},
                {"id": 2, "parent_text": "polyphenols have an antioxidant effect."}
            ]})),
            other => panic!("unexpected task {:?}", other),
        })
    }

    #[tokio::test]
    async fn test_classify_and_link_by_id_and_text() {
        let builder = HierarchyBuilder::new(coffee_llm(), Arc::new(WordHashEmbedder), 0.7);
        let role_claims = builder.classify(coffee_claims()).await;

        assert_eq!(role_claims[0].role, Role::Thesis);
        assert_eq!(role_claims[1].parent, Some(0));
        assert_eq!(role_claims[2].role, Role::Evidence);
        assert_eq!(role_claims[2].parent, Some(1));
        assert!((role_claims[2].role_confidence - DEFAULT_ROLE_CONFIDENCE).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_build_produces_three_level_chain() {
        let builder = HierarchyBuilder::new(coffee_llm(), Arc::new(WordHashEmbedder), 0.7);
        let structure = builder.build(coffee_claims(), "en").await;

        assert_eq!(structure.chain_count(), 1);
        let chain = &structure.chains[0];
        assert_eq!(chain.thesis.text, "Coffee reduces liver cancer risk");
        assert_eq!(chain.sub_arguments.len(), 1);
        assert_eq!(chain.sub_arguments[0].evidence.len(), 1);
        assert_eq!(structure.total_claims, 3);
        assert_eq!(structure.reclassified_count, 0);
    }

    #[tokio::test]
    async fn test_failed_role_call_makes_every_claim_a_thesis() {
        let builder = HierarchyBuilder::new(failing_llm(), Arc::new(WordHashEmbedder), 0.7);
        let structure = builder.build(coffee_claims(), "en").await;
        assert_eq!(structure.chain_count(), 3);
        assert_eq!(structure.total_claims, 3);
    }
}
