//! Claim validation
//!
//! A claim is accepted when at least one criterion holds: an explicit causal
//! or logical relation, a mechanistic explanation, or a substantive factual
//! or theoretical assertion.
//!
//! Fail-open: claims already passed the extractor's filter, so a failed
//! batch or a claim missing from the response is accepted rather than lost.

use crate::prompts;
use crate::types::{complete_as, ConsolidatedClaim, LlmClient, ValidatedClaim, ValidationCriteria};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct ValidationResponse {
    verdicts: Vec<Verdict>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    id: usize,
    #[serde(default, alias = "meets_causal_criterion")]
    causal: Option<bool>,
    #[serde(default, alias = "meets_mechanistic_criterion")]
    mechanistic: Option<bool>,
    #[serde(default, alias = "meets_necessity_criterion")]
    substantive: Option<bool>,
    #[serde(default)]
    is_valid: Option<bool>,
    #[serde(default, alias = "reasoning")]
    reason: Option<String>,
}

/// Accepted and rejected claims of one validation pass
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub accepted: Vec<ValidatedClaim>,
    pub rejected: Vec<ValidatedClaim>,
}

pub struct ClaimValidator {
    llm: Arc<dyn LlmClient>,
    batch_size: usize,
}

impl ClaimValidator {
    pub fn new(llm: Arc<dyn LlmClient>, batch_size: usize) -> Self {
        Self {
            llm,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn validate(&self, claims: Vec<ConsolidatedClaim>) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        let mut remaining = claims.into_iter().peekable();

        while remaining.peek().is_some() {
            let batch: Vec<ConsolidatedClaim> = remaining.by_ref().take(self.batch_size).collect();
            let verdicts = self.request_verdicts(&batch).await;

            for (id, claim) in batch.into_iter().enumerate() {
                let validated = match verdicts.as_ref().and_then(|v| v.get(&id)) {
                    Some(verdict) => apply_verdict(claim, verdict),
                    None => accept_unreviewed(claim),
                };
                if validated.is_valid {
                    outcome.accepted.push(validated);
                } else {
                    debug!(
                        claim = %validated.claim.text(),
                        reason = validated.rejection_reason.as_deref().unwrap_or(""),
                        "Claim rejected"
                    );
                    outcome.rejected.push(validated);
                }
            }
        }

        info!(
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            "Validation complete"
        );
        outcome
    }

    async fn request_verdicts(&self, batch: &[ConsolidatedClaim]) -> Option<HashMap<usize, Verdict>> {
        let listing = prompts::numbered(batch.iter().enumerate().map(|(i, c)| (i, c.text())));
        match complete_as::<ValidationResponse>(self.llm.as_ref(), &prompts::validate_claims(&listing)).await {
            Ok(response) => Some(response.verdicts.into_iter().map(|v| (v.id, v)).collect()),
            Err(e) => {
                warn!(batch = batch.len(), error = %e, "Validation call failed, accepting batch unreviewed");
                None
            }
        }
    }
}

fn apply_verdict(claim: ConsolidatedClaim, verdict: &Verdict) -> ValidatedClaim {
    let any_criterion = verdict.causal.is_some() || verdict.mechanistic.is_some() || verdict.substantive.is_some();
    let criteria = ValidationCriteria {
        causal: verdict.causal.unwrap_or(false),
        mechanistic: verdict.mechanistic.unwrap_or(false),
        substantive: verdict.substantive.unwrap_or(false),
    };
    let is_valid = if any_criterion {
        criteria.any()
    } else {
        verdict.is_valid.unwrap_or(true)
    };

    ValidatedClaim {
        claim,
        is_valid,
        criteria,
        rejection_reason: if is_valid {
            None
        } else {
            Some(verdict.reason.clone().unwrap_or_else(|| "meets no validation criterion".to_string()))
        },
    }
}

fn accept_unreviewed(claim: ConsolidatedClaim) -> ValidatedClaim {
    ValidatedClaim {
        claim,
        is_valid: true,
        criteria: ValidationCriteria::default(),
        rejection_reason: None,
    }
}
