//! Quality-aware selection among stored analyses
//!
//! Every completed bundle for an input is scored:
//!
//! ```text
//! composite = 0.40 · tier/3
//!           + 0.30 · avg_rating/5
//!           + 0.20 · min(1, log10(rating_count + 1) / 2)
//!           + 0.10 · max(0, 1 - age_days/max_age_days)
//! ```
//!
//! The best bundle is served whichever mode was requested. With no
//! completed bundle the caller is told there is no cache; it never falls
//! back to a partial or failed run.

use crate::types::{AnalysisBundle, AnalysisMode, AnalysisStatus, AnalysisStore};
use argtree_common::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const QUALITY_WEIGHT: f64 = 0.40;
pub const RATING_WEIGHT: f64 = 0.30;
pub const CONFIDENCE_WEIGHT: f64 = 0.20;
pub const RECENCY_WEIGHT: f64 = 0.10;
const CONFIDENCE_DIVISOR: f64 = 2.0;

/// Composite score of one bundle in [0, 1]
pub fn composite_score(tier: u8, avg_rating: f64, rating_count: u32, age_days: f64, max_age_days: f64) -> f64 {
    let quality = (tier as f64 / 3.0).clamp(0.0, 1.0);
    let rating = (avg_rating / 5.0).clamp(0.0, 1.0);
    let confidence = ((rating_count as f64 + 1.0).log10() / CONFIDENCE_DIVISOR).min(1.0);
    let freshness = if max_age_days > 0.0 {
        (1.0 - age_days.max(0.0) / max_age_days).clamp(0.0, 1.0)
    } else {
        0.0
    };

    QUALITY_WEIGHT * quality + RATING_WEIGHT * rating + CONFIDENCE_WEIGHT * confidence + RECENCY_WEIGHT * freshness
}

fn bundle_score(bundle: &AnalysisBundle, now: DateTime<Utc>, max_age_days: f64) -> f64 {
    composite_score(
        bundle.mode.tier(),
        bundle.ratings.average(),
        bundle.ratings.rating_count,
        bundle.age_days(now),
        max_age_days,
    )
}

/// Index and score of the best completed bundle; ties go to the deeper mode
pub fn choose_best(bundles: &[AnalysisBundle], now: DateTime<Utc>, max_age_days: f64) -> Option<(usize, f64)> {
    bundles
        .iter()
        .enumerate()
        .filter(|(_, b)| b.status == AnalysisStatus::Completed)
        .map(|(i, b)| (i, bundle_score(b, now, max_age_days)))
        .max_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| bundles[a.0].mode.tier().cmp(&bundles[b.0].mode.tier()))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheReason {
    /// Best bundle is the requested mode
    ExactMatch,
    /// Best bundle is deeper than requested
    UpgradedMode,
    /// Best bundle is shallower than requested but rated higher overall
    BetterRatedMode,
    NoCache,
    ForceRefresh,
}

#[derive(Debug, Clone)]
pub struct CacheDecision {
    pub bundle: Option<AnalysisBundle>,
    pub reason: CacheReason,
    pub composite: Option<f64>,
}

impl CacheDecision {
    fn miss(reason: CacheReason) -> Self {
        Self {
            bundle: None,
            reason,
            composite: None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.bundle.is_some()
    }
}

/// Summary row for one stored mode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableAnalysis {
    pub mode: AnalysisMode,
    pub status: AnalysisStatus,
    pub age_days: f64,
    pub average_rating: f64,
    pub rating_count: u32,
    pub thesis_count: usize,
    pub composite: f64,
}

pub struct CacheSelector {
    store: Arc<dyn AnalysisStore>,
    max_age_days: f64,
}

impl CacheSelector {
    pub fn new(store: Arc<dyn AnalysisStore>, max_age_days: f64) -> Self {
        Self { store, max_age_days }
    }

    /// Pick the bundle to serve for `input_id`
    pub async fn select(&self, input_id: &str, requested: AnalysisMode, force_refresh: bool) -> Result<CacheDecision> {
        if force_refresh {
            debug!(input_id, "Cache bypassed by force refresh");
            return Ok(CacheDecision::miss(CacheReason::ForceRefresh));
        }

        let mut bundles = self.store.get_all(input_id).await?;
        let Some((idx, composite)) = choose_best(&bundles, Utc::now(), self.max_age_days) else {
            debug!(input_id, requested = %requested, "No cached analysis");
            return Ok(CacheDecision::miss(CacheReason::NoCache));
        };

        let bundle = bundles.swap_remove(idx);
        let reason = if bundle.mode == requested {
            CacheReason::ExactMatch
        } else if bundle.mode.tier() > requested.tier() {
            CacheReason::UpgradedMode
        } else {
            CacheReason::BetterRatedMode
        };

        info!(
            input_id,
            requested = %requested,
            served = %bundle.mode,
            composite,
            reason = ?reason,
            "Serving cached analysis"
        );
        Ok(CacheDecision {
            bundle: Some(bundle),
            reason,
            composite: Some(composite),
        })
    }

    /// Every stored mode for `input_id`, shallow first
    pub async fn available_analyses(&self, input_id: &str) -> Result<Vec<AvailableAnalysis>> {
        let now = Utc::now();
        let bundles = self.store.get_all(input_id).await?;
        Ok(bundles
            .iter()
            .map(|b| AvailableAnalysis {
                mode: b.mode,
                status: b.status,
                age_days: b.age_days(now),
                average_rating: b.ratings.average(),
                rating_count: b.ratings.rating_count,
                thesis_count: b.theses.len(),
                composite: bundle_score(b, now, self.max_age_days),
            })
            .collect())
    }
}
