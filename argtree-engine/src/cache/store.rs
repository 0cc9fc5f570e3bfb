//! In-memory analysis store
//!
//! Each `(input_id, mode)` entry sits behind its own lock, so rating
//! increments on one mode never block reads of another. The outer map lock
//! is only held to look up or insert an entry, and a first insert happens
//! under a single write acquisition.

use crate::types::{AnalysisBundle, AnalysisMode, AnalysisStore};
use argtree_common::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::RwLock as EntryLock;
use tracing::debug;

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

type Key = (String, AnalysisMode);

#[derive(Default)]
pub struct InMemoryAnalysisStore {
    entries: RwLock<HashMap<Key, Arc<EntryLock<AnalysisBundle>>>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, input_id: &str, mode: AnalysisMode) -> Option<Arc<EntryLock<AnalysisBundle>>> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(&(input_id.to_string(), mode)).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn validate_rating(rating: f64) -> Result<f64> {
    if rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(Error::InvalidInput(format!(
            "rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, rating
        )))
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn get(&self, input_id: &str, mode: AnalysisMode) -> Result<Option<AnalysisBundle>> {
        match self.entry(input_id, mode) {
            Some(entry) => Ok(Some(entry.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, input_id: &str, mode: AnalysisMode, bundle: AnalysisBundle) -> Result<()> {
        if bundle.mode != mode || bundle.input_id != input_id {
            return Err(Error::InvalidInput(format!(
                "bundle for ({}, {}) stored under ({}, {})",
                bundle.input_id, bundle.mode, input_id, mode
            )));
        }

        let existing = {
            let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            match entries.entry((input_id.to_string(), mode)) {
                Entry::Occupied(occupied) => occupied.get().clone(),
                Entry::Vacant(vacant) => {
                    vacant.insert(Arc::new(EntryLock::new(bundle)));
                    debug!(input_id, mode = %mode, "Analysis stored");
                    return Ok(());
                }
            }
        };

        let mut stored = existing.write().await;
        let mut bundle = bundle;
        bundle.ratings = stored.ratings;
        bundle.created_at = stored.created_at;
        *stored = bundle;
        debug!(input_id, mode = %mode, "Analysis replaced");
        Ok(())
    }

    async fn increment_rating(&self, input_id: &str, mode: AnalysisMode, rating: f64) -> Result<()> {
        let rating = validate_rating(rating)?;
        let entry = self
            .entry(input_id, mode)
            .ok_or_else(|| Error::NotFound(format!("analysis ({}, {})", input_id, mode)))?;

        let mut bundle = entry.write().await;
        bundle.ratings.rating_count += 1;
        bundle.ratings.ratings_sum += rating;
        bundle.updated_at = Utc::now();
        debug!(
            input_id,
            mode = %mode,
            rating_count = bundle.ratings.rating_count,
            average = bundle.ratings.average(),
            "Rating recorded"
        );
        Ok(())
    }
}
