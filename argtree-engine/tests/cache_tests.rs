//! Stored analyses, ratings and cache selection

use argtree_common::Error;
use argtree_engine::cache::{CacheReason, CacheSelector, InMemoryAnalysisStore};
use argtree_engine::types::{AnalysisBundle, AnalysisMode, AnalysisStatus, AnalysisStore, RatingStats};
use chrono::{Duration, Utc};
use std::sync::Arc;

fn completed(input_id: &str, mode: AnalysisMode, avg: f64, count: u32, age_days: i64) -> AnalysisBundle {
    let mut bundle = AnalysisBundle::pending(input_id, mode);
    bundle.status = AnalysisStatus::Completed;
    bundle.ratings = RatingStats {
        rating_count: count,
        ratings_sum: avg * count as f64,
    };
    bundle.created_at = Utc::now() - Duration::days(age_days);
    bundle
}

async fn store_with(bundles: Vec<AnalysisBundle>) -> Arc<InMemoryAnalysisStore> {
    let store = Arc::new(InMemoryAnalysisStore::new());
    for bundle in bundles {
        let (input_id, mode) = (bundle.input_id.clone(), bundle.mode);
        store.put(&input_id, mode, bundle).await.unwrap();
    }
    store
}

#[tokio::test]
async fn test_well_rated_deep_analysis_serves_shallow_request() -> anyhow::Result<()> {
    let store = store_with(vec![
        completed("vid", AnalysisMode::Shallow, 2.0, 5, 2),
        completed("vid", AnalysisMode::Deep, 4.8, 20, 2),
    ])
    .await;
    let selector = CacheSelector::new(store, 7.0);

    let decision = selector.select("vid", AnalysisMode::Shallow, false).await?;
    assert_eq!(decision.reason, CacheReason::UpgradedMode);
    assert_eq!(decision.bundle.as_ref().map(|b| b.mode), Some(AnalysisMode::Deep));
    assert!(decision.composite.unwrap() > 0.85);

    let decision = selector.select("vid", AnalysisMode::Deep, false).await?;
    assert_eq!(decision.reason, CacheReason::ExactMatch);

    let decision = selector.select("vid", AnalysisMode::Deep, true).await?;
    assert_eq!(decision.reason, CacheReason::ForceRefresh);
    assert!(!decision.is_hit());

    let decision = selector.select("other", AnalysisMode::Deep, false).await?;
    assert_eq!(decision.reason, CacheReason::NoCache);
    assert!(!decision.is_hit());
    Ok(())
}

#[tokio::test]
async fn test_shallower_mode_served_when_deeper_is_unfinished() -> anyhow::Result<()> {
    let mut failed_deep = completed("vid", AnalysisMode::Deep, 5.0, 50, 0);
    failed_deep.status = AnalysisStatus::Failed;
    let store = store_with(vec![
        completed("vid", AnalysisMode::Shallow, 3.0, 2, 1),
        completed("vid", AnalysisMode::Balanced, 4.5, 10, 1),
        failed_deep,
    ])
    .await;
    let selector = CacheSelector::new(store, 7.0);

    let decision = selector.select("vid", AnalysisMode::Deep, false).await?;
    assert_eq!(decision.reason, CacheReason::BetterRatedMode);
    assert_eq!(decision.bundle.map(|b| b.mode), Some(AnalysisMode::Balanced));

    let available = selector.available_analyses("vid").await?;
    let modes: Vec<AnalysisMode> = available.iter().map(|a| a.mode).collect();
    assert_eq!(modes, AnalysisMode::ALL.to_vec());
    assert_eq!(available[2].status, AnalysisStatus::Failed);
    assert!((available[1].average_rating - 4.5).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_ratings_are_all_counted() {
    let store = store_with(vec![completed("vid", AnalysisMode::Balanced, 0.0, 0, 0)]).await;

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let rating = if i % 2 == 0 { 4.0 } else { 5.0 };
                store.increment_rating("vid", AnalysisMode::Balanced, rating).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let bundle = store.get("vid", AnalysisMode::Balanced).await.unwrap().unwrap();
    assert_eq!(bundle.ratings.rating_count, 50);
    assert!((bundle.ratings.ratings_sum - 225.0).abs() < 1e-9);
    assert!((bundle.ratings.average() - 4.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_invalid_ratings_are_rejected() {
    let store = store_with(vec![completed("vid", AnalysisMode::Shallow, 0.0, 0, 0)]).await;

    for rating in [-0.5, 5.5, f64::NAN, f64::INFINITY] {
        let result = store.increment_rating("vid", AnalysisMode::Shallow, rating).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))), "rating {rating} accepted");
    }
    let missing = store.increment_rating("vid", AnalysisMode::Deep, 3.0).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    let bundle = store.get("vid", AnalysisMode::Shallow).await.unwrap().unwrap();
    assert_eq!(bundle.ratings.rating_count, 0);
}
