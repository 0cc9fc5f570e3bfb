//! Embedding-based claim deduplication
//!
//! Claims whose embeddings have cosine similarity >= threshold are linked;
//! connected components of that graph (union-find) collapse to one
//! consolidated claim represented by the longest member. Components are
//! transitive: A~B and B~C merge A, B and C even when A≁C.

use crate::resilience::{retry_transient, RetryPolicy};
use crate::types::{ConsolidatedClaim, EmbeddingClient, RawClaim, ServiceError};
use std::sync::Arc;
use tracing::{debug, info};

/// Disjoint-set forest with path compression and union by rank
#[derive(Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Cosine similarity; 0.0 for zero or mismatched vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Group indices into similarity components
///
/// Components are ordered by their smallest member; members ascend.
pub fn cluster(embeddings: &[Vec<f32>], threshold: f32) -> Vec<Vec<usize>> {
    let n = embeddings.len();
    let mut uf = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if cosine_similarity(&embeddings[i], &embeddings[j]) >= threshold {
                uf.union(i, j);
            }
        }
    }

    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
    for i in 0..n {
        let root = uf.find(i);
        match slot_of_root[root] {
            Some(slot) => components[slot].push(i),
            None => {
                slot_of_root[root] = Some(components.len());
                components.push(vec![i]);
            }
        }
    }
    components
}

pub struct Deduplicator {
    embedder: Arc<dyn EmbeddingClient>,
    threshold: f32,
    retry: RetryPolicy,
}

impl Deduplicator {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, threshold: f32) -> Self {
        Self {
            embedder,
            threshold,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Merge near-duplicates
    ///
    /// # Errors
    /// The embedding service failing after retries; there is no meaningful
    /// fallback because the pairwise invariant cannot be checked without it.
    pub async fn deduplicate(&self, claims: Vec<RawClaim>) -> Result<Vec<ConsolidatedClaim>, ServiceError> {
        if claims.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = claims.iter().map(|c| c.text.clone()).collect();
        let embedder = self.embedder.clone();
        let attempted = retry_transient("embed claims", &self.retry, || {
            let embedder = embedder.clone();
            let texts = texts.clone();
            async move { embedder.embed_batch(&texts).await }
        })
        .await;
        let embeddings = attempted.result?;
        if embeddings.len() != claims.len() {
            return Err(ServiceError::Malformed(format!(
                "expected {} embeddings, got {}",
                claims.len(),
                embeddings.len()
            )));
        }

        let components = cluster(&embeddings, self.threshold);
        let input_count = claims.len();

        let mut slots: Vec<Option<RawClaim>> = claims.into_iter().map(Some).collect();
        let mut consolidated = Vec::with_capacity(components.len());
        for members in components {
            let representative = members
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    let len_a = texts[a].chars().count();
                    let len_b = texts[b].chars().count();
                    // Longest wins; among equals the earliest
                    len_a.cmp(&len_b).then(b.cmp(&a))
                })
                .unwrap_or(members[0]);

            let merged_from: Vec<RawClaim> = members.iter().filter_map(|&i| slots[i].take()).collect();
            let position = members.iter().position(|&i| i == representative).unwrap_or(0);
            let claim = merged_from[position].clone();

            if merged_from.len() > 1 {
                debug!(merged = merged_from.len(), representative = %claim.text, "Merged duplicate claims");
            }
            consolidated.push(ConsolidatedClaim {
                claim,
                merged_from,
                embedding: embeddings[representative].clone(),
            });
        }

        info!(
            input = input_count,
            consolidated = consolidated.len(),
            threshold = self.threshold,
            "Deduplication complete"
        );
        Ok(consolidated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_union_find_merges_transitively() {
        let mut uf = UnionFind::new(4);
        uf.union(0, 1);
        uf.union(1, 2);
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(3));
    }

    #[test]
    fn test_cluster_is_transitive_closure() {
        // A~B (0.9), B~C (0.9), A≁C (~0.62)
        let a = vec![1.0, 0.0];
        let b = vec![(0.45f32).cos(), (0.45f32).sin()];
        let c = vec![(0.9f32).cos(), (0.9f32).sin()];
        assert!(cosine_similarity(&a, &b) >= 0.85);
        assert!(cosine_similarity(&b, &c) >= 0.85);
        assert!(cosine_similarity(&a, &c) < 0.85);

        let components = cluster(&[a, b, c, vec![0.0, -1.0]], 0.85);

        assert_eq!(components, vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_cluster_orders_by_first_member() {
        let x = vec![1.0, 0.0];
        let y = vec![0.0, 1.0];
        let components = cluster(&[y.clone(), x.clone(), y, x], 0.85);
        assert_eq!(components, vec![vec![0, 2], vec![1, 3]]);
    }
}
