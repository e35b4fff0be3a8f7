// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Reranker registry
//!
//! A reranker reorders ANN candidates; the search pipeline's final
//! top-k follows the reranker's output order. The built-in `identity`
//! reranker re-scores candidates by exact distance over their stored
//! vectors, which requires `store_embeddings` on the index.

use super::backend::{distance, Metric};
use crate::error::{GrafitoError, Result};
use crate::storage::Node;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One candidate handed to a reranker
#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub id: i64,
    pub vector: Option<Vec<f32>>,
    pub score: f64,
    pub node: Option<Node>,
}

/// Reranker callback: `(query_vec, candidates) -> [(id, score)]`
pub type Reranker =
    Arc<dyn Fn(&[f32], &[RerankCandidate]) -> Result<Vec<(i64, f64)>> + Send + Sync>;

pub const IDENTITY_RERANKER: &str = "identity";

/// Append-only, thread-safe name → reranker map. The identity reranker
/// is resolved per index (its metric matters), not through the map.
pub struct RerankerRegistry {
    entries: RwLock<HashMap<String, Reranker>>,
}

impl Default for RerankerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RerankerRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, name: &str, reranker: Reranker) {
        self.entries.write().insert(name.to_string(), reranker);
    }

    /// Resolve a reranker for an index with the given metric
    pub fn resolve(&self, name: &str, metric: Metric) -> Result<Reranker> {
        if name == IDENTITY_RERANKER {
            return Ok(identity_reranker(metric));
        }
        self.entries.read().get(name).cloned().ok_or_else(|| {
            GrafitoError::Configuration(format!("unknown reranker: {name}"))
        })
    }
}

/// Exact-distance re-scoring over stored vectors
pub(crate) fn identity_reranker(metric: Metric) -> Reranker {
    Arc::new(move |query, candidates| {
        let mut rescored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let vector = candidate.vector.as_deref().ok_or_else(|| {
                GrafitoError::Configuration(
                    "identity reranker requires stored embeddings (store_embeddings: true)"
                        .to_string(),
                )
            })?;
            rescored.push((candidate.id, distance(query, vector, metric) as f64));
        }
        rescored.sort_by(|(id_a, da), (id_b, db)| {
            da.partial_cmp(db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(id_a.cmp(id_b))
        });
        Ok(rescored)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, vector: &[f32]) -> RerankCandidate {
        RerankCandidate {
            id,
            vector: Some(vector.to_vec()),
            score: 0.0,
            node: None,
        }
    }

    #[test]
    fn test_identity_rescoring_orders_by_exact_distance() {
        let registry = RerankerRegistry::new();
        let reranker = registry.resolve(IDENTITY_RERANKER, Metric::L2).unwrap();
        let out = reranker(
            &[1.0, 0.0],
            &[candidate(1, &[0.0, 1.0]), candidate(2, &[1.0, 0.1])],
        )
        .unwrap();
        assert_eq!(out[0].0, 2);
    }

    #[test]
    fn test_identity_requires_vectors() {
        let registry = RerankerRegistry::new();
        let reranker = registry.resolve(IDENTITY_RERANKER, Metric::L2).unwrap();
        let missing = RerankCandidate {
            id: 1,
            vector: None,
            score: 0.0,
            node: None,
        };
        assert!(reranker(&[1.0], &[missing]).is_err());
    }

    #[test]
    fn test_unknown_reranker_is_configuration_error() {
        let registry = RerankerRegistry::new();
        assert!(matches!(
            registry.resolve("nope", Metric::L2),
            Err(GrafitoError::Configuration(_))
        ));
    }
}
