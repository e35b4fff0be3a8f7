// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! The ANN backend contract
//!
//! A backend owns a named vector structure of fixed dimension. Scores
//! are distances: smaller is better, ties break by id. Backends declare
//! which distance spaces they support; `l2` is Euclidean, `ip` is
//! negated inner product (so that smaller still means closer), `cosine`
//! is cosine distance.

use crate::error::{GrafitoError, Result};
use crate::storage::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Distance space of a vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    L2,
    Ip,
    Cosine,
}

impl Metric {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Some(Metric::L2),
            "ip" | "inner_product" | "dot" => Some(Metric::Ip),
            "cosine" => Some(Metric::Cosine),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::L2 => "l2",
            Metric::Ip => "ip",
            Metric::Cosine => "cosine",
        }
    }
}

/// Distance between two equal-length vectors under `metric`
pub fn distance(a: &[f32], b: &[f32], metric: Metric) -> f32 {
    match metric {
        Metric::L2 => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
        Metric::Ip => -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        Metric::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                1.0
            } else {
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}

/// Candidate filter passed down to a backend search
pub type IdFilter<'a> = &'a dyn Fn(i64) -> bool;

/// Pluggable ANN structure over a fixed dimension
pub trait VectorBackend: Send + Sync {
    /// Backend tag as recorded in the index metadata
    fn backend_tag(&self) -> &'static str;

    /// Distance spaces this backend supports
    fn supported_metrics(&self) -> &'static [Metric];

    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace the vector for `id`
    fn add(&mut self, id: i64, vector: &[f32]) -> Result<()>;

    /// Remove `id`; unknown ids are a no-op
    fn remove(&mut self, id: i64) -> Result<()>;

    /// The `k` nearest candidates to `query`, smallest distance first,
    /// ties by id. `filter` (when given) excludes ids before ranking.
    fn search(&self, query: &[f32], k: usize, filter: Option<IdFilter>) -> Result<Vec<(i64, f32)>>;

    /// Write the index state to `path` (or its configured default)
    fn persist(&self, path: Option<&Path>) -> Result<()>;

    /// Replace the index state from a previously persisted file
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Stored vector for `id`, when the backend retains vectors
    fn vector(&self, id: i64) -> Option<Vec<f32>>;
}

/// Constructor signature for registered backend implementations
pub type BackendFactory =
    fn(dimension: usize, metric: Metric, options: &BTreeMap<String, Value>) -> Result<Box<dyn VectorBackend>>;

pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(GrafitoError::Index(format!(
            "dimension mismatch: index expects {expected}, got {}",
            vector.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_distance() {
        let d = distance(&[0.0, 0.0], &[3.0, 4.0], Metric::L2);
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_orthogonal() {
        let d = distance(&[1.0, 0.0], &[0.0, 1.0], Metric::Cosine);
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ip_smaller_is_closer() {
        let near = distance(&[1.0, 0.0], &[1.0, 0.0], Metric::Ip);
        let far = distance(&[1.0, 0.0], &[0.1, 0.0], Metric::Ip);
        assert!(near < far);
    }
}
