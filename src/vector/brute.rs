// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Exact brute-force backend
//!
//! The reference implementation for correctness testing: search scans
//! every stored vector and returns exactly the `k` smallest distances,
//! ties broken by id.

use super::backend::{check_dimension, distance, IdFilter, Metric, VectorBackend};
use crate::error::{GrafitoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const BACKEND_TAG: &str = "brute";

pub struct BruteForceIndex {
    dimension: usize,
    metric: Metric,
    entries: Vec<(i64, Vec<f32>)>,
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    dimension: usize,
    metric: String,
    entries: Vec<(i64, Vec<f32>)>,
}

impl BruteForceIndex {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            entries: Vec::new(),
        }
    }
}

impl VectorBackend for BruteForceIndex {
    fn backend_tag(&self) -> &'static str {
        BACKEND_TAG
    }

    fn supported_metrics(&self) -> &'static [Metric] {
        &[Metric::L2, Metric::Ip, Metric::Cosine]
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn add(&mut self, id: i64, vector: &[f32]) -> Result<()> {
        check_dimension(self.dimension, vector)?;
        match self.entries.iter_mut().find(|(eid, _)| *eid == id) {
            Some(slot) => slot.1 = vector.to_vec(),
            None => self.entries.push((id, vector.to_vec())),
        }
        Ok(())
    }

    fn remove(&mut self, id: i64) -> Result<()> {
        self.entries.retain(|(eid, _)| *eid != id);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize, filter: Option<IdFilter>) -> Result<Vec<(i64, f32)>> {
        check_dimension(self.dimension, query)?;
        let mut scored: Vec<(i64, f32)> = self
            .entries
            .iter()
            .filter(|(id, _)| filter.map_or(true, |f| f(*id)))
            .map(|(id, vector)| (*id, distance(query, vector, self.metric)))
            .collect();
        scored.sort_by(|(id_a, da), (id_b, db)| {
            da.partial_cmp(db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(id_a.cmp(id_b))
        });
        scored.truncate(k);
        Ok(scored)
    }

    fn persist(&self, path: Option<&Path>) -> Result<()> {
        let path = path.ok_or_else(|| {
            GrafitoError::Configuration("brute-force persist requires a path".to_string())
        })?;
        let state = PersistedState {
            dimension: self.dimension,
            metric: self.metric.as_str().to_string(),
            entries: self.entries.clone(),
        };
        let bytes = bincode::serialize(&state)
            .map_err(|e| GrafitoError::Storage(format!("vector index encode failed: {e}")))?;
        std::fs::write(path, bytes)
            .map_err(|e| GrafitoError::Storage(format!("vector index write failed: {e}")))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)
            .map_err(|e| GrafitoError::Storage(format!("vector index read failed: {e}")))?;
        let state: PersistedState = bincode::deserialize(&bytes)
            .map_err(|e| GrafitoError::Storage(format!("vector index decode failed: {e}")))?;
        if state.dimension != self.dimension {
            return Err(GrafitoError::Index(format!(
                "persisted index has dimension {}, expected {}",
                state.dimension, self.dimension
            )));
        }
        self.entries = state.entries;
        Ok(())
    }

    fn vector(&self, id: i64) -> Option<Vec<f32>> {
        self.entries
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BruteForceIndex {
        let mut index = BruteForceIndex::new(3, Metric::L2);
        index.add(1, &[1.0, 0.0, 0.0]).unwrap();
        index.add(2, &[0.0, 1.0, 0.0]).unwrap();
        index.add(3, &[0.9, 0.1, 0.0]).unwrap();
        index
    }

    #[test]
    fn test_exact_order() {
        let index = sample();
        let hits = index.search(&[1.0, 0.0, 0.0], 2, None).unwrap();
        let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_tie_broken_by_id() {
        let mut index = BruteForceIndex::new(2, Metric::L2);
        index.add(7, &[1.0, 0.0]).unwrap();
        index.add(2, &[1.0, 0.0]).unwrap();
        let hits = index.search(&[1.0, 0.0], 2, None).unwrap();
        assert_eq!(hits[0].0, 2);
        assert_eq!(hits[1].0, 7);
    }

    #[test]
    fn test_filter_excludes_before_ranking() {
        let index = sample();
        let filter = |id: i64| id != 1;
        let hits = index.search(&[1.0, 0.0, 0.0], 2, Some(&filter)).unwrap();
        assert_eq!(hits[0].0, 3);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = BruteForceIndex::new(3, Metric::L2);
        assert!(index.add(1, &[1.0, 0.0]).is_err());
    }

    #[test]
    fn test_persist_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        let index = sample();
        index.persist(Some(&path)).unwrap();

        let mut restored = BruteForceIndex::new(3, Metric::L2);
        restored.load(&path).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.vector(1), Some(vec![1.0, 0.0, 0.0]));
    }
}
