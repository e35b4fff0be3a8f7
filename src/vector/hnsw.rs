// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! HNSW (Hierarchical Navigable Small World) backend
//!
//! Approximate search over a layered proximity graph. Deletions are
//! tombstoned: removed slots stay navigable but never surface in
//! results. Tuning options: `m` (graph degree), `ef_construction`,
//! `ef_search`.

use super::backend::{check_dimension, distance, IdFilter, Metric, VectorBackend};
use crate::error::{GrafitoError, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::Path;

pub const BACKEND_TAG: &str = "hnsw";

const DEFAULT_M: usize = 16;
const DEFAULT_EF_CONSTRUCTION: usize = 200;
const DEFAULT_EF_SEARCH: usize = 64;

#[derive(Serialize, Deserialize, Clone)]
struct Slot {
    id: i64,
    vector: Vec<f32>,
    /// Neighbor slot indexes per layer; `links.len() - 1` is the slot's
    /// top layer.
    links: Vec<Vec<usize>>,
    deleted: bool,
}

pub struct HnswIndex {
    dimension: usize,
    metric: Metric,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    level_mult: f64,
    slots: Vec<Slot>,
    id_to_slot: HashMap<i64, usize>,
    entry: Option<usize>,
    rng: SmallRng,
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    dimension: usize,
    metric: String,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    slots: Vec<Slot>,
    entry: Option<usize>,
}

/// Max-heap entry ordered by distance (furthest on top)
struct Far(f32, usize);
impl PartialEq for Far {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Far {}
impl PartialOrd for Far {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Far {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Min-heap entry (nearest on top), via reversed ordering
struct Near(f32, usize);
impl PartialEq for Near {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Near {}
impl PartialOrd for Near {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Near {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
    }
}

impl HnswIndex {
    pub fn new(dimension: usize, metric: Metric, m: usize, ef_construction: usize, ef_search: usize) -> Self {
        let m = m.max(2);
        Self {
            dimension,
            metric,
            m,
            ef_construction: ef_construction.max(m),
            ef_search: ef_search.max(1),
            level_mult: 1.0 / (m as f64).ln(),
            slots: Vec::new(),
            id_to_slot: HashMap::new(),
            entry: None,
            rng: SmallRng::seed_from_u64(0x9E3779B9),
        }
    }

    pub fn with_defaults(dimension: usize, metric: Metric) -> Self {
        Self::new(
            dimension,
            metric,
            DEFAULT_M,
            DEFAULT_EF_CONSTRUCTION,
            DEFAULT_EF_SEARCH,
        )
    }

    fn dist(&self, query: &[f32], slot: usize) -> f32 {
        distance(query, &self.slots[slot].vector, self.metric)
    }

    fn random_level(&mut self) -> usize {
        let uniform: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        (-uniform.ln() * self.level_mult) as usize
    }

    fn top_layer(&self, slot: usize) -> usize {
        self.slots[slot].links.len().saturating_sub(1)
    }

    /// Greedy single-candidate descent within one layer
    fn greedy_step(&self, query: &[f32], mut current: usize, layer: usize) -> usize {
        let mut best = self.dist(query, current);
        loop {
            let mut improved = false;
            for &neighbor in &self.slots[current].links[layer] {
                let d = self.dist(query, neighbor);
                if d < best {
                    best = d;
                    current = neighbor;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Best-first search within one layer, returning up to `ef`
    /// candidates sorted nearest-first.
    fn search_layer(&self, query: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<(f32, usize)> {
        let mut visited: HashSet<usize> = HashSet::from([entry]);
        let entry_dist = self.dist(query, entry);
        let mut candidates = BinaryHeap::from([Near(entry_dist, entry)]);
        let mut results = BinaryHeap::from([Far(entry_dist, entry)]);

        while let Some(Near(d, slot)) = candidates.pop() {
            let worst = results.peek().map(|f| f.0).unwrap_or(f32::MAX);
            if d > worst && results.len() >= ef {
                break;
            }
            for &neighbor in &self.slots[slot].links[layer] {
                if !visited.insert(neighbor) {
                    continue;
                }
                let nd = self.dist(query, neighbor);
                let worst = results.peek().map(|f| f.0).unwrap_or(f32::MAX);
                if results.len() < ef || nd < worst {
                    candidates.push(Near(nd, neighbor));
                    results.push(Far(nd, neighbor));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<(f32, usize)> = results.into_iter().map(|Far(d, s)| (d, s)).collect();
        out.sort_by(|(da, sa), (db, sb)| {
            da.partial_cmp(db)
                .unwrap_or(Ordering::Equal)
                .then(sa.cmp(sb))
        });
        out
    }

    fn link(&mut self, a: usize, b: usize, layer: usize) {
        if a == b {
            return;
        }
        let cap = if layer == 0 { self.m * 2 } else { self.m };
        for (from, to) in [(a, b), (b, a)] {
            if !self.slots[from].links[layer].contains(&to) {
                self.slots[from].links[layer].push(to);
            }
            if self.slots[from].links[layer].len() > cap {
                // Keep the closest `cap` neighbors.
                let origin = self.slots[from].vector.clone();
                let mut neighbors = std::mem::take(&mut self.slots[from].links[layer]);
                neighbors.sort_by(|&x, &y| {
                    self.dist(&origin, x)
                        .partial_cmp(&self.dist(&origin, y))
                        .unwrap_or(Ordering::Equal)
                });
                neighbors.truncate(cap);
                self.slots[from].links[layer] = neighbors;
            }
        }
    }
}

impl VectorBackend for HnswIndex {
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
        self.slots.iter().filter(|s| !s.deleted).count()
    }

    fn add(&mut self, id: i64, vector: &[f32]) -> Result<()> {
        check_dimension(self.dimension, vector)?;
        if self.id_to_slot.contains_key(&id) {
            self.remove(id)?;
        }
        let level = self.random_level();
        let slot = self.slots.len();
        self.slots.push(Slot {
            id,
            vector: vector.to_vec(),
            links: vec![Vec::new(); level + 1],
            deleted: false,
        });
        self.id_to_slot.insert(id, slot);

        let Some(entry) = self.entry else {
            self.entry = Some(slot);
            return Ok(());
        };

        let entry_top = self.top_layer(entry);
        let mut current = entry;
        // Greedy descent through the layers above the new node's level.
        for layer in ((level + 1)..=entry_top).rev() {
            current = self.greedy_step(vector, current, layer);
        }
        // Connect on every shared layer from the top down.
        for layer in (0..=level.min(entry_top)).rev() {
            let candidates = self.search_layer(vector, current, self.ef_construction, layer);
            current = candidates.first().map(|(_, s)| *s).unwrap_or(current);
            for &(_, neighbor) in candidates.iter().take(self.m) {
                self.link(slot, neighbor, layer);
            }
        }
        if level > entry_top {
            self.entry = Some(slot);
        }
        Ok(())
    }

    fn remove(&mut self, id: i64) -> Result<()> {
        if let Some(slot) = self.id_to_slot.remove(&id) {
            self.slots[slot].deleted = true;
            if self.entry == Some(slot) {
                // Move the entry point to the live slot with the tallest
                // layer stack.
                self.entry = self
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| !s.deleted)
                    .max_by_key(|(_, s)| s.links.len())
                    .map(|(i, _)| i);
            }
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize, filter: Option<IdFilter>) -> Result<Vec<(i64, f32)>> {
        check_dimension(self.dimension, query)?;
        let Some(entry) = self.entry else {
            return Ok(Vec::new());
        };
        let mut current = entry;
        for layer in (1..=self.top_layer(entry)).rev() {
            current = self.greedy_step(query, current, layer);
        }
        let ef = self.ef_search.max(k);
        let candidates = self.search_layer(query, current, ef, 0);
        let mut hits: Vec<(i64, f32)> = candidates
            .into_iter()
            .filter(|(_, slot)| !self.slots[*slot].deleted)
            .map(|(d, slot)| (self.slots[slot].id, d))
            .filter(|(id, _)| filter.map_or(true, |f| f(*id)))
            .collect();
        hits.sort_by(|(id_a, da), (id_b, db)| {
            da.partial_cmp(db)
                .unwrap_or(Ordering::Equal)
                .then(id_a.cmp(id_b))
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn persist(&self, path: Option<&Path>) -> Result<()> {
        let path = path.ok_or_else(|| {
            GrafitoError::Configuration("hnsw persist requires a path".to_string())
        })?;
        let state = PersistedState {
            dimension: self.dimension,
            metric: self.metric.as_str().to_string(),
            m: self.m,
            ef_construction: self.ef_construction,
            ef_search: self.ef_search,
            slots: self.slots.clone(),
            entry: self.entry,
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
        self.m = state.m;
        self.ef_construction = state.ef_construction;
        self.ef_search = state.ef_search;
        self.entry = state.entry;
        self.id_to_slot = state
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.deleted)
            .map(|(i, s)| (s.id, i))
            .collect();
        self.slots = state.slots;
        Ok(())
    }

    fn vector(&self, id: i64) -> Option<Vec<f32>> {
        let slot = *self.id_to_slot.get(&id)?;
        Some(self.slots[slot].vector.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_on_small_set() {
        let mut index = HnswIndex::with_defaults(3, Metric::L2);
        index.add(1, &[1.0, 0.0, 0.0]).unwrap();
        index.add(2, &[0.0, 1.0, 0.0]).unwrap();
        index.add(3, &[0.9, 0.1, 0.0]).unwrap();
        let hits = index.search(&[1.0, 0.0, 0.0], 2, None).unwrap();
        let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_tombstoned_ids_never_surface() {
        let mut index = HnswIndex::with_defaults(2, Metric::L2);
        for i in 0..20 {
            index.add(i, &[i as f32, 0.0]).unwrap();
        }
        index.remove(0).unwrap();
        let hits = index.search(&[0.0, 0.0], 5, None).unwrap();
        assert!(hits.iter().all(|(id, _)| *id != 0));
        assert_eq!(index.len(), 19);
    }

    #[test]
    fn test_recall_against_brute_force() {
        use crate::vector::brute::BruteForceIndex;
        let mut hnsw = HnswIndex::with_defaults(4, Metric::L2);
        let mut brute = BruteForceIndex::new(4, Metric::L2);
        // Deterministic pseudo-random points.
        let mut seed = 1u64;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) as f32 / (1u64 << 31) as f32) - 1.0
        };
        for id in 0..200 {
            let v = [next(), next(), next(), next()];
            hnsw.add(id, &v).unwrap();
            brute.add(id, &v).unwrap();
        }
        let query = [0.1, -0.2, 0.3, 0.0];
        let expected = brute.search(&query, 10, None).unwrap();
        let got = hnsw.search(&query, 10, None).unwrap();
        let expected_ids: HashSet<i64> = expected.iter().map(|(id, _)| *id).collect();
        let overlap = got.iter().filter(|(id, _)| expected_ids.contains(id)).count();
        assert!(overlap >= 8, "recall too low: {overlap}/10");
    }

    #[test]
    fn test_update_replaces_vector() {
        let mut index = HnswIndex::with_defaults(2, Metric::L2);
        index.add(1, &[0.0, 0.0]).unwrap();
        index.add(1, &[5.0, 5.0]).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.vector(1), Some(vec![5.0, 5.0]));
    }
}
