// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Traversal kernel: BFS shortest paths, DFS bounded paths and
//! variable-length expansion
//!
//! Enumeration order follows relationship-insertion order throughout, so
//! BFS tie-breaks resolve to the first discovered parent and DFS yields
//! the first path in insertion order. All paths are simple: no node is
//! revisited within a single path.

use crate::error::Result;
use crate::graph::Graph;
use crate::storage::{Direction, Node, Path, Relationship};
use std::collections::{HashMap, HashSet, VecDeque};

impl Graph {
    /// BFS shortest path from `source` to `target`. Returns `None` when
    /// no path exists. A zero-length path is returned when
    /// `source == target`.
    pub fn find_shortest_path(
        &self,
        source: i64,
        target: i64,
        direction: Direction,
    ) -> Result<Option<Path>> {
        self.shortest_path_with_types(source, target, direction, &[])
    }

    pub(crate) fn shortest_path_with_types(
        &self,
        source: i64,
        target: i64,
        direction: Direction,
        rel_types: &[String],
    ) -> Result<Option<Path>> {
        let start = self.require_node(source)?;
        self.require_node(target)?;
        if source == target {
            return Ok(Some(Path::single(start)));
        }

        let mut parents: HashMap<i64, (i64, Relationship)> = HashMap::new();
        let mut queue = VecDeque::from([source]);
        let mut visited: HashSet<i64> = HashSet::from([source]);

        while let Some(current) = queue.pop_front() {
            self.check_interrupted()?;
            for rel in self.incident_relationships(current, direction, None)? {
                if !rel_types.is_empty() && !rel_types.iter().any(|t| *t == rel.rel_type) {
                    continue;
                }
                let next = match step_endpoint(&rel, current, direction) {
                    Some(next) => next,
                    None => continue,
                };
                if !visited.insert(next) {
                    continue; // first discovered parent wins
                }
                parents.insert(next, (current, rel));
                if next == target {
                    return Ok(Some(self.assemble_path(source, target, &parents)?));
                }
                queue.push_back(next);
            }
        }
        Ok(None)
    }

    /// Every minimum-length path from `source` to `target`
    pub fn find_all_shortest_paths(
        &self,
        source: i64,
        target: i64,
        direction: Direction,
    ) -> Result<Vec<Path>> {
        self.all_shortest_paths_with_types(source, target, direction, &[])
    }

    pub(crate) fn all_shortest_paths_with_types(
        &self,
        source: i64,
        target: i64,
        direction: Direction,
        rel_types: &[String],
    ) -> Result<Vec<Path>> {
        let start = self.require_node(source)?;
        self.require_node(target)?;
        if source == target {
            return Ok(vec![Path::single(start)]);
        }

        // Level-order BFS recording every parent edge at minimal depth.
        let mut depth: HashMap<i64, usize> = HashMap::from([(source, 0)]);
        let mut parents: HashMap<i64, Vec<(i64, Relationship)>> = HashMap::new();
        let mut frontier = vec![source];
        let mut found_at: Option<usize> = None;
        let mut level = 0usize;

        while !frontier.is_empty() && found_at.is_none() {
            self.check_interrupted()?;
            level += 1;
            let mut next_frontier = Vec::new();
            for &current in &frontier {
                for rel in self.incident_relationships(current, direction, None)? {
                    if !rel_types.is_empty() && !rel_types.iter().any(|t| *t == rel.rel_type) {
                        continue;
                    }
                    let next = match step_endpoint(&rel, current, direction) {
                        Some(next) => next,
                        None => continue,
                    };
                    match depth.get(&next) {
                        None => {
                            depth.insert(next, level);
                            parents.entry(next).or_default().push((current, rel));
                            next_frontier.push(next);
                            if next == target {
                                found_at = Some(level);
                            }
                        }
                        Some(&d) if d == level => {
                            parents.entry(next).or_default().push((current, rel));
                        }
                        Some(_) => {}
                    }
                }
            }
            frontier = next_frontier;
        }

        if found_at.is_none() {
            return Ok(Vec::new());
        }

        // Backtrack every parent chain from target to source.
        let mut rel_paths: Vec<Vec<Relationship>> = Vec::new();
        let mut stack: Vec<(i64, Vec<Relationship>)> = vec![(target, Vec::new())];
        while let Some((node, suffix)) = stack.pop() {
            if node == source {
                let mut rels = suffix.clone();
                rels.reverse();
                rel_paths.push(rels);
                continue;
            }
            if let Some(links) = parents.get(&node) {
                for (prev, rel) in links {
                    let mut next_suffix = suffix.clone();
                    next_suffix.push(rel.clone());
                    stack.push((*prev, next_suffix));
                }
            }
        }

        let mut paths = Vec::with_capacity(rel_paths.len());
        for rels in rel_paths {
            paths.push(self.materialize_path(source, &rels)?);
        }
        Ok(paths)
    }

    /// DFS for any simple path of length at most `max_depth`. With
    /// `max_depth = 0` and `source == target`, the single-node path is
    /// returned.
    pub fn find_path(
        &self,
        source: i64,
        target: i64,
        max_depth: usize,
        direction: Direction,
    ) -> Result<Option<Path>> {
        let start = self.require_node(source)?;
        self.require_node(target)?;
        if source == target {
            return Ok(Some(Path::single(start)));
        }
        let mut rels = Vec::new();
        let mut on_path = HashSet::from([source]);
        if self.dfs_search(source, target, max_depth, direction, &mut rels, &mut on_path)? {
            return Ok(Some(self.materialize_path(source, &rels)?));
        }
        Ok(None)
    }

    fn dfs_search(
        &self,
        current: i64,
        target: i64,
        remaining: usize,
        direction: Direction,
        rels: &mut Vec<Relationship>,
        on_path: &mut HashSet<i64>,
    ) -> Result<bool> {
        if remaining == 0 {
            return Ok(false);
        }
        self.check_interrupted()?;
        for rel in self.incident_relationships(current, direction, None)? {
            let next = match step_endpoint(&rel, current, direction) {
                Some(next) => next,
                None => continue,
            };
            if on_path.contains(&next) {
                continue;
            }
            rels.push(rel);
            if next == target {
                return Ok(true);
            }
            on_path.insert(next);
            if self.dfs_search(next, target, remaining - 1, direction, rels, on_path)? {
                return Ok(true);
            }
            on_path.remove(&next);
            rels.pop();
        }
        Ok(false)
    }

    /// Enumerate every simple relationship path starting at `start`
    /// whose length lies in `[min_len, max_len]`, yielding the
    /// relationship list and the terminal node id. Used by
    /// variable-length pattern segments; `max_len` arrives pre-clamped
    /// to `cypher_max_hops`.
    pub(crate) fn expand_paths(
        &self,
        start: i64,
        direction: Direction,
        rel_types: &[String],
        min_len: usize,
        max_len: usize,
    ) -> Result<Vec<(Vec<Relationship>, i64)>> {
        let mut results = Vec::new();
        if min_len == 0 {
            results.push((Vec::new(), start));
        }
        let mut rels = Vec::new();
        let mut on_path = HashSet::from([start]);
        self.expand_from(
            start,
            direction,
            rel_types,
            min_len,
            max_len,
            &mut rels,
            &mut on_path,
            &mut results,
        )?;
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_from(
        &self,
        current: i64,
        direction: Direction,
        rel_types: &[String],
        min_len: usize,
        max_len: usize,
        rels: &mut Vec<Relationship>,
        on_path: &mut HashSet<i64>,
        results: &mut Vec<(Vec<Relationship>, i64)>,
    ) -> Result<()> {
        if rels.len() >= max_len {
            return Ok(());
        }
        self.check_interrupted()?;
        for rel in self.incident_relationships(current, direction, None)? {
            if !rel_types.is_empty() && !rel_types.iter().any(|t| *t == rel.rel_type) {
                continue;
            }
            let next = match step_endpoint(&rel, current, direction) {
                Some(next) => next,
                None => continue,
            };
            if on_path.contains(&next) {
                continue;
            }
            rels.push(rel);
            on_path.insert(next);
            if rels.len() >= min_len {
                results.push((rels.clone(), next));
            }
            self.expand_from(
                next, direction, rel_types, min_len, max_len, rels, on_path, results,
            )?;
            on_path.remove(&next);
            rels.pop();
        }
        Ok(())
    }

    /// Rebuild node/relationship alternation from a relationship chain
    pub(crate) fn materialize_path(&self, source: i64, rels: &[Relationship]) -> Result<Path> {
        let mut nodes: Vec<Node> = vec![self.require_node(source)?];
        let mut current = source;
        for rel in rels {
            let next = rel
                .other_end(current)
                .unwrap_or(rel.target);
            nodes.push(self.require_node(next)?);
            current = next;
        }
        Ok(Path {
            nodes,
            relationships: rels.to_vec(),
        })
    }

    fn assemble_path(
        &self,
        source: i64,
        target: i64,
        parents: &HashMap<i64, (i64, Relationship)>,
    ) -> Result<Path> {
        let mut rels = Vec::new();
        let mut current = target;
        while current != source {
            let (prev, rel) = parents
                .get(&current)
                .expect("parent chain reaches the source");
            rels.push(rel.clone());
            current = *prev;
        }
        rels.reverse();
        self.materialize_path(source, &rels)
    }
}

/// The node reached by following `rel` out of `from` under `direction`,
/// or `None` when the edge points the wrong way.
fn step_endpoint(rel: &Relationship, from: i64, direction: Direction) -> Option<i64> {
    match direction {
        Direction::Outgoing => (rel.source == from).then_some(rel.target),
        Direction::Incoming => (rel.target == from).then_some(rel.source),
        Direction::Both => rel.other_end(from),
    }
}
