// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Graph entity records
//!
//! Nodes and relationships are value records keyed by identifier; they
//! never hold references to each other. References are resolved through
//! the store.

use crate::storage::value::Value;
use std::collections::BTreeMap;

/// A node: integer identifier, label set, JSON-typed properties,
/// creation timestamp (Julian day) and optional URI.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
    pub created: f64,
    pub uri: Option<String>,
}

impl Node {
    /// Case-insensitive label membership test
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A directed relationship between two nodes with a case-sensitive type
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: i64,
    pub source: i64,
    pub target: i64,
    pub rel_type: String,
    pub properties: BTreeMap<String, Value>,
    pub created: f64,
    pub uri: Option<String>,
}

impl Relationship {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// The endpoint opposite `node_id`, if `node_id` is an endpoint
    pub fn other_end(&self, node_id: i64) -> Option<i64> {
        if self.source == node_id {
            Some(self.target)
        } else if self.target == node_id {
            Some(self.source)
        } else {
            None
        }
    }
}

/// An alternating node/relationship sequence; `nodes.len()` is always
/// `relationships.len() + 1`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl Path {
    pub fn single(node: Node) -> Self {
        Self {
            nodes: vec![node],
            relationships: Vec::new(),
        }
    }

    /// Path length is the relationship count
    pub fn length(&self) -> usize {
        self.relationships.len()
    }
}

/// Traversal direction relative to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Entity kind discriminator used by index and FTS metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Relationship,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Relationship => "relationship",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "node" => Some(EntityKind::Node),
            "relationship" | "rel" | "edge" => Some(EntityKind::Relationship),
            _ => None,
        }
    }
}
