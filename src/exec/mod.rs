// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query execution: binding frames, expression evaluation, pattern
//! enumeration and the clause pipeline

pub mod aggregate;
pub mod eval;
pub mod executor;
pub mod pattern;
pub mod result;

pub use result::{QueryResult, Row};

use crate::ast::{parse_script, parse_statement};
use crate::error::Result;
use crate::graph::Graph;
use crate::storage::Value;
use executor::Executor;
use std::collections::BTreeMap;

impl Graph {
    /// Parse and execute one statement
    pub fn execute(&self, query: &str) -> Result<QueryResult> {
        self.execute_with_params(query, BTreeMap::new())
    }

    /// Parse and execute one statement with `$name` parameters. The
    /// statement runs in its own scope: an execution error rolls the
    /// whole statement back, never leaving partial writes.
    pub fn execute_with_params(
        &self,
        query: &str,
        params: BTreeMap<String, Value>,
    ) -> Result<QueryResult> {
        let statement = parse_statement(query)?;
        self.store
            .in_write_scope(|_| Executor::new(self, &params).execute(&statement))
    }

    /// Execute a semicolon-separated script, one result per statement
    pub fn execute_many(&self, script: &str) -> Result<Vec<QueryResult>> {
        let statements = parse_script(script)?;
        let empty = BTreeMap::new();
        let mut results = Vec::with_capacity(statements.len());
        for statement in &statements {
            results.push(
                self.store
                    .in_write_scope(|_| Executor::new(self, &empty).execute(statement))?,
            );
        }
        Ok(results)
    }
}

/// A binding frame: an ordered map from variable names to values, the
/// pipeline's unit of work. Insertion order is preserved so `RETURN *`
/// and column ordering stay deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    entries: Vec<(String, Value)>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Bind or rebind a variable, preserving its original position
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
