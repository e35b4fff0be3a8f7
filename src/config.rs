// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Database open-time configuration

use std::path::PathBuf;

/// SQLite journaling mode applied at open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-ahead logging (recommended for on-disk databases)
    Wal,
    /// In-memory journal (used automatically for `:memory:` databases)
    Memory,
    /// Rollback journal
    Delete,
}

impl JournalMode {
    pub(crate) fn as_pragma_value(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Memory => "MEMORY",
            JournalMode::Delete => "DELETE",
        }
    }
}

/// Configuration for opening a [`Graph`](crate::Graph)
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Database file path; `None` opens an in-memory database
    pub path: Option<PathBuf>,
    /// Upper bound applied to variable-length patterns without an explicit
    /// upper bound
    pub cypher_max_hops: usize,
    /// Default `k` for vector and full-text search
    pub default_top_k: usize,
    /// Journaling mode; ignored for in-memory databases
    pub journal_mode: JournalMode,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            path: None,
            cypher_max_hops: 15,
            default_top_k: 10,
            journal_mode: JournalMode::Wal,
        }
    }
}

impl GraphConfig {
    /// Configuration for an on-disk database at `path`
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Configuration for an in-memory database
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Override the variable-length pattern hop limit
    pub fn with_max_hops(mut self, hops: usize) -> Self {
        self.cypher_max_hops = hops;
        self
    }

    /// Override the default `k` for similarity search
    pub fn with_default_top_k(mut self, k: usize) -> Self {
        self.default_top_k = k;
        self
    }

    /// Override the journaling mode
    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }
}
