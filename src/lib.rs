// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Grafito - a single-node property-graph database on SQLite
//!
//! Grafito stores a directed, labeled, attributed multigraph with
//! JSON-typed properties in an embedded SQLite database and exposes
//! three query modalities:
//!
//! - a declarative Cypher-like pattern query language,
//! - programmatic graph primitives (CRUD, labels, neighbors, traversal),
//! - similarity search over per-node vector embeddings, plus full-text
//!   search through SQLite FTS5.
//!
//! # Usage
//!
//! ```no_run
//! use grafito::Graph;
//!
//! let graph = Graph::open("./mydb.sqlite")?;
//! graph.execute(
//!     "CREATE (a:Person {name: 'Alice', age: 30}), (b:Person {name: 'Bob'}), \
//!      (a)-[:KNOWS {since: 2020}]->(b)",
//! )?;
//! let result = graph.execute(
//!     "MATCH (p:Person)-[:KNOWS]->(q) RETURN p.name, q.name, p.age + 1",
//! )?;
//! assert_eq!(result.rows.len(), 1);
//! # Ok::<(), grafito::GrafitoError>(())
//! ```

pub mod ast;
pub mod catalog;
pub mod config;
pub mod dump;
pub mod error;
pub mod exec;
pub mod fts;
pub mod functions;
pub mod graph;
pub mod procedures;
pub mod session;
pub mod storage;
pub mod traversal;
pub mod vector;

pub use catalog::{ConstraintInfo, ConstraintKind, IndexInfo, ScalarType};
pub use config::{GraphConfig, JournalMode};
pub use error::{GrafitoError, Result};
pub use exec::{QueryResult, Row};
pub use fts::{FtsConfigEntry, TextSearchHit};
pub use graph::{Graph, Properties};
pub use session::Transaction;
pub use storage::{
    Crs, Direction, DurationValue, EntityKind, Node, Path, PointValue, Relationship, Value,
};
pub use vector::{
    EmbeddingFunction, Metric, RerankCandidate, Reranker, SearchHit, VectorBackend, VectorQuery,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
