// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Procedure registry and the built-in procedures
//!
//! Procedures are resolved by lowercased name; each declares a fixed
//! column schema, so the executor can validate YIELD projections before
//! running anything. The registry is append-only and thread-safe.

pub mod import;
pub mod loaders;

use crate::error::{GrafitoError, Result};
use crate::fts::TextSearchHit;
use crate::graph::{Graph, Properties};
use crate::storage::{EntityKind, Value};
use crate::vector::VectorQuery;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Handler signature: evaluated arguments in, rows out
pub type ProcedureHandler = dyn Fn(&Graph, &[Value]) -> Result<Vec<Vec<Value>>> + Send + Sync;

/// A registered procedure with its fixed return schema
pub struct Procedure {
    pub name: String,
    pub columns: Vec<String>,
    pub handler: Arc<ProcedureHandler>,
}

/// Name → procedure map; built-ins are installed at database open
pub struct ProcedureRegistry {
    entries: RwLock<HashMap<String, Arc<Procedure>>>,
}

impl ProcedureRegistry {
    pub fn with_builtins() -> Self {
        let registry = Self {
            entries: RwLock::new(HashMap::new()),
        };
        registry.register("db.vector.search", &["node", "score", "node_id"], vector_search_proc);
        registry.register("db.uri_index.create", &["name"], uri_index_proc);
        registry.register(
            "db.index.fulltext.search",
            &["entity", "entity_id", "property", "content", "score", "node"],
            fulltext_search_proc,
        );
        registry.register("apoc.load.json", &["value"], loaders::load_json_proc);
        registry.register("apoc.load.jsonArray", &["value"], loaders::load_json_array_proc);
        registry.register("apoc.load.jsonParams", &["value"], loaders::load_json_params_proc);
        registry.register("apoc.import.json", &["nodes", "relationships"], import::import_json_proc);
        registry
    }

    /// Register (or replace) a procedure
    pub fn register(
        &self,
        name: &str,
        columns: &[&str],
        handler: fn(&Graph, &[Value]) -> Result<Vec<Vec<Value>>>,
    ) {
        self.register_arc(Arc::new(Procedure {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            handler: Arc::new(handler),
        }));
    }

    /// Register a procedure with a closure handler
    pub fn register_arc(&self, procedure: Arc<Procedure>) {
        self.entries
            .write()
            .insert(procedure.name.to_ascii_lowercase(), procedure);
    }

    pub fn get(&self, name: &str) -> Option<Arc<Procedure>> {
        self.entries.read().get(&name.to_ascii_lowercase()).cloned()
    }
}

impl Graph {
    /// Register a custom procedure on this database handle
    pub fn register_procedure(
        &self,
        name: &str,
        columns: &[&str],
        handler: Arc<ProcedureHandler>,
    ) {
        self.procedures.register_arc(Arc::new(Procedure {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            handler,
        }));
    }
}

// ----------------------------------------------------------------------
// Built-ins
// ----------------------------------------------------------------------

/// `db.vector.search(index, query_vec|text, k?, options?)`
fn vector_search_proc(graph: &Graph, args: &[Value]) -> Result<Vec<Vec<Value>>> {
    if args.is_empty() || args.len() > 4 {
        return Err(GrafitoError::QueryExecution(
            "db.vector.search expects (index, query, k?, options?)".to_string(),
        ));
    }
    let Some(index) = args[0].as_str() else {
        return Err(GrafitoError::QueryExecution(
            "db.vector.search: index name must be a string".to_string(),
        ));
    };
    let mut query = VectorQuery::default();
    match args.get(1) {
        Some(Value::List(items)) => query.vector = Some(float_vec(items)?),
        Some(Value::String(text)) => query.text = Some(text.clone()),
        other => {
            return Err(GrafitoError::QueryExecution(format!(
                "db.vector.search: query must be a vector or text, got {:?}",
                other.map(|v| v.type_name())
            )))
        }
    }
    if let Some(k) = args.get(2) {
        match k {
            Value::Null => {}
            Value::Int(k) if *k > 0 => query.k = Some(*k as usize),
            other => {
                return Err(GrafitoError::QueryExecution(format!(
                    "db.vector.search: k must be a positive integer, got {other}"
                )))
            }
        }
    }
    if let Some(Value::Map(options)) = args.get(3) {
        if let Some(Value::List(labels)) = options.get("labels") {
            for label in labels {
                match label.as_str() {
                    Some(label) => query.labels.push(label.to_string()),
                    None => {
                        return Err(GrafitoError::Configuration(
                            "labels filter must contain strings".to_string(),
                        ))
                    }
                }
            }
        }
        if let Some(Value::Map(properties)) = options.get("properties") {
            query.properties = properties.clone();
        }
        if let Some(Value::Bool(rerank)) = options.get("rerank") {
            query.rerank = *rerank;
        }
        if let Some(Value::String(reranker)) = options.get("reranker") {
            query.reranker = Some(reranker.clone());
            query.rerank = true;
        }
        if let Some(Value::Int(multiplier)) = options.get("candidate_multiplier") {
            if *multiplier >= 1 {
                query.candidate_multiplier = Some(*multiplier as usize);
            }
        }
    }
    let hits = graph.vector_search(index, query)?;
    Ok(hits
        .into_iter()
        .map(|hit| {
            vec![
                hit.node.map(Value::Node).unwrap_or(Value::Null),
                Value::Float(hit.score),
                Value::Int(hit.node_id),
            ]
        })
        .collect())
}

/// `db.uri_index.create(kind)` — index the `uri` column of nodes or
/// relationships
fn uri_index_proc(graph: &Graph, args: &[Value]) -> Result<Vec<Vec<Value>>> {
    let kind = match args {
        [Value::String(kind)] => EntityKind::parse(kind).ok_or_else(|| {
            GrafitoError::Configuration(format!("unknown entity kind: {kind}"))
        })?,
        _ => {
            return Err(GrafitoError::QueryExecution(
                "db.uri_index.create expects ('node'|'relationship')".to_string(),
            ))
        }
    };
    let (table, name) = match kind {
        EntityKind::Node => ("nodes", "idx_nodes_uri"),
        EntityKind::Relationship => ("relationships", "idx_relationships_uri"),
    };
    graph.store.in_write_scope(|store| {
        store.with_conn(|conn| {
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {name} ON {table}(uri) WHERE uri IS NOT NULL"
            ))?;
            Ok(())
        })
    })?;
    Ok(vec![vec![Value::String(name.to_string())]])
}

/// `db.index.fulltext.search(query, options?)` with options
/// `{k, property, labels, properties}`
fn fulltext_search_proc(graph: &Graph, args: &[Value]) -> Result<Vec<Vec<Value>>> {
    let Some(Value::String(query)) = args.first() else {
        return Err(GrafitoError::QueryExecution(
            "db.index.fulltext.search expects (query, options?)".to_string(),
        ));
    };
    let mut k = None;
    let mut property: Option<String> = None;
    let mut labels: Vec<String> = Vec::new();
    let mut property_filters = Properties::new();
    if let Some(Value::Map(options)) = args.get(1) {
        if let Some(Value::Int(value)) = options.get("k") {
            if *value > 0 {
                k = Some(*value as usize);
            }
        }
        if let Some(Value::String(value)) = options.get("property") {
            property = Some(value.clone());
        }
        if let Some(Value::List(items)) = options.get("labels") {
            for item in items {
                if let Some(label) = item.as_str() {
                    labels.push(label.to_string());
                }
            }
        }
        if let Some(Value::Map(filters)) = options.get("properties") {
            property_filters = filters.clone();
        }
    }
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let hits = graph.text_search(
        query,
        k,
        property.as_deref(),
        &label_refs,
        &property_filters,
    )?;
    Ok(hits.into_iter().map(text_hit_row).collect())
}

fn text_hit_row(hit: TextSearchHit) -> Vec<Value> {
    vec![
        Value::String(hit.entity.as_str().to_string()),
        Value::Int(hit.entity_id),
        Value::String(hit.property),
        Value::String(hit.content),
        Value::Float(hit.score),
        hit.node.map(Value::Node).unwrap_or(Value::Null),
    ]
}

pub(crate) fn float_vec(items: &[Value]) -> Result<Vec<f32>> {
    items
        .iter()
        .map(|v| {
            v.as_number().map(|f| f as f32).ok_or_else(|| {
                GrafitoError::QueryExecution(format!(
                    "vector components must be numbers, got {}",
                    v.type_name()
                ))
            })
        })
        .collect()
}
