// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Vector-index subsystem: backend registry, index lifecycle and the
//! hybrid search pipeline (pre-filter by labels/properties, optional
//! post-rerank)

pub mod backend;
pub mod brute;
pub mod hnsw;
pub mod rerank;

pub use backend::{distance, BackendFactory, Metric, VectorBackend};
pub use rerank::{RerankCandidate, Reranker, RerankerRegistry, IDENTITY_RERANKER};

use crate::error::{GrafitoError, Result};
use crate::graph::{Graph, Properties};
use crate::storage::{Node, Store, Value};
use log::{debug, warn};
use parking_lot::RwLock;
use rusqlite::params;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Default candidate over-pull factor for pre-filtered searches
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 3;

/// Converts text to vectors; the interface fixed for embedding
/// providers, which live outside the core.
pub trait EmbeddingFunction: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Declared metadata of a vector index
#[derive(Debug, Clone)]
pub struct VectorIndexMeta {
    pub name: String,
    pub dimension: usize,
    pub backend: String,
    pub method: String,
    pub metric: Metric,
    pub store_embeddings: bool,
    pub default_k: Option<usize>,
    pub candidate_multiplier: usize,
    pub persist_path: Option<PathBuf>,
    pub embedding_fn: Option<String>,
}

impl VectorIndexMeta {
    fn from_options(
        name: &str,
        dimension: usize,
        backend: &str,
        options: &BTreeMap<String, Value>,
    ) -> Result<Self> {
        let metric = match options.get("metric") {
            None | Some(Value::Null) => Metric::L2,
            Some(Value::String(s)) => Metric::parse(s).ok_or_else(|| {
                GrafitoError::Configuration(format!("unknown metric: {s}"))
            })?,
            Some(other) => {
                return Err(GrafitoError::Configuration(format!(
                    "metric option must be a string, got {}",
                    other.type_name()
                )))
            }
        };
        let store_embeddings = matches!(options.get("store_embeddings"), Some(Value::Bool(true)));
        let default_k = match options.get("default_k") {
            Some(Value::Int(k)) if *k > 0 => Some(*k as usize),
            None | Some(Value::Null) => None,
            Some(other) => {
                return Err(GrafitoError::Configuration(format!(
                    "default_k must be a positive integer, got {other}"
                )))
            }
        };
        let candidate_multiplier = match options.get("candidate_multiplier") {
            Some(Value::Int(m)) if *m >= 1 => *m as usize,
            None | Some(Value::Null) => DEFAULT_CANDIDATE_MULTIPLIER,
            Some(other) => {
                return Err(GrafitoError::Configuration(format!(
                    "candidate_multiplier must be a positive integer, got {other}"
                )))
            }
        };
        let persist_path = match options.get("persist_path") {
            Some(Value::String(p)) => Some(PathBuf::from(p)),
            _ => None,
        };
        let embedding_fn = match options.get("embedding_fn") {
            Some(Value::String(f)) => Some(f.clone()),
            _ => None,
        };
        let method = match options.get("method") {
            Some(Value::String(m)) => m.clone(),
            _ => backend.to_string(),
        };
        Ok(Self {
            name: name.to_string(),
            dimension,
            backend: backend.to_string(),
            method,
            metric,
            store_embeddings,
            default_k,
            candidate_multiplier,
            persist_path,
            embedding_fn,
        })
    }
}

/// A search request against a named index
#[derive(Debug, Clone, Default)]
pub struct VectorQuery {
    pub vector: Option<Vec<f32>>,
    pub text: Option<String>,
    pub k: Option<usize>,
    pub labels: Vec<String>,
    pub properties: Properties,
    pub rerank: bool,
    pub reranker: Option<String>,
    pub candidate_multiplier: Option<usize>,
}

/// One search hit; `score` is a distance (smaller is better)
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub node_id: i64,
    pub score: f64,
    pub node: Option<Node>,
}

struct OpenIndex {
    meta: VectorIndexMeta,
    options: BTreeMap<String, Value>,
    backend: Box<dyn VectorBackend>,
}

/// Process-wide vector state: open indexes plus the backend, reranker
/// and embedding-function registries.
pub struct VectorManager {
    open: RwLock<HashMap<String, OpenIndex>>,
    factories: RwLock<HashMap<String, BackendFactory>>,
    rerankers: RerankerRegistry,
    embedders: RwLock<HashMap<String, Arc<dyn EmbeddingFunction>>>,
}

impl VectorManager {
    pub fn new() -> Self {
        let manager = Self {
            open: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
            rerankers: RerankerRegistry::new(),
            embedders: RwLock::new(HashMap::new()),
        };
        manager.register_backend(brute::BACKEND_TAG, |dim, metric, _opts| {
            Ok(Box::new(brute::BruteForceIndex::new(dim, metric)))
        });
        manager.register_backend(hnsw::BACKEND_TAG, |dim, metric, opts| {
            let int = |key: &str, default: usize| match opts.get(key) {
                Some(Value::Int(i)) if *i > 0 => *i as usize,
                _ => default,
            };
            Ok(Box::new(hnsw::HnswIndex::new(
                dim,
                metric,
                int("m", 16),
                int("ef_construction", 200),
                int("ef_search", 64),
            )))
        });
        manager
    }

    pub fn register_backend(&self, tag: &str, factory: BackendFactory) {
        self.factories.write().insert(tag.to_string(), factory);
    }

    pub fn register_reranker(&self, name: &str, reranker: Reranker) {
        self.rerankers.register(name, reranker);
    }

    pub fn register_embedder(&self, name: &str, embedder: Arc<dyn EmbeddingFunction>) {
        self.embedders.write().insert(name.to_string(), embedder);
    }

    /// Re-open every declared index from stored metadata, restoring
    /// contents from a persisted file or from stored embeddings.
    pub fn bootstrap(&self, store: &Store) -> Result<()> {
        let rows: Vec<(String, i64, String, String)> = store.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT name, dimension, backend, options FROM vector_indexes")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<_>>()?;
            Ok(rows)
        })?;
        for (name, dimension, backend_tag, options_json) in rows {
            let options = options_from_json(&options_json)?;
            let meta =
                VectorIndexMeta::from_options(&name, dimension as usize, &backend_tag, &options)?;
            let mut backend = self.instantiate(&meta, &options)?;
            let loaded_from_file = match &meta.persist_path {
                Some(path) if path.exists() => {
                    backend.load(path)?;
                    true
                }
                _ => false,
            };
            if !loaded_from_file && meta.store_embeddings {
                for (node_id, vector) in load_entries(store, &name)? {
                    backend.add(node_id, &vector)?;
                }
            }
            debug!("opened vector index {name} ({} entries)", backend.len());
            self.open
                .write()
                .insert(name.clone(), OpenIndex { meta, options, backend });
        }
        Ok(())
    }

    fn instantiate(
        &self,
        meta: &VectorIndexMeta,
        options: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn VectorBackend>> {
        let factories = self.factories.read();
        let factory = factories.get(&meta.backend).ok_or_else(|| {
            GrafitoError::Configuration(format!("unknown vector backend: {}", meta.backend))
        })?;
        let backend = factory(meta.dimension, meta.metric, options)?;
        if !backend.supported_metrics().contains(&meta.metric) {
            return Err(GrafitoError::Configuration(format!(
                "backend {} does not support metric {}",
                meta.backend,
                meta.metric.as_str()
            )));
        }
        Ok(backend)
    }

    /// Drop an index from every open backend (node deletion path)
    pub fn remove_node(&self, node_id: i64) {
        for index in self.open.write().values_mut() {
            if let Err(error) = index.backend.remove(node_id) {
                warn!("failed to remove node {node_id} from {}: {error}", index.meta.name);
            }
        }
    }

    /// Forget every entry (graph clear path): each index is rebuilt
    /// empty with its original options.
    pub fn clear_entries(&self) {
        let mut open = self.open.write();
        let names: Vec<String> = open.keys().cloned().collect();
        for name in names {
            if let Some(index) = open.remove(&name) {
                match self.instantiate(&index.meta, &index.options) {
                    Ok(backend) => {
                        open.insert(
                            name,
                            OpenIndex {
                                meta: index.meta,
                                options: index.options,
                                backend,
                            },
                        );
                    }
                    Err(error) => warn!("failed to rebuild vector index {name}: {error}"),
                }
            }
        }
    }

    fn embedder(&self, name: &str) -> Result<Arc<dyn EmbeddingFunction>> {
        self.embedders.read().get(name).cloned().ok_or_else(|| {
            GrafitoError::Configuration(format!("unknown embedding function: {name}"))
        })
    }
}

impl Default for VectorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create a named vector index over a fixed dimension
    pub fn create_vector_index(
        &self,
        name: &str,
        dimension: usize,
        backend_tag: &str,
        options: BTreeMap<String, Value>,
    ) -> Result<()> {
        if self.vectors.open.read().contains_key(name) {
            return Err(GrafitoError::Index(format!(
                "vector index {name} already exists"
            )));
        }
        let meta = VectorIndexMeta::from_options(name, dimension, backend_tag, &options)?;
        if let Some(embedder) = &meta.embedding_fn {
            // Fail fast on a dangling association.
            self.vectors.embedder(embedder)?;
        }
        let backend = self.vectors.instantiate(&meta, &options)?;
        let options_json = crate::graph::props_to_json(&options);
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO vector_indexes (name, dimension, backend, method, options) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![name, dimension as i64, backend_tag, meta.method, options_json],
                )?;
                Ok(())
            })
        })?;
        self.vectors
            .open
            .write()
            .insert(name.to_string(), OpenIndex { meta, options, backend });
        Ok(())
    }

    /// Drop a vector index and its stored entries
    pub fn drop_vector_index(&self, name: &str) -> Result<()> {
        if self.vectors.open.write().remove(name).is_none() {
            return Err(GrafitoError::Index(format!("no such vector index: {name}")));
        }
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                conn.execute("DELETE FROM vector_indexes WHERE name = ?1", params![name])?;
                Ok(())
            })
        })
    }

    /// Names of the declared vector indexes
    pub fn vector_index_names(&self) -> Vec<String> {
        self.vectors.open.read().keys().cloned().collect()
    }

    /// Insert or replace a node's embedding. Either a vector or text
    /// must be given; text requires the index's embedding function.
    pub fn upsert_embedding(
        &self,
        index: &str,
        node_id: i64,
        vector: Option<Vec<f32>>,
        text: Option<&str>,
    ) -> Result<()> {
        self.require_node(node_id)?;
        let meta = {
            let open = self.vectors.open.read();
            open.get(index)
                .map(|idx| idx.meta.clone())
                .ok_or_else(|| GrafitoError::Index(format!("no such vector index: {index}")))?
        };
        let vector = match (vector, text) {
            (Some(vector), _) => vector,
            (None, Some(text)) => {
                let embedder_name = meta.embedding_fn.as_deref().ok_or_else(|| {
                    GrafitoError::Configuration(format!(
                        "index {index} has no embedding function; cannot embed text"
                    ))
                })?;
                self.vectors.embedder(embedder_name)?.embed(text)?
            }
            (None, None) => {
                return Err(GrafitoError::Configuration(
                    "upsert requires a vector or text".to_string(),
                ))
            }
        };
        self.finish_upsert(index, node_id, vector, meta.store_embeddings)
    }

    fn finish_upsert(
        &self,
        index: &str,
        node_id: i64,
        vector: Vec<f32>,
        store_embeddings: bool,
    ) -> Result<()> {
        {
            let mut open = self.vectors.open.write();
            let idx = open
                .get_mut(index)
                .ok_or_else(|| GrafitoError::Index(format!("no such vector index: {index}")))?;
            idx.backend.add(node_id, &vector)?;
        }
        if store_embeddings {
            let encoded = serde_json::to_string(&vector)
                .map_err(|e| GrafitoError::Storage(format!("embedding encode failed: {e}")))?;
            self.store.in_write_scope(|store| {
                store.with_conn(|conn| {
                    conn.execute(
                        "INSERT OR REPLACE INTO vector_entries (index_name, node_id, embedding) \
                         VALUES (?1, ?2, ?3)",
                        params![index, node_id, encoded],
                    )?;
                    Ok(())
                })
            })?;
        }
        Ok(())
    }

    /// Remove a node's entry from one index
    pub fn remove_embedding(&self, index: &str, node_id: i64) -> Result<()> {
        {
            let mut open = self.vectors.open.write();
            let idx = open
                .get_mut(index)
                .ok_or_else(|| GrafitoError::Index(format!("no such vector index: {index}")))?;
            idx.backend.remove(node_id)?;
        }
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                conn.execute(
                    "DELETE FROM vector_entries WHERE index_name = ?1 AND node_id = ?2",
                    params![index, node_id],
                )?;
                Ok(())
            })
        })
    }

    /// Persist an index to its configured (or an explicit) path
    pub fn persist_vector_index(&self, index: &str, path: Option<&std::path::Path>) -> Result<()> {
        let open = self.vectors.open.read();
        let idx = open
            .get(index)
            .ok_or_else(|| GrafitoError::Index(format!("no such vector index: {index}")))?;
        idx.backend
            .persist(path.or(idx.meta.persist_path.as_deref()))
    }

    /// Hybrid similarity search: optional label/property pre-filter,
    /// candidate over-pull, optional rerank, final top-k.
    pub fn vector_search(&self, index: &str, query: VectorQuery) -> Result<Vec<SearchHit>> {
        // Resolve the query vector first; embedding may need registry
        // access.
        let (meta, query_vector) = {
            let open = self.vectors.open.read();
            let idx = open
                .get(index)
                .ok_or_else(|| GrafitoError::Index(format!("no such vector index: {index}")))?;
            let meta = idx.meta.clone();
            let vector = match (&query.vector, &query.text) {
                (Some(vector), _) => vector.clone(),
                (None, Some(text)) => {
                    let embedder_name = meta.embedding_fn.clone().ok_or_else(|| {
                        GrafitoError::Configuration(format!(
                            "index {index} has no embedding function; cannot embed text"
                        ))
                    })?;
                    drop(open);
                    self.vectors.embedder(&embedder_name)?.embed(text)?
                }
                (None, None) => {
                    return Err(GrafitoError::Configuration(
                        "vector search requires a query vector or text".to_string(),
                    ))
                }
            };
            (meta, vector)
        };

        let k = query
            .k
            .or(meta.default_k)
            .unwrap_or(self.config.default_top_k);
        let multiplier = query
            .candidate_multiplier
            .unwrap_or(meta.candidate_multiplier);

        // Pre-filter: materialize the allowed id set, then push it down.
        let filtered = !query.labels.is_empty() || !query.properties.is_empty();
        let allowed: Option<HashSet<i64>> = if filtered {
            let labels: Vec<&str> = query.labels.iter().map(String::as_str).collect();
            Some(
                self.match_nodes(&labels, &query.properties)?
                    .into_iter()
                    .map(|n| n.id)
                    .collect(),
            )
        } else {
            None
        };

        let pull = if filtered || query.rerank { k * multiplier } else { k };
        let (mut hits, vectors): (Vec<(i64, f64)>, HashMap<i64, Option<Vec<f32>>>) = {
            let open = self.vectors.open.read();
            let idx = open
                .get(index)
                .ok_or_else(|| GrafitoError::Index(format!("no such vector index: {index}")))?;
            let filter = allowed
                .as_ref()
                .map(|set| move |id: i64| set.contains(&id));
            let raw = match &filter {
                Some(f) => {
                    idx.backend
                        .search(&query_vector, pull, Some(f as &dyn Fn(i64) -> bool))?
                }
                None => idx.backend.search(&query_vector, pull, None)?,
            };
            let vectors = raw
                .iter()
                .map(|(id, _)| (*id, idx.backend.vector(*id)))
                .collect();
            (
                raw.into_iter().map(|(id, d)| (id, d as f64)).collect(),
                vectors,
            )
        };

        // The post-filter stays authoritative even with pushdown.
        if let Some(allowed) = &allowed {
            hits.retain(|(id, _)| allowed.contains(id));
        }

        // Entries whose nodes are gone are dropped (and tombstoned in
        // the backend) before anything is returned.
        let mut nodes: HashMap<i64, Node> = HashMap::new();
        let mut stale: Vec<i64> = Vec::new();
        hits.retain(|(id, _)| match self.get_node(*id) {
            Ok(Some(node)) => {
                nodes.insert(*id, node);
                true
            }
            _ => {
                stale.push(*id);
                false
            }
        });
        if !stale.is_empty() {
            let mut open = self.vectors.open.write();
            if let Some(idx) = open.get_mut(index) {
                for id in stale {
                    let _ = idx.backend.remove(id);
                }
            }
        }

        if query.rerank {
            let reranker = self.vectors.rerankers.resolve(
                query.reranker.as_deref().unwrap_or(IDENTITY_RERANKER),
                meta.metric,
            )?;
            let candidates: Vec<RerankCandidate> = hits
                .iter()
                .map(|(id, score)| RerankCandidate {
                    id: *id,
                    vector: vectors.get(id).cloned().flatten(),
                    score: *score,
                    node: nodes.get(id).cloned(),
                })
                .collect();
            let reranked = reranker(&query_vector, &candidates)?;
            hits = reranked;
        }

        hits.truncate(k);
        Ok(hits
            .into_iter()
            .map(|(node_id, score)| SearchHit {
                score,
                node: nodes.get(&node_id).cloned(),
                node_id,
            })
            .collect())
    }

    /// Register a reranker callback by name
    pub fn register_reranker(&self, name: &str, reranker: Reranker) {
        self.vectors.register_reranker(name, reranker);
    }

    /// Register an embedding function by name
    pub fn register_embedding_function(&self, name: &str, f: Arc<dyn EmbeddingFunction>) {
        self.vectors.register_embedder(name, f);
    }

    /// Register a vector backend factory by tag
    pub fn register_vector_backend(&self, tag: &str, factory: BackendFactory) {
        self.vectors.register_backend(tag, factory);
    }
}

fn options_from_json(text: &str) -> Result<BTreeMap<String, Value>> {
    crate::graph::json_to_props(text)
}

fn load_entries(store: &Store, index: &str) -> Result<Vec<(i64, Vec<f32>)>> {
    store.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT node_id, embedding FROM vector_entries WHERE index_name = ?1 ORDER BY node_id",
        )?;
        let rows: Vec<(i64, String)> = stmt
            .query_map(params![index], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        let mut entries = Vec::with_capacity(rows.len());
        for (node_id, encoded) in rows {
            let vector: Vec<f32> = serde_json::from_str(&encoded)
                .map_err(|e| GrafitoError::Storage(format!("embedding decode failed: {e}")))?;
            entries.push((node_id, vector));
        }
        Ok(entries)
    })
}
