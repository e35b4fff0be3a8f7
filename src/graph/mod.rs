// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Graph primitives: CRUD on nodes, relationships, labels and neighbors
//!
//! All mutations participate in the active transaction and consult the
//! constraint registry before committing. Deleting a node cascades to its
//! incident relationships through the storage layer's foreign keys.

use crate::config::GraphConfig;
use crate::error::{GrafitoError, Result};
use crate::procedures::ProcedureRegistry;
use crate::storage::{Direction, EntityKind, Node, Relationship, Store, Value};
use crate::vector::VectorManager;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path as FsPath;
use std::sync::atomic::{AtomicBool, Ordering};

/// Property map alias used across the primitive surface
pub type Properties = BTreeMap<String, Value>;

/// The database handle: graph primitives, the query engine entry points,
/// index registries and the transaction scope API all hang off this type.
pub struct Graph {
    pub(crate) store: Store,
    pub(crate) config: GraphConfig,
    pub(crate) vectors: VectorManager,
    pub(crate) procedures: ProcedureRegistry,
    pub(crate) interrupted: AtomicBool,
}

impl Graph {
    /// Open (or create) a database at `path`
    pub fn open(path: impl AsRef<FsPath>) -> Result<Self> {
        Self::open_with_config(GraphConfig::at_path(path.as_ref()))
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_config(GraphConfig::in_memory())
    }

    /// Open with explicit configuration
    pub fn open_with_config(config: GraphConfig) -> Result<Self> {
        let store = Store::open(&config)?;
        let vectors = VectorManager::new();
        vectors.bootstrap(&store)?;
        let graph = Self {
            store,
            config,
            vectors,
            procedures: ProcedureRegistry::with_builtins(),
            interrupted: AtomicBool::new(false),
        };
        Ok(graph)
    }

    /// Open-time configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Request cancellation of the in-flight query. Checked at clause
    /// boundaries and at each pattern-enumeration step.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn check_interrupted(&self) -> Result<()> {
        if self.interrupted.swap(false, Ordering::SeqCst) {
            Err(GrafitoError::QueryExecution("query interrupted".to_string()))
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Insert a node, interning any new labels. Constraints are checked
    /// before the write.
    pub fn create_node(&self, labels: &[&str], properties: Properties) -> Result<Node> {
        self.store.in_write_scope(|store| {
            let owned: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
            self.check_node_constraints(None, &owned, &properties)?;
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO nodes (properties) VALUES (?1)",
                    params![props_to_json(&properties)],
                )?;
                let id = conn.last_insert_rowid();
                for label in &owned {
                    attach_label(conn, id, label)?;
                }
                debug!("created node {id} labels={owned:?}");
                fetch_node(conn, id)?.ok_or_else(|| {
                    GrafitoError::Storage(format!("node {id} vanished during create"))
                })
            })
        })
    }

    /// Fetch a node by id; `Ok(None)` when it does not exist
    pub fn get_node(&self, id: i64) -> Result<Option<Node>> {
        self.store.with_conn(|conn| fetch_node(conn, id))
    }

    /// All nodes bearing every requested label whose properties equal the
    /// given filters. Falls back to a full scan when no property index
    /// applies.
    pub fn match_nodes(&self, labels: &[&str], filters: &Properties) -> Result<Vec<Node>> {
        self.store.with_conn(|conn| {
            let mut sql = String::from("SELECT n.id FROM nodes n");
            let mut clauses: Vec<String> = Vec::new();
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            for label in labels {
                clauses.push(
                    "EXISTS (SELECT 1 FROM node_labels nl JOIN labels l ON nl.label_id = l.id \
                     WHERE nl.node_id = n.id AND l.name = ? COLLATE NOCASE)"
                        .to_string(),
                );
                args.push(Box::new(label.to_string()));
            }
            // Scalar filters prune in SQL (the expression indexes apply
            // here); the Rust-side equality check below stays
            // authoritative for every filter.
            for (key, value) in filters {
                match value {
                    Value::Int(i) => {
                        clauses.push(format!(
                            "json_extract(n.properties, {}) = ?",
                            json_path_literal(key)
                        ));
                        args.push(Box::new(*i));
                    }
                    Value::Float(f) => {
                        clauses.push(format!(
                            "json_extract(n.properties, {}) = ?",
                            json_path_literal(key)
                        ));
                        args.push(Box::new(*f));
                    }
                    Value::String(s) => {
                        clauses.push(format!(
                            "json_extract(n.properties, {}) = ?",
                            json_path_literal(key)
                        ));
                        args.push(Box::new(s.clone()));
                    }
                    _ => {}
                }
            }
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY n.id");

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|p| p.as_ref()).collect();
            let ids: Vec<i64> = stmt
                .query_map(param_refs.as_slice(), |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;

            let mut nodes = Vec::new();
            for id in ids {
                if let Some(node) = fetch_node(conn, id)? {
                    if filters
                        .iter()
                        .all(|(k, v)| node.properties.get(k).map_or(v.is_null(), |pv| pv == v))
                    {
                        nodes.push(node);
                    }
                }
            }
            Ok(nodes)
        })
    }

    /// Merge `props` into the node's property map. A `null` value sets
    /// the key to JSON null explicitly; it does not delete the key.
    pub fn update_node_properties(&self, id: i64, props: Properties) -> Result<Node> {
        self.store.in_write_scope(|store| {
            let node = self.require_node(id)?;
            let mut merged = node.properties.clone();
            for (key, value) in props {
                merged.insert(key, value);
            }
            self.check_node_constraints(Some(id), &node.labels, &merged)?;
            store.with_conn(|conn| {
                conn.execute(
                    "UPDATE nodes SET properties = ?1 WHERE id = ?2",
                    params![props_to_json(&merged), id],
                )?;
                fetch_node(conn, id)?
                    .ok_or_else(|| GrafitoError::NotFound(format!("node {id}")))
            })
        })
    }

    /// Remove a property key entirely
    pub fn remove_node_property(&self, id: i64, key: &str) -> Result<Node> {
        self.store.in_write_scope(|store| {
            let node = self.require_node(id)?;
            let labels = node.labels.clone();
            let mut props = node.properties;
            props.remove(key);
            self.check_node_constraints(Some(id), &labels, &props)?;
            store.with_conn(|conn| {
                conn.execute(
                    "UPDATE nodes SET properties = ?1 WHERE id = ?2",
                    params![props_to_json(&props), id],
                )?;
                fetch_node(conn, id)?
                    .ok_or_else(|| GrafitoError::NotFound(format!("node {id}")))
            })
        })
    }

    /// Attach labels; adding a label the node already has is a no-op
    pub fn add_labels(&self, id: i64, labels: &[&str]) -> Result<Node> {
        self.store.in_write_scope(|store| {
            let node = self.require_node(id)?;
            let mut combined = node.labels.clone();
            for label in labels {
                if !combined.iter().any(|l| l.eq_ignore_ascii_case(label)) {
                    combined.push(label.to_string());
                }
            }
            self.check_node_constraints(Some(id), &combined, &node.properties)?;
            store.with_conn(|conn| {
                for label in labels {
                    attach_label(conn, id, label)?;
                }
                fetch_node(conn, id)?
                    .ok_or_else(|| GrafitoError::NotFound(format!("node {id}")))
            })
        })
    }

    /// Detach labels; removing an absent label is a no-op
    pub fn remove_labels(&self, id: i64, labels: &[&str]) -> Result<Node> {
        self.store.in_write_scope(|store| {
            self.require_node(id)?;
            store.with_conn(|conn| {
                for label in labels {
                    conn.execute(
                        "DELETE FROM node_labels WHERE node_id = ?1 AND label_id IN \
                         (SELECT id FROM labels WHERE name = ?2 COLLATE NOCASE)",
                        params![id, label],
                    )?;
                }
                fetch_node(conn, id)?
                    .ok_or_else(|| GrafitoError::NotFound(format!("node {id}")))
            })
        })
    }

    /// Delete a node, cascading to every incident relationship
    pub fn delete_node(&self, id: i64) -> Result<()> {
        self.store.in_write_scope(|store| {
            self.require_node(id)?;
            store.with_conn(|conn| {
                conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;
                Ok(())
            })
        })?;
        self.vectors.remove_node(id);
        Ok(())
    }

    /// Number of relationships incident to a node
    pub fn degree(&self, id: i64) -> Result<i64> {
        self.store.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT count(*) FROM relationships WHERE source = ?1 OR target = ?1",
                params![id],
                |row| row.get(0),
            )?)
        })
    }

    pub(crate) fn require_node(&self, id: i64) -> Result<Node> {
        self.get_node(id)?
            .ok_or_else(|| GrafitoError::NotFound(format!("node {id}")))
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    /// Create a directed relationship; both endpoints must exist
    pub fn create_relationship(
        &self,
        source: i64,
        target: i64,
        rel_type: &str,
        properties: Properties,
    ) -> Result<Relationship> {
        self.store.in_write_scope(|store| {
            self.require_node(source)?;
            self.require_node(target)?;
            self.check_relationship_constraints(None, rel_type, &properties)?;
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO relationships (source, target, rel_type, properties) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![source, target, rel_type, props_to_json(&properties)],
                )?;
                let id = conn.last_insert_rowid();
                debug!("created relationship {id} ({source})-[:{rel_type}]->({target})");
                fetch_relationship(conn, id)?.ok_or_else(|| {
                    GrafitoError::Storage(format!("relationship {id} vanished during create"))
                })
            })
        })
    }

    pub fn get_relationship(&self, id: i64) -> Result<Option<Relationship>> {
        self.store.with_conn(|conn| fetch_relationship(conn, id))
    }

    pub(crate) fn require_relationship(&self, id: i64) -> Result<Relationship> {
        self.get_relationship(id)?
            .ok_or_else(|| GrafitoError::NotFound(format!("relationship {id}")))
    }

    /// Relationships filtered by any combination of source, target, type
    pub fn match_relationships(
        &self,
        source: Option<i64>,
        target: Option<i64>,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        self.store.with_conn(|conn| {
            let mut sql = String::from("SELECT id FROM relationships");
            let mut clauses = Vec::new();
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            if let Some(source) = source {
                clauses.push("source = ?".to_string());
                args.push(Box::new(source));
            }
            if let Some(target) = target {
                clauses.push("target = ?".to_string());
                args.push(Box::new(target));
            }
            if let Some(rel_type) = rel_type {
                clauses.push("rel_type = ?".to_string());
                args.push(Box::new(rel_type.to_string()));
            }
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|p| p.as_ref()).collect();
            let ids: Vec<i64> = stmt
                .query_map(param_refs.as_slice(), |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            let mut rels = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(rel) = fetch_relationship(conn, id)? {
                    rels.push(rel);
                }
            }
            Ok(rels)
        })
    }

    /// Merge properties into a relationship, same null semantics as nodes
    pub fn update_relationship_properties(
        &self,
        id: i64,
        props: Properties,
    ) -> Result<Relationship> {
        self.store.in_write_scope(|store| {
            let rel = self.require_relationship(id)?;
            let mut merged = rel.properties.clone();
            for (key, value) in props {
                merged.insert(key, value);
            }
            self.check_relationship_constraints(Some(id), &rel.rel_type, &merged)?;
            store.with_conn(|conn| {
                conn.execute(
                    "UPDATE relationships SET properties = ?1 WHERE id = ?2",
                    params![props_to_json(&merged), id],
                )?;
                fetch_relationship(conn, id)?
                    .ok_or_else(|| GrafitoError::NotFound(format!("relationship {id}")))
            })
        })
    }

    /// Remove a property key from a relationship
    pub fn remove_relationship_property(&self, id: i64, key: &str) -> Result<Relationship> {
        self.store.in_write_scope(|store| {
            let rel = self.require_relationship(id)?;
            let mut props = rel.properties;
            props.remove(key);
            store.with_conn(|conn| {
                conn.execute(
                    "UPDATE relationships SET properties = ?1 WHERE id = ?2",
                    params![props_to_json(&props), id],
                )?;
                fetch_relationship(conn, id)?
                    .ok_or_else(|| GrafitoError::NotFound(format!("relationship {id}")))
            })
        })
    }

    pub fn delete_relationship(&self, id: i64) -> Result<()> {
        self.store.in_write_scope(|store| {
            self.require_relationship(id)?;
            store.with_conn(|conn| {
                conn.execute("DELETE FROM relationships WHERE id = ?1", params![id])?;
                Ok(())
            })
        })
    }

    /// Adjacent nodes in the given direction, optionally restricted by
    /// relationship type. `Both` returns the deduplicated union in
    /// relationship-insertion order.
    pub fn get_neighbors(
        &self,
        id: i64,
        direction: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Node>> {
        let rels = self.incident_relationships(id, direction, rel_type)?;
        let mut seen = Vec::new();
        let mut neighbors = Vec::new();
        self.store.with_conn(|conn| {
            for rel in &rels {
                let other = if rel.source == id { rel.target } else { rel.source };
                if seen.contains(&other) {
                    continue;
                }
                seen.push(other);
                if let Some(node) = fetch_node(conn, other)? {
                    neighbors.push(node);
                }
            }
            Ok(())
        })?;
        Ok(neighbors)
    }

    /// Relationships incident to `id` in the given direction, in
    /// insertion order
    pub fn incident_relationships(
        &self,
        id: i64,
        direction: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        let mut rels = match direction {
            Direction::Outgoing => self.match_relationships(Some(id), None, rel_type)?,
            Direction::Incoming => self.match_relationships(None, Some(id), rel_type)?,
            Direction::Both => {
                let mut out = self.match_relationships(Some(id), None, rel_type)?;
                let incoming = self.match_relationships(None, Some(id), rel_type)?;
                for rel in incoming {
                    // A self-loop appears in both result sets once.
                    if !out.iter().any(|r| r.id == rel.id) {
                        out.push(rel);
                    }
                }
                out.sort_by_key(|r| r.id);
                out
            }
        };
        if direction != Direction::Both {
            rels.sort_by_key(|r| r.id);
        }
        Ok(rels)
    }

    // ------------------------------------------------------------------
    // URIs and bulk operations
    // ------------------------------------------------------------------

    /// Set or clear the URI of a node or relationship
    pub fn set_uri(&self, kind: EntityKind, id: i64, uri: Option<&str>) -> Result<()> {
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                let table = match kind {
                    EntityKind::Node => "nodes",
                    EntityKind::Relationship => "relationships",
                };
                let changed = conn.execute(
                    &format!("UPDATE {table} SET uri = ?1 WHERE id = ?2"),
                    params![uri, id],
                )?;
                if changed == 0 {
                    return Err(GrafitoError::NotFound(format!("{} {id}", kind.as_str())));
                }
                Ok(())
            })
        })
    }

    /// Delete every node and relationship (labels stay interned)
    pub fn clear(&self) -> Result<()> {
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                conn.execute("DELETE FROM relationships", [])?;
                conn.execute("DELETE FROM nodes", [])?;
                Ok(())
            })
        })?;
        self.vectors.clear_entries();
        Ok(())
    }

    /// Total node count
    pub fn node_count(&self) -> Result<i64> {
        self.store.with_conn(|conn| {
            Ok(conn.query_row("SELECT count(*) FROM nodes", [], |row| row.get(0))?)
        })
    }

    /// Total relationship count
    pub fn relationship_count(&self) -> Result<i64> {
        self.store.with_conn(|conn| {
            Ok(conn.query_row("SELECT count(*) FROM relationships", [], |row| row.get(0))?)
        })
    }
}

// ----------------------------------------------------------------------
// Row decoding helpers shared with other subsystems
// ----------------------------------------------------------------------

pub(crate) fn fetch_node(conn: &Connection, id: i64) -> Result<Option<Node>> {
    let row = conn
        .query_row(
            "SELECT id, properties, created, uri FROM nodes WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((id, props_json, created, uri)) = row else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT l.name FROM labels l JOIN node_labels nl ON nl.label_id = l.id \
         WHERE nl.node_id = ?1 ORDER BY nl.label_id",
    )?;
    let labels: Vec<String> = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(Some(Node {
        id,
        labels,
        properties: json_to_props(&props_json)?,
        created,
        uri,
    }))
}

pub(crate) fn fetch_relationship(conn: &Connection, id: i64) -> Result<Option<Relationship>> {
    let row = conn
        .query_row(
            "SELECT id, source, target, rel_type, properties, created, uri \
             FROM relationships WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )
        .optional()?;
    let Some((id, source, target, rel_type, props_json, created, uri)) = row else {
        return Ok(None);
    };
    Ok(Some(Relationship {
        id,
        source,
        target,
        rel_type,
        properties: json_to_props(&props_json)?,
        created,
        uri,
    }))
}

fn attach_label(conn: &Connection, node_id: i64, label: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO labels (name) VALUES (?1)",
        params![label],
    )?;
    let label_id: i64 = conn.query_row(
        "SELECT id FROM labels WHERE name = ?1 COLLATE NOCASE",
        params![label],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO node_labels (node_id, label_id) VALUES (?1, ?2)",
        params![node_id, label_id],
    )?;
    Ok(())
}

pub(crate) fn props_to_json(props: &Properties) -> String {
    let map: serde_json::Map<String, serde_json::Value> = props
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    serde_json::Value::Object(map).to_string()
}

pub(crate) fn json_to_props(text: &str) -> Result<Properties> {
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| GrafitoError::Storage(format!("corrupt property JSON: {e}")))?;
    match json {
        serde_json::Value::Object(entries) => Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect()),
        _ => Err(GrafitoError::Storage(
            "property JSON is not an object".to_string(),
        )),
    }
}

pub(crate) fn json_path_literal(key: &str) -> String {
    format!("'$.\"{}\"'", key.replace('"', ""))
}
