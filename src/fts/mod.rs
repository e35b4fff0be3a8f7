// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Full-text search subsystem
//!
//! For every configured (entity, label-or-type, property) triple,
//! generated SQLite triggers materialize documents into the
//! `fts_content` FTS5 table as entities mutate; deletion cleanup lives
//! in the base schema. Raw BM25 scores (lower, possibly negative, is
//! better) are mapped to a non-negative similarity where higher is
//! better.

use crate::error::{GrafitoError, Result};
use crate::graph::{Graph, Properties};
use crate::storage::{EntityKind, Node};
use rusqlite::{params, Connection};

/// One row of the FTS configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FtsConfigEntry {
    pub entity: EntityKind,
    /// `None` indexes the property on every node / relationship
    pub label_or_type: Option<String>,
    pub property: String,
    pub weight: Option<f64>,
}

/// One full-text hit; `score` is the non-negative similarity
#[derive(Debug, Clone)]
pub struct TextSearchHit {
    pub entity: EntityKind,
    pub entity_id: i64,
    pub property: String,
    pub content: String,
    pub score: f64,
    pub node: Option<Node>,
}

impl Graph {
    /// Add an FTS configuration entry; its triggers are installed and
    /// existing entities are indexed immediately.
    pub fn add_fts_config(&self, entry: FtsConfigEntry) -> Result<()> {
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO fts_config (entity, label_or_type, property, weight) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        entry.entity.as_str(),
                        entry.label_or_type,
                        entry.property,
                        entry.weight,
                    ],
                )?;
                let config_id = conn.last_insert_rowid();
                install_triggers(conn, config_id, &entry)?;
                populate(conn, &entry)?;
                Ok(())
            })
        })
    }

    /// Remove a configuration entry, its triggers and its documents
    pub fn remove_fts_config(
        &self,
        entity: EntityKind,
        label_or_type: Option<&str>,
        property: &str,
    ) -> Result<()> {
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                let id: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM fts_config WHERE entity = ?1 \
                         AND label_or_type IS ?2 AND property = ?3",
                        params![entity.as_str(), label_or_type, property],
                        |row| row.get(0),
                    )
                    .ok();
                let Some(id) = id else {
                    return Err(GrafitoError::Index(format!(
                        "no text-index configuration for ({}, {:?}, {property})",
                        entity.as_str(),
                        label_or_type
                    )));
                };
                drop_triggers(conn, id)?;
                conn.execute("DELETE FROM fts_config WHERE id = ?1", params![id])?;
                conn.execute(
                    "DELETE FROM fts_content WHERE entity = ?1 AND property = ?2",
                    params![entity.as_str(), property],
                )?;
                Ok(())
            })
        })
    }

    /// All configured entries
    pub fn fts_configs(&self) -> Result<Vec<FtsConfigEntry>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT entity, label_or_type, property, weight FROM fts_config ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })?;
            let mut entries = Vec::new();
            for row in rows {
                let (entity, label_or_type, property, weight) = row?;
                entries.push(FtsConfigEntry {
                    entity: EntityKind::parse(&entity)
                        .ok_or_else(|| GrafitoError::Storage("bad entity kind".to_string()))?,
                    label_or_type,
                    property,
                    weight,
                });
            }
            Ok(entries)
        })
    }

    /// Full repopulate: every document is rebuilt from the current
    /// graph content.
    pub fn rebuild_fts(&self) -> Result<()> {
        let configs = self.fts_configs()?;
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                conn.execute("DELETE FROM fts_content", [])?;
                for entry in &configs {
                    populate(conn, entry)?;
                }
                Ok(())
            })
        })
    }

    /// BM25 search over the indexed text. Results can be narrowed to a
    /// single property and post-filtered by labels and exact property
    /// values (node entities only).
    pub fn text_search(
        &self,
        query: &str,
        k: Option<usize>,
        property: Option<&str>,
        labels: &[&str],
        property_filters: &Properties,
    ) -> Result<Vec<TextSearchHit>> {
        let k = k.unwrap_or(self.config.default_top_k);
        let weights: Vec<FtsConfigEntry> = self.fts_configs()?;
        let raw_hits: Vec<(String, i64, String, String, f64)> = self.store.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT entity, entity_id, property, content, bm25(fts_content) \
                 FROM fts_content WHERE fts_content MATCH ?1",
            );
            if property.is_some() {
                sql.push_str(" AND property = ?2");
            }
            sql.push_str(" ORDER BY bm25(fts_content)");
            let mut stmt = conn.prepare(&sql)?;
            let map_row = |row: &rusqlite::Row<'_>| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            };
            let rows = match property {
                Some(p) => stmt.query_map(params![query, p], map_row)?,
                None => stmt.query_map(params![query], map_row)?,
            };
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })?;

        let mut hits = Vec::new();
        for (entity, entity_id, doc_property, content, raw) in raw_hits {
            if hits.len() >= k {
                break;
            }
            let entity = EntityKind::parse(&entity)
                .ok_or_else(|| GrafitoError::Storage("bad entity kind".to_string()))?;
            // BM25 raw scores are better when lower; negate into a
            // non-negative similarity.
            let mut score = (-raw).max(0.0);
            if let Some(weight) = weights
                .iter()
                .find(|w| w.entity == entity && w.property == doc_property)
                .and_then(|w| w.weight)
            {
                score *= weight;
            }

            let node = match entity {
                EntityKind::Node => {
                    let Some(node) = self.get_node(entity_id)? else {
                        continue; // entity vanished under the index
                    };
                    if !labels.iter().all(|l| node.has_label(l)) {
                        continue;
                    }
                    if !property_filters.iter().all(|(key, expected)| {
                        node.properties
                            .get(key)
                            .map_or(expected.is_null(), |v| v == expected)
                    }) {
                        continue;
                    }
                    Some(node)
                }
                EntityKind::Relationship => {
                    if !labels.is_empty() {
                        continue;
                    }
                    let Some(rel) = self.get_relationship(entity_id)? else {
                        continue;
                    };
                    if !property_filters.iter().all(|(key, expected)| {
                        rel.properties
                            .get(key)
                            .map_or(expected.is_null(), |v| v == expected)
                    }) {
                        continue;
                    }
                    None
                }
            };
            hits.push(TextSearchHit {
                entity,
                entity_id,
                property: doc_property,
                content,
                score,
                node,
            });
        }
        Ok(hits)
    }
}

fn sql_str(s: &str) -> String {
    s.replace('\'', "''")
}

fn trigger_names(config_id: i64) -> [String; 4] {
    [
        format!("fts_cfg{config_id}_entity_insert"),
        format!("fts_cfg{config_id}_entity_update"),
        format!("fts_cfg{config_id}_label_attach"),
        format!("fts_cfg{config_id}_label_detach"),
    ]
}

fn drop_triggers(conn: &Connection, config_id: i64) -> Result<()> {
    for name in trigger_names(config_id) {
        conn.execute_batch(&format!("DROP TRIGGER IF EXISTS \"{name}\""))?;
    }
    Ok(())
}

/// Install the synchronization triggers for one configuration entry
fn install_triggers(conn: &Connection, config_id: i64, entry: &FtsConfigEntry) -> Result<()> {
    drop_triggers(conn, config_id)?;
    let [insert_name, update_name, attach_name, detach_name] = trigger_names(config_id);
    let property = sql_str(&entry.property);
    let path = format!("'$.\"{property}\"'");

    match entry.entity {
        EntityKind::Node => {
            let label_predicate = |node_id: &str| match &entry.label_or_type {
                Some(label) => format!(
                    "EXISTS (SELECT 1 FROM node_labels nl JOIN labels l ON nl.label_id = l.id \
                     WHERE nl.node_id = {node_id} AND l.name = '{}' COLLATE NOCASE)",
                    sql_str(label)
                ),
                None => "1".to_string(),
            };

            if entry.label_or_type.is_none() {
                // Unscoped configs index at node insert.
                conn.execute_batch(&format!(
                    "CREATE TRIGGER \"{insert_name}\" AFTER INSERT ON nodes \
                     WHEN json_extract(NEW.properties, {path}) IS NOT NULL \
                     BEGIN \
                       INSERT INTO fts_content (entity, entity_id, property, content) \
                       VALUES ('node', NEW.id, '{property}', json_extract(NEW.properties, {path})); \
                     END"
                ))?;
            } else {
                // Scoped configs index when the label attaches (the
                // label row lands after the node row).
                let label = sql_str(entry.label_or_type.as_deref().expect("scoped config"));
                conn.execute_batch(&format!(
                    "CREATE TRIGGER \"{attach_name}\" AFTER INSERT ON node_labels \
                     WHEN EXISTS (SELECT 1 FROM labels l WHERE l.id = NEW.label_id \
                                  AND l.name = '{label}' COLLATE NOCASE) \
                     BEGIN \
                       DELETE FROM fts_content WHERE entity = 'node' \
                         AND entity_id = NEW.node_id AND property = '{property}'; \
                       INSERT INTO fts_content (entity, entity_id, property, content) \
                       SELECT 'node', NEW.node_id, '{property}', json_extract(n.properties, {path}) \
                       FROM nodes n WHERE n.id = NEW.node_id \
                         AND json_extract(n.properties, {path}) IS NOT NULL; \
                     END"
                ))?;
                conn.execute_batch(&format!(
                    "CREATE TRIGGER \"{detach_name}\" AFTER DELETE ON node_labels \
                     WHEN EXISTS (SELECT 1 FROM labels l WHERE l.id = OLD.label_id \
                                  AND l.name = '{label}' COLLATE NOCASE) \
                     BEGIN \
                       DELETE FROM fts_content WHERE entity = 'node' \
                         AND entity_id = OLD.node_id AND property = '{property}'; \
                     END"
                ))?;
            }

            conn.execute_batch(&format!(
                "CREATE TRIGGER \"{update_name}\" AFTER UPDATE OF properties ON nodes \
                 WHEN {predicate} \
                 BEGIN \
                   DELETE FROM fts_content WHERE entity = 'node' \
                     AND entity_id = NEW.id AND property = '{property}'; \
                   INSERT INTO fts_content (entity, entity_id, property, content) \
                   SELECT 'node', NEW.id, '{property}', json_extract(NEW.properties, {path}) \
                   WHERE json_extract(NEW.properties, {path}) IS NOT NULL; \
                 END",
                predicate = label_predicate("NEW.id"),
            ))?;
        }
        EntityKind::Relationship => {
            let type_predicate = match &entry.label_or_type {
                Some(rel_type) => format!("NEW.rel_type = '{}'", sql_str(rel_type)),
                None => "1".to_string(),
            };
            conn.execute_batch(&format!(
                "CREATE TRIGGER \"{insert_name}\" AFTER INSERT ON relationships \
                 WHEN ({type_predicate}) AND json_extract(NEW.properties, {path}) IS NOT NULL \
                 BEGIN \
                   INSERT INTO fts_content (entity, entity_id, property, content) \
                   VALUES ('relationship', NEW.id, '{property}', \
                           json_extract(NEW.properties, {path})); \
                 END"
            ))?;
            conn.execute_batch(&format!(
                "CREATE TRIGGER \"{update_name}\" AFTER UPDATE OF properties ON relationships \
                 WHEN {type_predicate} \
                 BEGIN \
                   DELETE FROM fts_content WHERE entity = 'relationship' \
                     AND entity_id = NEW.id AND property = '{property}'; \
                   INSERT INTO fts_content (entity, entity_id, property, content) \
                   SELECT 'relationship', NEW.id, '{property}', \
                          json_extract(NEW.properties, {path}) \
                   WHERE json_extract(NEW.properties, {path}) IS NOT NULL; \
                 END"
            ))?;
        }
    }
    Ok(())
}

/// Index the documents that already satisfy a configuration entry
fn populate(conn: &Connection, entry: &FtsConfigEntry) -> Result<()> {
    let property = sql_str(&entry.property);
    let path = format!("'$.\"{property}\"'");
    match entry.entity {
        EntityKind::Node => {
            let label_clause = match &entry.label_or_type {
                Some(label) => format!(
                    "AND EXISTS (SELECT 1 FROM node_labels nl JOIN labels l \
                     ON nl.label_id = l.id WHERE nl.node_id = n.id \
                     AND l.name = '{}' COLLATE NOCASE)",
                    sql_str(label)
                ),
                None => String::new(),
            };
            conn.execute_batch(&format!(
                "DELETE FROM fts_content WHERE entity = 'node' AND property = '{property}'; \
                 INSERT INTO fts_content (entity, entity_id, property, content) \
                 SELECT 'node', n.id, '{property}', json_extract(n.properties, {path}) \
                 FROM nodes n WHERE json_extract(n.properties, {path}) IS NOT NULL {label_clause}"
            ))?;
        }
        EntityKind::Relationship => {
            let type_clause = match &entry.label_or_type {
                Some(rel_type) => format!("AND r.rel_type = '{}'", sql_str(rel_type)),
                None => String::new(),
            };
            conn.execute_batch(&format!(
                "DELETE FROM fts_content WHERE entity = 'relationship' AND property = '{property}'; \
                 INSERT INTO fts_content (entity, entity_id, property, content) \
                 SELECT 'relationship', r.id, '{property}', json_extract(r.properties, {path}) \
                 FROM relationships r WHERE json_extract(r.properties, {path}) IS NOT NULL {type_clause}"
            ))?;
        }
    }
    Ok(())
}
