// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SQLite schema: normalized graph tables, metadata tables and the FTS5
//! virtual table
//!
//! Relationships cascade on node deletion through foreign keys; the two
//! directional indexes on `(source, rel_type)` and `(target, rel_type)`
//! back the neighbor queries.

use crate::config::{GraphConfig, JournalMode};
use crate::error::Result;
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    properties  TEXT NOT NULL DEFAULT '{}',
    created     REAL NOT NULL DEFAULT (julianday('now')),
    uri         TEXT
);

CREATE TABLE IF NOT EXISTS labels (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL COLLATE NOCASE UNIQUE
);

CREATE TABLE IF NOT EXISTS node_labels (
    node_id   INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    label_id  INTEGER NOT NULL REFERENCES labels(id) ON DELETE CASCADE,
    PRIMARY KEY (node_id, label_id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS relationships (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    source      INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    target      INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    rel_type    TEXT NOT NULL,
    properties  TEXT NOT NULL DEFAULT '{}',
    created     REAL NOT NULL DEFAULT (julianday('now')),
    uri         TEXT
);

CREATE INDEX IF NOT EXISTS idx_relationships_source_type ON relationships(source, rel_type);
CREATE INDEX IF NOT EXISTS idx_relationships_target_type ON relationships(target, rel_type);
CREATE INDEX IF NOT EXISTS idx_node_labels_label ON node_labels(label_id, node_id);

CREATE TABLE IF NOT EXISTS property_indexes (
    name           TEXT PRIMARY KEY,
    entity         TEXT NOT NULL CHECK (entity IN ('node', 'relationship')),
    label_or_type  TEXT NOT NULL,
    property       TEXT NOT NULL,
    is_unique      INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS property_constraints (
    name           TEXT PRIMARY KEY,
    kind           TEXT NOT NULL CHECK (kind IN ('uniqueness', 'existence', 'type')),
    entity         TEXT NOT NULL CHECK (entity IN ('node', 'relationship')),
    label_or_type  TEXT NOT NULL,
    property       TEXT NOT NULL,
    value_type     TEXT
);

CREATE TABLE IF NOT EXISTS vector_indexes (
    name       TEXT PRIMARY KEY,
    dimension  INTEGER NOT NULL,
    backend    TEXT NOT NULL,
    method     TEXT NOT NULL,
    options    TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS vector_entries (
    index_name  TEXT NOT NULL REFERENCES vector_indexes(name) ON DELETE CASCADE,
    node_id     INTEGER NOT NULL,
    embedding   TEXT NOT NULL,
    PRIMARY KEY (index_name, node_id)
);

CREATE TABLE IF NOT EXISTS fts_config (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    entity         TEXT NOT NULL CHECK (entity IN ('node', 'relationship')),
    label_or_type  TEXT,
    property       TEXT NOT NULL,
    weight         REAL,
    UNIQUE (entity, label_or_type, property)
);
";

const FTS_SCHEMA: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS fts_content USING fts5(
    entity UNINDEXED,
    entity_id UNINDEXED,
    property UNINDEXED,
    content
);
";

// Deleting an entity always drops its FTS documents, independent of the
// per-config triggers managed by the fts module.
const CLEANUP_TRIGGERS: &str = "
CREATE TRIGGER IF NOT EXISTS fts_cleanup_node_delete AFTER DELETE ON nodes BEGIN
    DELETE FROM fts_content WHERE entity = 'node' AND entity_id = OLD.id;
    DELETE FROM vector_entries WHERE node_id = OLD.id;
END;

CREATE TRIGGER IF NOT EXISTS fts_cleanup_rel_delete AFTER DELETE ON relationships BEGIN
    DELETE FROM fts_content WHERE entity = 'relationship' AND entity_id = OLD.id;
END;
";

/// Apply pragmas and create all tables on a fresh or existing database
pub fn initialize(conn: &Connection, config: &GraphConfig) -> Result<()> {
    let journal = if config.path.is_none() {
        JournalMode::Memory
    } else {
        config.journal_mode
    };
    conn.pragma_update(None, "journal_mode", journal.as_pragma_value())?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA)?;
    conn.execute_batch(FTS_SCHEMA)?;
    conn.execute_batch(CLEANUP_TRIGGERS)?;
    Ok(())
}
