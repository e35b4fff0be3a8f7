// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Property-index registry and constraint enforcement
//!
//! Index metadata lives in `property_indexes`; each node index is backed
//! by a SQLite expression index over `json_extract(properties, …)` that
//! accelerates `match_nodes`. Constraints (uniqueness, existence, type)
//! are enforced in the graph-primitive layer before every write; unique
//! indexes guard a uniqueness constraint through the same check path.

use crate::error::{GrafitoError, Result};
use crate::graph::{json_path_literal, json_to_props, Graph, Properties};
use crate::storage::{EntityKind, Value};
use rusqlite::params;

/// Scalar kinds recognized by type constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Map,
}

impl ScalarType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STRING" => Some(ScalarType::String),
            "INTEGER" => Some(ScalarType::Integer),
            "FLOAT" => Some(ScalarType::Float),
            "BOOLEAN" => Some(ScalarType::Boolean),
            "LIST" => Some(ScalarType::List),
            "MAP" => Some(ScalarType::Map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "STRING",
            ScalarType::Integer => "INTEGER",
            ScalarType::Float => "FLOAT",
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::List => "LIST",
            ScalarType::Map => "MAP",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ScalarType::String, Value::String(_))
                | (ScalarType::Integer, Value::Int(_))
                | (ScalarType::Float, Value::Float(_))
                | (ScalarType::Boolean, Value::Bool(_))
                | (ScalarType::List, Value::List(_))
                | (ScalarType::Map, Value::Map(_))
        )
    }
}

/// Constraint kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Uniqueness,
    Existence,
    Type,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::Uniqueness => "uniqueness",
            ConstraintKind::Existence => "existence",
            ConstraintKind::Type => "type",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uniqueness" | "unique" => Some(ConstraintKind::Uniqueness),
            "existence" | "exists" => Some(ConstraintKind::Existence),
            "type" => Some(ConstraintKind::Type),
            _ => None,
        }
    }
}

/// A row of `SHOW INDEXES`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub entity: EntityKind,
    pub label_or_type: String,
    pub property: String,
    pub unique: bool,
    pub kind: &'static str,
}

/// A row of `SHOW CONSTRAINTS`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintInfo {
    pub name: String,
    pub kind: ConstraintKind,
    pub entity: EntityKind,
    pub label_or_type: String,
    pub property: String,
    pub value_type: Option<ScalarType>,
}

/// Deterministic auto-generated index name
pub fn default_index_name(entity: EntityKind, label_or_type: &str, property: &str) -> String {
    format!("idx_{}_{}_{}", entity.as_str(), label_or_type, property)
}

fn default_constraint_name(
    kind: ConstraintKind,
    entity: EntityKind,
    label_or_type: &str,
    property: &str,
) -> String {
    format!(
        "{}_{}_{}_{}",
        kind.as_str(),
        entity.as_str(),
        label_or_type,
        property
    )
}

impl Graph {
    // ------------------------------------------------------------------
    // Index registry
    // ------------------------------------------------------------------

    /// Create a property index. With `if_not_exists`, re-creating an
    /// existing index is a no-op; without it, an `Index` error.
    pub fn create_index(
        &self,
        entity: EntityKind,
        label_or_type: &str,
        property: &str,
        unique: bool,
        name: Option<&str>,
        if_not_exists: bool,
    ) -> Result<String> {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| default_index_name(entity, label_or_type, property));
        self.store.in_write_scope(|store| {
            let exists: bool = store.with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT count(*) FROM property_indexes WHERE name = ?1",
                    params![name],
                    |row| row.get::<_, i64>(0),
                )? > 0)
            })?;
            if exists {
                if if_not_exists {
                    return Ok(name.clone());
                }
                return Err(GrafitoError::Index(format!("index {name} already exists")));
            }
            if unique {
                // Reject creation over data that already violates
                // uniqueness.
                self.scan_uniqueness(entity, label_or_type, property)?;
            }
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO property_indexes (name, entity, label_or_type, property, is_unique) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![name, entity.as_str(), label_or_type, property, unique as i64],
                )?;
                let table = match entity {
                    EntityKind::Node => "nodes",
                    EntityKind::Relationship => "relationships",
                };
                conn.execute_batch(&format!(
                    "CREATE INDEX IF NOT EXISTS \"{name}_expr\" ON {table} (json_extract(properties, {path}))",
                    path = json_path_literal(property),
                ))?;
                Ok(())
            })?;
            Ok(name.clone())
        })
    }

    /// Drop an index by name
    pub fn drop_index(&self, name: &str, if_exists: bool) -> Result<()> {
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                let removed = conn.execute(
                    "DELETE FROM property_indexes WHERE name = ?1",
                    params![name],
                )?;
                if removed == 0 {
                    if if_exists {
                        return Ok(());
                    }
                    return Err(GrafitoError::Index(format!("no such index: {name}")));
                }
                conn.execute_batch(&format!("DROP INDEX IF EXISTS \"{name}_expr\""))?;
                Ok(())
            })
        })
    }

    /// All registered property indexes
    pub fn show_indexes(&self) -> Result<Vec<IndexInfo>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, entity, label_or_type, property, is_unique \
                 FROM property_indexes ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;
            let mut indexes = Vec::new();
            for row in rows {
                let (name, entity, label_or_type, property, is_unique) = row?;
                indexes.push(IndexInfo {
                    name,
                    entity: EntityKind::parse(&entity)
                        .ok_or_else(|| GrafitoError::Storage("bad entity kind".to_string()))?,
                    label_or_type,
                    property,
                    unique: is_unique != 0,
                    kind: "range",
                });
            }
            Ok(indexes)
        })
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    /// Create a constraint. Existing data is scanned first; creation is
    /// rejected when any row already violates the constraint.
    pub fn create_constraint(
        &self,
        kind: ConstraintKind,
        entity: EntityKind,
        label_or_type: &str,
        property: &str,
        value_type: Option<ScalarType>,
        name: Option<&str>,
        if_not_exists: bool,
    ) -> Result<String> {
        if kind == ConstraintKind::Type && value_type.is_none() {
            return Err(GrafitoError::Configuration(
                "type constraint requires a scalar type".to_string(),
            ));
        }
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| default_constraint_name(kind, entity, label_or_type, property));
        self.store.in_write_scope(|store| {
            let exists: bool = store.with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT count(*) FROM property_constraints WHERE name = ?1",
                    params![name],
                    |row| row.get::<_, i64>(0),
                )? > 0)
            })?;
            if exists {
                if if_not_exists {
                    return Ok(name.clone());
                }
                return Err(GrafitoError::Index(format!(
                    "constraint {name} already exists"
                )));
            }
            match kind {
                ConstraintKind::Uniqueness => {
                    self.scan_uniqueness(entity, label_or_type, property)?
                }
                ConstraintKind::Existence | ConstraintKind::Type => {
                    self.scan_presence(entity, label_or_type, property, kind, value_type)?
                }
            }
            store.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO property_constraints (name, kind, entity, label_or_type, property, value_type) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        name,
                        kind.as_str(),
                        entity.as_str(),
                        label_or_type,
                        property,
                        value_type.map(|t| t.as_str()),
                    ],
                )?;
                Ok(())
            })?;
            Ok(name.clone())
        })
    }

    /// Drop a constraint by name
    pub fn drop_constraint(&self, name: &str, if_exists: bool) -> Result<()> {
        self.store.in_write_scope(|store| {
            store.with_conn(|conn| {
                let removed = conn.execute(
                    "DELETE FROM property_constraints WHERE name = ?1",
                    params![name],
                )?;
                if removed == 0 && !if_exists {
                    return Err(GrafitoError::Index(format!("no such constraint: {name}")));
                }
                Ok(())
            })
        })
    }

    /// All registered constraints
    pub fn show_constraints(&self) -> Result<Vec<ConstraintInfo>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, kind, entity, label_or_type, property, value_type \
                 FROM property_constraints ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?;
            let mut constraints = Vec::new();
            for row in rows {
                let (name, kind, entity, label_or_type, property, value_type) = row?;
                constraints.push(ConstraintInfo {
                    name,
                    kind: ConstraintKind::parse(&kind)
                        .ok_or_else(|| GrafitoError::Storage("bad constraint kind".to_string()))?,
                    entity: EntityKind::parse(&entity)
                        .ok_or_else(|| GrafitoError::Storage("bad entity kind".to_string()))?,
                    label_or_type,
                    property,
                    value_type: value_type.as_deref().and_then(ScalarType::parse),
                });
            }
            Ok(constraints)
        })
    }

    // ------------------------------------------------------------------
    // Write-time enforcement, called from the graph primitives
    // ------------------------------------------------------------------

    /// Validate a node's labels/properties against every applicable
    /// constraint. `node_id` excludes the node itself from uniqueness
    /// scans during updates.
    pub(crate) fn check_node_constraints(
        &self,
        node_id: Option<i64>,
        labels: &[String],
        props: &Properties,
    ) -> Result<()> {
        for rule in self.applicable_rules(EntityKind::Node)? {
            if !labels
                .iter()
                .any(|l| l.eq_ignore_ascii_case(&rule.label_or_type))
            {
                continue;
            }
            self.enforce_rule(&rule, node_id, props, |exclude, value| {
                self.count_nodes_with_value(&rule.label_or_type, &rule.property, value, exclude)
            })?;
        }
        Ok(())
    }

    /// Validate a relationship's properties against every applicable
    /// constraint for its type (case-sensitive match).
    pub(crate) fn check_relationship_constraints(
        &self,
        rel_id: Option<i64>,
        rel_type: &str,
        props: &Properties,
    ) -> Result<()> {
        for rule in self.applicable_rules(EntityKind::Relationship)? {
            if rule.label_or_type != rel_type {
                continue;
            }
            self.enforce_rule(&rule, rel_id, props, |exclude, value| {
                self.count_relationships_with_value(rel_type, &rule.property, value, exclude)
            })?;
        }
        Ok(())
    }

    fn enforce_rule(
        &self,
        rule: &ConstraintInfo,
        entity_id: Option<i64>,
        props: &Properties,
        count_others: impl Fn(Option<i64>, &Value) -> Result<i64>,
    ) -> Result<()> {
        let value = props.get(&rule.property);
        match rule.kind {
            ConstraintKind::Uniqueness => {
                // NULL property values are never rejected.
                if let Some(value) = value.filter(|v| !v.is_null()) {
                    if count_others(entity_id, value)? > 0 {
                        return Err(GrafitoError::ConstraintViolation(format!(
                            "uniqueness on ({}, {}) violated by value {}",
                            rule.label_or_type, rule.property, value
                        )));
                    }
                }
            }
            ConstraintKind::Existence => {
                if value.map_or(true, Value::is_null) {
                    return Err(GrafitoError::ConstraintViolation(format!(
                        "existence of {}.{} violated",
                        rule.label_or_type, rule.property
                    )));
                }
            }
            ConstraintKind::Type => {
                let expected = rule.value_type.expect("type constraint carries a type");
                match value {
                    Some(v) if expected.matches(v) => {}
                    Some(v) => {
                        return Err(GrafitoError::ConstraintViolation(format!(
                            "type of {}.{} must be {}, got {}",
                            rule.label_or_type,
                            rule.property,
                            expected.as_str(),
                            v.type_name()
                        )))
                    }
                    None => {
                        return Err(GrafitoError::ConstraintViolation(format!(
                            "type constraint on {}.{} requires the property to be present",
                            rule.label_or_type, rule.property
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    /// Constraints plus unique indexes, normalized into constraint rules
    fn applicable_rules(&self, entity: EntityKind) -> Result<Vec<ConstraintInfo>> {
        let mut rules: Vec<ConstraintInfo> = self
            .show_constraints()?
            .into_iter()
            .filter(|c| c.entity == entity)
            .collect();
        for index in self.show_indexes()? {
            if index.unique && index.entity == entity {
                rules.push(ConstraintInfo {
                    name: index.name,
                    kind: ConstraintKind::Uniqueness,
                    entity,
                    label_or_type: index.label_or_type,
                    property: index.property,
                    value_type: None,
                });
            }
        }
        Ok(rules)
    }

    fn count_nodes_with_value(
        &self,
        label: &str,
        property: &str,
        value: &Value,
        exclude: Option<i64>,
    ) -> Result<i64> {
        let nodes = self.match_nodes(&[label], &Properties::new())?;
        Ok(nodes
            .iter()
            .filter(|n| Some(n.id) != exclude)
            .filter(|n| n.properties.get(property).is_some_and(|v| v == value))
            .count() as i64)
    }

    fn count_relationships_with_value(
        &self,
        rel_type: &str,
        property: &str,
        value: &Value,
        exclude: Option<i64>,
    ) -> Result<i64> {
        let rels = self.match_relationships(None, None, Some(rel_type))?;
        Ok(rels
            .iter()
            .filter(|r| Some(r.id) != exclude)
            .filter(|r| r.properties.get(property).is_some_and(|v| v == value))
            .count() as i64)
    }

    /// Scan for duplicate non-null values before creating a uniqueness
    /// guard
    fn scan_uniqueness(
        &self,
        entity: EntityKind,
        label_or_type: &str,
        property: &str,
    ) -> Result<()> {
        let mut seen: Vec<Value> = Vec::new();
        let values = self.existing_property_values(entity, label_or_type, property)?;
        for value in values.into_iter().flatten() {
            if value.is_null() {
                continue;
            }
            if seen.contains(&value) {
                return Err(GrafitoError::ConstraintViolation(format!(
                    "existing data violates uniqueness on ({label_or_type}, {property})"
                )));
            }
            seen.push(value);
        }
        Ok(())
    }

    /// Scan for missing or mistyped values before creating an existence
    /// or type constraint
    fn scan_presence(
        &self,
        entity: EntityKind,
        label_or_type: &str,
        property: &str,
        kind: ConstraintKind,
        value_type: Option<ScalarType>,
    ) -> Result<()> {
        let values = self.existing_property_values(entity, label_or_type, property)?;
        for value in values {
            match (&value, kind) {
                (None, _) | (Some(Value::Null), _) => {
                    return Err(GrafitoError::ConstraintViolation(format!(
                        "existing data violates {} on ({label_or_type}, {property})",
                        kind.as_str()
                    )));
                }
                (Some(v), ConstraintKind::Type) => {
                    let expected = value_type.expect("type constraint carries a type");
                    if !expected.matches(v) {
                        return Err(GrafitoError::ConstraintViolation(format!(
                            "existing data violates type {} on ({label_or_type}, {property})",
                            expected.as_str()
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn existing_property_values(
        &self,
        entity: EntityKind,
        label_or_type: &str,
        property: &str,
    ) -> Result<Vec<Option<Value>>> {
        match entity {
            EntityKind::Node => Ok(self
                .match_nodes(&[label_or_type], &Properties::new())?
                .into_iter()
                .map(|n| n.properties.get(property).cloned())
                .collect()),
            EntityKind::Relationship => self.store.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT properties FROM relationships WHERE rel_type = ?1 ORDER BY id",
                )?;
                let texts: Vec<String> = stmt
                    .query_map(params![label_or_type], |row| row.get(0))?
                    .collect::<rusqlite::Result<_>>()?;
                let mut values = Vec::with_capacity(texts.len());
                for text in texts {
                    values.push(json_to_props(&text)?.get(property).cloned());
                }
                Ok(values)
            }),
        }
    }
}
