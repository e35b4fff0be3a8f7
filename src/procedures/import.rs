// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `apoc.import.json` — batch import of exported graph data
//!
//! Accepted shapes: JSONL entries, an array of entries, or a
//! `{nodes, relationships}` document. Entries are tagged
//! `"type": "node" | "relationship"`; relationships reference node ids
//! declared earlier in the same import, and unresolved references fail
//! the import.

use super::loaders::{fetch_text, LoadOptions};
use crate::error::{GrafitoError, Result};
use crate::graph::{Graph, Properties};
use crate::storage::Value;
use std::collections::BTreeMap;

pub fn import_json_proc(graph: &Graph, args: &[Value]) -> Result<Vec<Vec<Value>>> {
    if args.is_empty() || args.len() > 2 {
        return Err(GrafitoError::QueryExecution(
            "apoc.import.json expects (source, options?)".to_string(),
        ));
    }
    let Some(source) = args[0].as_str() else {
        return Err(GrafitoError::QueryExecution(
            "apoc.import.json: source must be a string".to_string(),
        ));
    };
    let text = fetch_text(source, &LoadOptions::default())?;
    let (nodes, relationships) = import_text(graph, &text)?;
    Ok(vec![vec![Value::Int(nodes), Value::Int(relationships)]])
}

/// Run an import over decoded text, returning (nodes, relationships)
/// created. The whole import runs in one transaction scope.
pub fn import_text(graph: &Graph, text: &str) -> Result<(i64, i64)> {
    let entries = decode_entries(text)?;
    graph.store.in_write_scope(|_| {
        let mut importer = Importer {
            graph,
            id_map: BTreeMap::new(),
            nodes: 0,
            relationships: 0,
        };
        for entry in &entries {
            importer.apply(entry)?;
        }
        Ok((importer.nodes, importer.relationships))
    })
}

/// Normalize all accepted shapes into a flat entry list with nodes
/// before the relationships that reference them.
fn decode_entries(text: &str) -> Result<Vec<Value>> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
        let value = Value::from_json(&json);
        return match value {
            Value::List(items) => Ok(items),
            Value::Map(ref entries) if entries.contains_key("type") => Ok(vec![value]),
            Value::Map(entries) => {
                let mut flat = Vec::new();
                match entries.get("nodes") {
                    Some(Value::List(nodes)) => flat.extend(nodes.iter().cloned()),
                    None => {}
                    Some(other) => {
                        return Err(GrafitoError::Import(format!(
                            "'nodes' must be a list, got {}",
                            other.type_name()
                        )))
                    }
                }
                match entries.get("relationships") {
                    Some(Value::List(rels)) => flat.extend(rels.iter().cloned()),
                    None => {}
                    Some(other) => {
                        return Err(GrafitoError::Import(format!(
                            "'relationships' must be a list, got {}",
                            other.type_name()
                        )))
                    }
                }
                if flat.is_empty() {
                    return Err(GrafitoError::Import(
                        "import document has no nodes or relationships".to_string(),
                    ));
                }
                Ok(flat)
            }
            _ => Err(GrafitoError::Import(
                "import document must be an object or array".to_string(),
            )),
        };
    }
    // JSONL fallback
    let mut entries = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let json: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            GrafitoError::Import(format!("malformed JSONL at line {}: {e}", line_no + 1))
        })?;
        entries.push(Value::from_json(&json));
    }
    if entries.is_empty() {
        return Err(GrafitoError::Import("empty import document".to_string()));
    }
    Ok(entries)
}

struct Importer<'g> {
    graph: &'g Graph,
    /// External id (rendered to string) → created node id
    id_map: BTreeMap<String, i64>,
    nodes: i64,
    relationships: i64,
}

impl Importer<'_> {
    fn apply(&mut self, entry: &Value) -> Result<()> {
        let Value::Map(fields) = entry else {
            return Err(GrafitoError::Import(format!(
                "import entry must be an object, got {}",
                entry.type_name()
            )));
        };
        let kind = fields
            .get("type")
            .and_then(Value::as_str)
            // Entries from a {nodes, relationships} document may omit
            // the tag; presence of endpoints decides.
            .map(str::to_string)
            .unwrap_or_else(|| {
                if fields.contains_key("start") || fields.contains_key("end") {
                    "relationship".to_string()
                } else {
                    "node".to_string()
                }
            });
        match kind.as_str() {
            "node" => self.import_node(fields),
            "relationship" | "rel" => self.import_relationship(fields),
            other => Err(GrafitoError::Import(format!(
                "unknown import entry type: {other}"
            ))),
        }
    }

    fn import_node(&mut self, fields: &Properties) -> Result<()> {
        let labels: Vec<String> = match fields.get("labels") {
            Some(Value::List(items)) => items
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        GrafitoError::Import("node labels must be strings".to_string())
                    })
                })
                .collect::<Result<_>>()?,
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(GrafitoError::Import(format!(
                    "node labels must be a list, got {}",
                    other.type_name()
                )))
            }
        };
        let properties = match fields.get("properties") {
            Some(Value::Map(props)) => props.clone(),
            None | Some(Value::Null) => Properties::new(),
            Some(other) => {
                return Err(GrafitoError::Import(format!(
                    "node properties must be a map, got {}",
                    other.type_name()
                )))
            }
        };
        let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let node = self.graph.create_node(&label_refs, properties)?;
        if let Some(external) = fields.get("id") {
            self.id_map.insert(external.to_string(), node.id);
        }
        self.nodes += 1;
        Ok(())
    }

    fn import_relationship(&mut self, fields: &Properties) -> Result<()> {
        let rel_type = fields
            .get("label")
            .or_else(|| fields.get("relationshipType"))
            .or_else(|| fields.get("rel_type"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GrafitoError::Import("relationship entry is missing its type".to_string())
            })?
            .to_string();
        let source = self.resolve_endpoint(fields.get("start"), "start")?;
        let target = self.resolve_endpoint(fields.get("end"), "end")?;
        let properties = match fields.get("properties") {
            Some(Value::Map(props)) => props.clone(),
            None | Some(Value::Null) => Properties::new(),
            Some(other) => {
                return Err(GrafitoError::Import(format!(
                    "relationship properties must be a map, got {}",
                    other.type_name()
                )))
            }
        };
        self.graph
            .create_relationship(source, target, &rel_type, properties)?;
        self.relationships += 1;
        Ok(())
    }

    fn resolve_endpoint(&self, endpoint: Option<&Value>, which: &str) -> Result<i64> {
        let external = match endpoint {
            Some(Value::Map(fields)) => fields
                .get("id")
                .ok_or_else(|| {
                    GrafitoError::Import(format!("relationship {which} is missing an id"))
                })?
                .to_string(),
            Some(Value::Null) | None => {
                return Err(GrafitoError::Import(format!(
                    "relationship entry is missing its {which} node"
                )))
            }
            Some(scalar) => scalar.to_string(),
        };
        self.id_map.get(&external).copied().ok_or_else(|| {
            GrafitoError::Import(format!(
                "relationship references undeclared node id: {external}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_jsonl_entries() {
        let graph = Graph::open_in_memory().unwrap();
        let text = concat!(
            "{\"type\":\"node\",\"id\":\"a\",\"labels\":[\"Person\"],\"properties\":{\"name\":\"Ada\"}}\n",
            "{\"type\":\"node\",\"id\":\"b\",\"labels\":[\"Person\"],\"properties\":{\"name\":\"Bob\"}}\n",
            "{\"type\":\"relationship\",\"label\":\"KNOWS\",\"start\":{\"id\":\"a\"},\"end\":{\"id\":\"b\"},\"properties\":{\"since\":2020}}\n",
        );
        let (nodes, rels) = import_text(&graph, text).unwrap();
        assert_eq!(nodes, 2);
        assert_eq!(rels, 1);
        assert_eq!(graph.node_count().unwrap(), 2);
        assert_eq!(graph.relationship_count().unwrap(), 1);
    }

    #[test]
    fn test_import_nodes_relationships_document() {
        let graph = Graph::open_in_memory().unwrap();
        let text = r#"{
            "nodes": [
                {"id": 1, "labels": ["City"], "properties": {"name": "Oslo"}},
                {"id": 2, "labels": ["City"], "properties": {"name": "Bergen"}}
            ],
            "relationships": [
                {"label": "ROAD", "start": 1, "end": 2, "properties": {"km": 463}}
            ]
        }"#;
        let (nodes, rels) = import_text(&graph, text).unwrap();
        assert_eq!((nodes, rels), (2, 1));
    }

    #[test]
    fn test_unresolved_reference_fails_and_rolls_back() {
        let graph = Graph::open_in_memory().unwrap();
        let text = concat!(
            "{\"type\":\"node\",\"id\":\"a\",\"labels\":[],\"properties\":{}}\n",
            "{\"type\":\"relationship\",\"label\":\"R\",\"start\":{\"id\":\"a\"},\"end\":{\"id\":\"ghost\"}}\n",
        );
        let err = import_text(&graph, text).unwrap_err();
        assert!(matches!(err, GrafitoError::Import(_)));
        // The failed import left nothing behind.
        assert_eq!(graph.node_count().unwrap(), 0);
    }

    #[test]
    fn test_malformed_input_is_import_error() {
        let graph = Graph::open_in_memory().unwrap();
        assert!(matches!(
            import_text(&graph, "{oops"),
            Err(GrafitoError::Import(_))
        ));
    }
}
