// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Self-describing dump and restore
//!
//! The database describes itself as a script in its own query language:
//! a `CREATE` per node carrying a synthetic `_dump_id` property, a
//! `MATCH … CREATE` per relationship keyed by `_dump_id`, and a final
//! `MATCH (n) REMOVE n._dump_id`. Restoring executes the script,
//! optionally after clearing existing content. Identifiers are
//! renumbered on restore; everything else round-trips.

use crate::error::Result;
use crate::graph::Graph;
use std::fmt::Write as _;

const DUMP_ID: &str = "_dump_id";

impl Graph {
    /// Render the whole graph as a restore script
    pub fn dump_to_string(&self) -> Result<String> {
        let mut script = String::new();
        let nodes = self.match_nodes(&[], &Default::default())?;

        for (position, node) in nodes.iter().enumerate() {
            let mut parts: Vec<String> = vec![format!("{DUMP_ID}: {position}")];
            for (key, value) in &node.properties {
                parts.push(format!("{}: {}", escape_key(key), value.to_cypher_literal()));
            }
            let labels: String = node
                .labels
                .iter()
                .map(|l| format!(":{}", escape_key(l)))
                .collect();
            writeln!(script, "CREATE ({labels} {{{}}});", parts.join(", "))
                .expect("string write");
        }

        for rel in self.match_relationships(None, None, None)? {
            let source_pos = nodes
                .iter()
                .position(|n| n.id == rel.source)
                .expect("relationship source exists");
            let target_pos = nodes
                .iter()
                .position(|n| n.id == rel.target)
                .expect("relationship target exists");
            let props = if rel.properties.is_empty() {
                String::new()
            } else {
                let parts: Vec<String> = rel
                    .properties
                    .iter()
                    .map(|(key, value)| {
                        format!("{}: {}", escape_key(key), value.to_cypher_literal())
                    })
                    .collect();
                format!(" {{{}}}", parts.join(", "))
            };
            writeln!(
                script,
                "MATCH (a {{{DUMP_ID}: {source_pos}}}), (b {{{DUMP_ID}: {target_pos}}}) \
                 CREATE (a)-[:{}{props}]->(b);",
                escape_key(&rel.rel_type)
            )
            .expect("string write");
        }

        writeln!(script, "MATCH (n) REMOVE n.{DUMP_ID};").expect("string write");
        Ok(script)
    }

    /// Execute a dump script. With `clear_existing`, current content is
    /// deleted first; the whole restore runs in one transaction scope.
    pub fn restore(&self, script: &str, clear_existing: bool) -> Result<()> {
        self.store.in_write_scope(|_| {
            if clear_existing {
                self.clear()?;
            }
            self.execute_many(script)?;
            Ok(())
        })
    }
}

/// Quote keys/labels that are not plain identifiers
fn escape_key(key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !key.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        key.to_string()
    } else {
        format!("`{key}`")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Properties;
    use crate::storage::Value;

    #[test]
    fn test_dump_shape() {
        let graph = Graph::open_in_memory().unwrap();
        let mut props = Properties::new();
        props.insert("name".to_string(), Value::from("Ada"));
        let a = graph.create_node(&["Person"], props).unwrap();
        let b = graph.create_node(&["Person"], Properties::new()).unwrap();
        graph
            .create_relationship(a.id, b.id, "KNOWS", Properties::new())
            .unwrap();

        let script = graph.dump_to_string().unwrap();
        assert!(script.contains("CREATE (:Person {_dump_id: 0, name: 'Ada'});"));
        assert!(script.contains("MATCH (a {_dump_id: 0}), (b {_dump_id: 1})"));
        assert!(script.trim_end().ends_with("MATCH (n) REMOVE n._dump_id;"));
    }

    #[test]
    fn test_restore_round_trip_counts() {
        let graph = Graph::open_in_memory().unwrap();
        for i in 0..5 {
            let mut props = Properties::new();
            props.insert("i".to_string(), Value::Int(i));
            graph.create_node(&["N"], props).unwrap();
        }
        let nodes = graph.match_nodes(&["N"], &Properties::new()).unwrap();
        for pair in nodes.windows(2) {
            graph
                .create_relationship(pair[0].id, pair[1].id, "NEXT", Properties::new())
                .unwrap();
        }

        let script = graph.dump_to_string().unwrap();
        graph.restore(&script, true).unwrap();

        assert_eq!(graph.node_count().unwrap(), 5);
        assert_eq!(graph.relationship_count().unwrap(), 4);
        // The synthetic dump id is removed by the script's final line.
        for node in graph.match_nodes(&[], &Properties::new()).unwrap() {
            assert!(!node.properties.contains_key("_dump_id"));
        }
    }
}
