//! Query-language write tests: CREATE, MERGE, SET, REMOVE, DELETE and
//! statement-level rollback

#[path = "testutils/mod.rs"]
mod testutils;

use grafito::{GrafitoError, Value};
use testutils::TestFixture;

#[test]
fn test_create_binds_new_entities() {
    let fixture = TestFixture::new();
    let result = fixture.query("CREATE (a:Thing {v: 1})-[r:REL {w: 2}]->(b:Thing) RETURN a, r, b");
    assert_eq!(result.rows.len(), 1);
    let Some(Value::Relationship(rel)) = result.first("r") else {
        panic!("relationship expected");
    };
    assert_eq!(rel.rel_type, "REL");
    assert_eq!(fixture.graph.node_count().unwrap(), 2);
}

#[test]
fn test_create_incoming_direction() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (a:L {n: 'a'})<-[:IN]-(b:L {n: 'b'})");
    let rels = fixture.graph.match_relationships(None, None, Some("IN")).unwrap();
    assert_eq!(rels.len(), 1);
    let source = fixture.graph.get_node(rels[0].source).unwrap().unwrap();
    assert_eq!(source.property("n"), Some(&Value::from("b")));
}

#[test]
fn test_create_undirected_fails() {
    let fixture = TestFixture::new();
    let err = fixture.assert_query_fails("CREATE (a)-[:R]-(b)");
    assert!(matches!(err, GrafitoError::QueryExecution(_)), "{err}");
}

#[test]
fn test_merge_matches_or_creates() {
    let fixture = TestFixture::new();
    fixture.query("MERGE (u:User {id: 1})");
    fixture.query("MERGE (u:User {id: 1})");
    assert_eq!(fixture.graph.node_count().unwrap(), 1);
    fixture.query("MERGE (u:User {id: 2})");
    assert_eq!(fixture.graph.node_count().unwrap(), 2);
}

#[test]
fn test_merge_on_create_on_match() {
    let fixture = TestFixture::new();
    fixture.query(
        "MERGE (u:User {id: 1}) ON CREATE SET u.created = true ON MATCH SET u.matched = true",
    );
    fixture.assert_first_value(
        "MATCH (u:User {id: 1}) RETURN u.created AS c, u.matched AS m",
        "c",
        Value::Bool(true),
    );
    fixture.query(
        "MERGE (u:User {id: 1}) ON CREATE SET u.created = true ON MATCH SET u.matched = true",
    );
    fixture.assert_first_value(
        "MATCH (u:User {id: 1}) RETURN u.matched AS m",
        "m",
        Value::Bool(true),
    );
}

#[test]
fn test_merge_whole_pattern_is_atomic() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (:City {name: 'Oslo'}), (:City {name: 'Bergen'})");
    // The nodes exist but the relationship does not: MERGE creates the
    // entire pattern rather than reusing the partial match.
    fixture.query("MERGE (:City {name: 'Oslo'})-[:ROAD]->(:City {name: 'Bergen'})");
    assert_eq!(fixture.graph.node_count().unwrap(), 4);
    assert_eq!(fixture.graph.relationship_count().unwrap(), 1);
    // Re-merging the now-complete pattern creates nothing.
    fixture.query("MERGE (:City {name: 'Oslo'})-[:ROAD]->(:City {name: 'Bergen'})");
    assert_eq!(fixture.graph.node_count().unwrap(), 4);
    assert_eq!(fixture.graph.relationship_count().unwrap(), 1);
}

#[test]
fn test_set_property_and_labels() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (:P {name: 'x'})");
    fixture.query("MATCH (p:P) SET p.age = 7, p:Extra");
    let nodes = fixture.graph.match_nodes(&["Extra"], &Default::default()).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].property("age"), Some(&Value::Int(7)));
}

#[test]
fn test_set_plus_equals_merges_map() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (:P {a: 1, b: 2})");
    fixture.query("MATCH (p:P) SET p += {b: 20, c: 30}");
    let result = fixture.query("MATCH (p:P) RETURN p.a AS a, p.b AS b, p.c AS c");
    assert_eq!(result.first("a"), Some(&Value::Int(1)));
    assert_eq!(result.first("b"), Some(&Value::Int(20)));
    assert_eq!(result.first("c"), Some(&Value::Int(30)));
}

#[test]
fn test_set_equals_replaces_map() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (:P {a: 1, b: 2})");
    fixture.query("MATCH (p:P) SET p = {c: 3}");
    let node = &fixture.graph.match_nodes(&["P"], &Default::default()).unwrap()[0];
    assert_eq!(node.property("a"), None);
    assert_eq!(node.property("b"), None);
    assert_eq!(node.property("c"), Some(&Value::Int(3)));
}

#[test]
fn test_remove_property_and_label() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (:A:B {x: 1})");
    fixture.query("MATCH (n:A) REMOVE n.x, n:B");
    let node = &fixture.graph.match_nodes(&["A"], &Default::default()).unwrap()[0];
    assert_eq!(node.property("x"), None);
    assert_eq!(node.labels, vec!["A"]);
}

#[test]
fn test_plain_delete_fails_on_connected_node() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (a:N)-[:R]->(b:N)");
    let err = fixture.assert_query_fails("MATCH (n:N) DELETE n");
    assert!(matches!(err, GrafitoError::QueryExecution(_)), "{err}");
    // Statement-level rollback: nothing was deleted.
    assert_eq!(fixture.graph.node_count().unwrap(), 2);
    assert_eq!(fixture.graph.relationship_count().unwrap(), 1);
}

#[test]
fn test_detach_delete_removes_relationships_first() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (a:N)-[:R]->(b:N)");
    fixture.query("MATCH (n:N) DETACH DELETE n");
    assert_eq!(fixture.graph.node_count().unwrap(), 0);
    assert_eq!(fixture.graph.relationship_count().unwrap(), 0);
}

#[test]
fn test_delete_relationship_only() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (a:N)-[:R]->(b:N)");
    fixture.query("MATCH ()-[r:R]->() DELETE r");
    assert_eq!(fixture.graph.node_count().unwrap(), 2);
    assert_eq!(fixture.graph.relationship_count().unwrap(), 0);
}

#[test]
fn test_execution_error_rolls_back_whole_statement() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (:Row {v: 1}), (:Row {v: 0})");
    // The division fails on the second row after the first SET already
    // ran; the whole statement must roll back.
    let err = fixture.assert_query_fails("MATCH (r:Row) SET r.inv = 10 / r.v");
    assert!(matches!(err, GrafitoError::QueryExecution(_)), "{err}");
    let result = fixture.query("MATCH (r:Row) WHERE r.inv IS NOT NULL RETURN count(r) AS n");
    assert_eq!(result.first("n"), Some(&Value::Int(0)));
}
