//! Dump/restore round-trip tests

#[path = "testutils/mod.rs"]
mod testutils;

use grafito::Value;
use std::collections::BTreeMap;
use testutils::TestFixture;

#[test]
fn test_round_trip_preserves_counts_and_label_partition() {
    let fixture = TestFixture::new();
    // 100 nodes over three labels, 200 relationships.
    for i in 0..100 {
        let label = match i % 3 {
            0 => "Account",
            1 => "Merchant",
            _ => "Device",
        };
        fixture.query(&format!("CREATE (:{label} {{seq: {i}}})"));
    }
    for i in 0..200 {
        fixture.query(&format!(
            "MATCH (a {{seq: {}}}), (b {{seq: {}}}) CREATE (a)-[:LINK {{n: {i}}}]->(b)",
            i % 100,
            (i * 7 + 1) % 100,
        ));
    }

    let partition_query = "MATCH (n) RETURN labels(n) AS ls, count(*) AS c ORDER BY ls[0]";
    let before = fixture.query(partition_query);

    let script = fixture.graph.dump_to_string().unwrap();
    fixture.graph.restore(&script, true).unwrap();

    assert_eq!(fixture.graph.node_count().unwrap(), 100);
    assert_eq!(fixture.graph.relationship_count().unwrap(), 200);
    assert_eq!(fixture.query(partition_query), before);
}

#[test]
fn test_round_trip_preserves_property_values() {
    let fixture = TestFixture::new();
    fixture.query(
        "CREATE (:Mixed {s: 'text', i: 42, f: 1.5, b: true, n: null, \
                 xs: [1, 'two', [3]], m: {k: 'v', nested: {deep: 1}}})",
    );
    let script = fixture.graph.dump_to_string().unwrap();
    fixture.graph.restore(&script, true).unwrap();

    let node = &fixture
        .graph
        .match_nodes(&["Mixed"], &BTreeMap::new())
        .unwrap()[0];
    assert_eq!(node.property("s"), Some(&Value::from("text")));
    assert_eq!(node.property("i"), Some(&Value::Int(42)));
    assert_eq!(node.property("f"), Some(&Value::Float(1.5)));
    assert_eq!(node.property("b"), Some(&Value::Bool(true)));
    assert_eq!(node.property("n"), Some(&Value::Null));
    let Some(Value::List(xs)) = node.property("xs") else {
        panic!("list expected");
    };
    assert_eq!(xs.len(), 3);
    let Some(Value::Map(m)) = node.property("m") else {
        panic!("map expected");
    };
    assert_eq!(m.get("k"), Some(&Value::from("v")));
}

#[test]
fn test_round_trip_preserves_temporals_and_points() {
    let fixture = TestFixture::new();
    fixture.query(
        "CREATE (:Event {day: date('2024-03-15'), at: localdatetime('2024-03-15T10:30:00'), \
                 span: duration('P1DT2H'), loc: point({x: 1.0, y: 2.0})})",
    );
    let before = fixture.query(
        "MATCH (e:Event) RETURN e.day AS day, e.at AS at, e.span AS span, e.loc AS loc",
    );
    let script = fixture.graph.dump_to_string().unwrap();
    fixture.graph.restore(&script, true).unwrap();
    let after = fixture.query(
        "MATCH (e:Event) RETURN e.day AS day, e.at AS at, e.span AS span, e.loc AS loc",
    );
    assert_eq!(before, after);
}

#[test]
fn test_restore_without_clear_appends() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (:Keep {v: 1})");
    let script = fixture.graph.dump_to_string().unwrap();
    fixture.graph.restore(&script, false).unwrap();
    assert_eq!(fixture.graph.node_count().unwrap(), 2);
}

#[test]
fn test_query_results_survive_round_trip() {
    let fixture = TestFixture::new();
    fixture.insert_social_data();
    let query = "MATCH (p:Person)-[:KNOWS]->(q) \
                 RETURN p.name AS a, q.name AS b ORDER BY a";
    let before = fixture.query(query);
    let script = fixture.graph.dump_to_string().unwrap();
    fixture.graph.restore(&script, true).unwrap();
    assert_eq!(fixture.query(query), before);
}
