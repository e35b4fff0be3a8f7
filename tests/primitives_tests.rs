//! Graph-primitive contract tests: CRUD on nodes and relationships,
//! label idempotence, neighbor queries and cascade deletion

#[path = "testutils/mod.rs"]
mod testutils;

use grafito::{Direction, GrafitoError, Properties, Value};
use testutils::TestFixture;

fn props(pairs: &[(&str, Value)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_create_and_get_node() {
    let fixture = TestFixture::new();
    let node = fixture
        .graph
        .create_node(&["Person"], props(&[("name", Value::from("Ada"))]))
        .unwrap();
    assert!(node.id > 0);
    assert!(node.created > 2_400_000.0, "created is a Julian day");

    let fetched = fixture.graph.get_node(node.id).unwrap().unwrap();
    assert_eq!(fetched.labels, vec!["Person"]);
    assert_eq!(fetched.property("name"), Some(&Value::from("Ada")));

    assert!(fixture.graph.get_node(node.id + 999).unwrap().is_none());
}

#[test]
fn test_node_ids_are_monotonic() {
    let fixture = TestFixture::new();
    let a = fixture.graph.create_node(&[], Properties::new()).unwrap();
    let b = fixture.graph.create_node(&[], Properties::new()).unwrap();
    assert!(b.id > a.id);
}

#[test]
fn test_add_labels_is_idempotent() {
    let fixture = TestFixture::new();
    let node = fixture.graph.create_node(&["A"], Properties::new()).unwrap();
    let node = fixture.graph.add_labels(node.id, &["B", "b", "A"]).unwrap();
    // Labels form a case-insensitive set.
    assert_eq!(node.labels.len(), 2);
    let node = fixture.graph.add_labels(node.id, &["B"]).unwrap();
    assert_eq!(node.labels.len(), 2);
}

#[test]
fn test_remove_labels_absent_is_noop() {
    let fixture = TestFixture::new();
    let node = fixture.graph.create_node(&["A"], Properties::new()).unwrap();
    let node = fixture.graph.remove_labels(node.id, &["Missing"]).unwrap();
    assert_eq!(node.labels, vec!["A"]);
}

#[test]
fn test_match_nodes_label_and_property_filters() {
    let fixture = TestFixture::new();
    fixture.insert_social_data();
    let all = fixture.graph.match_nodes(&["Person"], &Properties::new()).unwrap();
    assert_eq!(all.len(), 5);

    let anns = fixture
        .graph
        .match_nodes(&["Person"], &props(&[("name", Value::from("Ann"))]))
        .unwrap();
    assert_eq!(anns.len(), 1);

    // AND semantics across labels
    let node = fixture.graph.create_node(&["Person", "Admin"], Properties::new()).unwrap();
    let admins = fixture
        .graph
        .match_nodes(&["Person", "Admin"], &Properties::new())
        .unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].id, node.id);
}

#[test]
fn test_update_properties_merges_and_null_sets_null() {
    let fixture = TestFixture::new();
    let node = fixture
        .graph
        .create_node(&[], props(&[("a", Value::Int(1)), ("b", Value::Int(2))]))
        .unwrap();
    let node = fixture
        .graph
        .update_node_properties(node.id, props(&[("b", Value::Null), ("c", Value::Int(3))]))
        .unwrap();
    assert_eq!(node.property("a"), Some(&Value::Int(1)));
    // null sets the key to null explicitly; it does not delete it
    assert_eq!(node.property("b"), Some(&Value::Null));
    assert_eq!(node.property("c"), Some(&Value::Int(3)));

    let node = fixture.graph.remove_node_property(node.id, "b").unwrap();
    assert_eq!(node.property("b"), None);
}

#[test]
fn test_create_relationship_requires_endpoints() {
    let fixture = TestFixture::new();
    let a = fixture.graph.create_node(&[], Properties::new()).unwrap();
    let err = fixture
        .graph
        .create_relationship(a.id, a.id + 100, "KNOWS", Properties::new())
        .unwrap_err();
    assert!(matches!(err, GrafitoError::NotFound(_)), "{err}");
}

#[test]
fn test_delete_node_cascades_to_relationships() {
    let fixture = TestFixture::new();
    fixture.insert_social_data();
    let ben = fixture.person_id("Ben");
    assert_eq!(fixture.graph.relationship_count().unwrap(), 4);

    fixture.graph.delete_node(ben).unwrap();

    // Ann->Ben and Ben->Cat are gone with Ben.
    assert_eq!(fixture.graph.relationship_count().unwrap(), 2);
    for rel in fixture.graph.match_relationships(None, None, None).unwrap() {
        assert_ne!(rel.source, ben);
        assert_ne!(rel.target, ben);
    }
}

#[test]
fn test_match_relationships_by_source_target_type() {
    let fixture = TestFixture::new();
    fixture.insert_social_data();
    let ann = fixture.person_id("Ann");
    let ben = fixture.person_id("Ben");

    let out = fixture.graph.match_relationships(Some(ann), None, None).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].target, ben);

    // Relationship types are case-sensitive.
    assert!(fixture
        .graph
        .match_relationships(None, None, Some("knows"))
        .unwrap()
        .is_empty());
    assert_eq!(
        fixture
            .graph
            .match_relationships(None, None, Some("KNOWS"))
            .unwrap()
            .len(),
        4
    );
}

#[test]
fn test_get_neighbors_directions_and_dedup() {
    let fixture = TestFixture::new();
    let a = fixture.graph.create_node(&["N"], Properties::new()).unwrap();
    let b = fixture.graph.create_node(&["N"], Properties::new()).unwrap();
    // Two parallel edges plus one reverse edge: `Both` still returns b once.
    fixture.graph.create_relationship(a.id, b.id, "R", Properties::new()).unwrap();
    fixture.graph.create_relationship(a.id, b.id, "R", Properties::new()).unwrap();
    fixture.graph.create_relationship(b.id, a.id, "R", Properties::new()).unwrap();

    let out = fixture.graph.get_neighbors(a.id, Direction::Outgoing, None).unwrap();
    assert_eq!(out.len(), 1);
    let incoming = fixture.graph.get_neighbors(a.id, Direction::Incoming, None).unwrap();
    assert_eq!(incoming.len(), 1);
    let both = fixture.graph.get_neighbors(a.id, Direction::Both, None).unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].id, b.id);
}

#[test]
fn test_temporal_property_round_trips_through_storage() {
    let fixture = TestFixture::new();
    let date = fixture
        .query("RETURN date('2024-03-15') AS d")
        .first("d")
        .cloned()
        .unwrap();
    let node = fixture
        .graph
        .create_node(&[], props(&[("born", date.clone())]))
        .unwrap();
    let fetched = fixture.graph.get_node(node.id).unwrap().unwrap();
    assert_eq!(fetched.property("born"), Some(&date));
}

#[test]
fn test_clear_removes_everything() {
    let fixture = TestFixture::new();
    fixture.insert_social_data();
    fixture.graph.clear().unwrap();
    assert_eq!(fixture.graph.node_count().unwrap(), 0);
    assert_eq!(fixture.graph.relationship_count().unwrap(), 0);
}
