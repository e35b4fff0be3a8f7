//! Traversal kernel and variable-length pattern tests

#[path = "testutils/mod.rs"]
mod testutils;

use grafito::{Direction, GrafitoError, Properties, Value};
use testutils::TestFixture;

/// A-KNOWS->B-KNOWS->C-KNOWS->A
fn triangle(fixture: &TestFixture) -> (i64, i64, i64) {
    fixture.query(
        "CREATE (a:Person {name:'A'}), (b:Person {name:'B'}), (c:Person {name:'C'}), \
         (a)-[:KNOWS]->(b), (b)-[:KNOWS]->(c), (c)-[:KNOWS]->(a)",
    );
    (
        fixture.person_id("A"),
        fixture.person_id("B"),
        fixture.person_id("C"),
    )
}

#[test]
fn test_bfs_shortest_path_in_triangle() {
    let fixture = TestFixture::new();
    let (a, _b, c) = triangle(&fixture);
    let path = fixture
        .graph
        .find_shortest_path(a, c, Direction::Outgoing)
        .unwrap()
        .expect("path exists");
    let names: Vec<&Value> = path
        .nodes
        .iter()
        .map(|n| n.property("name").unwrap())
        .collect();
    assert_eq!(names, vec![&Value::from("A"), &Value::from("B"), &Value::from("C")]);
}

#[test]
fn test_bfs_first_discovered_parent_wins() {
    let fixture = TestFixture::new();
    // Two equal-length routes s->m1->t and s->m2->t; m1's edge is
    // inserted first, so BFS must route through it.
    fixture.query(
        "CREATE (s:N {name:'s'}), (m1:N {name:'m1'}), (m2:N {name:'m2'}), (t:N {name:'t'}), \
         (s)-[:R]->(m1), (s)-[:R]->(m2), (m1)-[:R]->(t), (m2)-[:R]->(t)",
    );
    let find = |name: &str| {
        let mut filters = Properties::new();
        filters.insert("name".to_string(), Value::from(name));
        fixture.graph.match_nodes(&["N"], &filters).unwrap()[0].id
    };
    let path = fixture
        .graph
        .find_shortest_path(find("s"), find("t"), Direction::Outgoing)
        .unwrap()
        .unwrap();
    assert_eq!(
        path.nodes[1].property("name"),
        Some(&Value::from("m1"))
    );
}

#[test]
fn test_self_path_has_length_zero() {
    // max_depth = 0 with source == target yields the single-node path.
    let fixture = TestFixture::new();
    let (a, _, _) = triangle(&fixture);
    let path = fixture
        .graph
        .find_path(a, a, 0, Direction::Outgoing)
        .unwrap()
        .expect("self path");
    assert_eq!(path.length(), 0);
    assert_eq!(path.nodes.len(), 1);
    assert_eq!(path.nodes[0].id, a);
}

#[test]
fn test_dfs_bounded_path_respects_max_depth() {
    let fixture = TestFixture::new();
    let (a, _, c) = triangle(&fixture);
    // A reaches C in 2 hops; a depth-1 search must fail.
    assert!(fixture
        .graph
        .find_path(a, c, 1, Direction::Outgoing)
        .unwrap()
        .is_none());
    let path = fixture
        .graph
        .find_path(a, c, 2, Direction::Outgoing)
        .unwrap()
        .unwrap();
    assert_eq!(path.length(), 2);
}

#[test]
fn test_all_shortest_paths_returns_every_minimum() {
    let fixture = TestFixture::new();
    fixture.query(
        "CREATE (s:M {name:'s'}), (m1:M), (m2:M), (t:M {name:'t'}), \
         (s)-[:R]->(m1), (s)-[:R]->(m2), (m1)-[:R]->(t), (m2)-[:R]->(t)",
    );
    let mut filters = Properties::new();
    filters.insert("name".to_string(), Value::from("s"));
    let s = fixture.graph.match_nodes(&["M"], &filters).unwrap()[0].id;
    filters.insert("name".to_string(), Value::from("t"));
    let t = fixture.graph.match_nodes(&["M"], &filters).unwrap()[0].id;

    let paths = fixture
        .graph
        .find_all_shortest_paths(s, t, Direction::Outgoing)
        .unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.length() == 2));
}

#[test]
fn test_variable_length_bounds_are_exact() {
    let fixture = TestFixture::new();
    fixture.insert_social_data(); // Ann->Ben->Cat->Dan->Eve
    fixture.assert_first_value(
        "MATCH (a:Person {name:'Ann'})-[:KNOWS*2..3]->(b) RETURN count(b) AS n",
        "n",
        Value::Int(2), // Cat (2 hops), Dan (3 hops)
    );
    fixture.assert_first_value(
        "MATCH (a:Person {name:'Ann'})-[:KNOWS*1..]->(b) RETURN count(b) AS n",
        "n",
        Value::Int(4),
    );
}

#[test]
fn test_variable_length_binds_relationship_list_and_path() {
    let fixture = TestFixture::new();
    fixture.insert_social_data();
    let result = fixture.query(
        "MATCH p = (a:Person {name:'Ann'})-[rs:KNOWS*2..2]->(b) \
         RETURN size(rs) AS hops, length(p) AS len, b.name AS name",
    );
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.first("hops"), Some(&Value::Int(2)));
    assert_eq!(result.first("len"), Some(&Value::Int(2)));
    assert_eq!(result.first("name"), Some(&Value::from("Cat")));
}

#[test]
fn test_unbounded_pattern_clamped_by_max_hops() {
    let fixture = TestFixture::with_config(|config| {
        config.cypher_max_hops = 2;
    });
    fixture.insert_social_data();
    // With the hop limit at 2, Dan (3 hops) and Eve (4 hops) are
    // unreachable from Ann through an unbounded pattern.
    fixture.assert_first_value(
        "MATCH (a:Person {name:'Ann'})-[:KNOWS*]->(b) RETURN count(b) AS n",
        "n",
        Value::Int(2),
    );
}

#[test]
fn test_explicit_bound_above_hop_limit_fails() {
    let fixture = TestFixture::with_config(|config| {
        config.cypher_max_hops = 2;
    });
    fixture.insert_social_data();
    let err =
        fixture.assert_query_fails("MATCH (a)-[:KNOWS*1..5]->(b) RETURN count(b) AS n");
    assert!(matches!(err, GrafitoError::QueryExecution(_)), "{err}");
}

#[test]
fn test_variable_length_paths_are_simple() {
    let fixture = TestFixture::new();
    let (a, _, _) = triangle(&fixture);
    // Paths are simple: from A the only simple paths are A->B and
    // A->B->C. The cycle back to A is excluded, and enumeration
    // terminates despite it.
    let paths = fixture
        .graph
        .find_shortest_path(a, a, Direction::Outgoing)
        .unwrap();
    assert!(paths.is_some());
    fixture.assert_first_value(
        "MATCH (x:Person {name:'A'})-[:KNOWS*1..10]->(y) RETURN count(y) AS n",
        "n",
        Value::Int(2),
    );
}

#[test]
fn test_shortest_path_function_in_match() {
    let fixture = TestFixture::new();
    triangle(&fixture);
    let result = fixture.query(
        "MATCH p = shortestPath((a:Person {name:'A'})-[:KNOWS*]->(c:Person {name:'C'})) \
         RETURN length(p) AS len",
    );
    assert_eq!(result.first("len"), Some(&Value::Int(2)));
}

#[test]
fn test_all_shortest_paths_function_in_match() {
    let fixture = TestFixture::new();
    fixture.query(
        "CREATE (s:K {name:'s'}), (m1:K), (m2:K), (t:K {name:'t'}), \
         (s)-[:R]->(m1), (s)-[:R]->(m2), (m1)-[:R]->(t), (m2)-[:R]->(t)",
    );
    let result = fixture.query(
        "MATCH p = allShortestPaths((s:K {name:'s'})-[:R*]->(t:K {name:'t'})) \
         RETURN count(p) AS n",
    );
    assert_eq!(result.first("n"), Some(&Value::Int(2)));
}

#[test]
fn test_undirected_variable_length() {
    let fixture = TestFixture::new();
    fixture.insert_social_data();
    // From Cat, one hop in either direction reaches Ben and Dan.
    fixture.assert_first_value(
        "MATCH (c:Person {name:'Cat'})-[:KNOWS*1..1]-(x) RETURN count(x) AS n",
        "n",
        Value::Int(2),
    );
}
