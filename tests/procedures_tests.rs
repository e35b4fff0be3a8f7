//! Procedure dispatcher tests: apoc.load/import, uri index and the
//! scalar apoc library reached through queries

#[path = "testutils/mod.rs"]
mod testutils;

use grafito::{GrafitoError, Value};
use testutils::TestFixture;

#[test]
fn test_load_json_local_file() {
    let fixture = TestFixture::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.json");
    std::fs::write(&path, r#"{"name": "grafito", "stars": 7}"#).unwrap();
    let result = fixture.query(&format!(
        "CALL apoc.load.json('{}') YIELD value RETURN value.name AS name, value.stars AS stars",
        path.display()
    ));
    assert_eq!(result.first("name"), Some(&Value::from("grafito")));
    assert_eq!(result.first("stars"), Some(&Value::Int(7)));
}

#[test]
fn test_load_json_array_yields_rows() {
    let fixture = TestFixture::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("list.json");
    std::fs::write(&path, r#"[{"i": 1}, {"i": 2}, {"i": 3}]"#).unwrap();
    let result = fixture.query(&format!(
        "CALL apoc.load.jsonArray('{}') YIELD value RETURN sum(value.i) AS total",
        path.display()
    ));
    assert_eq!(result.first("total"), Some(&Value::Int(6)));
}

#[test]
fn test_load_json_missing_file_is_import_error() {
    let fixture = TestFixture::new();
    let err = fixture.assert_query_fails("CALL apoc.load.json('/nonexistent/nope.json')");
    assert!(matches!(err, GrafitoError::Import(_)), "{err}");
}

#[test]
fn test_load_json_file_url_prefix() {
    let fixture = TestFixture::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(&path, "[1, 2]").unwrap();
    let result = fixture.query(&format!(
        "CALL apoc.load.json('file://{}') YIELD value RETURN size(value) AS n",
        path.display()
    ));
    assert_eq!(result.first("n"), Some(&Value::Int(2)));
}

#[test]
fn test_import_json_via_call() {
    let fixture = TestFixture::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"type\":\"node\",\"id\":\"p1\",\"labels\":[\"Person\"],\"properties\":{\"name\":\"Ada\"}}\n",
            "{\"type\":\"node\",\"id\":\"p2\",\"labels\":[\"Person\"],\"properties\":{\"name\":\"Lin\"}}\n",
            "{\"type\":\"relationship\",\"label\":\"KNOWS\",\"start\":{\"id\":\"p1\"},\"end\":{\"id\":\"p2\"}}\n",
        ),
    )
    .unwrap();
    let result = fixture.query(&format!(
        "CALL apoc.import.json('{}') YIELD nodes, relationships RETURN nodes, relationships",
        path.display()
    ));
    assert_eq!(result.first("nodes"), Some(&Value::Int(2)));
    assert_eq!(result.first("relationships"), Some(&Value::Int(1)));
    fixture.assert_first_value(
        "MATCH (:Person {name:'Ada'})-[:KNOWS]->(p) RETURN p.name AS name",
        "name",
        Value::from("Lin"),
    );
}

#[test]
fn test_uri_index_create() {
    let fixture = TestFixture::new();
    let result = fixture.query("CALL db.uri_index.create('node')");
    assert_eq!(result.first("name"), Some(&Value::from("idx_nodes_uri")));
    // Idempotent re-creation.
    fixture.query("CALL db.uri_index.create('node')");
    fixture.query("CALL db.uri_index.create('relationship')");
}

#[test]
fn test_standalone_call_returns_procedure_schema() {
    let fixture = TestFixture::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v.json");
    std::fs::write(&path, "{\"ok\": true}").unwrap();
    let result = fixture.query(&format!("CALL apoc.load.json('{}')", path.display()));
    assert_eq!(result.columns, vec!["value".to_string()]);
    assert_eq!(result.rows.len(), 1);
}

#[test]
fn test_call_without_yield_mid_query_fails() {
    let fixture = TestFixture::new();
    let err = fixture.assert_query_fails("CALL db.uri_index.create('node') RETURN 1");
    assert!(matches!(err, GrafitoError::QueryExecution(_)), "{err}");
}

#[test]
fn test_apoc_scalar_functions_through_queries() {
    let fixture = TestFixture::new();
    fixture.assert_first_value(
        "RETURN apoc.text.join(['a', 'b', 'c'], '-') AS v",
        "v",
        Value::from("a-b-c"),
    );
    fixture.assert_first_value(
        "RETURN apoc.map.merge({a: 1}, {b: 2}).b AS v",
        "v",
        Value::Int(2),
    );
    fixture.assert_first_value(
        "RETURN apoc.coll.sum([1, 2, 3]) AS v",
        "v",
        Value::Float(6.0),
    );
    fixture.assert_first_value(
        "RETURN apoc.util.decompress(apoc.util.compress('round trip')) AS v",
        "v",
        Value::from("round trip"),
    );
}

#[test]
fn test_apoc_convert_tomap_equals_property_map() {
    let fixture = TestFixture::new();
    fixture.query("CREATE (:P {a: 1, b: 'x'})");
    let result = fixture.query(
        "MATCH (p:P) RETURN apoc.convert.toMap(p) AS m, properties(p) AS props",
    );
    assert_eq!(result.first("m"), result.first("props"));
}

#[test]
fn test_apoc_map_pairs_round_trip_in_query() {
    let fixture = TestFixture::new();
    fixture.assert_first_value(
        "WITH {x: 1, y: 'two'} AS m \
         RETURN apoc.map.fromPairs(apoc.map.toPairs(m)) = m AS same",
        "same",
        Value::Bool(true),
    );
}

#[test]
fn test_custom_procedure_registration() {
    let fixture = TestFixture::new();
    fixture.graph.register_procedure(
        "demo.constants",
        &["name", "value"],
        std::sync::Arc::new(|_graph, _args| {
            Ok(vec![
                vec![Value::from("pi"), Value::Float(std::f64::consts::PI)],
                vec![Value::from("e"), Value::Float(std::f64::consts::E)],
            ])
        }),
    );
    let result = fixture.query(
        "CALL demo.constants() YIELD name, value WHERE value > 3 RETURN name",
    );
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.first("name"), Some(&Value::from("pi")));
}

#[test]
fn test_temporal_and_spatial_functions_in_queries() {
    let fixture = TestFixture::new();
    fixture.assert_first_value("RETURN date('2024-03-15').year AS v", "v", Value::Int(2024));
    fixture.assert_first_value(
        "RETURN (date('2024-01-31') + duration('P1M')).month AS v",
        "v",
        Value::Int(2),
    );
    fixture.assert_first_value(
        "RETURN duration.between(date('2020-01-01'), date('2020-03-01')).months AS v",
        "v",
        Value::Int(2),
    );
    fixture.assert_first_value(
        "RETURN distance(point({x: 0.0, y: 0.0}), point({x: 3.0, y: 4.0})) AS v",
        "v",
        Value::Float(5.0),
    );
    fixture.assert_first_value(
        "RETURN datetime.truncate('day', localdatetime('2024-03-15T10:30:00')) AS v",
        "v",
        fixture
            .query("RETURN localdatetime('2024-03-15T00:00:00') AS v")
            .first("v")
            .cloned()
            .unwrap(),
    );
}

#[test]
fn test_string_function_subset() {
    let fixture = TestFixture::new();
    fixture.assert_first_value("RETURN levenshtein('kitten', 'sitting') AS v", "v", Value::Int(3));
    fixture.assert_first_value("RETURN snake_case('HelloWorld') AS v", "v", Value::from("hello_world"));
    fixture.assert_first_value("RETURN deaccent('café') AS v", "v", Value::from("cafe"));
    fixture.assert_first_value(
        "RETURN strip_html('<p>plain</p>') AS v",
        "v",
        Value::from("plain"),
    );
    fixture.assert_first_value("RETURN jaccard('abc', 'abc') AS v", "v", Value::Float(1.0));
    fixture.assert_first_value(
        "RETURN substring('grafito', 0, 5) AS v",
        "v",
        Value::from("grafi"),
    );
    // negative substring length is a runtime error
    let err = fixture.assert_query_fails("RETURN substring('x', 0, -1) AS v");
    assert!(matches!(err, GrafitoError::QueryExecution(_)), "{err}");
}
