//! Test fixture for Grafito integration tests
//!
//! Provides isolated on-disk database instances driving only the public
//! `Graph` API.

use grafito::{Graph, GraphConfig, Properties, QueryResult, Value};

/// Test fixture with an isolated database instance
pub struct TestFixture {
    pub graph: Graph,
    _temp_dir: tempfile::TempDir,
}

impl TestFixture {
    /// Create a fixture backed by a fresh on-disk database
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let db_path = temp_dir
            .path()
            .join(format!("grafito_test_{}.sqlite", fastrand::u64(..)));
        let graph = Graph::open(&db_path).expect("open test database");
        TestFixture {
            graph,
            _temp_dir: temp_dir,
        }
    }

    /// Create a fixture with custom configuration
    pub fn with_config(mutate: impl FnOnce(&mut GraphConfig)) -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let db_path = temp_dir
            .path()
            .join(format!("grafito_test_{}.sqlite", fastrand::u64(..)));
        let mut config = GraphConfig::at_path(&db_path);
        mutate(&mut config);
        let graph = Graph::open_with_config(config).expect("open test database");
        TestFixture {
            graph,
            _temp_dir: temp_dir,
        }
    }

    /// Execute a query, panicking with the error on failure
    pub fn query(&self, text: &str) -> QueryResult {
        self.graph
            .execute(text)
            .unwrap_or_else(|e| panic!("query failed: {text}\n  error: {e}"))
    }

    /// Execute a query and assert it fails
    pub fn assert_query_fails(&self, text: &str) -> grafito::GrafitoError {
        match self.graph.execute(text) {
            Ok(_) => panic!("query unexpectedly succeeded: {text}"),
            Err(error) => error,
        }
    }

    /// Assert the first row's value in `column`
    pub fn assert_first_value(&self, text: &str, column: &str, expected: Value) {
        let result = self.query(text);
        let actual = result.first(column).unwrap_or_else(|| {
            panic!(
                "column {column} missing from {:?} for query: {text}",
                result.columns
            )
        });
        assert_eq!(*actual, expected, "query: {text}");
    }

    /// Insert the small social graph used across suites:
    /// five people in a KNOWS chain with ages 20..60.
    pub fn insert_social_data(&self) {
        for (i, name) in ["Ann", "Ben", "Cat", "Dan", "Eve"].iter().enumerate() {
            self.query(&format!(
                "CREATE (:Person {{name: '{name}', age: {}}})",
                20 + i as i64 * 10
            ));
        }
        for pair in [("Ann", "Ben"), ("Ben", "Cat"), ("Cat", "Dan"), ("Dan", "Eve")] {
            self.query(&format!(
                "MATCH (a:Person {{name: '{}'}}), (b:Person {{name: '{}'}}) \
                 CREATE (a)-[:KNOWS {{since: 2020}}]->(b)",
                pair.0, pair.1
            ));
        }
    }

    /// Node id for a `:Person` by name, via the primitives API
    pub fn person_id(&self, name: &str) -> i64 {
        let mut filters = Properties::new();
        filters.insert("name".to_string(), Value::from(name));
        let nodes = self
            .graph
            .match_nodes(&["Person"], &filters)
            .expect("match_nodes");
        nodes
            .first()
            .unwrap_or_else(|| panic!("no Person named {name}"))
            .id
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
