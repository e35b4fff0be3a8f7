//! Index registry and constraint enforcement tests

#[path = "testutils/mod.rs"]
mod testutils;

use grafito::{ConstraintKind, EntityKind, GrafitoError, Properties, ScalarType, Value};
use testutils::TestFixture;

fn props(pairs: &[(&str, Value)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_create_index_default_name_and_show() {
    let fixture = TestFixture::new();
    fixture.query("CREATE INDEX FOR (n:Person) ON (n.name)");
    let result = fixture.query("SHOW INDEXES");
    assert_eq!(result.rows.len(), 1);
    assert_eq!(
        result.first("name"),
        Some(&Value::from("idx_node_Person_name"))
    );
    assert_eq!(result.first("unique"), Some(&Value::Bool(false)));
    assert_eq!(result.first("kind"), Some(&Value::from("range")));
}

#[test]
fn test_create_index_if_not_exists_is_idempotent() {
    let fixture = TestFixture::new();
    fixture.query("CREATE INDEX FOR (n:Person) ON (n.name)");
    fixture.query("CREATE INDEX IF NOT EXISTS FOR (n:Person) ON (n.name)");
    let err = fixture.assert_query_fails("CREATE INDEX FOR (n:Person) ON (n.name)");
    assert!(matches!(err, GrafitoError::Index(_)), "{err}");
}

#[test]
fn test_drop_index() {
    let fixture = TestFixture::new();
    fixture.query("CREATE INDEX named_idx FOR (n:Person) ON (n.name)");
    fixture.query("DROP INDEX named_idx");
    assert!(fixture.query("SHOW INDEXES").rows.is_empty());
    let err = fixture.assert_query_fails("DROP INDEX named_idx");
    assert!(matches!(err, GrafitoError::Index(_)), "{err}");
    fixture.query("DROP INDEX named_idx IF EXISTS");
}

#[test]
fn test_uniqueness_allows_multiple_nulls() {
    let fixture = TestFixture::new();
    fixture.query("CREATE CONSTRAINT FOR (u:User) REQUIRE u.email IS UNIQUE");

    // Creating {email: null} twice succeeds.
    fixture
        .graph
        .create_node(&["User"], props(&[("email", Value::Null)]))
        .unwrap();
    fixture
        .graph
        .create_node(&["User"], props(&[("email", Value::Null)]))
        .unwrap();

    // A non-null value is accepted once and rejected the second time.
    fixture
        .graph
        .create_node(&["User"], props(&[("email", Value::from("a@b"))]))
        .unwrap();
    let err = fixture
        .graph
        .create_node(&["User"], props(&[("email", Value::from("a@b"))]))
        .unwrap_err();
    assert!(matches!(err, GrafitoError::ConstraintViolation(_)), "{err}");
}

#[test]
fn test_uniqueness_checked_on_update_and_label_add() {
    let fixture = TestFixture::new();
    fixture.query("CREATE CONSTRAINT FOR (u:User) REQUIRE u.email IS UNIQUE");
    fixture
        .graph
        .create_node(&["User"], props(&[("email", Value::from("a@b"))]))
        .unwrap();
    let other = fixture
        .graph
        .create_node(&["User"], props(&[("email", Value::from("c@d"))]))
        .unwrap();
    assert!(fixture
        .graph
        .update_node_properties(other.id, props(&[("email", Value::from("a@b"))]))
        .is_err());

    // An unlabeled node with the duplicate value cannot gain the label.
    let unlabeled = fixture
        .graph
        .create_node(&[], props(&[("email", Value::from("a@b"))]))
        .unwrap();
    assert!(fixture.graph.add_labels(unlabeled.id, &["User"]).is_err());
}

#[test]
fn test_unique_index_guards_uniqueness() {
    let fixture = TestFixture::new();
    fixture.query("CREATE UNIQUE INDEX FOR (u:Account) ON (u.number)");
    fixture
        .graph
        .create_node(&["Account"], props(&[("number", Value::Int(7))]))
        .unwrap();
    let err = fixture
        .graph
        .create_node(&["Account"], props(&[("number", Value::Int(7))]))
        .unwrap_err();
    assert!(matches!(err, GrafitoError::ConstraintViolation(_)), "{err}");
}

#[test]
fn test_existence_constraint() {
    let fixture = TestFixture::new();
    fixture.query("CREATE CONSTRAINT FOR (p:Person) REQUIRE p.name IS NOT NULL");
    assert!(fixture.graph.create_node(&["Person"], Properties::new()).is_err());
    assert!(fixture
        .graph
        .create_node(&["Person"], props(&[("name", Value::Null)]))
        .is_err());
    fixture
        .graph
        .create_node(&["Person"], props(&[("name", Value::from("ok"))]))
        .unwrap();
}

#[test]
fn test_type_constraint() {
    let fixture = TestFixture::new();
    fixture.query("CREATE CONSTRAINT FOR (p:Person) REQUIRE p.age IS :: INTEGER");
    // Missing and wrongly-typed values both fail.
    assert!(fixture.graph.create_node(&["Person"], Properties::new()).is_err());
    assert!(fixture
        .graph
        .create_node(&["Person"], props(&[("age", Value::from("forty"))]))
        .is_err());
    fixture
        .graph
        .create_node(&["Person"], props(&[("age", Value::Int(40))]))
        .unwrap();
}

#[test]
fn test_constraint_over_violating_data_is_rejected() {
    let fixture = TestFixture::new();
    fixture
        .graph
        .create_node(&["User"], props(&[("email", Value::from("dup"))]))
        .unwrap();
    fixture
        .graph
        .create_node(&["User"], props(&[("email", Value::from("dup"))]))
        .unwrap();
    let err =
        fixture.assert_query_fails("CREATE CONSTRAINT FOR (u:User) REQUIRE u.email IS UNIQUE");
    assert!(matches!(err, GrafitoError::ConstraintViolation(_)), "{err}");
    // The rejected constraint was not recorded.
    assert!(fixture.query("SHOW CONSTRAINTS").rows.is_empty());
}

#[test]
fn test_show_constraints_shape() {
    let fixture = TestFixture::new();
    fixture.query("CREATE CONSTRAINT person_age FOR (p:Person) REQUIRE p.age IS :: INTEGER");
    let result = fixture.query("SHOW CONSTRAINTS");
    assert_eq!(result.first("name"), Some(&Value::from("person_age")));
    assert_eq!(result.first("kind"), Some(&Value::from("type")));
    assert_eq!(result.first("value_type"), Some(&Value::from("INTEGER")));
    fixture.query("DROP CONSTRAINT person_age");
    assert!(fixture.query("SHOW CONSTRAINTS").rows.is_empty());
}

#[test]
fn test_relationship_type_constraint_via_api() {
    let fixture = TestFixture::new();
    fixture
        .graph
        .create_constraint(
            ConstraintKind::Type,
            EntityKind::Relationship,
            "RATED",
            "stars",
            Some(ScalarType::Integer),
            None,
            false,
        )
        .unwrap();
    let a = fixture.graph.create_node(&[], Properties::new()).unwrap();
    let b = fixture.graph.create_node(&[], Properties::new()).unwrap();
    assert!(fixture
        .graph
        .create_relationship(a.id, b.id, "RATED", props(&[("stars", Value::from("five"))]))
        .is_err());
    fixture
        .graph
        .create_relationship(a.id, b.id, "RATED", props(&[("stars", Value::Int(5))]))
        .unwrap();
}

#[test]
fn test_constraint_violation_in_query_rolls_back() {
    let fixture = TestFixture::new();
    fixture.query("CREATE CONSTRAINT FOR (u:User) REQUIRE u.email IS UNIQUE");
    fixture.query("CREATE (:User {email: 'a@b'})");
    let err = fixture.assert_query_fails("CREATE (:User {email: 'x'}), (:User {email: 'a@b'})");
    assert!(matches!(err, GrafitoError::ConstraintViolation(_)), "{err}");
    // The first node of the failed statement is gone too.
    fixture.assert_first_value(
        "MATCH (u:User) RETURN count(u) AS n",
        "n",
        Value::Int(1),
    );
}
