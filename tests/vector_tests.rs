//! Vector-index subsystem tests: backend correctness, the filter
//! pipeline, rerankers and embedding functions

#[path = "testutils/mod.rs"]
mod testutils;

use grafito::{
    EmbeddingFunction, GrafitoError, Properties, Value, VectorQuery,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use testutils::TestFixture;

fn options(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Three labeled nodes with unit-ish vectors in a brute-force index
fn seeded(fixture: &TestFixture, index_options: BTreeMap<String, Value>) -> (i64, i64, i64) {
    fixture
        .graph
        .create_vector_index("vectors", 3, "brute", index_options)
        .unwrap();
    let mut make = |name: &str, vec: [f32; 3]| {
        let mut props = Properties::new();
        props.insert("name".to_string(), Value::from(name));
        let node = fixture.graph.create_node(&["Doc"], props).unwrap();
        fixture
            .graph
            .upsert_embedding("vectors", node.id, Some(vec.to_vec()), None)
            .unwrap();
        node.id
    };
    (
        make("n1", [1.0, 0.0, 0.0]),
        make("n2", [0.0, 1.0, 0.0]),
        make("n3", [0.9, 0.1, 0.0]),
    )
}

#[test]
fn test_brute_force_l2_order() {
    let fixture = TestFixture::new();
    let (n1, _n2, n3) = seeded(&fixture, options(&[("metric", Value::from("l2"))]));
    let hits = fixture
        .graph
        .vector_search(
            "vectors",
            VectorQuery {
                vector: Some(vec![1.0, 0.0, 0.0]),
                k: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
    let ids: Vec<i64> = hits.iter().map(|h| h.node_id).collect();
    assert_eq!(ids, vec![n1, n3]);
    assert!(hits[0].score <= hits[1].score);
    assert!(hits[0].node.is_some());
}

#[test]
fn test_dimension_mismatch_is_index_error() {
    let fixture = TestFixture::new();
    fixture
        .graph
        .create_vector_index("vectors", 3, "brute", BTreeMap::new())
        .unwrap();
    let node = fixture.graph.create_node(&[], Properties::new()).unwrap();
    let err = fixture
        .graph
        .upsert_embedding("vectors", node.id, Some(vec![1.0, 0.0]), None)
        .unwrap_err();
    assert!(matches!(err, GrafitoError::Index(_)), "{err}");
}

#[test]
fn test_unknown_index_is_index_error() {
    let fixture = TestFixture::new();
    let err = fixture
        .graph
        .vector_search("missing", VectorQuery::default())
        .unwrap_err();
    assert!(matches!(err, GrafitoError::Index(_)), "{err}");
}

#[test]
fn test_label_and_property_prefilter() {
    let fixture = TestFixture::new();
    fixture
        .graph
        .create_vector_index("vectors", 2, "brute", BTreeMap::new())
        .unwrap();
    for (name, label, vec) in [
        ("a", "Red", [1.0_f32, 0.0]),
        ("b", "Blue", [0.99, 0.01]),
        ("c", "Red", [0.0, 1.0]),
    ] {
        let mut props = Properties::new();
        props.insert("name".to_string(), Value::from(name));
        let node = fixture.graph.create_node(&[label], props).unwrap();
        fixture
            .graph
            .upsert_embedding("vectors", node.id, Some(vec.to_vec()), None)
            .unwrap();
    }
    let hits = fixture
        .graph
        .vector_search(
            "vectors",
            VectorQuery {
                vector: Some(vec![1.0, 0.0]),
                k: Some(2),
                labels: vec!["Red".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
    // b is nearer but filtered out by label.
    let names: Vec<&Value> = hits
        .iter()
        .map(|h| h.node.as_ref().unwrap().property("name").unwrap())
        .collect();
    assert_eq!(names, vec![&Value::from("a"), &Value::from("c")]);
}

#[test]
fn test_deleted_nodes_never_surface() {
    let fixture = TestFixture::new();
    let (n1, _n2, n3) = seeded(&fixture, BTreeMap::new());
    fixture.graph.delete_node(n1).unwrap();
    let hits = fixture
        .graph
        .vector_search(
            "vectors",
            VectorQuery {
                vector: Some(vec![1.0, 0.0, 0.0]),
                k: Some(3),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(hits.iter().all(|h| h.node_id != n1));
    assert_eq!(hits[0].node_id, n3);
}

#[test]
fn test_rerank_identity_requires_stored_embeddings() {
    let fixture = TestFixture::new();
    // brute retains vectors, so identity rerank works even without the
    // flag; hnsw also retains them. The flag is what the contract
    // guarantees, so exercise the guaranteed path.
    seeded(
        &fixture,
        options(&[("store_embeddings", Value::Bool(true))]),
    );
    let hits = fixture
        .graph
        .vector_search(
            "vectors",
            VectorQuery {
                vector: Some(vec![1.0, 0.0, 0.0]),
                k: Some(1),
                rerank: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_custom_reranker_order_is_authoritative() {
    let fixture = TestFixture::new();
    let (_n1, n2, _n3) = seeded(&fixture, BTreeMap::new());
    // A reranker that sorts by id descending, ignoring distance.
    fixture.graph.register_reranker(
        "by_id_desc",
        Arc::new(|_query, candidates| {
            let mut out: Vec<(i64, f64)> =
                candidates.iter().map(|c| (c.id, c.score)).collect();
            out.sort_by(|a, b| b.0.cmp(&a.0));
            Ok(out)
        }),
    );
    let hits = fixture
        .graph
        .vector_search(
            "vectors",
            VectorQuery {
                vector: Some(vec![0.0, 1.0, 0.0]),
                k: Some(1),
                rerank: true,
                reranker: Some("by_id_desc".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    // Highest id wins regardless of similarity (n3 was created last).
    assert!(hits[0].node_id > n2);
}

#[test]
fn test_unknown_reranker_is_configuration_error() {
    let fixture = TestFixture::new();
    seeded(&fixture, BTreeMap::new());
    let err = fixture
        .graph
        .vector_search(
            "vectors",
            VectorQuery {
                vector: Some(vec![1.0, 0.0, 0.0]),
                rerank: true,
                reranker: Some("nope".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, GrafitoError::Configuration(_)), "{err}");
}

struct CharCountEmbedder;

impl EmbeddingFunction for CharCountEmbedder {
    fn embed(&self, text: &str) -> grafito::Result<Vec<f32>> {
        // Toy embedding: [len, vowels, consonants]
        let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count() as f32;
        let len = text.chars().count() as f32;
        Ok(vec![len, vowels, len - vowels])
    }
}

#[test]
fn test_text_upsert_through_embedding_function() {
    let fixture = TestFixture::new();
    fixture
        .graph
        .register_embedding_function("chars", Arc::new(CharCountEmbedder));
    fixture
        .graph
        .create_vector_index(
            "texts",
            3,
            "brute",
            options(&[("embedding_fn", Value::from("chars"))]),
        )
        .unwrap();
    let node = fixture.graph.create_node(&[], Properties::new()).unwrap();
    fixture
        .graph
        .upsert_embedding("texts", node.id, None, Some("hello"))
        .unwrap();
    let hits = fixture
        .graph
        .vector_search(
            "texts",
            VectorQuery {
                text: Some("hello".to_string()),
                k: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(hits[0].node_id, node.id);
    assert!(hits[0].score < 1e-6);
}

#[test]
fn test_text_upsert_without_embedder_is_configuration_error() {
    let fixture = TestFixture::new();
    fixture
        .graph
        .create_vector_index("plain", 3, "brute", BTreeMap::new())
        .unwrap();
    let node = fixture.graph.create_node(&[], Properties::new()).unwrap();
    let err = fixture
        .graph
        .upsert_embedding("plain", node.id, None, Some("text"))
        .unwrap_err();
    assert!(matches!(err, GrafitoError::Configuration(_)), "{err}");
}

#[test]
fn test_hnsw_agrees_with_brute_force_on_small_data() {
    let fixture = TestFixture::new();
    fixture
        .graph
        .create_vector_index(
            "approx",
            3,
            "hnsw",
            options(&[("store_embeddings", Value::Bool(true))]),
        )
        .unwrap();
    fixture
        .graph
        .create_vector_index("exact", 3, "brute", BTreeMap::new())
        .unwrap();
    let mut ids = Vec::new();
    for i in 0..20 {
        let node = fixture.graph.create_node(&[], Properties::new()).unwrap();
        let v = vec![(i as f32 * 0.7).sin(), (i as f32 * 0.3).cos(), i as f32 / 20.0];
        fixture
            .graph
            .upsert_embedding("approx", node.id, Some(v.clone()), None)
            .unwrap();
        fixture
            .graph
            .upsert_embedding("exact", node.id, Some(v), None)
            .unwrap();
        ids.push(node.id);
    }
    let query = VectorQuery {
        vector: Some(vec![0.5, 0.5, 0.5]),
        k: Some(1),
        ..Default::default()
    };
    let exact = fixture.graph.vector_search("exact", query.clone()).unwrap();
    // With rerank over stored embeddings, the approximate top-1 equals
    // the brute-force top-1 on data small enough to saturate the pool.
    let approx = fixture
        .graph
        .vector_search(
            "approx",
            VectorQuery {
                rerank: true,
                ..query
            },
        )
        .unwrap();
    assert_eq!(approx[0].node_id, exact[0].node_id);
}

#[test]
fn test_persist_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("vectors.bin");
    let db_path = dir.path().join("graph.sqlite");

    let ids;
    {
        let graph = grafito::Graph::open(&db_path).unwrap();
        graph
            .create_vector_index(
                "vectors",
                2,
                "brute",
                options(&[(
                    "persist_path",
                    Value::from(index_path.to_str().unwrap()),
                )]),
            )
            .unwrap();
        let a = graph.create_node(&[], Properties::new()).unwrap();
        let b = graph.create_node(&[], Properties::new()).unwrap();
        graph
            .upsert_embedding("vectors", a.id, Some(vec![1.0, 0.0]), None)
            .unwrap();
        graph
            .upsert_embedding("vectors", b.id, Some(vec![0.0, 1.0]), None)
            .unwrap();
        graph.persist_vector_index("vectors", None).unwrap();
        ids = (a.id, b.id);
    }

    let graph = grafito::Graph::open(&db_path).unwrap();
    let hits = graph
        .vector_search(
            "vectors",
            VectorQuery {
                vector: Some(vec![1.0, 0.0]),
                k: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(hits[0].node_id, ids.0);
}

#[test]
fn test_vector_search_procedure_via_call() {
    let fixture = TestFixture::new();
    let (n1, _n2, _n3) = seeded(&fixture, BTreeMap::new());
    let result = fixture.query(
        "CALL db.vector.search('vectors', [1.0, 0.0, 0.0], 2) \
         YIELD node, score RETURN node, score",
    );
    assert_eq!(result.rows.len(), 2);
    let Some(Value::Node(node)) = result.first("node") else {
        panic!("node expected");
    };
    assert_eq!(node.id, n1);
}

#[test]
fn test_vector_search_procedure_with_options() {
    let fixture = TestFixture::new();
    seeded(&fixture, BTreeMap::new());
    let result = fixture.query(
        "CALL db.vector.search('vectors', [1.0, 0.0, 0.0], 2, \
              {labels: ['Doc'], properties: {name: 'n3'}}) \
         YIELD node, score \
         RETURN node.name AS name",
    );
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.first("name"), Some(&Value::from("n3")));
}
