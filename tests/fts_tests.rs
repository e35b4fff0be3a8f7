//! Text-index subsystem tests: trigger-maintained documents, rebuild
//! and BM25 search

#[path = "testutils/mod.rs"]
mod testutils;

use grafito::{EntityKind, FtsConfigEntry, Properties, Value};
use testutils::TestFixture;

fn config(entity: EntityKind, label: Option<&str>, property: &str) -> FtsConfigEntry {
    FtsConfigEntry {
        entity,
        label_or_type: label.map(str::to_string),
        property: property.to_string(),
        weight: None,
    }
}

fn article_fixture() -> TestFixture {
    let fixture = TestFixture::new();
    fixture
        .graph
        .add_fts_config(config(EntityKind::Node, Some("Article"), "body"))
        .unwrap();
    fixture
}

#[test]
fn test_insert_is_indexed_through_triggers() {
    let fixture = article_fixture();
    fixture.query("CREATE (:Article {body: 'sqlite powers the storage layer'})");
    fixture.query("CREATE (:Article {body: 'vectors power similarity'})");
    let hits = fixture
        .graph
        .text_search("storage", None, None, &[], &Properties::new())
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].score >= 0.0, "similarity is non-negative");
    assert!(hits[0].content.contains("storage"));
    assert!(hits[0].node.is_some());
}

#[test]
fn test_label_scoped_config_ignores_other_nodes() {
    let fixture = article_fixture();
    fixture.query("CREATE (:Article {body: 'about graphs'})");
    fixture.query("CREATE (:Note {body: 'about graphs'})");
    let hits = fixture
        .graph
        .text_search("graphs", None, None, &[], &Properties::new())
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_update_replaces_document() {
    let fixture = article_fixture();
    fixture.query("CREATE (:Article {title: 't', body: 'original wording'})");
    fixture.query("MATCH (a:Article) SET a.body = 'rewritten text'");
    assert!(fixture
        .graph
        .text_search("original", None, None, &[], &Properties::new())
        .unwrap()
        .is_empty());
    assert_eq!(
        fixture
            .graph
            .text_search("rewritten", None, None, &[], &Properties::new())
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_delete_removes_document() {
    let fixture = article_fixture();
    fixture.query("CREATE (:Article {body: 'ephemeral content'})");
    fixture.query("MATCH (a:Article) DETACH DELETE a");
    assert!(fixture
        .graph
        .text_search("ephemeral", None, None, &[], &Properties::new())
        .unwrap()
        .is_empty());
}

#[test]
fn test_label_detach_removes_document() {
    let fixture = article_fixture();
    fixture.query("CREATE (:Article {body: 'labeled content'})");
    fixture.query("MATCH (a:Article) REMOVE a:Article");
    assert!(fixture
        .graph
        .text_search("labeled", None, None, &[], &Properties::new())
        .unwrap()
        .is_empty());
}

#[test]
fn test_relationship_documents() {
    let fixture = TestFixture::new();
    fixture
        .graph
        .add_fts_config(config(EntityKind::Relationship, Some("REVIEWED"), "comment"))
        .unwrap();
    fixture.query(
        "CREATE (:U {name:'u'})-[:REVIEWED {comment: 'excellent throughput'}]->(:Repo)",
    );
    let hits = fixture
        .graph
        .text_search("throughput", None, None, &[], &Properties::new())
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity, EntityKind::Relationship);
    assert!(hits[0].node.is_none());
}

#[test]
fn test_rebuild_reindexes_existing_content() {
    let fixture = TestFixture::new();
    // Content created before the config exists is picked up at
    // config-add time and again by rebuild.
    fixture.query("CREATE (:Article {body: 'pre-existing words'})");
    fixture
        .graph
        .add_fts_config(config(EntityKind::Node, Some("Article"), "body"))
        .unwrap();
    assert_eq!(
        fixture
            .graph
            .text_search("words", None, None, &[], &Properties::new())
            .unwrap()
            .len(),
        1
    );
    fixture.graph.rebuild_fts().unwrap();
    assert_eq!(
        fixture
            .graph
            .text_search("words", None, None, &[], &Properties::new())
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_post_hoc_label_and_property_filters() {
    let fixture = TestFixture::new();
    fixture
        .graph
        .add_fts_config(config(EntityKind::Node, None, "body"))
        .unwrap();
    fixture.query("CREATE (:Draft {body: 'shared phrase', lang: 'en'})");
    fixture.query("CREATE (:Final {body: 'shared phrase', lang: 'de'})");

    let drafts = fixture
        .graph
        .text_search("phrase", None, None, &["Draft"], &Properties::new())
        .unwrap();
    assert_eq!(drafts.len(), 1);

    let mut filters = Properties::new();
    filters.insert("lang".to_string(), Value::from("de"));
    let german = fixture
        .graph
        .text_search("phrase", None, None, &[], &filters)
        .unwrap();
    assert_eq!(german.len(), 1);
}

#[test]
fn test_k_limits_results() {
    let fixture = article_fixture();
    for i in 0..10 {
        fixture.query(&format!("CREATE (:Article {{body: 'common term {i}'}})"));
    }
    let hits = fixture
        .graph
        .text_search("common", Some(3), None, &[], &Properties::new())
        .unwrap();
    assert_eq!(hits.len(), 3);
}

#[test]
fn test_fulltext_search_procedure() {
    let fixture = article_fixture();
    fixture.query("CREATE (:Article {body: 'procedure surfaced content'})");
    let result = fixture.query(
        "CALL db.index.fulltext.search('surfaced', {k: 5}) \
         YIELD entity_id, content, score, node \
         RETURN entity_id, content, score, node",
    );
    assert_eq!(result.rows.len(), 1);
    assert!(matches!(result.first("node"), Some(Value::Node(_))));
}

#[test]
fn test_remove_config_drops_documents() {
    let fixture = article_fixture();
    fixture.query("CREATE (:Article {body: 'disappearing act'})");
    fixture
        .graph
        .remove_fts_config(EntityKind::Node, Some("Article"), "body")
        .unwrap();
    assert!(fixture
        .graph
        .text_search("disappearing", None, None, &[], &Properties::new())
        .unwrap()
        .is_empty());
    // And mutations after removal no longer index.
    fixture.query("CREATE (:Article {body: 'disappearing again'})");
    assert!(fixture
        .graph
        .text_search("again", None, None, &[], &Properties::new())
        .unwrap()
        .is_empty());
}
