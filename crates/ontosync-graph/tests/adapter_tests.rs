//! Graph schema adapter tests against the in-memory mirror

use ontosync_graph::{CypherStatement, GraphConfig, GraphSchemaAdapter, MemoryGraph};
use ontosync_model::{Backend, ClientError, EntityTemplate, RelationshipTemplate, SchemaError};
use proptest::prelude::*;
use serde_json::Value;
use std::sync::Arc;

fn adapter() -> (GraphSchemaAdapter, MemoryGraph) {
    let graph = MemoryGraph::new();
    let adapter = GraphSchemaAdapter::new(Arc::new(graph.clone()), GraphConfig::default());
    (adapter, graph)
}

fn mirror_chain(adapter: &GraphSchemaAdapter) {
    adapter
        .mirror_entity_template(&EntityTemplate::new("A", "A"))
        .unwrap();
    adapter
        .mirror_entity_template(&EntityTemplate::new("B", "B").extending("A"))
        .unwrap();
    adapter
        .mirror_entity_template(&EntityTemplate::new("C", "C").extending("B"))
        .unwrap();
    adapter
        .mirror_entity_template(&EntityTemplate::new("Other", "Other"))
        .unwrap();
    adapter
        .mirror_entity_template(&EntityTemplate::new("Thing", "Thing"))
        .unwrap();
}

// ============================================================================
// Ancestor-aware lookup
// ============================================================================

#[test]
fn test_relationship_on_grandparent_is_found_from_grandchild() {
    let (adapter, graph) = adapter();
    mirror_chain(&adapter);
    adapter
        .mirror_relationship_template(&RelationshipTemplate::new("aOwnsThing", "owns", "A", "Thing"))
        .unwrap();

    assert_eq!(
        adapter.find_by_cet_and_name("C", "owns").unwrap(),
        vec!["aOwnsThing".to_string()]
    );
    assert_eq!(graph.parent_of("C").as_deref(), Some("B"));
}

#[test]
fn test_lookup_excludes_unrelated_templates_and_other_names() {
    let (adapter, _graph) = adapter();
    mirror_chain(&adapter);
    adapter
        .mirror_relationship_template(&RelationshipTemplate::new("otherOwns", "owns", "Other", "Thing"))
        .unwrap();
    adapter
        .mirror_relationship_template(&RelationshipTemplate::new("aUses", "uses", "A", "Thing"))
        .unwrap();
    adapter
        .mirror_relationship_template(&RelationshipTemplate::new("ownedByB", "owns", "Thing", "B"))
        .unwrap();

    // End-node attachment on an ancestor counts too
    assert_eq!(
        adapter.find_by_cet_and_name("C", "owns").unwrap(),
        vec!["ownedByB".to_string()]
    );
    assert!(adapter.find_by_cet_and_name("A", "owns").unwrap().is_empty());
    assert!(adapter.find_by_cet_and_name("Missing", "owns").unwrap().is_empty());
}

#[test]
fn test_lookup_is_one_statement_in_one_session() {
    let (adapter, graph) = adapter();
    mirror_chain(&adapter);
    let opened = graph.sessions_opened();

    adapter.find_by_cet_and_name("C", "owns").unwrap();

    assert_eq!(graph.sessions_opened(), opened + 1);
    assert_eq!(graph.open_sessions(), 0);
    assert_eq!(
        graph.statement_log().last().map(String::as_str),
        Some("crt.by_cet_and_name")
    );
}

// ============================================================================
// Directional lookup
// ============================================================================

#[test]
fn test_directional_lookup_ignores_storage_direction() {
    let (adapter, _graph) = adapter();
    mirror_chain(&adapter);
    adapter
        .mirror_relationship_template(&RelationshipTemplate::new("owns", "owns", "A", "Thing"))
        .unwrap();
    adapter
        .mirror_relationship_template(&RelationshipTemplate::new("sells", "sells", "Thing", "A"))
        .unwrap();

    let forward = adapter.find_by_source_or_target("A", "Thing").unwrap();
    let backward = adapter.find_by_source_or_target("Thing", "A").unwrap();
    assert_eq!(forward, backward);
    assert_eq!(
        forward.iter().map(|r| r.code.as_str()).collect::<Vec<_>>(),
        vec!["owns", "sells"]
    );

    let named = adapter
        .find_by_name_and_source_or_target("Thing", "A", "owns")
        .unwrap();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].start_node, "A");
    assert_eq!(named[0].end_node, "Thing");

    assert!(adapter
        .find_by_start_end_and_name("Thing", "A", "owns")
        .unwrap()
        .is_empty());
    assert_eq!(
        adapter.find_by_start_end_and_name("A", "Thing", "owns").unwrap(),
        named
    );
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_directional_lookup_is_symmetric(
        edges in prop::collection::vec((0usize..4, 0usize..4, 0usize..2), 0..12),
        x in 0usize..4,
        y in 0usize..4,
    ) {
        let nodes = ["N", "M", "P", "Q"];
        let names = ["owns", "uses"];
        let (adapter, _graph) = adapter();
        for code in nodes {
            adapter.mirror_entity_template(&EntityTemplate::new(code, code)).unwrap();
        }
        for (i, (start, end, name)) in edges.iter().enumerate() {
            let code = format!("rel{}", (b'a' + i as u8) as char);
            let crt = RelationshipTemplate::new(&code, names[*name], nodes[*start], nodes[*end]);
            adapter.mirror_relationship_template(&crt).unwrap();
        }

        let forward = adapter.find_by_source_or_target(nodes[x], nodes[y]).unwrap();
        let backward = adapter.find_by_source_or_target(nodes[y], nodes[x]).unwrap();
        prop_assert_eq!(&forward, &backward);

        for name in names {
            let forward = adapter.find_by_name_and_source_or_target(nodes[x], nodes[y], name).unwrap();
            let backward = adapter.find_by_name_and_source_or_target(nodes[y], nodes[x], name).unwrap();
            prop_assert_eq!(forward, backward);
        }
    }
}

// ============================================================================
// Mirror maintenance and failures
// ============================================================================

#[test]
fn test_relationship_needs_mirrored_endpoints() {
    let (adapter, graph) = adapter();
    adapter
        .mirror_entity_template(&EntityTemplate::new("Person", "Person"))
        .unwrap();

    let err = adapter
        .mirror_relationship_template(&RelationshipTemplate::new("owns", "owns", "Person", "Car"))
        .unwrap_err();
    assert!(matches!(err, SchemaError::Validation { .. }), "unexpected error: {err}");
    assert!(graph.relationship_codes().is_empty());
}

#[test]
fn test_unmirror_removes_nodes() {
    let (adapter, graph) = adapter();
    mirror_chain(&adapter);
    let crt = RelationshipTemplate::new("owns", "owns", "A", "Thing").unique(true);
    adapter.mirror_relationship_template(&crt).unwrap();
    assert_eq!(graph.relationship_is_unique("owns"), Some(true));

    adapter.unmirror_relationship_template("owns").unwrap();
    assert!(graph.relationship_codes().is_empty());

    adapter.unmirror_entity_template("B").unwrap();
    assert!(!graph.entity_codes().contains(&"B".to_string()));
    assert_eq!(graph.parent_of("C"), None);
}

#[test]
fn test_driver_failure_is_wrapped_with_operation() {
    let (adapter, graph) = adapter();
    graph.fail_next(
        "crt.by_source_or_target",
        ClientError::new(Backend::Graph, "database unavailable")
            .with_status("Neo.TransientError.General.DatabaseUnavailable"),
    );
    graph.fail_next_close(ClientError::new(Backend::Graph, "socket closed"));

    let err = adapter.find_by_source_or_target("A", "B").unwrap_err();
    match err {
        SchemaError::Execution {
            code,
            operation,
            source,
        } => {
            assert_eq!(code, "A");
            assert_eq!(operation, "find relationships by source or target");
            assert_eq!(source.message, "database unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(graph.open_sessions(), 0);
    assert_eq!(graph.rollbacks(), 1);
}

#[test]
fn test_run_raw_returns_rows() {
    let (adapter, graph) = adapter();
    let mut row = serde_json::Map::new();
    row.insert("count".into(), Value::from(3));
    graph.respond_to("MATCH (n) RETURN count(n) AS count", vec![row.clone()]);

    let rows = adapter
        .run_raw(&CypherStatement::raw("MATCH (n) RETURN count(n) AS count"))
        .unwrap();
    assert_eq!(rows, vec![row]);

    let err = adapter
        .run_raw(&CypherStatement::raw("MATCH (n) DELETE n"))
        .unwrap_err();
    assert!(matches!(err, SchemaError::Execution { .. }));
}
