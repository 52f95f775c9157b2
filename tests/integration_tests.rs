//! Integration tests for the complete Ontosync pipeline
//!
//! These tests drive the ontology service end to end across crates:
//! - config file → service wiring → table naming and graph mirror
//! - template lifecycle → relational schema → GraphQL IDL
//! - storage changes → reconciliation → field storages
//!
//! Run with: cargo test --test integration_tests

use ontosync_core::{
    plan_reconciliation, MemoryTemplateStore, OntologyService, SyncConfig, TemplateStore,
};
use ontosync_graph::MemoryGraph;
use ontosync_model::{
    storages, AppliesTo, CustomField, EntityTemplate, FieldType, RelationshipTemplate,
    SchemaError, StorageTarget, TemplateRef,
};
use ontosync_sql::MemoryRelationalExecutor;
use std::sync::Arc;
use tempfile::tempdir;

const SQL: &[StorageTarget] = &[StorageTarget::Sql];
const BOTH: &[StorageTarget] = &[StorageTarget::Sql, StorageTarget::Neo4j];

struct Pipeline {
    service: OntologyService,
    store: Arc<MemoryTemplateStore>,
    db: MemoryRelationalExecutor,
    graph: MemoryGraph,
}

fn pipeline(config: &SyncConfig) -> Pipeline {
    let store = Arc::new(MemoryTemplateStore::new());
    let db = MemoryRelationalExecutor::new();
    let graph = MemoryGraph::new();
    let service = OntologyService::new(
        store.clone(),
        Arc::new(db.clone()),
        Arc::new(graph.clone()),
        config,
    );
    Pipeline {
        service,
        store,
        db,
        graph,
    }
}

fn config_from_file() -> SyncConfig {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ontosync.json");
    let json = serde_json::json!({
        "sql": { "table_prefix": "cust_", "default_string_length": 100 },
        "graph": { "database": "ontology" }
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&json).unwrap()).unwrap();
    SyncConfig::from_path(&path).unwrap()
}

// ============================================================================
// Configuration → wiring
// ============================================================================

#[test]
fn test_config_file_drives_table_names() {
    let config = config_from_file();
    assert_eq!(config.sql.default_string_length, 100);
    assert_eq!(config.graph.database.as_deref(), Some("ontology"));

    let p = pipeline(&config);
    p.service
        .create_entity_template(EntityTemplate::new("Person", "Person").stored_in(BOTH))
        .unwrap();
    p.service
        .add_field(
            CustomField::new("name", AppliesTo::entity("Person"), FieldType::String)
                .required()
                .stored_in(SQL),
        )
        .unwrap();

    assert_eq!(p.db.table_names("default"), vec!["cust_person".to_string()]);
    let table = p.db.describe("default", "cust_person").unwrap();
    assert!(table.column("uuid").is_some());
    assert!(table.column("name").is_some());
    assert_eq!(p.graph.entity_name("Person").as_deref(), Some("Person"));
}

// ============================================================================
// Template lifecycle
// ============================================================================

#[test]
fn test_full_ontology_lifecycle() {
    let p = pipeline(&config_from_file());

    p.service
        .create_entity_template(EntityTemplate::new("Person", "Person").stored_in(BOTH))
        .unwrap();
    p.service
        .create_entity_template(EntityTemplate::new("Driver", "Driver").extending("Person"))
        .unwrap();
    p.service
        .create_entity_template(EntityTemplate::new("Car", "Car").stored_in(SQL))
        .unwrap();
    p.service
        .add_field(CustomField::new("plate", AppliesTo::entity("Car"), FieldType::String).identifier())
        .unwrap();
    p.service
        .create_relationship_template(
            RelationshipTemplate::new("owns", "owns", "Person", "Car")
                .stored_in(SQL)
                .source_names(Some("car"), None)
                .target_names(Some("owner"), None)
                .unique(true),
        )
        .unwrap();

    // Relational side: relationship table points at both endpoint tables
    let owns = p.db.describe("default", "cust_owns").unwrap();
    assert!(owns.column("source").is_some());
    assert!(owns.column("target").is_some());

    // Graph side: inherited relationship lookup
    assert_eq!(
        p.service.relationships_of("Driver", "owns").unwrap(),
        vec!["owns".to_string()]
    );
    assert_eq!(p.graph.parent_of("Driver").as_deref(), Some("Person"));
    assert!(p.service.is_unique("owns").unwrap());

    // IDL: relationship fields reach the sub-template
    let idl = p.service.graphql_idl().unwrap();
    assert!(idl.contains("type Driver {\n\tcar: Car @relation(name: \"owns\", direction: OUT)\n}"));
    assert!(idl.contains("\tplate: ID!\n"));

    // Tear down in dependency order
    assert!(matches!(
        p.service.remove_entity_template("Person"),
        Err(SchemaError::Dependency { .. })
    ));
    p.service.remove_relationship_template("owns").unwrap();
    p.service.remove_entity_template("Driver").unwrap();
    p.service.remove_entity_template("Person").unwrap();
    p.service.remove_entity_template("Car").unwrap();

    assert!(p.db.table_names("default").is_empty());
    assert!(p.graph.entity_codes().is_empty());
    assert!(p.store.list_entities().unwrap().is_empty());
    assert_eq!(p.graph.open_sessions(), 0);
}

// ============================================================================
// Storage changes → reconciliation
// ============================================================================

#[test]
fn test_storage_round_trip_restores_columns() {
    let p = pipeline(&SyncConfig::default());
    p.service
        .create_entity_template(EntityTemplate::new("Person", "Person").stored_in(BOTH))
        .unwrap();
    p.service
        .add_field(CustomField::new("name", AppliesTo::entity("Person"), FieldType::String).stored_in(BOTH))
        .unwrap();
    p.service
        .add_field(
            CustomField::new("nickname", AppliesTo::entity("Person"), FieldType::String)
                .stored_in(&[StorageTarget::Neo4j]),
        )
        .unwrap();

    let dropped = p
        .service
        .update_entity_template(EntityTemplate::new("Person", "Person").stored_in(&[StorageTarget::Neo4j]))
        .unwrap();
    assert!(dropped.table_dropped);
    assert_eq!(dropped.fields_updated, vec!["name".to_string()]);

    // Every field of the scope gets a column when the table comes back
    let recreated = p
        .service
        .update_entity_template(EntityTemplate::new("Person", "Person").stored_in(BOTH))
        .unwrap();
    assert!(recreated.table_created);
    assert_eq!(
        recreated.columns_added,
        vec!["name".to_string(), "nickname".to_string()]
    );
    let table = p.db.describe("default", "person").unwrap();
    assert!(table.column("name").is_some());
    assert!(table.column("nickname").is_some());

    for field in p.service.registry().fields_of(&AppliesTo::entity("Person")).unwrap() {
        assert_eq!(field.storages, storages(BOTH));
    }
    assert!(p
        .service
        .synchronize_storages(&TemplateRef::entity("Person"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_reconciliation_plan_serializes_for_audit() {
    let fields = vec![
        CustomField::new("name", AppliesTo::entity("Person"), FieldType::String).stored_in(BOTH),
        CustomField::new("age", AppliesTo::entity("Person"), FieldType::Long).stored_in(SQL),
    ];
    let plan = plan_reconciliation(
        "person",
        &storages(BOTH),
        &storages(&[StorageTarget::Neo4j]),
        &fields,
    );

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            { "op": "drop_table", "table": "person" },
            { "op": "strip_field_storage", "field": "name", "removed": ["SQL"] },
            { "op": "strip_field_storage", "field": "age", "removed": ["SQL"] }
        ])
    );
}
