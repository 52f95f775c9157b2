//! Ontology service: template and field lifecycle.
//!
//! Every mutation validates first, then applies the idempotent schema
//! changes, then records the definition. A failure after the schema step
//! leaves DDL behind that the next attempt will find in place.

use crate::config::SyncConfig;
use crate::graphql::GraphQlGenerator;
use crate::reconcile::{ReconciliationReport, StorageReconciler};
use crate::registry::TemplateRegistry;
use crate::store::TemplateStore;
use crate::uniqueness::UniquenessCache;
use ontosync_graph::{GraphDriver, GraphSchemaAdapter};
use ontosync_model::{
    AppliesTo, CustomField, EntityTemplate, RelationshipTemplate, Result, SchemaError,
    StorageSet, StorageTarget, TemplateKind, TemplateRef,
};
use ontosync_sql::{RelationalExecutor, RelationalSchemaAdapter, TableSource};
use std::sync::Arc;

pub struct OntologyService {
    registry: Arc<TemplateRegistry>,
    sql: Arc<RelationalSchemaAdapter>,
    graph: GraphSchemaAdapter,
    reconciler: StorageReconciler,
    uniqueness: UniquenessCache,
    idl: GraphQlGenerator,
}

impl OntologyService {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        relational: Arc<dyn RelationalExecutor>,
        graph: Arc<dyn GraphDriver>,
        config: &SyncConfig,
    ) -> Self {
        let registry = Arc::new(TemplateRegistry::new(Arc::clone(&store)));
        let sql = Arc::new(RelationalSchemaAdapter::new(relational, config.sql.clone()));
        Self {
            reconciler: StorageReconciler::new(Arc::clone(&registry), Arc::clone(&sql)),
            uniqueness: UniquenessCache::new(store),
            idl: GraphQlGenerator::new(Arc::clone(&registry)),
            graph: GraphSchemaAdapter::new(graph, config.graph.clone()),
            registry,
            sql,
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn relational(&self) -> &RelationalSchemaAdapter {
        &self.sql
    }

    pub fn graph(&self) -> &GraphSchemaAdapter {
        &self.graph
    }

    pub fn uniqueness(&self) -> &UniquenessCache {
        &self.uniqueness
    }

    // ========================================================================
    // Entity templates
    // ========================================================================

    pub fn create_entity_template(&self, cet: EntityTemplate) -> Result<()> {
        self.registry.validate_entity(&cet)?;
        self.registry.ensure_code_available(&cet.code)?;

        if cet.available_storages.contains(&StorageTarget::Sql) {
            self.sql
                .create_table(TableSource::Entity(&cet))
                .map_err(|e| e.for_template(&cet.code))?;
        }
        self.graph.mirror_entity_template(&cet)?;

        let code = cet.code.clone();
        self.registry.store().insert_entity(cet)?;
        tracing::info!(template = %code, "created entity template");
        Ok(())
    }

    /// Replace an entity template, reconciling storages first.
    pub fn update_entity_template(&self, cet: EntityTemplate) -> Result<ReconciliationReport> {
        let previous = self.registry.require_entity(&cet.code)?;
        self.registry.validate_entity(&cet)?;

        let report = self.reconciler.reconcile_storage(
            TableSource::Entity(&cet),
            &previous.available_storages,
            &cet.available_storages,
        )?;
        self.registry.store().update_entity(cet.clone())?;
        self.graph.mirror_entity_template(&cet)?;
        tracing::info!(template = %cet.code, "updated entity template");
        Ok(report)
    }

    /// Refused while relationship templates or sub-templates point at it.
    pub fn remove_entity_template(&self, code: &str) -> Result<()> {
        let cet = self.registry.require_entity(code)?;

        if let Some(crt) = self
            .registry
            .relationships()?
            .into_iter()
            .find(|crt| crt.start_node == code || crt.end_node == code)
        {
            return Err(SchemaError::Dependency {
                code: code.to_string(),
                object: crt.code.clone(),
                message: format!("relationship template `{}` still uses it", crt.code),
            });
        }
        if let Some(child) = self
            .registry
            .entities()?
            .into_iter()
            .find(|child| child.super_template.as_deref() == Some(code))
        {
            return Err(SchemaError::Dependency {
                code: code.to_string(),
                object: child.code.clone(),
                message: format!("entity template `{}` extends it", child.code),
            });
        }

        if cet.available_storages.contains(&StorageTarget::Sql) {
            self.sql
                .remove_table(None, &self.sql.table_name(code))
                .map_err(|e| e.for_template(code))?;
        }
        self.remove_fields_of(&cet.applies_to())?;
        self.graph.unmirror_entity_template(code)?;
        self.registry.store().remove_entity(code)?;
        tracing::info!(template = %code, "removed entity template");
        Ok(())
    }

    // ========================================================================
    // Relationship templates
    // ========================================================================

    pub fn create_relationship_template(&self, crt: RelationshipTemplate) -> Result<()> {
        self.registry.validate_relationship(&crt)?;
        self.registry.ensure_code_available(&crt.code)?;

        if crt.available_storages.contains(&StorageTarget::Sql) {
            self.sql
                .create_table(TableSource::Relationship(&crt))
                .map_err(|e| e.for_template(&crt.code))?;
        }
        self.graph.mirror_relationship_template(&crt)?;

        let code = crt.code.clone();
        self.registry.store().insert_relationship(crt)?;
        self.registry.invalidate(&code);
        self.uniqueness.invalidate(&code);
        tracing::info!(template = %code, "created relationship template");
        Ok(())
    }

    /// Replace a relationship template. Storages are reconciled against the
    /// registry's record of the previous version.
    pub fn update_relationship_template(
        &self,
        crt: RelationshipTemplate,
    ) -> Result<ReconciliationReport> {
        let previous = self.registry.require_relationship(&crt.code)?;
        self.registry.validate_relationship(&crt)?;

        let report = self.reconciler.reconcile_storage(
            TableSource::Relationship(&crt),
            &previous.available_storages,
            &crt.available_storages,
        )?;
        self.registry.store().update_relationship(crt.clone())?;
        self.registry.invalidate(&crt.code);
        self.uniqueness.invalidate(&crt.code);
        self.graph.mirror_relationship_template(&crt)?;
        tracing::info!(template = %crt.code, "updated relationship template");
        Ok(report)
    }

    /// Cascades to the template's fields and, with relational storage, its
    /// table in the default repository.
    pub fn remove_relationship_template(&self, code: &str) -> Result<()> {
        let crt = self.registry.require_relationship(code)?;

        if crt.available_storages.contains(&StorageTarget::Sql) {
            self.sql
                .remove_table(None, &self.sql.table_name(code))
                .map_err(|e| e.for_template(code))?;
        }
        self.remove_fields_of(&crt.applies_to())?;
        self.graph.unmirror_relationship_template(code)?;
        self.registry.store().remove_relationship(code)?;
        self.registry.invalidate(code);
        self.uniqueness.invalidate(code);
        tracing::info!(template = %code, "removed relationship template");
        Ok(())
    }

    // ========================================================================
    // Custom fields
    // ========================================================================

    pub fn add_field(&self, mut field: CustomField) -> Result<()> {
        if field.identifier {
            field.required = true;
        }
        let available = self.registry.validate_field(&field)?;
        if self
            .registry
            .store()
            .find_field(&field.applies_to, &field.code)?
            .is_some()
        {
            return Err(SchemaError::conflict(
                &field.code,
                format!("field already exists on {}", field.applies_to),
            ));
        }

        let owner = owner_code(&field.applies_to)?.to_string();
        if field.is_stored_in(StorageTarget::Sql) && available.contains(&StorageTarget::Sql) {
            self.sql
                .add_column(&self.sql.table_name(&owner), &field)
                .map_err(|e| e.for_template(&owner))?;
        }
        let code = field.code.clone();
        self.registry.store().insert_field(field)?;
        tracing::info!(template = %owner, field = %code, "added custom field");
        Ok(())
    }

    /// Adds or drops the column when relational storage of the field
    /// changes. A column kept with a different type is a conflict.
    pub fn update_field(&self, mut field: CustomField) -> Result<()> {
        if field.identifier {
            field.required = true;
        }
        let previous = self
            .registry
            .store()
            .find_field(&field.applies_to, &field.code)?
            .ok_or_else(|| SchemaError::not_found("field", &field.code))?;
        let available = self.registry.validate_field(&field)?;

        let owner = owner_code(&field.applies_to)?.to_string();
        let table = self.sql.table_name(&owner);
        let relational = available.contains(&StorageTarget::Sql);
        let was_stored = relational && previous.is_stored_in(StorageTarget::Sql);
        let is_stored = relational && field.is_stored_in(StorageTarget::Sql);

        if is_stored {
            self.sql
                .add_column(&table, &field)
                .map_err(|e| e.for_template(&owner))?;
        } else if was_stored {
            self.sql
                .remove_column(&table, &field.code)
                .map_err(|e| e.for_template(&owner))?;
        }
        let code = field.code.clone();
        self.registry.store().update_field(field)?;
        tracing::info!(template = %owner, field = %code, "updated custom field");
        Ok(())
    }

    pub fn remove_field(&self, applies_to: &AppliesTo, code: &str) -> Result<()> {
        let field = self
            .registry
            .store()
            .find_field(applies_to, code)?
            .ok_or_else(|| SchemaError::not_found("field", code))?;
        let owner = owner_code(applies_to)?;
        let available = self.registry.owner_storages(applies_to)?;

        if field.is_stored_in(StorageTarget::Sql) && available.contains(&StorageTarget::Sql) {
            self.sql
                .remove_column(&self.sql.table_name(owner), code)
                .map_err(|e| e.for_template(owner))?;
        }
        self.registry.store().remove_field(applies_to, code)?;
        tracing::info!(template = %owner, field = %code, "removed custom field");
        Ok(())
    }

    fn remove_fields_of(&self, applies_to: &AppliesTo) -> Result<()> {
        for field in self.registry.fields_of(applies_to)? {
            self.registry.store().remove_field(applies_to, &field.code)?;
        }
        Ok(())
    }

    // ========================================================================
    // Storage synchronization and queries
    // ========================================================================

    /// Strip field storages the template no longer offers. Returns the codes
    /// of the fields that changed.
    pub fn synchronize_storages(&self, template: &TemplateRef) -> Result<Vec<String>> {
        match template.kind {
            TemplateKind::Entity => {
                let cet = self.registry.require_entity(&template.code)?;
                self.reconciler
                    .synchronize_storages(TableSource::Entity(&cet), &cet.available_storages)
            }
            TemplateKind::Relationship => {
                let crt = self.registry.require_relationship(&template.code)?;
                self.reconciler
                    .synchronize_storages(TableSource::Relationship(&crt), &crt.available_storages)
            }
        }
    }

    pub fn reconcile_storage(
        &self,
        template: TableSource<'_>,
        previous: &StorageSet,
        new: &StorageSet,
    ) -> Result<ReconciliationReport> {
        self.reconciler.reconcile_storage(template, previous, new)
    }

    pub fn is_unique(&self, code: &str) -> Result<bool> {
        self.uniqueness.is_unique(code)
    }

    /// Relationship templates named `name` attached to `cet_code` or one of
    /// its ancestors.
    pub fn relationships_of(&self, cet_code: &str, name: &str) -> Result<Vec<String>> {
        self.graph.find_by_cet_and_name(cet_code, name)
    }

    pub fn graphql_idl(&self) -> Result<String> {
        self.idl.generate()
    }
}

fn owner_code(applies_to: &AppliesTo) -> Result<&str> {
    applies_to
        .parse()
        .map(|(_, code)| code)
        .ok_or_else(|| SchemaError::validation(applies_to.as_str(), "unknown applies-to scope"))
}
