//! Storage reconciliation.
//!
//! When the available storages of a template change, the relational table
//! and the per-field storage assignments are brought in line with the new
//! set. Planning ([`plan_reconciliation`]) is pure; [`StorageReconciler`]
//! executes a plan against the relational adapter and the registry.
//!
//! Relational DDL and field updates are not atomic together. Every step is
//! create-if-absent or drop-if-exists, so a failed pass is repaired by
//! running it again.

use crate::registry::TemplateRegistry;
use ontosync_model::{AppliesTo, CustomField, Result, StorageDelta, StorageSet, StorageTarget};
use ontosync_sql::{RelationalSchemaAdapter, TableSource};
use serde::Serialize;
use std::sync::Arc;

/// One schema change of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOperation {
    /// Create the table; when it is new, add these field columns in order
    /// and store the fields relationally.
    CreateTable { table: String, columns: Vec<String> },
    DropTable { table: String },
    /// Remove storages no longer available from a field.
    StripFieldStorage { field: String, removed: StorageSet },
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub table_created: bool,
    pub table_dropped: bool,
    pub columns_added: Vec<String>,
    pub fields_updated: Vec<String>,
}

impl ReconciliationReport {
    pub fn is_noop(&self) -> bool {
        !self.table_created
            && !self.table_dropped
            && self.columns_added.is_empty()
            && self.fields_updated.is_empty()
    }
}

/// Operations turning `previous` into `new` for a template whose table is
/// `table` and whose fields (in definition order) are `fields`.
pub fn plan_reconciliation(
    table: &str,
    previous: &StorageSet,
    new: &StorageSet,
    fields: &[CustomField],
) -> Vec<SchemaOperation> {
    let delta = StorageDelta::between(previous, new);
    let mut plan = Vec::new();

    if delta.adds(StorageTarget::Sql) {
        plan.push(SchemaOperation::CreateTable {
            table: table.to_string(),
            columns: fields.iter().map(|field| field.code.clone()).collect(),
        });
    }
    if delta.removes(StorageTarget::Sql) {
        plan.push(SchemaOperation::DropTable {
            table: table.to_string(),
        });
    }

    plan.extend(fields.iter().filter_map(|field| {
        let removed = field.storages_outside(new);
        (!removed.is_empty()).then(|| SchemaOperation::StripFieldStorage {
            field: field.code.clone(),
            removed,
        })
    }));
    plan
}

pub struct StorageReconciler {
    registry: Arc<TemplateRegistry>,
    sql: Arc<RelationalSchemaAdapter>,
}

impl StorageReconciler {
    pub fn new(registry: Arc<TemplateRegistry>, sql: Arc<RelationalSchemaAdapter>) -> Self {
        Self { registry, sql }
    }

    /// Bring the schema of `template` from `previous` to `new` storages.
    ///
    /// Errors name the template code. A table drop blocked by references
    /// aborts the pass before any field is touched.
    pub fn reconcile_storage(
        &self,
        template: TableSource<'_>,
        previous: &StorageSet,
        new: &StorageSet,
    ) -> Result<ReconciliationReport> {
        let code = template.code().to_string();
        let mut fields = self.registry.fields_of(&applies_to(template))?;
        let table = self.sql.table_name(&code);
        let plan = plan_reconciliation(&table, previous, new, &fields);

        tracing::info!(
            template = %code,
            previous = ?previous,
            new = ?new,
            steps = plan.len(),
            "reconciling template storages"
        );

        let mut report = ReconciliationReport::default();
        for operation in plan {
            match operation {
                SchemaOperation::CreateTable { table, columns } => {
                    report.table_created = self
                        .sql
                        .create_table(template)
                        .map_err(|e| e.for_template(&code))?;
                    if !report.table_created {
                        continue;
                    }
                    for column in columns {
                        let Some(field) = fields.iter_mut().find(|f| f.code == column) else {
                            continue;
                        };
                        let gained = field.storages.insert(StorageTarget::Sql);
                        if self
                            .sql
                            .add_column(&table, field)
                            .map_err(|e| e.for_template(&code))?
                        {
                            report.columns_added.push(column.clone());
                        }
                        if gained {
                            self.registry
                                .persist_field(field.clone())
                                .map_err(|e| e.for_template(&code))?;
                            report.fields_updated.push(column);
                        }
                    }
                }
                SchemaOperation::DropTable { table } => {
                    report.table_dropped = self
                        .sql
                        .remove_table(None, &table)
                        .map_err(|e| {
                            tracing::warn!(template = %code, table = %table, error = %e, "table removal failed");
                            e.for_template(&code)
                        })?;
                }
                SchemaOperation::StripFieldStorage { field, removed } => {
                    let Some(current) = fields.iter_mut().find(|f| f.code == field) else {
                        continue;
                    };
                    current.storages.retain(|target| !removed.contains(target));
                    self.registry
                        .persist_field(current.clone())
                        .map_err(|e| e.for_template(&code))?;
                    tracing::debug!(template = %code, field = %field, removed = ?removed, "stripped field storages");
                    if !report.fields_updated.contains(&field) {
                        report.fields_updated.push(field);
                    }
                }
            }
        }

        self.registry.invalidate(&code);
        tracing::info!(
            template = %code,
            table_created = report.table_created,
            table_dropped = report.table_dropped,
            columns = report.columns_added.len(),
            fields = report.fields_updated.len(),
            "reconciled template storages"
        );
        Ok(report)
    }

    /// Strip from every field of `template` the storages missing from
    /// `available`, without touching the relational schema.
    pub fn synchronize_storages(
        &self,
        template: TableSource<'_>,
        available: &StorageSet,
    ) -> Result<Vec<String>> {
        let code = template.code();
        let mut updated = Vec::new();
        for mut field in self.registry.fields_of(&applies_to(template))? {
            let removed = field.storages_outside(available);
            if removed.is_empty() {
                continue;
            }
            field.storages.retain(|target| available.contains(target));
            let field_code = field.code.clone();
            self.registry
                .persist_field(field)
                .map_err(|e| e.for_template(code))?;
            updated.push(field_code);
        }
        self.registry.invalidate(code);
        Ok(updated)
    }
}

fn applies_to(template: TableSource<'_>) -> AppliesTo {
    match template {
        TableSource::Entity(cet) => cet.applies_to(),
        TableSource::Relationship(crt) => crt.applies_to(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontosync_model::{storages, FieldType};

    fn field(code: &str, targets: &[StorageTarget]) -> CustomField {
        CustomField::new(code, AppliesTo::entity("Person"), FieldType::String).stored_in(targets)
    }

    #[test]
    fn test_adding_sql_plans_table_with_every_field_column() {
        let fields = vec![
            field("name", &[StorageTarget::Sql, StorageTarget::Neo4j]),
            field("nickname", &[StorageTarget::Neo4j]),
            field("age", &[StorageTarget::Sql]),
        ];
        let plan = plan_reconciliation(
            "person",
            &storages(&[StorageTarget::Neo4j]),
            &storages(&[StorageTarget::Sql, StorageTarget::Neo4j]),
            &fields,
        );
        assert_eq!(
            plan,
            vec![SchemaOperation::CreateTable {
                table: "person".to_string(),
                columns: vec!["name".to_string(), "nickname".to_string(), "age".to_string()],
            }]
        );
    }

    #[test]
    fn test_removing_sql_plans_drop_then_strip() {
        let fields = vec![
            field("name", &[StorageTarget::Sql, StorageTarget::Neo4j]),
            field("nickname", &[StorageTarget::Neo4j]),
        ];
        let plan = plan_reconciliation(
            "person",
            &storages(&[StorageTarget::Sql, StorageTarget::Neo4j]),
            &storages(&[StorageTarget::Neo4j]),
            &fields,
        );
        assert_eq!(
            plan,
            vec![
                SchemaOperation::DropTable {
                    table: "person".to_string()
                },
                SchemaOperation::StripFieldStorage {
                    field: "name".to_string(),
                    removed: storages(&[StorageTarget::Sql]),
                },
            ]
        );
    }

    #[test]
    fn test_unchanged_storages_plan_nothing() {
        let set = storages(&[StorageTarget::Sql]);
        assert!(plan_reconciliation("person", &set, &set, &[field("name", &[StorageTarget::Sql])])
            .is_empty());
    }
}
