//! Relational schema adapter: template tables and field columns.

use crate::config::SqlStorageConfig;
use crate::ddl::{self, ColumnSpec, ID_COLUMN_TYPE};
use crate::executor::{sqlstate, ForeignKeyRef, RelationalExecutor, RelationalTransaction};
use ontosync_model::{
    ClientError, CustomField, EntityTemplate, FieldType, RelationshipTemplate, Result,
    SchemaError, StorageCardinality,
};
use std::sync::Arc;

/// Template a table is generated for.
#[derive(Debug, Clone, Copy)]
pub enum TableSource<'a> {
    Entity(&'a EntityTemplate),
    Relationship(&'a RelationshipTemplate),
}

impl TableSource<'_> {
    pub fn code(&self) -> &str {
        match self {
            TableSource::Entity(cet) => &cet.code,
            TableSource::Relationship(crt) => &crt.code,
        }
    }
}

pub struct RelationalSchemaAdapter {
    executor: Arc<dyn RelationalExecutor>,
    config: SqlStorageConfig,
}

impl RelationalSchemaAdapter {
    pub fn new(executor: Arc<dyn RelationalExecutor>, config: SqlStorageConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &SqlStorageConfig {
        &self.config
    }

    pub fn table_name(&self, code: &str) -> String {
        self.config.table_name(code)
    }

    /// Create the table of a template. Returns `false` without touching the
    /// schema when the table already exists.
    pub fn create_table(&self, source: TableSource<'_>) -> Result<bool> {
        let code = source.code();
        let table = self.table_name(code);
        let repository = self.config.default_repository.clone();

        self.in_transaction(&repository, code, "create table", |tx| {
            if tx.describe_table(&table)?.is_some() {
                return Ok(false);
            }

            let mut columns =
                vec![ColumnSpec::new(self.config.id_column.clone(), ID_COLUMN_TYPE).primary_key()];
            if let TableSource::Relationship(crt) = source {
                for (column, endpoint) in [("source", &crt.start_node), ("target", &crt.end_node)] {
                    let reference = self.entity_reference(tx, endpoint)?;
                    columns.push(
                        ColumnSpec::new(column, ID_COLUMN_TYPE)
                            .not_null()
                            .references(reference),
                    );
                }
            }

            tx.execute_ddl(&ddl::create_table(&table, &columns))?;
            Ok(true)
        })
        .inspect(|created| {
            if *created {
                tracing::info!(template = %code, table = %table, "created template table");
            } else {
                tracing::debug!(template = %code, table = %table, "template table already exists");
            }
        })
    }

    /// Add the column of `field` to `table`. Returns `false` when a column
    /// of the same type already exists; a column with another type is a
    /// conflict.
    pub fn add_column(&self, table: &str, field: &CustomField) -> Result<bool> {
        let repository = self.config.default_repository.clone();
        let column_name = ddl::column_name(&field.code);

        self.in_transaction(&repository, &field.code, "add column", |tx| {
            let Some(described) = tx.describe_table(table)? else {
                return Err(Step::Schema(SchemaError::not_found("table", table)));
            };

            let expected = ddl::column_type(field, &self.config);
            if let Some(existing) = described.column(&column_name) {
                if ddl::normalize_type(&existing.data_type) == ddl::normalize_type(&expected) {
                    return Ok(false);
                }
                return Err(Step::Schema(SchemaError::conflict(
                    &field.code,
                    format!(
                        "column {table}.{column_name} already exists as {} (expected {expected})",
                        existing.data_type
                    ),
                )));
            }

            let reference = match (&field.field_type, &field.reference, field.cardinality) {
                (FieldType::Entity, Some(target), StorageCardinality::Single) => {
                    self.entity_reference(tx, target)?
                }
                _ => None,
            };
            let column = ddl::field_column(field, &self.config, reference);
            tx.execute_ddl(&ddl::add_column(table, &column))?;
            Ok(true)
        })
        .inspect(|added| {
            if *added {
                tracing::info!(table = %table, column = %column_name, "added field column");
            }
        })
    }

    /// Drop the column of a field if present.
    pub fn remove_column(&self, table: &str, field_code: &str) -> Result<bool> {
        let repository = self.config.default_repository.clone();
        let column_name = ddl::column_name(field_code);

        self.in_transaction(&repository, field_code, "remove column", |tx| {
            let present = tx
                .describe_table(table)?
                .is_some_and(|described| described.column(&column_name).is_some());
            if !present {
                return Ok(false);
            }
            tx.execute_ddl(&ddl::drop_column(table, &column_name))?;
            Ok(true)
        })
        .inspect(|removed| {
            if *removed {
                tracing::info!(table = %table, column = %column_name, "removed field column");
            }
        })
    }

    /// Drop a table. `None` targets the default repository. Dropping a
    /// missing table is a no-op; a table still referenced is left intact and
    /// reported as a dependency error.
    pub fn remove_table(&self, repository: Option<&str>, table: &str) -> Result<bool> {
        let repository = self.config.repository(repository).to_string();

        self.in_transaction(&repository, table, "remove table", |tx| {
            if tx.describe_table(table)?.is_none() {
                return Ok(false);
            }
            tx.execute_ddl(&ddl::drop_table(table))?;
            Ok(true)
        })
        .inspect(|removed| {
            if *removed {
                tracing::info!(repository = %repository, table = %table, "dropped template table");
            }
        })
    }

    pub fn table_exists(&self, repository: Option<&str>, table: &str) -> Result<bool> {
        let repository = self.config.repository(repository).to_string();
        self.in_transaction(&repository, table, "describe table", |tx| {
            Ok(tx.describe_table(table)?.is_some())
        })
    }

    fn entity_reference(
        &self,
        tx: &mut dyn RelationalTransaction,
        entity_code: &str,
    ) -> Result<Option<ForeignKeyRef>, Step> {
        let target = self.table_name(entity_code);
        let described = tx.describe_table(&target)?;
        Ok(described
            .filter(|d| d.column(&self.config.id_column).is_some())
            .map(|_| ForeignKeyRef::new(target, self.config.id_column.clone())))
    }

    /// Run `body` in a fresh transaction: commit on success, roll back on
    /// failure. Client failures are classified by SQLSTATE.
    fn in_transaction<T>(
        &self,
        repository: &str,
        code: &str,
        operation: &str,
        body: impl FnOnce(&mut dyn RelationalTransaction) -> Result<T, Step>,
    ) -> Result<T> {
        let mut tx = self
            .executor
            .begin(repository)
            .map_err(|e| SchemaError::execution(code, operation, e))?;

        let tx_ref: &mut dyn RelationalTransaction = tx.as_mut();
        match body(tx_ref) {
            Ok(value) => {
                tx.commit().map_err(|e| classify(code, operation, e))?;
                Ok(value)
            }
            Err(step) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(
                        template = %code,
                        operation,
                        error = %rollback_err,
                        "rollback failed after schema operation error"
                    );
                }
                Err(match step {
                    Step::Client(e) => classify(code, operation, e),
                    Step::Schema(e) => e,
                })
            }
        }
    }
}

/// Failure inside a transaction body.
enum Step {
    Client(ClientError),
    Schema(SchemaError),
}

impl From<ClientError> for Step {
    fn from(err: ClientError) -> Self {
        Step::Client(err)
    }
}

fn classify(code: &str, operation: &str, err: ClientError) -> SchemaError {
    match err.status() {
        Some(sqlstate::DEPENDENT_OBJECTS_STILL_EXIST) => SchemaError::Dependency {
            code: code.to_string(),
            object: code.to_string(),
            message: err.message,
        },
        Some(sqlstate::DUPLICATE_TABLE | sqlstate::DUPLICATE_COLUMN | sqlstate::UNIQUE_VIOLATION) => {
            SchemaError::conflict(code, err.message)
        }
        _ => SchemaError::execution(code, operation, err),
    }
}
