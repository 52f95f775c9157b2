//! Relational execution interface consumed by the adapter.

use ontosync_model::ClientError;
use serde::{Deserialize, Serialize};

/// SQLSTATE codes the adapter classifies.
pub mod sqlstate {
    pub const DEPENDENT_OBJECTS_STILL_EXIST: &str = "2BP01";
    pub const DUPLICATE_TABLE: &str = "42P07";
    pub const DUPLICATE_COLUMN: &str = "42701";
    pub const UNDEFINED_TABLE: &str = "42P01";
    pub const UNDEFINED_COLUMN: &str = "42703";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const SYNTAX_ERROR: &str = "42601";
    pub const FEATURE_NOT_SUPPORTED: &str = "0A000";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub references: Option<ForeignKeyRef>,
}

/// Catalog view of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    pub columns: Vec<ColumnDescription>,
}

impl TableDescription {
    pub fn column(&self, name: &str) -> Option<&ColumnDescription> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Entry point of a relational client. One transaction per call to
/// [`RelationalExecutor::begin`]; it never joins a caller's transaction.
pub trait RelationalExecutor: Send + Sync {
    fn begin(&self, repository: &str) -> Result<Box<dyn RelationalTransaction>, ClientError>;
}

pub trait RelationalTransaction: Send {
    fn execute_ddl(&mut self, statement: &str) -> Result<(), ClientError>;

    /// Catalog introspection (`information_schema` on a real server).
    fn describe_table(&mut self, table: &str) -> Result<Option<TableDescription>, ClientError>;

    fn commit(self: Box<Self>) -> Result<(), ClientError>;

    fn rollback(self: Box<Self>) -> Result<(), ClientError>;
}
