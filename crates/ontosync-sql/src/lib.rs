//! Relational schema adapter for Ontosync
//!
//! Every template with relational storage owns one dynamic table:
//! - the table name is derived from the template code,
//! - each relationally stored custom field is one column,
//! - relationship tables carry `source`/`target` columns pointing at the
//!   endpoint entity tables.
//!
//! All operations are safe to repeat (create-if-absent, drop-if-exists) and
//! each one runs in a fresh transaction on the [`RelationalExecutor`].

pub mod adapter;
pub mod config;
pub mod ddl;
pub mod executor;
pub mod memory;

pub use adapter::{RelationalSchemaAdapter, TableSource};
pub use config::SqlStorageConfig;
pub use executor::{
    sqlstate, ColumnDescription, ForeignKeyRef, RelationalExecutor, RelationalTransaction,
    TableDescription,
};
pub use memory::MemoryRelationalExecutor;
