//! Ontosync ontology model
//!
//! Typed records for the custom ontology the synchronization core keeps in
//! step with its derived schemas:
//!
//! - entity templates (node types, single-parent inheritance),
//! - relationship templates (edge types between two entity templates),
//! - custom fields attached to a template's applies-to scope,
//! - the storage targets each of them is materialized into.
//!
//! The error taxonomy shared by every adapter crate lives here as well, so
//! the relational and graph adapters can report failures in the same terms
//! as the reconciler that drives them.

pub mod code;
pub mod error;
pub mod field;
pub mod storage;
pub mod template;

pub use code::{validate_ontology_code, AppliesTo};
pub use error::{Backend, ClientError, Result, SchemaError};
pub use field::{CustomField, FieldType, StorageCardinality};
pub use storage::{storages, StorageDelta, StorageSet, StorageTarget};
pub use template::{
    EntityTemplate, GraphQlQueryField, PrimitiveType, RelationshipDirection,
    RelationshipTemplate, TemplateKind, TemplateRef,
};
