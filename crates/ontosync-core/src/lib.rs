//! Ontosync core
//!
//! Keeps three derived artefacts in step with a live ontology of entity and
//! relationship templates:
//!
//! ```text
//!                    ┌──────────────────┐
//!   create/update ──►│ OntologyService  │
//!   remove           └────────┬─────────┘
//!                             │
//!        ┌────────────────────┼──────────────────────┐
//!        ▼                    ▼                      ▼
//! ┌──────────────┐   ┌─────────────────┐   ┌──────────────────┐
//! │  Reconciler  │──►│ relational DDL  │   │  graph mirror    │
//! └──────┬───────┘   └─────────────────┘   └──────────────────┘
//!        ▼
//! ┌──────────────┐   ┌─────────────────┐   ┌──────────────────┐
//! │   Registry   │──►│ GraphQL IDL     │   │ uniqueness cache │
//! └──────────────┘   └─────────────────┘   └──────────────────┘
//! ```
//!
//! - [`reconcile`]: storage-set diffs become table creation/removal and
//!   field storage updates.
//! - [`registry`]: validation, inheritance walks, relationship cache.
//! - [`graphql`]: IDL text generated on demand from the registry.
//! - [`uniqueness`]: memoized relationship unicity flags.

pub mod config;
pub mod graphql;
pub mod reconcile;
pub mod registry;
pub mod service;
pub mod store;
pub mod uniqueness;


pub use config::SyncConfig;
pub use graphql::{GraphQlGenerator, IdlField};
pub use reconcile::{plan_reconciliation, ReconciliationReport, SchemaOperation, StorageReconciler};
pub use registry::TemplateRegistry;
pub use service::OntologyService;
pub use store::{MemoryTemplateStore, TemplateStore};
pub use uniqueness::UniquenessCache;
