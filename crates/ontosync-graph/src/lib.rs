//! Graph schema adapter for Ontosync
//!
//! The ontology is mirrored into the graph database as template nodes:
//!
//! ```text
//! (:EntityTemplate)-[:EXTENDS]->(:EntityTemplate)
//! (:RelationshipTemplate)-[:STARTS_AT]->(:EntityTemplate)
//! (:RelationshipTemplate)-[:ENDS_AT]->(:EntityTemplate)
//! ```
//!
//! Relationship lookups run as single Cypher statements over that mirror.
//! Every call acquires a session, opens a transaction, runs, commits or
//! rolls back and closes the session, whatever the outcome (see
//! [`session::run_in_transaction`]).

pub mod adapter;
pub mod config;
pub mod driver;
pub mod memory;
pub mod queries;
pub mod session;

pub use adapter::{GraphSchemaAdapter, RelationshipSummary};
pub use config::GraphConfig;
pub use driver::{CypherStatement, GraphDriver, GraphSession, GraphTransaction, Params, Record};
pub use memory::MemoryGraph;
pub use session::{run_in_transaction, SessionGuard, TransactionGuard};
