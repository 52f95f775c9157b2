//! Graph schema adapter: relationship lookups over the ontology mirror.

use crate::config::GraphConfig;
use crate::driver::{CypherStatement, GraphDriver, GraphTransaction, Record};
use crate::queries::Queries;
use crate::session::run_in_transaction;
use ontosync_model::{Backend, ClientError, EntityTemplate, RelationshipTemplate, Result, SchemaError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Relationship template row as returned by the directional lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipSummary {
    pub code: String,
    pub name: String,
    #[serde(rename = "startNode")]
    pub start_node: String,
    #[serde(rename = "endNode")]
    pub end_node: String,
}

pub struct GraphSchemaAdapter {
    driver: Arc<dyn GraphDriver>,
    config: GraphConfig,
}

impl GraphSchemaAdapter {
    pub fn new(driver: Arc<dyn GraphDriver>, config: GraphConfig) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Codes of the relationship templates named `name` whose start or end
    /// node is `cet_code` or one of its ancestors.
    pub fn find_by_cet_and_name(&self, cet_code: &str, name: &str) -> Result<Vec<String>> {
        let statement = Queries::new(&self.config).relationships_of_ancestors(cet_code, name);
        let records = self.run(cet_code, "find relationships by template and name", |tx| {
            tx.run(&statement)
        })?;

        let mut codes = records
            .iter()
            .map(|record| string_column(record, "code"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SchemaError::execution(cet_code, "find relationships by template and name", e))?;
        codes.sort();
        codes.dedup();
        Ok(codes)
    }

    /// Relationship templates between `source` and `target`, whichever side
    /// each one is stored on. The result does not depend on argument order.
    pub fn find_by_source_or_target(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Vec<RelationshipSummary>> {
        let statement = Queries::new(&self.config).by_source_or_target(source, target);
        self.summaries(source, "find relationships by source or target", &statement)
    }

    pub fn find_by_name_and_source_or_target(
        &self,
        source: &str,
        target: &str,
        name: &str,
    ) -> Result<Vec<RelationshipSummary>> {
        let statement =
            Queries::new(&self.config).by_name_and_source_or_target(source, target, name);
        self.summaries(source, "find relationships by name and source or target", &statement)
    }

    /// Ordered variant: `start` must be the start node, `end` the end node.
    pub fn find_by_start_end_and_name(
        &self,
        start: &str,
        end: &str,
        name: &str,
    ) -> Result<Vec<RelationshipSummary>> {
        let statement = Queries::new(&self.config).by_start_end_and_name(start, end, name);
        self.summaries(start, "find relationships by start, end and name", &statement)
    }

    pub fn mirror_entity_template(&self, cet: &EntityTemplate) -> Result<()> {
        let statement = Queries::new(&self.config).merge_entity_template(cet);
        self.run(&cet.code, "mirror entity template", |tx| tx.run(&statement))?;
        tracing::debug!(template = %cet.code, "mirrored entity template");
        Ok(())
    }

    pub fn unmirror_entity_template(&self, code: &str) -> Result<()> {
        let statement = Queries::new(&self.config).delete_entity_template(code);
        self.run(code, "unmirror entity template", |tx| tx.run(&statement))?;
        tracing::debug!(template = %code, "removed entity template from graph");
        Ok(())
    }

    /// Both endpoints must already be mirrored.
    pub fn mirror_relationship_template(&self, crt: &RelationshipTemplate) -> Result<()> {
        let statement = Queries::new(&self.config).merge_relationship_template(crt);
        let records = self.run(&crt.code, "mirror relationship template", |tx| {
            tx.run(&statement)
        })?;
        if records.is_empty() {
            return Err(SchemaError::validation(
                &crt.code,
                format!(
                    "start node `{}` or end node `{}` is not mirrored in the graph",
                    crt.start_node, crt.end_node
                ),
            ));
        }
        tracing::debug!(template = %crt.code, "mirrored relationship template");
        Ok(())
    }

    pub fn unmirror_relationship_template(&self, code: &str) -> Result<()> {
        let statement = Queries::new(&self.config).delete_relationship_template(code);
        self.run(code, "unmirror relationship template", |tx| tx.run(&statement))?;
        tracing::debug!(template = %code, "removed relationship template from graph");
        Ok(())
    }

    /// Execute an arbitrary statement in its own scoped transaction.
    pub fn run_raw(&self, statement: &CypherStatement) -> Result<Vec<Record>> {
        self.run("cypher", "run query", |tx| tx.run(statement))
    }

    fn summaries(
        &self,
        code: &str,
        operation: &str,
        statement: &CypherStatement,
    ) -> Result<Vec<RelationshipSummary>> {
        let records = self.run(code, operation, |tx| tx.run(statement))?;
        let mut summaries = records
            .into_iter()
            .map(|record| {
                serde_json::from_value::<RelationshipSummary>(Value::Object(record)).map_err(|e| {
                    ClientError::new(Backend::Graph, format!("malformed relationship row: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SchemaError::execution(code, operation, e))?;
        summaries.sort();
        summaries.dedup();
        Ok(summaries)
    }

    fn run<T>(
        &self,
        code: &str,
        operation: &str,
        work: impl FnOnce(&mut dyn GraphTransaction) -> Result<T, ClientError>,
    ) -> Result<T> {
        run_in_transaction(self.driver.as_ref(), self.config.database.as_deref(), work).map_err(
            |e| {
                tracing::warn!(template = %code, operation, error = %e, "graph operation failed");
                SchemaError::execution(code, operation, e)
            },
        )
    }
}

fn string_column(record: &Record, column: &str) -> Result<String, ClientError> {
    record
        .get(column)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::new(Backend::Graph, format!("missing string column `{column}`")))
}
