//! Synchronization settings.
//!
//! Loaded from a JSON file, then overridden by `ONTOSYNC_*` environment
//! variables. Every key is optional; missing keys keep their defaults.

use anyhow::Context;
use ontosync_graph::GraphConfig;
use ontosync_sql::SqlStorageConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_PREFIX: &str = "ONTOSYNC_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub sql: SqlStorageConfig,
    pub graph: GraphConfig,
}

impl SyncConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid synchronization config")
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&contents).with_context(|| format!("in {}", path.display()))
    }

    /// File (when given) plus environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Apply overrides from `lookup`, keyed without the `ONTOSYNC_` prefix
    /// (`SQL_TABLE_PREFIX`, `GRAPH_DATABASE`, ...).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(value) = lookup("SQL_TABLE_PREFIX") {
            self.sql.table_prefix = value;
        }
        if let Some(value) = lookup("SQL_DEFAULT_REPOSITORY") {
            self.sql.default_repository = value;
        }
        if let Some(value) = lookup("SQL_ID_COLUMN") {
            self.sql.id_column = value;
        }
        if let Some(value) = lookup("SQL_DEFAULT_STRING_LENGTH") {
            self.sql.default_string_length = value.parse().with_context(|| {
                format!("{ENV_PREFIX}SQL_DEFAULT_STRING_LENGTH is not a length: {value}")
            })?;
        }
        if let Some(value) = lookup("GRAPH_DATABASE") {
            self.graph.database = (!value.is_empty()).then_some(value);
        }
        if let Some(value) = lookup("GRAPH_ENTITY_LABEL") {
            self.graph.entity_label = value;
        }
        if let Some(value) = lookup("GRAPH_RELATIONSHIP_LABEL") {
            self.graph.relationship_label = value;
        }
        Ok(())
    }
}
