use serde::{Deserialize, Serialize};

/// Naming and typing defaults for generated tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlStorageConfig {
    /// Prepended to every generated table name.
    pub table_prefix: String,
    /// Repository used when an operation does not name one.
    pub default_repository: String,
    /// Primary key column of generated tables.
    pub id_column: String,
    /// `VARCHAR` length for string fields without `max_length`.
    pub default_string_length: u32,
}

impl Default for SqlStorageConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            default_repository: "default".to_string(),
            id_column: "uuid".to_string(),
            default_string_length: 255,
        }
    }
}

impl SqlStorageConfig {
    /// Deterministic table name of a template.
    pub fn table_name(&self, code: &str) -> String {
        format!("{}{}", self.table_prefix, code.to_lowercase())
    }

    pub fn repository<'a>(&'a self, repository: Option<&'a str>) -> &'a str {
        repository.unwrap_or(&self.default_repository)
    }
}
