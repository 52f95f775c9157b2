use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Database sessions are opened against; `None` uses the server default.
    pub database: Option<String>,
    /// Label of mirrored entity template nodes.
    pub entity_label: String,
    /// Label of mirrored relationship template nodes.
    pub relationship_label: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            database: None,
            entity_label: "EntityTemplate".to_string(),
            relationship_label: "RelationshipTemplate".to_string(),
        }
    }
}
