//! Ontology codes and applies-to scopes.

use crate::template::TemplateKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Prefix of the applies-to scope of entity templates.
pub const ENTITY_SCOPE_PREFIX: &str = "CE";
/// Prefix of the applies-to scope of relationship templates.
pub const RELATIONSHIP_SCOPE_PREFIX: &str = "CRT";

fn ontology_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z_]*$").expect("static pattern"))
}

/// Ontology codes start with a letter and contain only letters and
/// underscores. Digits are rejected: codes become table names, graph labels
/// and GraphQL type names at the same time.
pub fn validate_ontology_code(code: &str) -> bool {
    ontology_code_pattern().is_match(code)
}

/// Deterministic key grouping all custom fields of one template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppliesTo(String);

impl AppliesTo {
    pub fn new(kind: TemplateKind, code: &str) -> Self {
        let prefix = match kind {
            TemplateKind::Entity => ENTITY_SCOPE_PREFIX,
            TemplateKind::Relationship => RELATIONSHIP_SCOPE_PREFIX,
        };
        Self(format!("{prefix}_{code}"))
    }

    pub fn entity(code: &str) -> Self {
        Self::new(TemplateKind::Entity, code)
    }

    pub fn relationship(code: &str) -> Self {
        Self::new(TemplateKind::Relationship, code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the scope back into template kind and code.
    pub fn parse(&self) -> Option<(TemplateKind, &str)> {
        let (prefix, code) = self.0.split_once('_')?;
        match prefix {
            ENTITY_SCOPE_PREFIX => Some((TemplateKind::Entity, code)),
            RELATIONSHIP_SCOPE_PREFIX => Some((TemplateKind::Relationship, code)),
            _ => None,
        }
    }
}

impl fmt::Display for AppliesTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
