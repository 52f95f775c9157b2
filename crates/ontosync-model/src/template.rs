//! Entity and relationship templates.

use crate::code::AppliesTo;
use crate::storage::{StorageSet, StorageTarget};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which template family a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    Entity,
    Relationship,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKind::Entity => write!(f, "entity template"),
            TemplateKind::Relationship => write!(f, "relationship template"),
        }
    }
}

/// Reference to a template by kind and code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    pub kind: TemplateKind,
    pub code: String,
}

impl TemplateRef {
    pub fn entity(code: impl Into<String>) -> Self {
        Self {
            kind: TemplateKind::Entity,
            code: code.into(),
        }
    }

    pub fn relationship(code: impl Into<String>) -> Self {
        Self {
            kind: TemplateKind::Relationship,
            code: code.into(),
        }
    }

    pub fn applies_to(&self) -> AppliesTo {
        AppliesTo::new(self.kind, &self.code)
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind, self.code)
    }
}

/// Scalar kind wrapped by a primitive entity template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrimitiveType {
    String,
    Long,
    Date,
    Double,
}

/// Extra GraphQL field backed by an explicit query directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQlQueryField {
    pub field_name: String,
    pub field_type: String,
    /// Directive appended verbatim, e.g. `@cypher(statement: "...")`.
    pub query: String,
    #[serde(default)]
    pub multivalued: bool,
}

/// A node type of the custom ontology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTemplate {
    pub code: String,
    pub name: String,
    /// Code of the parent template (single inheritance).
    #[serde(default)]
    pub super_template: Option<String>,
    /// `Some` for scalar wrapper templates.
    #[serde(default)]
    pub primitive: Option<PrimitiveType>,
    #[serde(default)]
    pub available_storages: StorageSet,
    #[serde(default)]
    pub graphql_query_fields: Vec<GraphQlQueryField>,
}

impl EntityTemplate {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            super_template: None,
            primitive: None,
            available_storages: StorageSet::new(),
            graphql_query_fields: Vec::new(),
        }
    }

    pub fn extending(mut self, super_template: impl Into<String>) -> Self {
        self.super_template = Some(super_template.into());
        self
    }

    pub fn primitive(mut self, kind: PrimitiveType) -> Self {
        self.primitive = Some(kind);
        self
    }

    pub fn stored_in(mut self, targets: &[StorageTarget]) -> Self {
        self.available_storages = targets.iter().copied().collect();
        self
    }

    pub fn with_query_field(mut self, field: GraphQlQueryField) -> Self {
        self.graphql_query_fields.push(field);
        self
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive.is_some()
    }

    pub fn applies_to(&self) -> AppliesTo {
        AppliesTo::entity(&self.code)
    }

    pub fn template_ref(&self) -> TemplateRef {
        TemplateRef::entity(self.code.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipDirection {
    #[default]
    Outgoing,
    Incoming,
    Bidirectional,
}

/// An edge type between two entity templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTemplate {
    pub code: String,
    /// Relationship name as stored in the graph. Not unique across templates.
    pub name: String,
    pub start_node: String,
    pub end_node: String,
    #[serde(default)]
    pub direction: RelationshipDirection,
    /// Field added to the source entity referring the most recent target.
    #[serde(default)]
    pub source_name_singular: Option<String>,
    /// Field added to the source entity referring every target.
    #[serde(default)]
    pub source_name_plural: Option<String>,
    #[serde(default)]
    pub target_name_singular: Option<String>,
    #[serde(default)]
    pub target_name_plural: Option<String>,
    /// Field on the source entity listing the outgoing relationships.
    #[serde(default)]
    pub relationships_field_source: Option<String>,
    /// Field on the target entity listing the incoming relationships.
    #[serde(default)]
    pub relationships_field_target: Option<String>,
    #[serde(default)]
    pub available_storages: StorageSet,
    /// Whether the relation takes part in node unicity.
    #[serde(default)]
    pub unique: bool,
}

impl RelationshipTemplate {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        start_node: impl Into<String>,
        end_node: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            start_node: start_node.into(),
            end_node: end_node.into(),
            direction: RelationshipDirection::default(),
            source_name_singular: None,
            source_name_plural: None,
            target_name_singular: None,
            target_name_plural: None,
            relationships_field_source: None,
            relationships_field_target: None,
            available_storages: StorageSet::new(),
            unique: false,
        }
    }

    pub fn stored_in(mut self, targets: &[StorageTarget]) -> Self {
        self.available_storages = targets.iter().copied().collect();
        self
    }

    pub fn source_names(mut self, singular: Option<&str>, plural: Option<&str>) -> Self {
        self.source_name_singular = singular.map(str::to_string);
        self.source_name_plural = plural.map(str::to_string);
        self
    }

    pub fn target_names(mut self, singular: Option<&str>, plural: Option<&str>) -> Self {
        self.target_name_singular = singular.map(str::to_string);
        self.target_name_plural = plural.map(str::to_string);
        self
    }

    pub fn relationships_fields(mut self, source: Option<&str>, target: Option<&str>) -> Self {
        self.relationships_field_source = source.map(str::to_string);
        self.relationships_field_target = target.map(str::to_string);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn applies_to(&self) -> AppliesTo {
        AppliesTo::relationship(&self.code)
    }

    pub fn template_ref(&self) -> TemplateRef {
        TemplateRef::relationship(self.code.clone())
    }

    /// Name of the field listing outgoing relationships of this type on the
    /// source entity.
    pub fn outgoing_relationships_field(&self) -> Option<String> {
        self.source_name_singular
            .as_ref()
            .map(|singular| format!("{singular}Relationships"))
    }

    /// GraphQL type name derived from the singular source field name.
    pub fn graphql_type_name(&self) -> Option<String> {
        let singular = self.source_name_singular.as_deref()?;
        let mut chars = singular.chars();
        let first = chars.next()?;
        Some(format!(
            "{}{}Relationship",
            first.to_uppercase(),
            chars.as_str()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_defaults() {
        let crt = RelationshipTemplate::new("owns", "owns", "Person", "Car");
        assert_eq!(crt.direction, RelationshipDirection::Outgoing);
        assert!(crt.available_storages.is_empty());
        assert!(!crt.unique);
        assert_eq!(crt.applies_to().as_str(), "CRT_owns");
    }

    #[test]
    fn test_relationship_derived_names() {
        let crt = RelationshipTemplate::new("owns", "owns", "Person", "Car")
            .source_names(Some("car"), Some("cars"));
        assert_eq!(crt.outgoing_relationships_field().as_deref(), Some("carRelationships"));
        assert_eq!(crt.graphql_type_name().as_deref(), Some("CarRelationship"));

        let bare = RelationshipTemplate::new("owns", "owns", "Person", "Car");
        assert_eq!(bare.graphql_type_name(), None);
    }

    #[test]
    fn test_relationship_direction_defaults_when_missing_from_json() {
        let crt: RelationshipTemplate = serde_json::from_str(
            r#"{"code":"owns","name":"owns","start_node":"Person","end_node":"Car"}"#,
        )
        .unwrap();
        assert_eq!(crt.direction, RelationshipDirection::Outgoing);
    }
}
