//! Custom field definitions.

use crate::code::AppliesTo;
use crate::storage::{StorageSet, StorageTarget};
use serde::{Deserialize, Serialize};

/// Value type of a custom field. The set is closed: every consumer matches
/// on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    String,
    TextArea,
    Long,
    Date,
    Double,
    Boolean,
    /// Reference to an instance of another entity template.
    Entity,
    /// Path to a stored binary.
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageCardinality {
    #[default]
    Single,
    List,
}

/// A typed attribute attached to a template's applies-to scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub code: String,
    pub applies_to: AppliesTo,
    pub field_type: FieldType,
    #[serde(default)]
    pub cardinality: StorageCardinality,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub identifier: bool,
    #[serde(default)]
    pub storages: StorageSet,
    /// Referenced entity template code, for [`FieldType::Entity`].
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    /// Definition order inside the scope.
    #[serde(default)]
    pub position: u32,
}

impl CustomField {
    pub fn new(code: impl Into<String>, applies_to: AppliesTo, field_type: FieldType) -> Self {
        Self {
            code: code.into(),
            applies_to,
            field_type,
            cardinality: StorageCardinality::Single,
            required: false,
            identifier: false,
            storages: StorageSet::new(),
            reference: None,
            max_length: None,
            position: 0,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Identifier fields are always required.
    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self.required = true;
        self
    }

    pub fn list(mut self) -> Self {
        self.cardinality = StorageCardinality::List;
        self
    }

    pub fn stored_in(mut self, targets: &[StorageTarget]) -> Self {
        self.storages = targets.iter().copied().collect();
        self
    }

    pub fn references(mut self, entity_code: impl Into<String>) -> Self {
        self.reference = Some(entity_code.into());
        self
    }

    pub fn max_length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        self
    }

    pub fn at(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    pub fn is_multivalued(&self) -> bool {
        self.cardinality == StorageCardinality::List
    }

    pub fn is_stored_in(&self, target: StorageTarget) -> bool {
        self.storages.contains(&target)
    }

    /// Storages of this field missing from `available`.
    pub fn storages_outside(&self, available: &StorageSet) -> StorageSet {
        self.storages.difference(available).copied().collect()
    }
}
