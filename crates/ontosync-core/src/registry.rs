//! Template registry: ontology validation, inheritance walks and the
//! relationship template cache.
//!
//! Templates form an arena keyed by code; each entity template points at its
//! parent by code. Ancestor and descendance computations are explicit walks
//! over that arena with a visited set, so a corrupted chain terminates with
//! a validation error instead of looping.

use crate::store::TemplateStore;
use ontosync_model::{
    validate_ontology_code, AppliesTo, CustomField, EntityTemplate, FieldType,
    RelationshipTemplate, Result, SchemaError, StorageSet, TemplateKind,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

pub struct TemplateRegistry {
    store: Arc<dyn TemplateStore>,
    relationships: RwLock<HashMap<String, RelationshipTemplate>>,
}

impl TemplateRegistry {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self {
            store,
            relationships: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &dyn TemplateStore {
        self.store.as_ref()
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn entity(&self, code: &str) -> Result<Option<EntityTemplate>> {
        self.store.find_entity(code)
    }

    pub fn require_entity(&self, code: &str) -> Result<EntityTemplate> {
        self.entity(code)?
            .ok_or_else(|| SchemaError::not_found("entity template", code))
    }

    pub fn entities(&self) -> Result<Vec<EntityTemplate>> {
        self.store.list_entities()
    }

    /// Relationship template by code, served from the cache when present.
    pub fn relationship(&self, code: &str) -> Result<Option<RelationshipTemplate>> {
        if let Some(cached) = self.relationships.read().get(code) {
            return Ok(Some(cached.clone()));
        }
        let found = self.store.find_relationship(code)?;
        if let Some(crt) = &found {
            self.relationships.write().insert(code.to_string(), crt.clone());
        }
        Ok(found)
    }

    pub fn require_relationship(&self, code: &str) -> Result<RelationshipTemplate> {
        self.relationship(code)?
            .ok_or_else(|| SchemaError::not_found("relationship template", code))
    }

    pub fn relationships(&self) -> Result<Vec<RelationshipTemplate>> {
        self.store.list_relationships()
    }

    /// Drop the cached record of a relationship template.
    pub fn invalidate(&self, code: &str) {
        if self.relationships.write().remove(code).is_some() {
            tracing::trace!(template = %code, "evicted relationship template from cache");
        }
    }

    pub fn is_cached(&self, code: &str) -> bool {
        self.relationships.read().contains_key(code)
    }

    pub fn fields_of(&self, applies_to: &AppliesTo) -> Result<Vec<CustomField>> {
        self.store.fields_of(applies_to)
    }

    pub fn persist_field(&self, field: CustomField) -> Result<()> {
        self.store.update_field(field)
    }

    /// Available storages of the template owning `applies_to`.
    pub fn owner_storages(&self, applies_to: &AppliesTo) -> Result<StorageSet> {
        match applies_to.parse() {
            Some((TemplateKind::Entity, code)) => {
                Ok(self.require_entity(code)?.available_storages)
            }
            Some((TemplateKind::Relationship, code)) => {
                Ok(self.require_relationship(code)?.available_storages)
            }
            None => Err(SchemaError::validation(
                applies_to.as_str(),
                "unknown applies-to scope",
            )),
        }
    }

    // ------------------------------------------------------------------
    // Inheritance
    // ------------------------------------------------------------------

    /// Ancestors of `code`, nearest first, the template itself excluded.
    pub fn ancestors(&self, code: &str) -> Result<Vec<EntityTemplate>> {
        let arena = self.arena()?;
        let mut chain = Vec::new();
        let mut visited = BTreeSet::from([code.to_string()]);
        let mut parent = arena.get(code).and_then(|cet| cet.super_template.clone());

        while let Some(parent_code) = parent {
            if !visited.insert(parent_code.clone()) {
                return Err(SchemaError::validation(
                    code,
                    format!("inheritance cycle through `{parent_code}`"),
                ));
            }
            let Some(cet) = arena.get(&parent_code) else {
                break;
            };
            parent = cet.super_template.clone();
            chain.push(cet.clone());
        }
        Ok(chain)
    }

    /// Codes of `code` and every template below it, sorted.
    pub fn descendance(&self, code: &str) -> Result<Vec<String>> {
        Ok(descendance_in(&self.arena()?, code))
    }

    fn arena(&self) -> Result<BTreeMap<String, EntityTemplate>> {
        Ok(self
            .store
            .list_entities()?
            .into_iter()
            .map(|cet| (cet.code.clone(), cet))
            .collect())
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Code format, existing parent and acyclic chain. `cet` may be a new
    /// template or a new version of a stored one.
    pub fn validate_entity(&self, cet: &EntityTemplate) -> Result<()> {
        validate_code(&cet.code)?;
        let Some(parent) = &cet.super_template else {
            return Ok(());
        };

        let arena = self.arena()?;
        if !arena.contains_key(parent) {
            return Err(SchemaError::validation(
                &cet.code,
                format!("super template `{parent}` does not exist"),
            ));
        }

        let mut visited = BTreeSet::new();
        let mut current = Some(parent.clone());
        while let Some(code) = current {
            if code == cet.code || !visited.insert(code.clone()) {
                return Err(SchemaError::validation(
                    &cet.code,
                    format!("extending `{parent}` would create an inheritance cycle"),
                ));
            }
            current = arena.get(&code).and_then(|t| t.super_template.clone());
        }
        Ok(())
    }

    /// Template codes are unique across entity and relationship templates,
    /// ignoring case: both kinds derive their table name from the
    /// lowercased code.
    pub fn ensure_code_available(&self, code: &str) -> Result<()> {
        let key = code.to_lowercase();
        let taken = self
            .store
            .list_entities()?
            .into_iter()
            .map(|cet| (TemplateKind::Entity, cet.code))
            .chain(
                self.store
                    .list_relationships()?
                    .into_iter()
                    .map(|crt| (TemplateKind::Relationship, crt.code)),
            )
            .find(|(_, existing)| existing.to_lowercase() == key);

        match taken {
            Some((kind, existing)) => Err(SchemaError::conflict(
                code,
                format!("code clashes with {kind} `{existing}`"),
            )),
            None => Ok(()),
        }
    }

    /// Code format and existing start and end nodes.
    pub fn validate_relationship(&self, crt: &RelationshipTemplate) -> Result<()> {
        validate_code(&crt.code)?;
        for (side, node) in [("start", &crt.start_node), ("end", &crt.end_node)] {
            if node.is_empty() {
                return Err(SchemaError::validation(
                    &crt.code,
                    format!("{side} node is required"),
                ));
            }
            if self.entity(node)?.is_none() {
                return Err(SchemaError::validation(
                    &crt.code,
                    format!("{side} node `{node}` does not exist"),
                ));
            }
        }
        Ok(())
    }

    /// Field storages must fit in the owner's, entity references must name
    /// an existing entity template.
    pub fn validate_field(&self, field: &CustomField) -> Result<StorageSet> {
        if field.code.is_empty() {
            return Err(SchemaError::validation(
                field.applies_to.as_str(),
                "field code is required",
            ));
        }
        let available = self.owner_storages(&field.applies_to)?;
        let outside = field.storages_outside(&available);
        if !outside.is_empty() {
            let names: Vec<String> = outside.iter().map(ToString::to_string).collect();
            return Err(SchemaError::validation(
                &field.code,
                format!(
                    "storages [{}] are not available on {}",
                    names.join(", "),
                    field.applies_to
                ),
            ));
        }
        if field.field_type == FieldType::Entity {
            let Some(target) = &field.reference else {
                return Err(SchemaError::validation(
                    &field.code,
                    "entity reference field without a referenced template",
                ));
            };
            if self.entity(target)?.is_none() {
                return Err(SchemaError::validation(
                    &field.code,
                    format!("referenced entity template `{target}` does not exist"),
                ));
            }
        }
        Ok(available)
    }
}

fn validate_code(code: &str) -> Result<()> {
    if validate_ontology_code(code) {
        Ok(())
    } else {
        Err(SchemaError::validation(
            code,
            "codes must start with a letter and contain only letters and underscores",
        ))
    }
}

/// Descendance of `code` in an arena snapshot, `code` included.
pub(crate) fn descendance_in(arena: &BTreeMap<String, EntityTemplate>, code: &str) -> Vec<String> {
    if !arena.contains_key(code) {
        return Vec::new();
    }
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for cet in arena.values() {
        if let Some(parent) = &cet.super_template {
            children.entry(parent.as_str()).or_default().push(cet.code.as_str());
        }
    }

    let mut seen = BTreeSet::from([code.to_string()]);
    let mut stack = vec![code];
    while let Some(current) = stack.pop() {
        for child in children.get(current).into_iter().flatten() {
            if seen.insert(child.to_string()) {
                stack.push(*child);
            }
        }
    }
    seen.into_iter().collect()
}
