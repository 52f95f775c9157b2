//! Template persistence.
//!
//! The store is the system of record for template and field definitions.
//! [`TemplateStore`] is the seam to the persistence collaborator;
//! [`MemoryTemplateStore`] keeps everything behind one `RwLock`.

use ontosync_model::{
    AppliesTo, Backend, ClientError, CustomField, EntityTemplate, RelationshipTemplate, Result,
    SchemaError,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;

pub trait TemplateStore: Send + Sync {
    /// Fails with a conflict when the code is taken.
    fn insert_entity(&self, cet: EntityTemplate) -> Result<()>;
    /// Fails with not-found when the code is unknown.
    fn update_entity(&self, cet: EntityTemplate) -> Result<()>;
    fn remove_entity(&self, code: &str) -> Result<Option<EntityTemplate>>;
    fn find_entity(&self, code: &str) -> Result<Option<EntityTemplate>>;
    /// All entity templates, ordered by code.
    fn list_entities(&self) -> Result<Vec<EntityTemplate>>;

    fn insert_relationship(&self, crt: RelationshipTemplate) -> Result<()>;
    fn update_relationship(&self, crt: RelationshipTemplate) -> Result<()>;
    fn remove_relationship(&self, code: &str) -> Result<Option<RelationshipTemplate>>;
    fn find_relationship(&self, code: &str) -> Result<Option<RelationshipTemplate>>;
    /// All relationship templates, ordered by code.
    fn list_relationships(&self) -> Result<Vec<RelationshipTemplate>>;

    fn insert_field(&self, field: CustomField) -> Result<()>;
    fn update_field(&self, field: CustomField) -> Result<()>;
    fn remove_field(&self, applies_to: &AppliesTo, code: &str) -> Result<Option<CustomField>>;
    fn find_field(&self, applies_to: &AppliesTo, code: &str) -> Result<Option<CustomField>>;
    /// Fields of one scope in definition order (position, then code).
    fn fields_of(&self, applies_to: &AppliesTo) -> Result<Vec<CustomField>>;

    /// `SELECT DISTINCT unique FROM relationship templates WHERE code = ?`.
    /// `None` when no template has that code.
    fn relationship_unique_flag(&self, code: &str) -> Result<Option<bool>>;
}

#[derive(Default)]
struct Tables {
    entities: BTreeMap<String, EntityTemplate>,
    relationships: BTreeMap<String, RelationshipTemplate>,
    fields: BTreeMap<(AppliesTo, String), CustomField>,
}

#[derive(Default)]
pub struct MemoryTemplateStore {
    tables: RwLock<Tables>,
    fail_next: Mutex<Option<ClientError>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next store call with `err`.
    pub fn fail_next(&self, err: ClientError) {
        *self.fail_next.lock() = Some(err);
    }

    fn check(&self, operation: &str, code: &str) -> Result<()> {
        match self.fail_next.lock().take() {
            Some(err) => Err(SchemaError::execution(code, operation, err)),
            None => Ok(()),
        }
    }
}

fn insert_unique<T>(
    map: &mut BTreeMap<String, T>,
    code: String,
    value: T,
    kind: &str,
) -> Result<()> {
    if map.contains_key(&code) {
        return Err(SchemaError::conflict(
            &code,
            format!("{kind} `{code}` already exists"),
        ));
    }
    map.insert(code, value);
    Ok(())
}

fn replace_existing<T>(
    map: &mut BTreeMap<String, T>,
    code: String,
    value: T,
    kind: &'static str,
) -> Result<()> {
    match map.get_mut(&code) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(SchemaError::not_found(kind, code)),
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn insert_entity(&self, cet: EntityTemplate) -> Result<()> {
        self.check("insert entity template", &cet.code)?;
        let mut tables = self.tables.write();
        insert_unique(&mut tables.entities, cet.code.clone(), cet, "entity template")
    }

    fn update_entity(&self, cet: EntityTemplate) -> Result<()> {
        self.check("update entity template", &cet.code)?;
        let mut tables = self.tables.write();
        replace_existing(&mut tables.entities, cet.code.clone(), cet, "entity template")
    }

    fn remove_entity(&self, code: &str) -> Result<Option<EntityTemplate>> {
        self.check("remove entity template", code)?;
        Ok(self.tables.write().entities.remove(code))
    }

    fn find_entity(&self, code: &str) -> Result<Option<EntityTemplate>> {
        self.check("find entity template", code)?;
        Ok(self.tables.read().entities.get(code).cloned())
    }

    fn list_entities(&self) -> Result<Vec<EntityTemplate>> {
        self.check("list entity templates", "*")?;
        Ok(self.tables.read().entities.values().cloned().collect())
    }

    fn insert_relationship(&self, crt: RelationshipTemplate) -> Result<()> {
        self.check("insert relationship template", &crt.code)?;
        let mut tables = self.tables.write();
        insert_unique(
            &mut tables.relationships,
            crt.code.clone(),
            crt,
            "relationship template",
        )
    }

    fn update_relationship(&self, crt: RelationshipTemplate) -> Result<()> {
        self.check("update relationship template", &crt.code)?;
        let mut tables = self.tables.write();
        replace_existing(
            &mut tables.relationships,
            crt.code.clone(),
            crt,
            "relationship template",
        )
    }

    fn remove_relationship(&self, code: &str) -> Result<Option<RelationshipTemplate>> {
        self.check("remove relationship template", code)?;
        Ok(self.tables.write().relationships.remove(code))
    }

    fn find_relationship(&self, code: &str) -> Result<Option<RelationshipTemplate>> {
        self.check("find relationship template", code)?;
        Ok(self.tables.read().relationships.get(code).cloned())
    }

    fn list_relationships(&self) -> Result<Vec<RelationshipTemplate>> {
        self.check("list relationship templates", "*")?;
        Ok(self.tables.read().relationships.values().cloned().collect())
    }

    fn insert_field(&self, field: CustomField) -> Result<()> {
        self.check("insert field", &field.code)?;
        let key = (field.applies_to.clone(), field.code.clone());
        let mut tables = self.tables.write();
        if tables.fields.contains_key(&key) {
            return Err(SchemaError::conflict(
                &field.code,
                format!("field `{}` already exists on {}", field.code, field.applies_to),
            ));
        }
        tables.fields.insert(key, field);
        Ok(())
    }

    fn update_field(&self, field: CustomField) -> Result<()> {
        self.check("update field", &field.code)?;
        let key = (field.applies_to.clone(), field.code.clone());
        let mut tables = self.tables.write();
        match tables.fields.get_mut(&key) {
            Some(slot) => {
                *slot = field;
                Ok(())
            }
            None => Err(SchemaError::not_found("field", field.code)),
        }
    }

    fn remove_field(&self, applies_to: &AppliesTo, code: &str) -> Result<Option<CustomField>> {
        self.check("remove field", code)?;
        Ok(self
            .tables
            .write()
            .fields
            .remove(&(applies_to.clone(), code.to_string())))
    }

    fn find_field(&self, applies_to: &AppliesTo, code: &str) -> Result<Option<CustomField>> {
        self.check("find field", code)?;
        Ok(self
            .tables
            .read()
            .fields
            .get(&(applies_to.clone(), code.to_string()))
            .cloned())
    }

    fn fields_of(&self, applies_to: &AppliesTo) -> Result<Vec<CustomField>> {
        self.check("list fields", applies_to.as_str())?;
        let mut fields: Vec<CustomField> = self
            .tables
            .read()
            .fields
            .iter()
            .filter(|((scope, _), _)| scope == applies_to)
            .map(|(_, field)| field.clone())
            .collect();
        fields.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.code.cmp(&b.code)));
        Ok(fields)
    }

    fn relationship_unique_flag(&self, code: &str) -> Result<Option<bool>> {
        self.check("query relationship unicity", code)?;
        Ok(self
            .tables
            .read()
            .relationships
            .get(code)
            .map(|crt| crt.unique))
    }
}

/// Client error raised by stores for backend failures.
pub fn store_error(message: impl Into<String>) -> ClientError {
    ClientError::new(Backend::Store, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontosync_model::FieldType;

    #[test]
    fn test_fields_come_back_in_definition_order() {
        let store = MemoryTemplateStore::new();
        let scope = AppliesTo::entity("Person");
        store
            .insert_field(CustomField::new("zeta", scope.clone(), FieldType::Long).at(0))
            .unwrap();
        store
            .insert_field(CustomField::new("alpha", scope.clone(), FieldType::Long).at(1))
            .unwrap();
        store
            .insert_field(CustomField::new("other", AppliesTo::entity("Car"), FieldType::Long))
            .unwrap();

        let codes: Vec<_> = store
            .fields_of(&scope)
            .unwrap()
            .into_iter()
            .map(|f| f.code)
            .collect();
        assert_eq!(codes, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_duplicate_template_is_a_conflict() {
        let store = MemoryTemplateStore::new();
        store.insert_entity(EntityTemplate::new("Person", "Person")).unwrap();
        let err = store
            .insert_entity(EntityTemplate::new("Person", "Someone"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::Conflict { .. }));
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let store = MemoryTemplateStore::new();
        store.fail_next(store_error("connection refused"));
        assert!(matches!(
            store.list_entities(),
            Err(SchemaError::Execution { .. })
        ));
        assert!(store.list_entities().unwrap().is_empty());
    }
}
