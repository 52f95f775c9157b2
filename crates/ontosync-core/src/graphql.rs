//! GraphQL IDL derived from the template registry.
//!
//! One `type` block per entity template, one `<EndCode>Relation` carrier
//! type per relationship template, preceded by the two custom scalars. The
//! text is rebuilt from the registry on every call.

use crate::registry::{descendance_in, TemplateRegistry};
use ontosync_model::{
    CustomField, EntityTemplate, FieldType, PrimitiveType, RelationshipTemplate, Result,
};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

pub const LONG_SCALAR: &str = "GraphQLLong";
pub const DECIMAL_SCALAR: &str = "GraphQLBigDecimal";

/// One `name: Type` line of a type block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdlField {
    pub name: String,
    pub field_type: String,
    pub multivalued: bool,
    pub required: bool,
    pub directive: Option<String>,
}

impl IdlField {
    fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            multivalued: false,
            required: false,
            directive: None,
        }
    }

    fn multivalued(mut self) -> Self {
        self.multivalued = true;
        self
    }

    fn directive(mut self, directive: String) -> Self {
        self.directive = Some(directive);
        self
    }

    fn render(&self, out: &mut String) {
        let _ = write!(out, "\t{}: ", self.name);
        if self.multivalued {
            let _ = write!(out, "[{}]", self.field_type);
        } else {
            out.push_str(&self.field_type);
        }
        if self.required {
            out.push('!');
        }
        if let Some(directive) = &self.directive {
            out.push(' ');
            out.push_str(directive);
        }
        out.push('\n');
    }
}

/// Output type of a scalar field value.
pub fn scalar_type(field_type: FieldType) -> Option<&'static str> {
    match field_type {
        FieldType::String | FieldType::TextArea | FieldType::Binary => Some("String"),
        FieldType::Long | FieldType::Date => Some(LONG_SCALAR),
        FieldType::Double => Some(DECIMAL_SCALAR),
        FieldType::Boolean => Some("Boolean"),
        FieldType::Entity => None,
    }
}

fn primitive_type(kind: PrimitiveType) -> &'static str {
    match kind {
        PrimitiveType::String => "String",
        PrimitiveType::Long | PrimitiveType::Date => LONG_SCALAR,
        PrimitiveType::Double => DECIMAL_SCALAR,
    }
}

/// Lines for custom fields. Entity references are left to relationships.
fn custom_fields(fields: &[CustomField]) -> Vec<IdlField> {
    fields
        .iter()
        .filter_map(|field| {
            let scalar = scalar_type(field.field_type)?;
            if field.identifier {
                let mut line = IdlField::new(&field.code, "ID");
                line.required = true;
                return Some(line);
            }
            let mut line = IdlField::new(&field.code, scalar);
            line.multivalued = field.is_multivalued();
            line.required = field.required;
            Some(line)
        })
        .collect()
}

fn relation(name: &str, direction: &str) -> String {
    format!("@relation(name: \"{name}\", direction: {direction})")
}

fn cypher(statement: String) -> String {
    format!("@cypher(statement: \"{statement}\")")
}

pub struct GraphQlGenerator {
    registry: Arc<TemplateRegistry>,
}

impl GraphQlGenerator {
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self { registry }
    }

    pub fn generate(&self) -> Result<String> {
        let types = self.types()?;
        let mut idl = format!("scalar {LONG_SCALAR}\nscalar {DECIMAL_SCALAR}\n\n");
        for (name, fields) in &types {
            let _ = writeln!(idl, "type {name} {{");
            for field in fields {
                field.render(&mut idl);
            }
            idl.push_str("}\n\n");
        }
        tracing::debug!(types = types.len(), bytes = idl.len(), "generated GraphQL IDL");
        Ok(idl)
    }

    /// Type name to field lines, ordered by type name.
    pub fn types(&self) -> Result<BTreeMap<String, Vec<IdlField>>> {
        let arena: BTreeMap<String, EntityTemplate> = self
            .registry
            .entities()?
            .into_iter()
            .map(|cet| (cet.code.clone(), cet))
            .collect();

        let mut types = BTreeMap::new();
        for cet in arena.values() {
            types.insert(cet.code.clone(), self.entity_fields(cet)?);
        }

        for crt in self.registry.relationships()? {
            let carrier = format!("{}Relation", crt.end_node);
            let mut carrier_fields = custom_fields(&self.registry.fields_of(&crt.applies_to())?);
            carrier_fields.push(
                IdlField::new("to", crt.end_node.clone())
                    .directive(cypher("MATCH ()-[this]->(to) RETURN to".to_string())),
            );
            carrier_fields.push(
                IdlField::new("from", crt.start_node.clone())
                    .directive(cypher("MATCH (from)-[this]->() RETURN from".to_string())),
            );

            for source in descendance_in(&arena, &crt.start_node) {
                if let Some(fields) = types.get_mut(&source) {
                    fields.extend(outgoing_fields(&crt, &carrier));
                }
            }
            for target in descendance_in(&arena, &crt.end_node) {
                if let Some(fields) = types.get_mut(&target) {
                    fields.extend(incoming_fields(&crt, &carrier));
                }
            }

            if types.insert(carrier.clone(), carrier_fields).is_some() {
                tracing::debug!(
                    relationship = %crt.code,
                    carrier = %carrier,
                    "relation carrier type replaced by a later relationship"
                );
            }
        }
        Ok(types)
    }

    fn entity_fields(&self, cet: &EntityTemplate) -> Result<Vec<IdlField>> {
        let mut fields = custom_fields(&self.registry.fields_of(&cet.applies_to())?);

        for query_field in &cet.graphql_query_fields {
            let mut line = IdlField::new(&query_field.field_name, &query_field.field_type)
                .directive(query_field.query.clone());
            line.multivalued = query_field.multivalued;
            fields.push(line);
        }

        if let Some(kind) = cet.primitive {
            if !fields.iter().any(|f| f.name == "value") {
                let mut value = IdlField::new("value", primitive_type(kind));
                value.required = true;
                fields.push(value);
            }
        }
        Ok(fields)
    }
}

fn outgoing_fields(crt: &RelationshipTemplate, carrier: &str) -> Vec<IdlField> {
    let mut fields = Vec::new();
    if let Some(singular) = &crt.source_name_singular {
        fields.push(
            IdlField::new(singular, crt.end_node.clone()).directive(relation(&crt.name, "OUT")),
        );
    }
    if let Some(plural) = &crt.source_name_plural {
        fields.push(
            IdlField::new(plural, crt.end_node.clone())
                .multivalued()
                .directive(relation(&crt.name, "OUT")),
        );
    }
    if let Some(relationships) = &crt.relationships_field_source {
        fields.push(
            IdlField::new(relationships, carrier)
                .multivalued()
                .directive(cypher(format!(
                    "MATCH (this)-[rel:{}]->(n:{}) RETURN rel",
                    crt.name, crt.end_node
                ))),
        );
    }
    fields
}

fn incoming_fields(crt: &RelationshipTemplate, carrier: &str) -> Vec<IdlField> {
    let mut fields = Vec::new();
    if let Some(singular) = &crt.target_name_singular {
        fields.push(
            IdlField::new(singular, crt.start_node.clone()).directive(relation(&crt.name, "IN")),
        );
    }
    if let Some(plural) = &crt.target_name_plural {
        fields.push(
            IdlField::new(plural, crt.start_node.clone())
                .multivalued()
                .directive(relation(&crt.name, "IN")),
        );
    }
    if let Some(relationships) = &crt.relationships_field_target {
        fields.push(
            IdlField::new(relationships, carrier)
                .multivalued()
                .directive(cypher(format!(
                    "MATCH (n:{})-[rel:{}]->(this) RETURN rel",
                    crt.start_node, crt.name
                ))),
        );
    }
    fields
}
