//! Cypher statement catalogue.
//!
//! Labels come from [`GraphConfig`]; relationship types of the mirror are
//! fixed (`EXTENDS`, `STARTS_AT`, `ENDS_AT`).

use crate::config::GraphConfig;
use crate::driver::CypherStatement;
use ontosync_model::{EntityTemplate, RelationshipTemplate};
use serde_json::Value;

/// Statement names, passed as transaction metadata.
pub mod names {
    pub const RELATIONSHIPS_OF_ANCESTORS: &str = "crt.by_cet_and_name";
    pub const BY_SOURCE_OR_TARGET: &str = "crt.by_source_or_target";
    pub const BY_NAME_AND_SOURCE_OR_TARGET: &str = "crt.by_name_and_source_or_target";
    pub const BY_START_END_AND_NAME: &str = "crt.by_start_end_and_name";
    pub const MERGE_ENTITY_TEMPLATE: &str = "cet.merge";
    pub const DELETE_ENTITY_TEMPLATE: &str = "cet.delete";
    pub const MERGE_RELATIONSHIP_TEMPLATE: &str = "crt.merge";
    pub const DELETE_RELATIONSHIP_TEMPLATE: &str = "crt.delete";
}

const RELATIONSHIP_COLUMNS: &str =
    "crt.code AS code, crt.name AS name, start.code AS startNode, end.code AS endNode";

pub struct Queries<'a> {
    entity: &'a str,
    relationship: &'a str,
}

impl<'a> Queries<'a> {
    pub fn new(config: &'a GraphConfig) -> Self {
        Self {
            entity: &config.entity_label,
            relationship: &config.relationship_label,
        }
    }

    /// Codes of relationship templates named `name` attached to the entity
    /// template or any of its ancestors, walking `EXTENDS` recursively in
    /// one statement.
    pub fn relationships_of_ancestors(&self, cet_code: &str, name: &str) -> CypherStatement {
        let (e, r) = (self.entity, self.relationship);
        CypherStatement::named(
            names::RELATIONSHIPS_OF_ANCESTORS,
            format!(
                "MATCH (cet:{e} {{code: $cetCode}})-[:EXTENDS*0..]->(ancestor:{e})\n\
                 MATCH (crt:{r} {{name: $crtName}})-[:STARTS_AT|ENDS_AT]->(ancestor)\n\
                 RETURN DISTINCT crt.code AS code\n\
                 ORDER BY code"
            ),
        )
        .param("cetCode", cet_code)
        .param("crtName", name)
    }

    /// Relationship templates linking the two templates in either
    /// direction.
    pub fn by_source_or_target(&self, source: &str, target: &str) -> CypherStatement {
        let (e, r) = (self.entity, self.relationship);
        CypherStatement::named(
            names::BY_SOURCE_OR_TARGET,
            format!(
                "MATCH (start:{e})<-[:STARTS_AT]-(crt:{r})-[:ENDS_AT]->(end:{e})\n\
                 WHERE (start.code = $source AND end.code = $target)\n\
                    OR (start.code = $target AND end.code = $source)\n\
                 RETURN {RELATIONSHIP_COLUMNS}\n\
                 ORDER BY code"
            ),
        )
        .param("source", source)
        .param("target", target)
    }

    pub fn by_name_and_source_or_target(
        &self,
        source: &str,
        target: &str,
        name: &str,
    ) -> CypherStatement {
        let (e, r) = (self.entity, self.relationship);
        CypherStatement::named(
            names::BY_NAME_AND_SOURCE_OR_TARGET,
            format!(
                "MATCH (start:{e})<-[:STARTS_AT]-(crt:{r} {{name: $name}})-[:ENDS_AT]->(end:{e})\n\
                 WHERE (start.code = $source AND end.code = $target)\n\
                    OR (start.code = $target AND end.code = $source)\n\
                 RETURN {RELATIONSHIP_COLUMNS}\n\
                 ORDER BY code"
            ),
        )
        .param("source", source)
        .param("target", target)
        .param("name", name)
    }

    pub fn by_start_end_and_name(&self, start: &str, end: &str, name: &str) -> CypherStatement {
        let (e, r) = (self.entity, self.relationship);
        CypherStatement::named(
            names::BY_START_END_AND_NAME,
            format!(
                "MATCH (start:{e} {{code: $startCode}})<-[:STARTS_AT]-(crt:{r} {{name: $name}})-[:ENDS_AT]->(end:{e} {{code: $endCode}})\n\
                 RETURN {RELATIONSHIP_COLUMNS}\n\
                 ORDER BY code"
            ),
        )
        .param("startCode", start)
        .param("endCode", end)
        .param("name", name)
    }

    /// Upsert an entity template node and its `EXTENDS` edge.
    pub fn merge_entity_template(&self, cet: &EntityTemplate) -> CypherStatement {
        let e = self.entity;
        let super_template = cet
            .super_template
            .as_ref()
            .map_or(Value::Null, |code| Value::String(code.clone()));
        CypherStatement::named(
            names::MERGE_ENTITY_TEMPLATE,
            format!(
                "MERGE (cet:{e} {{code: $code}})\n\
                 SET cet.name = $name\n\
                 WITH cet\n\
                 OPTIONAL MATCH (cet)-[old:EXTENDS]->()\n\
                 DELETE old\n\
                 WITH DISTINCT cet\n\
                 OPTIONAL MATCH (parent:{e} {{code: $superTemplate}})\n\
                 FOREACH (_ IN CASE WHEN parent IS NULL THEN [] ELSE [1] END |\n\
                     MERGE (cet)-[:EXTENDS]->(parent))\n\
                 RETURN cet.code AS code"
            ),
        )
        .param("code", cet.code.as_str())
        .param("name", cet.name.as_str())
        .param("superTemplate", super_template)
    }

    pub fn delete_entity_template(&self, code: &str) -> CypherStatement {
        CypherStatement::named(
            names::DELETE_ENTITY_TEMPLATE,
            format!("MATCH (cet:{} {{code: $code}})\nDETACH DELETE cet", self.entity),
        )
        .param("code", code)
    }

    /// Upsert a relationship template node with its endpoint edges. Returns
    /// no row when either endpoint is missing from the mirror.
    pub fn merge_relationship_template(&self, crt: &RelationshipTemplate) -> CypherStatement {
        let (e, r) = (self.entity, self.relationship);
        CypherStatement::named(
            names::MERGE_RELATIONSHIP_TEMPLATE,
            format!(
                "MATCH (start:{e} {{code: $startNode}}), (end:{e} {{code: $endNode}})\n\
                 MERGE (crt:{r} {{code: $code}})\n\
                 SET crt.name = $name, crt.unique = $unique\n\
                 WITH crt, start, end\n\
                 OPTIONAL MATCH (crt)-[old:STARTS_AT|ENDS_AT]->()\n\
                 DELETE old\n\
                 WITH DISTINCT crt, start, end\n\
                 MERGE (crt)-[:STARTS_AT]->(start)\n\
                 MERGE (crt)-[:ENDS_AT]->(end)\n\
                 RETURN crt.code AS code"
            ),
        )
        .param("code", crt.code.as_str())
        .param("name", crt.name.as_str())
        .param("startNode", crt.start_node.as_str())
        .param("endNode", crt.end_node.as_str())
        .param("unique", crt.unique)
    }

    pub fn delete_relationship_template(&self, code: &str) -> CypherStatement {
        CypherStatement::named(
            names::DELETE_RELATIONSHIP_TEMPLATE,
            format!(
                "MATCH (crt:{} {{code: $code}})\nDETACH DELETE crt",
                self.relationship
            ),
        )
        .param("code", code)
    }
}
