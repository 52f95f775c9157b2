//! In-memory graph backend.
//!
//! `MemoryGraph` keeps the ontology mirror (entity template nodes with their
//! `EXTENDS` edge, relationship template nodes with their endpoint edges)
//! and answers the statements of [`crate::queries`] by name. Writes are
//! staged per transaction and replayed onto the shared mirror at commit.
//! Raw statements are only answered when a canned response was registered
//! with [`MemoryGraph::respond_to`].

use crate::driver::{CypherStatement, GraphDriver, GraphSession, GraphTransaction, Record};
use crate::queries::names;
use ontosync_model::{Backend, ClientError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Graph driver status codes used by the in-memory backend.
pub mod status {
    pub const SYNTAX_ERROR: &str = "Neo.ClientError.Statement.SyntaxError";
    pub const PARAMETER_MISSING: &str = "Neo.ClientError.Statement.ParameterMissing";
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EntityNode {
    name: String,
    parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RelationshipNode {
    name: String,
    unique: bool,
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Mirror {
    entities: BTreeMap<String, EntityNode>,
    relationships: BTreeMap<String, RelationshipNode>,
}

impl Mirror {
    /// `code` followed by every ancestor reachable through `EXTENDS`.
    fn ancestors(&self, code: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = self.entities.get_key_value(code);
        while let Some((code, node)) = current {
            if !seen.insert(code.clone()) {
                break;
            }
            chain.push(code.clone());
            current = node
                .parent
                .as_ref()
                .and_then(|parent| self.entities.get_key_value(parent));
        }
        chain
    }

    fn connected(&self) -> impl Iterator<Item = (&String, &RelationshipNode, &str, &str)> {
        self.relationships.iter().filter_map(|(code, node)| {
            match (node.start.as_deref(), node.end.as_deref()) {
                (Some(start), Some(end)) => Some((code, node, start, end)),
                _ => None,
            }
        })
    }

    fn apply(&mut self, write: &Write) -> Vec<Record> {
        match write {
            Write::MergeEntity { code, name, parent } => {
                let parent = parent
                    .as_ref()
                    .filter(|parent| self.entities.contains_key(*parent))
                    .cloned();
                self.entities.insert(
                    code.clone(),
                    EntityNode {
                        name: name.clone(),
                        parent,
                    },
                );
                vec![code_record(code)]
            }
            Write::DeleteEntity { code } => {
                if self.entities.remove(code).is_some() {
                    for node in self.entities.values_mut() {
                        if node.parent.as_deref() == Some(code.as_str()) {
                            node.parent = None;
                        }
                    }
                    for node in self.relationships.values_mut() {
                        if node.start.as_deref() == Some(code.as_str()) {
                            node.start = None;
                        }
                        if node.end.as_deref() == Some(code.as_str()) {
                            node.end = None;
                        }
                    }
                }
                Vec::new()
            }
            Write::MergeRelationship {
                code,
                name,
                start,
                end,
                unique,
            } => {
                if !self.entities.contains_key(start) || !self.entities.contains_key(end) {
                    return Vec::new();
                }
                self.relationships.insert(
                    code.clone(),
                    RelationshipNode {
                        name: name.clone(),
                        unique: *unique,
                        start: Some(start.clone()),
                        end: Some(end.clone()),
                    },
                );
                vec![code_record(code)]
            }
            Write::DeleteRelationship { code } => {
                self.relationships.remove(code);
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Write {
    MergeEntity {
        code: String,
        name: String,
        parent: Option<String>,
    },
    DeleteEntity {
        code: String,
    },
    MergeRelationship {
        code: String,
        name: String,
        start: String,
        end: String,
        unique: bool,
    },
    DeleteRelationship {
        code: String,
    },
}

#[derive(Default)]
struct Shared {
    mirror: Mirror,
    canned: HashMap<String, Vec<Record>>,
    fail_on: Vec<(String, ClientError)>,
    fail_close: Option<ClientError>,
    statement_log: Vec<String>,
    sessions_opened: usize,
    sessions_open: usize,
    commits: usize,
    rollbacks: usize,
}

/// In-memory [`GraphDriver`]. Clones share the same mirror.
#[derive(Clone, Default)]
pub struct MemoryGraph {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rows returned for a raw statement with exactly this text.
    pub fn respond_to(&self, text: impl Into<String>, rows: Vec<Record>) {
        self.shared.lock().canned.insert(text.into(), rows);
    }

    /// Fail the next statement whose name (or raw text) equals `statement`.
    pub fn fail_next(&self, statement: impl Into<String>, err: ClientError) {
        self.shared.lock().fail_on.push((statement.into(), err));
    }

    /// Fail the next session close. The session is released anyway.
    pub fn fail_next_close(&self, err: ClientError) {
        self.shared.lock().fail_close = Some(err);
    }

    pub fn sessions_opened(&self) -> usize {
        self.shared.lock().sessions_opened
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.shared.lock().sessions_open
    }

    pub fn commits(&self) -> usize {
        self.shared.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.shared.lock().rollbacks
    }

    /// Names (or text, for raw statements) of every statement run.
    pub fn statement_log(&self) -> Vec<String> {
        self.shared.lock().statement_log.clone()
    }

    pub fn entity_codes(&self) -> Vec<String> {
        self.shared.lock().mirror.entities.keys().cloned().collect()
    }

    pub fn relationship_codes(&self) -> Vec<String> {
        self.shared.lock().mirror.relationships.keys().cloned().collect()
    }

    pub fn entity_name(&self, code: &str) -> Option<String> {
        self.shared
            .lock()
            .mirror
            .entities
            .get(code)
            .map(|node| node.name.clone())
    }

    pub fn relationship_is_unique(&self, code: &str) -> Option<bool> {
        self.shared
            .lock()
            .mirror
            .relationships
            .get(code)
            .map(|node| node.unique)
    }

    /// Super-template edge of a mirrored entity template.
    pub fn parent_of(&self, code: &str) -> Option<String> {
        self.shared
            .lock()
            .mirror
            .entities
            .get(code)
            .and_then(|node| node.parent.clone())
    }
}

impl GraphDriver for MemoryGraph {
    fn open_session(&self, database: Option<&str>) -> Result<Box<dyn GraphSession>, ClientError> {
        let mut shared = self.shared.lock();
        shared.sessions_opened += 1;
        shared.sessions_open += 1;
        tracing::trace!(database = database.unwrap_or("<default>"), "opened graph session");
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MemorySession {
    shared: Arc<Mutex<Shared>>,
}

impl GraphSession for MemorySession {
    fn begin_transaction(&mut self) -> Result<Box<dyn GraphTransaction>, ClientError> {
        let staged = self.shared.lock().mirror.clone();
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            staged,
            writes: Vec::new(),
        }))
    }

    fn close(self: Box<Self>) -> Result<(), ClientError> {
        let mut shared = self.shared.lock();
        shared.sessions_open = shared.sessions_open.saturating_sub(1);
        match shared.fail_close.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct MemoryTransaction {
    shared: Arc<Mutex<Shared>>,
    staged: Mirror,
    writes: Vec<Write>,
}

impl MemoryTransaction {
    fn write(&mut self, write: Write) -> Vec<Record> {
        let rows = self.staged.apply(&write);
        self.writes.push(write);
        rows
    }
}

impl GraphTransaction for MemoryTransaction {
    fn run(&mut self, statement: &CypherStatement) -> Result<Vec<Record>, ClientError> {
        let key = statement
            .name
            .map_or_else(|| statement.text.clone(), str::to_string);
        let canned = {
            let mut shared = self.shared.lock();
            shared.statement_log.push(key.clone());
            if let Some(index) = shared.fail_on.iter().position(|(k, _)| *k == key) {
                return Err(shared.fail_on.remove(index).1);
            }
            statement
                .name
                .is_none()
                .then(|| shared.canned.get(&statement.text).cloned())
                .flatten()
        };

        let Some(name) = statement.name else {
            return canned.ok_or_else(|| {
                ClientError::new(
                    Backend::Graph,
                    format!("unsupported statement: {}", statement.text),
                )
                .with_status(status::SYNTAX_ERROR)
            });
        };

        match name {
            names::RELATIONSHIPS_OF_ANCESTORS => {
                let cet = param(statement, "cetCode")?;
                let crt_name = param(statement, "crtName")?;
                let ancestors = self.staged.ancestors(cet);
                let codes: BTreeSet<&String> = self
                    .staged
                    .connected()
                    .filter(|(_, node, start, end)| {
                        node.name == crt_name
                            && ancestors.iter().any(|a| a == start || a == end)
                    })
                    .map(|(code, ..)| code)
                    .collect();
                Ok(codes.into_iter().map(|code| code_record(code)).collect())
            }
            names::BY_SOURCE_OR_TARGET => {
                let source = param(statement, "source")?;
                let target = param(statement, "target")?;
                Ok(self.summaries(|_, start, end| pair_matches(source, target, start, end)))
            }
            names::BY_NAME_AND_SOURCE_OR_TARGET => {
                let source = param(statement, "source")?;
                let target = param(statement, "target")?;
                let rel_name = param(statement, "name")?;
                Ok(self.summaries(|node, start, end| {
                    node.name == rel_name && pair_matches(source, target, start, end)
                }))
            }
            names::BY_START_END_AND_NAME => {
                let start_code = param(statement, "startCode")?;
                let end_code = param(statement, "endCode")?;
                let rel_name = param(statement, "name")?;
                Ok(self.summaries(|node, start, end| {
                    node.name == rel_name && start == start_code && end == end_code
                }))
            }
            names::MERGE_ENTITY_TEMPLATE => {
                let write = Write::MergeEntity {
                    code: param(statement, "code")?.to_string(),
                    name: param(statement, "name")?.to_string(),
                    parent: statement.str_param("superTemplate").map(str::to_string),
                };
                Ok(self.write(write))
            }
            names::DELETE_ENTITY_TEMPLATE => {
                let code = param(statement, "code")?.to_string();
                Ok(self.write(Write::DeleteEntity { code }))
            }
            names::MERGE_RELATIONSHIP_TEMPLATE => {
                let write = Write::MergeRelationship {
                    code: param(statement, "code")?.to_string(),
                    name: param(statement, "name")?.to_string(),
                    start: param(statement, "startNode")?.to_string(),
                    end: param(statement, "endNode")?.to_string(),
                    unique: statement
                        .params
                        .get("unique")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                };
                Ok(self.write(write))
            }
            names::DELETE_RELATIONSHIP_TEMPLATE => {
                let code = param(statement, "code")?.to_string();
                Ok(self.write(Write::DeleteRelationship { code }))
            }
            other => Err(ClientError::new(
                Backend::Graph,
                format!("unknown statement `{other}`"),
            )
            .with_status(status::SYNTAX_ERROR)),
        }
    }

    fn commit(self: Box<Self>) -> Result<(), ClientError> {
        let mut shared = self.shared.lock();
        for write in &self.writes {
            shared.mirror.apply(write);
        }
        shared.commits += 1;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), ClientError> {
        self.shared.lock().rollbacks += 1;
        Ok(())
    }
}

impl MemoryTransaction {
    fn summaries(&self, filter: impl Fn(&RelationshipNode, &str, &str) -> bool) -> Vec<Record> {
        self.staged
            .connected()
            .filter(|(_, node, start, end)| filter(node, start, end))
            .map(|(code, node, start, end)| {
                let mut record = Record::new();
                record.insert("code".into(), Value::String(code.clone()));
                record.insert("name".into(), Value::String(node.name.clone()));
                record.insert("startNode".into(), Value::String(start.to_string()));
                record.insert("endNode".into(), Value::String(end.to_string()));
                record
            })
            .collect()
    }
}

fn pair_matches(a: &str, b: &str, start: &str, end: &str) -> bool {
    (start == a && end == b) || (start == b && end == a)
}

fn param<'s>(statement: &'s CypherStatement, key: &str) -> Result<&'s str, ClientError> {
    statement.str_param(key).ok_or_else(|| {
        ClientError::new(Backend::Graph, format!("expected parameter `{key}`"))
            .with_status(status::PARAMETER_MISSING)
    })
}

fn code_record(code: &str) -> Record {
    let mut record = Record::new();
    record.insert("code".into(), Value::String(code.to_string()));
    record
}
