//! Graph execution interface consumed by the adapter.

use ontosync_model::ClientError;
use serde_json::{Map, Value};

/// Named query parameters.
pub type Params = Map<String, Value>;

/// One result row, keyed by the `RETURN` aliases.
pub type Record = Map<String, Value>;

/// A parameterized Cypher statement.
///
/// `name` identifies statements of the adapter's catalogue; drivers may pass
/// it along as transaction metadata. Raw statements have no name.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherStatement {
    pub name: Option<&'static str>,
    pub text: String,
    pub params: Params,
}

impl CypherStatement {
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            name: None,
            text: text.into(),
            params: Params::new(),
        }
    }

    pub fn named(name: &'static str, text: impl Into<String>) -> Self {
        Self {
            name: Some(name),
            text: text.into(),
            params: Params::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

pub trait GraphDriver: Send + Sync {
    fn open_session(&self, database: Option<&str>) -> Result<Box<dyn GraphSession>, ClientError>;
}

pub trait GraphSession: Send {
    fn begin_transaction(&mut self) -> Result<Box<dyn GraphTransaction>, ClientError>;

    fn close(self: Box<Self>) -> Result<(), ClientError>;
}

pub trait GraphTransaction: Send {
    fn run(&mut self, statement: &CypherStatement) -> Result<Vec<Record>, ClientError>;

    fn commit(self: Box<Self>) -> Result<(), ClientError>;

    fn rollback(self: Box<Self>) -> Result<(), ClientError>;
}
