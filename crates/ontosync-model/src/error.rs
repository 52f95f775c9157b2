//! Error taxonomy shared by the reconciler and the schema adapters.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Backend a [`ClientError`] originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    Relational,
    Graph,
    Store,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Relational => write!(f, "relational"),
            Backend::Graph => write!(f, "graph"),
            Backend::Store => write!(f, "template store"),
        }
    }
}

/// Failure reported by an external client library.
///
/// `status` carries the backend's own error code when there is one
/// (a SQLSTATE for relational clients, a status code for graph drivers).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{backend} client error: {message}")]
pub struct ClientError {
    pub backend: Backend,
    pub status: Option<String>,
    pub message: String,
}

impl ClientError {
    pub fn new(backend: Backend, message: impl Into<String>) -> Self {
        Self {
            backend,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    /// Bad ontology reference or malformed definition. Raised before any
    /// side effect.
    #[error("invalid definition for `{code}`: {message}")]
    Validation { code: String, message: String },

    #[error("{kind} `{code}` not found")]
    NotFound { kind: &'static str, code: String },

    /// Schema object already exists with an incompatible shape.
    #[error("conflict on `{code}`: {message}")]
    Conflict { code: String, message: String },

    /// Removal blocked by live references; prior state preserved.
    #[error("cannot remove `{object}` of `{code}`: {message}")]
    Dependency {
        code: String,
        object: String,
        message: String,
    },

    /// Underlying client failure, tagged with the template and operation.
    #[error("{operation} failed for `{code}`: {source}")]
    Execution {
        code: String,
        operation: String,
        #[source]
        source: ClientError,
    },
}

impl SchemaError {
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Validation {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, code: impl Into<String>) -> Self {
        SchemaError::NotFound {
            kind,
            code: code.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn execution(
        code: impl Into<String>,
        operation: impl Into<String>,
        source: ClientError,
    ) -> Self {
        SchemaError::Execution {
            code: code.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Re-attribute an adapter error to the template that triggered it. The
    /// schema object named by dependency errors is kept.
    pub fn for_template(self, template: &str) -> Self {
        match self {
            SchemaError::Conflict { message, .. } => SchemaError::Conflict {
                code: template.to_string(),
                message,
            },
            SchemaError::Dependency {
                object, message, ..
            } => SchemaError::Dependency {
                code: template.to_string(),
                object,
                message,
            },
            SchemaError::Execution {
                operation, source, ..
            } => SchemaError::Execution {
                code: template.to_string(),
                operation,
                source,
            },
            other => other,
        }
    }

    /// Code of the template (or schema object) the error refers to.
    pub fn code(&self) -> &str {
        match self {
            SchemaError::Validation { code, .. }
            | SchemaError::NotFound { code, .. }
            | SchemaError::Conflict { code, .. }
            | SchemaError::Dependency { code, .. }
            | SchemaError::Execution { code, .. } => code,
        }
    }
}

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;
