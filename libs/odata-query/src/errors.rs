//! Error types.
//!
//! Three distinct classes exist:
//! - [`QueryError`]: invalid request input. Recorded against the parameter
//!   name in a [`ValidationSink`](crate::ValidationSink), never returned from
//!   `initialize`.
//! - [`ConfigurationError`]: a malformed type registry or an element type the
//!   registry does not know. Fixing it requires a code change, not a new
//!   request.
//! - [`ApplyError`]: failure or cancellation while the source executes.

use thiserror::Error;

/// Invalid query-string input for a single parameter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("syntax error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("unknown property '{name}' on type '{element_type}'")]
    UnknownProperty { name: String, element_type: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("value out of range: {0}")]
    Range(String),
}

impl QueryError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        QueryError::Parse {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn unknown_property(name: &str, element_type: &str) -> Self {
        QueryError::UnknownProperty {
            name: name.to_owned(),
            element_type: element_type.to_owned(),
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        QueryError::TypeMismatch(message.into())
    }

    pub(crate) fn range(message: impl Into<String>) -> Self {
        QueryError::Range(message.into())
    }

    /// Short machine-readable code used in problem responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Parse { .. } => "parse_error",
            QueryError::UnknownProperty { .. } => "unknown_property",
            QueryError::TypeMismatch(_) => "type_mismatch",
            QueryError::Range(_) => "out_of_range",
        }
    }
}

/// Setup defect in the type metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("element type '{0}' is registered twice")]
    DuplicateElementType(String),

    #[error("field '{field}' is declared twice on element type '{element_type}'")]
    DuplicateField { element_type: String, field: String },

    #[error("'{name}' is not a valid name (element type '{element_type}')")]
    InvalidName { element_type: String, name: String },

    #[error("navigation '{field}' on '{element_type}' targets unknown element type '{target}'")]
    UnknownNavigationTarget {
        element_type: String,
        field: String,
        target: String,
    },

    #[error("element type '{0}' is not registered")]
    UnknownElementType(String),
}

/// Failure while the source counts or materializes results.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("query was cancelled")]
    Cancelled,

    #[error("data source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}
