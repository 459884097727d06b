//! Caller-facing failures of the callable endpoint.

use serde_json::Value;
use thiserror::Error;

/// A classified failure returned to callers.
///
/// Explicit classes pass through unchanged; anything unclassified is
/// wrapped as `Internal` with the lower-level message kept in `details`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallableError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Internal {
        message: String,
        details: Option<Value>,
    },
}

impl CallableError {
    pub fn internal(message: impl Into<String>, details: impl std::fmt::Display) -> Self {
        CallableError::Internal {
            message: message.into(),
            details: Some(Value::String(details.to_string())),
        }
    }

    /// Callable protocol status string.
    pub fn status(&self) -> &'static str {
        match self {
            CallableError::Unauthenticated(_) => "UNAUTHENTICATED",
            CallableError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CallableError::NotFound(_) => "NOT_FOUND",
            CallableError::Internal { .. } => "INTERNAL",
        }
    }

    /// HTTP status code for the callable status.
    pub fn http_status(&self) -> u16 {
        match self {
            CallableError::Unauthenticated(_) => 401,
            CallableError::InvalidArgument(_) => 400,
            CallableError::NotFound(_) => 404,
            CallableError::Internal { .. } => 500,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            CallableError::Internal { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}
