//! Error types for document store, parse, and accessor failures.

use crate::node::Kind;
use crate::store::Handle;
use thiserror::Error;

/// Errors returned by every fallible `jsonkit-core` operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsonError {
    /// The input text was not valid JSON. `offset` is the byte position
    /// where the problem was detected.
    #[error("JSON parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// The handle is stale, was never allocated, or its caller references
    /// have already been consumed or released.
    #[error("invalid handle {0}")]
    InvalidHandle(Handle),

    /// The operation requires a different node kind than the one found.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: Kind },

    /// Object lookup miss.
    #[error("key not found: {0:?}")]
    KeyNotFound(String),

    /// Array lookup outside `0..len`.
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// The store refused to allocate (node limit reached).
    #[error("resource exhausted: {0}")]
    Resource(String),

    /// Attaching the value would make a node contain itself.
    #[error("attaching value would create a cycle")]
    Cycle,
}

impl JsonError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        JsonError::Parse {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn mismatch(expected: &'static str, found: Kind) -> Self {
        JsonError::TypeMismatch { expected, found }
    }
}

/// Convenience alias used throughout jsonkit-core.
pub type Result<T> = std::result::Result<T, JsonError>;
