//! Language-level runtime errors.
//!
//! These are raised when a fragment executes, never while binding. Resolution
//! failures live in `kestrel_vm::resolver::ResolveError` and are turned into
//! [`RuntimeError::Raised`] fragments at the binder boundary.

use std::sync::Arc;

use thiserror::Error;

/// Result type for fragment execution.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors surfaced to script code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Raised by a synthesized error fragment.
    #[error("{message}")]
    Raised { message: Arc<str> },

    /// A non-callable value reached an invoke node.
    #[error("type '{type_name}' is not callable")]
    NotCallable { type_name: String },

    /// A coercion node received a value of the wrong type.
    #[error("cannot convert '{from}' to '{to}'")]
    InvalidCast { from: String, to: String },

    /// A fragment read an operand position the call site did not supply.
    #[error("operand {index} is not available")]
    MissingOperand { index: usize },

    /// Error reported by a native function body.
    #[error("{0}")]
    Native(String),
}

impl RuntimeError {
    pub fn raised(message: impl Into<Arc<str>>) -> Self {
        Self::Raised {
            message: message.into(),
        }
    }

    /// Message text for raised errors.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Raised { message } => Some(message),
            _ => None,
        }
    }
}
