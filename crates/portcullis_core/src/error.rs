//! Core error types for PORTCULLIS.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Parse error
    ParseError {
        /// What failed to parse
        message: String,
    },

    /// Validation error
    Validation {
        /// Offending field
        field: String,
        /// Why it is invalid
        reason: String,
    },

    /// Not found
    NotFound {
        /// Kind of item, e.g. `site`
        kind: String,
        /// Missing identifier
        id: String,
    },

    /// Cycle in a parent chain
    CycleDetected {
        /// Site name
        site: String,
        /// Module where the cycle closes
        module: String,
    },

    /// I/O failure while reading configuration
    Io {
        /// File path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Timeout
    Timeout {
        /// Operation that timed out
        operation: String,
    },

    /// Internal error (for unexpected errors)
    Internal {
        /// Error message
        message: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError { message } => write!(f, "Parse error: {}", message),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::CycleDetected { site, module } => {
                write!(f, "Cycle detected in module chain of {} on site {}", module, site)
            }
            Self::Io { path, message } => write!(f, "I/O error on {}: {}", path, message),
            Self::Timeout { operation } => write!(f, "Timeout: {}", operation),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}
