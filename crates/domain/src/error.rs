//! Unified error types for the domain layer
//!
//! Provides a common error type for the pure parts of content loading (uid
//! unpacking, payload parsing), so the engine can wrap them without resorting
//! to strings.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A reference uid could not be unpacked into its parts
    #[error("Invalid uid for {format}: {uid}")]
    InvalidUid { format: &'static str, uid: String },

    /// A raw payload had an unexpected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Validation failed (e.g., an entity without a source)
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    /// Create an invalid uid error
    pub fn invalid_uid(format: &'static str, uid: impl Into<String>) -> Self {
        Self::InvalidUid {
            format,
            uid: uid.into(),
        }
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
