//! Error types for role assignment and group coordination

use thiserror::Error;

use crate::types::Role;

/// Result type alias using the core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for role assignment and group coordination
///
/// Every variant is fatal to the calling process: identity errors leave the
/// process without a role, and collective errors strand the other
/// participants of the rendezvous. Retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum Error {
    // Topology errors
    #[error("Invalid topology: {message}")]
    InvalidTopology { message: String },

    // Group service errors
    #[error("Group service unavailable: {message}")]
    GroupServiceUnavailable { message: String },

    #[error("Collective {operation} failed: {message}")]
    Collective { operation: String, message: String },

    // Programmer errors
    #[error("Rank {rank} is idle and has no role group")]
    NoRoleGroup { rank: usize },

    #[error("Instance already finalized (attempted {operation})")]
    InstanceFinalized { operation: String },

    #[error("Role mismatch: expected {expected}, got {actual}")]
    RoleMismatch { expected: Role, actual: Role },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns true if this error is retryable
    ///
    /// Always false: a failed rendezvous cannot be resumed by one participant.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Returns true if this error indicates misuse of the API rather than a
    /// failure of the job or its transport
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Error::NoRoleGroup { .. } | Error::InstanceFinalized { .. } | Error::RoleMismatch { .. }
        )
    }

    pub(crate) fn invalid_topology(message: impl Into<String>) -> Self {
        Error::InvalidTopology {
            message: message.into(),
        }
    }

    pub(crate) fn collective(operation: &str, message: impl Into<String>) -> Self {
        Error::Collective {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
