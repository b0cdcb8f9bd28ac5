//! Error types returned by the `Store` contract and serializer protocol.

use thiserror::Error;

/// Result alias used throughout the checkpoint crate.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Everything that can go wrong while saving, loading, or serializing a
/// checkpoint. Mirrors the shape of the engine's own error enum so callers
/// can match on `.code()` without caring which crate raised the error.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// No checkpoint exists for the requested run/step.
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// A checkpoint or one of its fields failed to (de)serialize.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The backing store rejected the read/write (connection, permissions,
    /// corruption, etc.) — always wraps the backend's own message.
    #[error("store error: {0}")]
    Storage(String),

    /// A caller passed a malformed identifier or an internally inconsistent
    /// checkpoint (e.g. a frontier snapshot referencing an unknown node).
    #[error("invalid checkpoint: {0}")]
    Invalid(String),

    /// Filesystem-backed stores surface `io::Error` through this variant.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Escape hatch for backend-specific errors that don't fit above.
    #[error("{0}")]
    Custom(String),
}

impl CheckpointError {
    /// Stable, machine-readable error code for logging/metrics, independent
    /// of the (free-form) display message.
    pub fn code(&self) -> &'static str {
        match self {
            CheckpointError::NotFound(_) => "not_found",
            CheckpointError::Serialization(_) => "serialization",
            CheckpointError::Storage(_) => "storage",
            CheckpointError::Invalid(_) => "invalid",
            CheckpointError::Io(_) => "io",
            CheckpointError::Custom(_) => "custom",
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        CheckpointError::Storage(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        CheckpointError::Invalid(msg.into())
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(e: serde_json::Error) -> Self {
        CheckpointError::Serialization(e.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for CheckpointError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        CheckpointError::Serialization(e.to_string())
    }
}
