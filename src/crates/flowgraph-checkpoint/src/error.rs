//! Error types for checkpoint operations
//!
//! All store implementations surface failures through [`CheckpointError`] so
//! the engine can treat persistence problems uniformly regardless of backend.

use thiserror::Error;

/// Convenience result type using [`CheckpointError`]
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors produced by checkpoint records and stores
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint exists with the requested id
    #[error("checkpoint '{0}' not found")]
    NotFound(String),

    /// The checkpoint metadata carries none of the grouping aliases
    ///
    /// Every persisted checkpoint must be attributable to a group via one of
    /// `execution_id`, `thread_id`, `session_id`, or `workflow_id`.
    #[error("checkpoint metadata has no grouping key (execution_id, thread_id, session_id, or workflow_id)")]
    MissingGroupKey,

    /// State or metadata could not be serialized by the store
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific storage failure
    ///
    /// Wraps whatever the persistence medium reports: connection loss, disk
    /// full, permission denied. The message is backend-defined.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CheckpointError {
    /// Create a storage error from any displayable backend failure
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
