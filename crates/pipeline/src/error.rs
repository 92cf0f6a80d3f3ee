use nile_storage::{Collection, StorageError};

/// Errors surfaced by pipeline, directory, settings and backup operations.
///
/// Every variant's `Display` is the human-readable reason shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A referenced id is absent from its collection. No writes happened.
    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: i64 },

    /// Input rejected before any write (missing field, bad amount, empty
    /// rejection reason, invalid transition).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The underlying record store failed.
    #[error("storage failure: {0}")]
    Store(#[from] StorageError),

    /// A backup document is malformed. Reported before any destructive write.
    #[error("invalid backup format: {0}")]
    Format(String),
}

impl PipelineError {
    pub(crate) fn not_found(collection: Collection, id: i64) -> Self {
        PipelineError::NotFound { collection, id }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        PipelineError::Validation(msg.into())
    }
}
