use crate::record::Collection;

/// All errors that can be returned by a RecordStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying SQLite failure (connection, constraint, missing table).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be converted to or from its stored form.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data for a collection does not have the expected shape.
    #[error("corrupt data in collection '{collection}': {message}")]
    Corrupt {
        collection: Collection,
        message: String,
    },

    /// The store was used before `initialize()` created the collection.
    #[error("collection '{collection}' is not initialized")]
    Uninitialized { collection: Collection },

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("record store lock poisoned")]
    LockPoisoned,
}
