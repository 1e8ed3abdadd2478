use std::path::PathBuf;
use thiserror::Error;

/// Errors from metadata store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating the database directory.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    #[error("Metadata store lock poisoned")]
    LockPoisoned,

    /// A stored row could not be decoded back into a record.
    #[error("Corrupt record '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}
