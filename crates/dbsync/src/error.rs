//! Error types for the synchronization engine.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while deriving, planning or executing a pass.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database URL names a backend we cannot drive.
    #[error("Unknown database backend '{0}'")]
    UnknownBackend(String),

    /// A field type does not map to any known type class.
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    /// A boolean-ish attribute had an unrecognized value.
    #[error("Unknown boolean value '{0}'")]
    InvalidBool(String),

    /// The named semaphore could not be acquired in time.
    #[error("Could not acquire the semaphore '{name}' within {timeout:?}")]
    LockTimeout {
        /// Semaphore name.
        name: String,
        /// How long we waited.
        timeout: Duration,
    },

    /// The lock file could not be opened or locked.
    #[error("Lock file error at {path}: {source}")]
    Lock {
        /// Path of the lock file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A static row references a field the table does not have.
    #[error("Unused data '{fields}' for table '{table}'")]
    UnknownField {
        /// Target table.
        table: String,
        /// Comma separated list of the offending fields.
        fields: String,
    },

    /// Both a table and its backup exist when a backup is about to be made.
    #[error("Table '{table}' and its backup '{backup}' both exist")]
    BackupConflict {
        /// Live table name.
        table: String,
        /// Backup table name.
        backup: String,
    },

    /// A state table row holds an unreadable timestamp.
    #[error("Invalid timestamp '{value}' stored for '{name}'")]
    InvalidTimestamp {
        /// Pass key of the row.
        name: String,
        /// Stored value.
        value: String,
    },

    /// A planned operation does not fit the simulated live schema.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Database error during introspection or execution.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading spec documents).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a spec document.
    #[error("Failed to parse '{path}': {source}")]
    Parse {
        /// Path to the document.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
