//! Error types for clipvault.

use thiserror::Error;

/// Result type alias using clipvault's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for clipvault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No registered format processor recognized the restore source.
    #[error("Backup format not recognized")]
    FormatUnrecognized,

    /// A single record inside an otherwise valid file could not be decoded.
    ///
    /// Processors recover from this locally; it never escapes a restore.
    #[error("Corrupt record: {0}")]
    RecordCorrupt(String),

    /// Upserting a clip into the store failed
    #[error("Commit failed: {0}")]
    Commit(String),

    /// Store operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A restore is already running and the policy rejects queueing
    #[error("A restore is already in progress")]
    RestoreInProgress,

    /// The caller cancelled the operation before it committed anything
    #[error("Operation cancelled")]
    Cancelled,

    /// The processor does not support the requested capability
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Source unreadable or sink unwritable
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Whether this error ends the whole operation (as opposed to a single record).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Error::RecordCorrupt(_) | Error::Commit(_))
    }
}
