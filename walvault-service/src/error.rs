//! Error type of the service layer.

use thiserror::Error;
use walvault_types::{HistoryParseError, InvalidFilenameError};

/// Errors that can occur while reading or inspecting the WAL archive.
#[derive(Debug, Error)]
pub enum Error {
    /// IO errors related to payload streaming or file operations.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to de/serialization of stored documents such as backup sentinels.
    #[error("serde error: {context}")]
    Serde {
        /// What was being decoded.
        context: String,
        /// The underlying error.
        #[source]
        cause: serde_json::Error,
    },

    /// A name that must be a segment file name could not be parsed.
    #[error("invalid segment file name: {0}")]
    InvalidFilename(#[from] InvalidFilenameError),

    /// A timeline history file is malformed.
    #[error("invalid history file {name}: {cause}")]
    History {
        /// The object name of the history file.
        name: String,
        /// The parse failure.
        #[source]
        cause: HistoryParseError,
    },

    /// A backup sentinel has a name that does not follow the backup naming scheme.
    #[error("invalid backup name {0:?}")]
    InvalidBackupName(String),

    /// An object is stored with a compression codec this client cannot decode.
    #[error("unsupported compression {extension:?} for object {name}")]
    UnsupportedCompression {
        /// The object name.
        name: String,
        /// The codec file extension.
        extension: String,
    },

    /// An object that must exist was not found in storage.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A background task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Any other error stemming from one of the storage backends.
    #[error("storage backend error: {context}")]
    Generic {
        /// Description of the failed operation.
        context: String,
        /// The underlying error.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Creates an [`Error::Serde`] with the given context.
    pub fn serde(context: impl Into<String>, cause: serde_json::Error) -> Self {
        Self::Serde {
            context: context.into(),
            cause,
        }
    }
}

/// Result type for service operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
