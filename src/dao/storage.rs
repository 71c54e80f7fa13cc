use std::{io, path::PathBuf};

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by the balances persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed while loading or saving the ledger.
    #[error("i/o failure on {path}: {source}")]
    Io {
        /// Path the failing operation targeted.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// The in-memory snapshot could not be encoded.
    #[error("failed to encode balances document")]
    Encode(#[source] serde_json::Error),
}

impl StorageError {
    /// Attach the targeted path to a raw filesystem error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
