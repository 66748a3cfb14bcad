use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the path store and its repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persisted document exists but cannot be parsed. Fatal at startup:
    /// silently starting empty would throw away the observation history.
    #[error("path database {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("path database io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path database encode error: {0}")]
    Encode(String),

    #[error("path store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
