//! Error types for agentkit-lock

use std::path::PathBuf;

/// Result type for agentkit-lock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing the lockfile
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Lockfile {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Invalid plugin key '{key}': expected namespace/name")]
    InvalidKey { key: String },

    #[error("Invalid lock entry: {0}")]
    InvalidEntry(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fs(#[from] agentkit_fs::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
