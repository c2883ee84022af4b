//! Error types for agentkit-git

use std::path::PathBuf;

/// Result type for agentkit-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in agentkit-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Invalid repository URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to clone {url}: {message}")]
    CloneFailed { url: String, message: String },

    #[error("Failed to fetch updates from {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Failed to checkout '{reference}': {message}")]
    CheckoutFailed { reference: String, message: String },

    #[error("Failed to query refs advertised by {url}: {message}")]
    RemoteUnreachable { url: String, message: String },

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
