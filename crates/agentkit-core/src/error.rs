//! Error types for agentkit-core

use std::path::PathBuf;

/// Result type for agentkit-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in agentkit-core operations
///
/// `Config` and `AgentNotFound` abort a sync before anything is mutated.
/// Source and load errors are scoped to the plugin that raised them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A declaration violates a plugin invariant
    #[error("Invalid configuration for agent '{agent}': {message}")]
    Config { agent: String, message: String },

    /// The agent filter matched no declared agent
    #[error("Agent not found: {id}")]
    AgentNotFound { id: String },

    /// A local plugin path does not exist
    #[error("Plugin source not found at {path}")]
    SourceNotFound { path: PathBuf },

    /// A remote plugin could not be cloned, fetched or checked out
    #[error("Failed to fetch {url} at '{reference}': {message}")]
    SourceFetch {
        url: String,
        reference: String,
        message: String,
    },

    /// No usable plugin could be built from a fetched source
    #[error("Failed to load plugin from {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error(transparent)]
    Lock(#[from] agentkit_lock::Error),

    #[error(transparent)]
    Git(#[from] agentkit_git::Error),

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

    pub(crate) fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }
}
