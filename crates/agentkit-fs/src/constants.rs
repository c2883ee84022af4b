//! Well-known project paths.

use std::path::{Path, PathBuf};

/// Standard agentkit project files and directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectPath {
    /// The `.agentkit` state directory
    StateDir,
    /// The `plugins` cache directory inside the state directory
    PluginCache,
    /// The lockfile written next to the configuration
    Lockfile,
    /// The default configuration file
    Config,
}

impl ProjectPath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateDir => ".agentkit",
            Self::PluginCache => "plugins",
            Self::Lockfile => "agentkit.lock.json",
            Self::Config => "agentkit.yaml",
        }
    }

    /// Default cache root for remote plugin clones below `base`.
    pub fn cache_root(base: &Path) -> PathBuf {
        base.join(Self::StateDir).join(Self::PluginCache)
    }
}

impl AsRef<Path> for ProjectPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl std::fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
