//! Command implementations for agentkit-cli

pub mod list;
pub mod sync;

pub use list::run_list;
pub use sync::run_sync;

use std::path::{Path, PathBuf};

/// Lockfile to use: the explicit one, or the default next to the config.
pub(crate) fn resolve_lockfile(config_path: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| crate::config::default_lockfile(config_path))
}
