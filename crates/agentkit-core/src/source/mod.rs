//! Plugin sources
//!
//! A [`Source`] knows where a declared plugin lives, how to bring it onto
//! disk, and how to fingerprint it for change detection.

mod local;
mod remote;

pub use local::LocalSource;
pub use remote::RemoteSource;

use std::path::{Path, PathBuf};

use agentkit_lock::{LockEntry, PluginKey, PluginKind};

use crate::Result;
use crate::declaration::{PluginDeclaration, SourceSpec};

/// A fetchable plugin location.
pub trait Source: Send + Sync {
    /// Key the plugin is locked under.
    fn identity(&self) -> PluginKey;

    /// Plugin kind this source was declared with.
    fn kind(&self) -> PluginKind;

    /// Bring the plugin onto disk and return its root directory.
    ///
    /// Remote sources place their checkout below the cache root they were
    /// built with.
    fn materialize(&self) -> Result<PathBuf>;

    /// Fingerprint of what is on disk now. Empty when unknown.
    fn fingerprint(&self) -> String;

    /// Fingerprint compared against the lock entry to classify a change.
    fn observe(&self) -> String {
        self.fingerprint()
    }

    /// Directory inside the materialized root that holds the plugin.
    fn sub_path(&self) -> Option<&str> {
        None
    }

    /// Normalized repository URL, for sources backed by a repository.
    fn repo_url(&self) -> Option<String> {
        None
    }

    /// Lock entry recording a successful install.
    fn lock_entry(&self, declaration: &PluginDeclaration, fingerprint: String) -> LockEntry;
}

/// Settings shared by every source of one sync.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// Directory relative local paths are resolved against
    pub base_dir: PathBuf,
    /// Root of the remote checkout cache
    pub cache_root: PathBuf,
    /// Re-clone remote sources instead of updating them
    pub force: bool,
    /// Never contact upstreams when a cached clone can answer
    pub offline: bool,
}

impl SourceContext {
    pub fn new(base_dir: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache_root: cache_root.into(),
            force: false,
            offline: false,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Build the source for `declaration`.
///
/// Fails only when a remote URL cannot be parsed.
pub fn resolve(declaration: &PluginDeclaration, context: &SourceContext) -> Result<Box<dyn Source>> {
    match &declaration.source {
        SourceSpec::Local { path } => Ok(Box::new(LocalSource::new(
            context.resolve(path),
            declaration.kind,
        ))),
        SourceSpec::Remote {
            url,
            reference,
            sub_path,
        } => Ok(Box::new(RemoteSource::new(
            url,
            reference,
            sub_path.clone(),
            declaration.kind,
            declaration.namespace.as_deref(),
            context,
        )?)),
    }
}

/// Strip the plugin name prefix for kinds that carry it.
pub(crate) fn display_name(name: &str, kind: PluginKind) -> String {
    if !kind.uses_name_prefix() {
        return name.to_string();
    }
    match name.strip_prefix(crate::declaration::PLUGIN_NAME_PREFIX) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => name.to_string(),
    }
}
