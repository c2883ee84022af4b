use std::path::PathBuf;

use agentkit_lock::{LockEntry, PluginKey, PluginKind, SourceKind};
use chrono::Utc;

use super::{Source, display_name};
use crate::declaration::{LOCAL_VERSION, PluginDeclaration};
use crate::{Error, Result};

/// Namespace of every filesystem plugin.
pub const LOCAL_NAMESPACE: &str = "local";

/// Extensions of single-file plugin manifests, dropped from the plugin name.
const MANIFEST_EXTENSIONS: &[&str] = &["json", "toml", "yaml", "yml"];

/// A plugin file or directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalSource {
    path: PathBuf,
    kind: PluginKind,
}

impl LocalSource {
    /// `path` must already be resolved against the configuration directory.
    pub fn new(path: PathBuf, kind: PluginKind) -> Self {
        Self { path, kind }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Name derived from the declared path alone, so it is stable when the
    /// path disappears.
    fn raw_name(&self) -> String {
        let is_manifest = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        let name = if is_manifest {
            self.path.file_stem()
        } else {
            self.path.file_name()
        };
        match name {
            Some(n) => n.to_string_lossy().into_owned(),
            None => dunce::canonicalize(&self.path)
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| LOCAL_NAMESPACE.to_string()),
        }
    }
}

impl Source for LocalSource {
    fn identity(&self) -> PluginKey {
        PluginKey::new(LOCAL_NAMESPACE, display_name(&self.raw_name(), self.kind))
    }

    fn kind(&self) -> PluginKind {
        self.kind
    }

    fn materialize(&self) -> Result<PathBuf> {
        if !self.path.exists() {
            return Err(Error::SourceNotFound {
                path: self.path.clone(),
            });
        }
        dunce::canonicalize(&self.path).map_err(|e| Error::io(&self.path, e))
    }

    fn fingerprint(&self) -> String {
        agentkit_fs::fingerprint_path(&self.path)
    }

    fn lock_entry(&self, declaration: &PluginDeclaration, fingerprint: String) -> LockEntry {
        let key = self.identity();
        let source_path = dunce::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        LockEntry {
            full_name: key.to_string(),
            namespace: key.namespace,
            name: key.name,
            version: LOCAL_VERSION.to_string(),
            source_type: SourceKind::Local,
            plugin_type: self.kind,
            fingerprint,
            installed_at: Utc::now(),
            variables: declaration.variables.clone(),
            command: declaration.command.clone(),
            args: declaration.args.clone(),
            source_path: Some(source_path.to_string_lossy().into_owned()),
            repo_url: None,
            sub_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_identity_uses_stem() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("weather.json");
        std::fs::write(&file, "{}").unwrap();

        let source = LocalSource::new(file, PluginKind::Standard);
        assert_eq!(source.identity(), PluginKey::new("local", "weather"));
    }

    #[test]
    fn file_identity_survives_deletion() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("weather.json");
        std::fs::write(&file, "{}").unwrap();
        let source = LocalSource::new(file.clone(), PluginKind::Standard);
        let before = source.identity();

        std::fs::remove_file(&file).unwrap();

        assert_eq!(source.identity(), before);
    }

    #[test]
    fn prefix_is_stripped_from_directory_names() {
        let source = LocalSource::new(
            PathBuf::from("/plugins/agentkit-plugin-search"),
            PluginKind::Standard,
        );
        assert_eq!(source.identity().name, "search");

        let server = LocalSource::new(
            PathBuf::from("/plugins/agentkit-plugin-search"),
            PluginKind::ServerExtension,
        );
        assert_eq!(server.identity().name, "agentkit-plugin-search");
    }

    #[test]
    fn missing_path_is_source_not_found() {
        let source = LocalSource::new(PathBuf::from("/definitely/not/here"), PluginKind::Standard);
        assert!(matches!(
            source.materialize(),
            Err(Error::SourceNotFound { .. })
        ));
        assert_eq!(source.fingerprint(), "");
    }
}
