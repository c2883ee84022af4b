use std::path::PathBuf;

use agentkit_git::{RepoUrl, helpers};
use agentkit_lock::{LockEntry, PluginKey, PluginKind, SourceKind};
use chrono::Utc;
use git2::Repository;

use super::{Source, SourceContext, display_name};
use crate::declaration::{PLUGIN_NAME_PREFIX, PluginDeclaration};
use crate::{Error, Result};

/// A plugin living in a git repository, checked out into the cache.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    url: RepoUrl,
    namespace: String,
    name: String,
    reference: String,
    sub_path: Option<String>,
    kind: PluginKind,
    checkout_dir: PathBuf,
    force: bool,
    offline: bool,
}

impl RemoteSource {
    pub fn new(
        url: &str,
        reference: &str,
        sub_path: Option<String>,
        kind: PluginKind,
        namespace: Option<&str>,
        context: &SourceContext,
    ) -> agentkit_git::Result<Self> {
        let parsed = RepoUrl::parse(url)?;
        let url = if kind.uses_name_prefix() {
            parsed.with_prefix(PLUGIN_NAME_PREFIX)
        } else {
            parsed
        };

        let name = display_name(url.repo(), kind);
        let namespace = namespace.unwrap_or(url.owner()).to_string();
        let checkout_dir = context
            .cache_root
            .join(kind.as_str())
            .join(&namespace)
            .join(&name);

        Ok(Self {
            url,
            namespace,
            name,
            reference: reference.to_string(),
            sub_path: sub_path.filter(|p| !p.is_empty()),
            kind,
            checkout_dir,
            force: context.force,
            offline: context.offline,
        })
    }

    /// Directory the repository is checked out into.
    pub fn checkout_dir(&self) -> &std::path::Path {
        &self.checkout_dir
    }

    pub fn clone_url(&self) -> String {
        self.url.clone_url()
    }

    fn fetch_error(&self, e: agentkit_git::Error) -> Error {
        Error::SourceFetch {
            url: self.url.clone_url(),
            reference: self.reference.clone(),
            message: e.to_string(),
        }
    }

    fn open_or_clone(&self) -> Result<Repository> {
        let dir = &self.checkout_dir;
        let clone_url = self.url.clone_url();

        if !self.force && helpers::is_repository(dir) {
            let repo = Repository::open(dir).map_err(|e| self.fetch_error(e.into()))?;
            if self.offline {
                tracing::debug!(dir = %dir.display(), "Offline, using cached clone as is");
            } else {
                helpers::fetch_origin(&repo).map_err(|e| self.fetch_error(e))?;
            }
            return Ok(repo);
        }

        if dir.exists() {
            tracing::debug!(dir = %dir.display(), force = self.force, "Removing stale checkout");
            std::fs::remove_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        helpers::clone_repo(&clone_url, dir).map_err(|e| self.fetch_error(e))
    }
}

impl Source for RemoteSource {
    fn identity(&self) -> PluginKey {
        PluginKey::new(&self.namespace, &self.name)
    }

    fn kind(&self) -> PluginKind {
        self.kind
    }

    fn materialize(&self) -> Result<PathBuf> {
        let repo = self.open_or_clone()?;
        let strategy = agentkit_git::checkout_with_fallback(&repo, &self.reference)
            .map_err(|e| self.fetch_error(e))?;
        tracing::debug!(
            url = %self.url,
            reference = %self.reference,
            strategy = ?strategy,
            "Checked out plugin repository"
        );
        Ok(self.checkout_dir.clone())
    }

    fn fingerprint(&self) -> String {
        helpers::head_commit(&self.checkout_dir)
    }

    fn observe(&self) -> String {
        if !helpers::is_repository(&self.checkout_dir) {
            tracing::debug!(dir = %self.checkout_dir.display(), "No cached clone, reinstall needed");
            return String::new();
        }
        if self.offline {
            return self.fingerprint();
        }
        match helpers::advertised_refs(&self.url.clone_url()) {
            Ok(refs) => agentkit_git::resolve_advertised(&refs, &self.reference)
                .unwrap_or_else(|| {
                    tracing::debug!(
                        url = %self.url,
                        reference = %self.reference,
                        "Ref not advertised, using cached checkout"
                    );
                    self.fingerprint()
                }),
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Upstream unreachable, using cached checkout");
                self.fingerprint()
            }
        }
    }

    fn sub_path(&self) -> Option<&str> {
        self.sub_path.as_deref()
    }

    fn repo_url(&self) -> Option<String> {
        Some(self.url.normalized())
    }

    fn lock_entry(&self, declaration: &PluginDeclaration, fingerprint: String) -> LockEntry {
        let key = self.identity();
        LockEntry {
            full_name: key.to_string(),
            namespace: key.namespace,
            name: key.name,
            version: self.reference.clone(),
            source_type: SourceKind::Remote,
            plugin_type: self.kind,
            fingerprint,
            installed_at: Utc::now(),
            variables: declaration.variables.clone(),
            command: declaration.command.clone(),
            args: declaration.args.clone(),
            source_path: None,
            repo_url: Some(self.url.clone_url()),
            sub_path: self.sub_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SourceContext {
        SourceContext::new("/project", "/project/.agentkit/plugins")
    }

    #[test]
    fn identity_strips_prefix_and_uses_owner() {
        let source =
            RemoteSource::new("acme/search", "main", None, PluginKind::Standard, None, &context())
                .unwrap();

        assert_eq!(source.identity(), PluginKey::new("acme", "search"));
        assert_eq!(
            source.clone_url(),
            "https://github.com/acme/agentkit-plugin-search"
        );
        assert_eq!(
            source.checkout_dir(),
            std::path::Path::new("/project/.agentkit/plugins/standard/acme/search")
        );
    }

    #[test]
    fn server_extensions_keep_repository_name() {
        let source = RemoteSource::new(
            "acme/search-server",
            "main",
            None,
            PluginKind::ServerExtension,
            None,
            &context(),
        )
        .unwrap();

        assert_eq!(source.identity().name, "search-server");
        assert_eq!(source.clone_url(), "https://github.com/acme/search-server");
    }

    #[test]
    fn namespace_override_changes_key_and_cache_dir() {
        let source = RemoteSource::new(
            "acme/search",
            "main",
            None,
            PluginKind::Parameterized,
            Some("tools"),
            &context(),
        )
        .unwrap();

        assert_eq!(source.identity(), PluginKey::new("tools", "search"));
        assert!(source.checkout_dir().ends_with("parameterized/tools/search"));
    }
}
