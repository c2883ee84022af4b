//! The lockfile: installed plugin state for every agent
//!
//! Persisted as pretty JSON. Reads take a shared advisory lock, writes go
//! through [`agentkit_fs::io::write_atomic`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use agentkit_fs::NormalizedPath;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::entry::{LockEntry, PluginKey, PluginKind};
use crate::migrate::migrate;
use crate::{Error, Result};

/// Current on-disk format version.
pub const LOCKFILE_VERSION: u32 = 1;

fn default_version() -> u32 {
    LOCKFILE_VERSION
}

/// Installed state of one agent's plugins, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentLockState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub plugins: BTreeMap<PluginKind, BTreeMap<PluginKey, LockEntry>>,
}

impl AgentLockState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plugins: BTreeMap::new(),
        }
    }

    pub fn get(&self, kind: PluginKind, key: &PluginKey) -> Option<&LockEntry> {
        self.plugins.get(&kind).and_then(|entries| entries.get(key))
    }

    pub fn get_mut(&mut self, kind: PluginKind, key: &PluginKey) -> Option<&mut LockEntry> {
        self.plugins
            .get_mut(&kind)
            .and_then(|entries| entries.get_mut(key))
    }

    /// Insert `entry` under its own kind and key, returning any entry it replaced.
    pub fn insert(&mut self, entry: LockEntry) -> Option<LockEntry> {
        self.plugins
            .entry(entry.plugin_type)
            .or_default()
            .insert(entry.key(), entry)
    }

    pub fn remove(&mut self, kind: PluginKind, key: &PluginKey) -> Option<LockEntry> {
        let entries = self.plugins.get_mut(&kind)?;
        let removed = entries.remove(key);
        if entries.is_empty() {
            self.plugins.remove(&kind);
        }
        removed
    }

    /// Keys stored under `kind`, in map order.
    pub fn keys(&self, kind: PluginKind) -> Vec<PluginKey> {
        self.plugins
            .get(&kind)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every entry with its kind, in map order.
    pub fn entries(&self) -> impl Iterator<Item = (PluginKind, &PluginKey, &LockEntry)> {
        self.plugins
            .iter()
            .flat_map(|(kind, entries)| entries.iter().map(move |(key, entry)| (*kind, key, entry)))
    }

    pub fn len(&self) -> usize {
        self.plugins.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop kind groups that no longer hold any entry.
    pub fn prune_empty(&mut self) {
        self.plugins.retain(|_, entries| !entries.is_empty());
    }
}

/// All agents' installed plugin state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentLockState>,
}

impl Default for LockFile {
    fn default() -> Self {
        Self::new()
    }
}

impl LockFile {
    /// Create an empty lockfile
    pub fn new() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            agents: BTreeMap::new(),
        }
    }

    /// Parse lockfile text, migrating older layouts.
    ///
    /// `path` is only used for error reporting.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let corrupt = |reason: String| Error::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let mut value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| corrupt(e.to_string()))?;
        if migrate(&mut value) {
            tracing::info!(path = %path.display(), "Migrated lockfile to current layout");
        }

        let lockfile: LockFile =
            serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
        if lockfile.version > LOCKFILE_VERSION {
            return Err(corrupt(format!(
                "unsupported version {} (newest known is {})",
                lockfile.version, LOCKFILE_VERSION
            )));
        }
        Ok(lockfile)
    }

    /// Load a lockfile under a shared lock.
    ///
    /// A missing file yields an empty lockfile. Malformed content is an
    /// [`Error::Corrupt`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No lockfile yet, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(Error::io(path, e)),
        };
        file.lock_shared().map_err(|e| Error::io(path, e))?;

        // Read through the locked handle
        let mut content = String::new();
        (&file)
            .read_to_string(&mut content)
            .map_err(|e| Error::io(path, e))?;

        Self::parse(&content, path)
    }

    /// Load a lockfile, replacing corrupt content with an empty lockfile.
    pub fn load_or_recover(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(Error::Corrupt { path, reason }) => {
                tracing::warn!(
                    path = %path.display(),
                    reason = %reason,
                    "Discarding corrupt lockfile"
                );
                Ok(Self::new())
            }
            other => other,
        }
    }

    /// Write the lockfile atomically as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        agentkit_fs::io::write_atomic(&NormalizedPath::new(path), content.as_bytes())?;
        Ok(())
    }

    pub fn agent(&self, id: &str) -> Option<&AgentLockState> {
        self.agents.get(id)
    }

    /// Make sure agent `id` exists and carries `name`.
    pub fn ensure_agent(&mut self, id: &str, name: &str) -> &mut AgentLockState {
        let agent = self
            .agents
            .entry(id.to_string())
            .or_insert_with(|| AgentLockState::new(name));
        if agent.name != name {
            agent.name = name.to_string();
        }
        agent
    }

    /// Remove agents that are not in `declared`, returning them.
    pub fn cleanup_agents(&mut self, declared: &BTreeSet<String>) -> Vec<(String, AgentLockState)> {
        let stale: Vec<String> = self
            .agents
            .keys()
            .filter(|id| !declared.contains(*id))
            .cloned()
            .collect();

        stale
            .into_iter()
            .filter_map(|id| {
                let state = self.agents.remove(&id)?;
                tracing::info!(agent = %id, name = %state.name, "Removing agent no longer declared");
                Some((id, state))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::SourceKind;
    use chrono::Utc;

    fn entry(namespace: &str, name: &str, kind: PluginKind) -> LockEntry {
        LockEntry {
            namespace: namespace.to_string(),
            name: name.to_string(),
            full_name: format!("{namespace}/{name}"),
            version: "local".to_string(),
            source_type: SourceKind::Local,
            plugin_type: kind,
            fingerprint: "sha256:00".to_string(),
            installed_at: Utc::now(),
            variables: BTreeMap::new(),
            command: None,
            args: Vec::new(),
            source_path: None,
            repo_url: None,
            sub_path: None,
        }
    }

    #[test]
    fn removing_last_entry_prunes_kind() {
        let mut agent = AgentLockState::new("A");
        agent.insert(entry("local", "echo", PluginKind::Standard));
        assert_eq!(agent.len(), 1);

        agent.remove(PluginKind::Standard, &PluginKey::new("local", "echo"));

        assert!(agent.plugins.is_empty());
    }

    #[test]
    fn same_key_under_different_kinds_coexists() {
        let mut agent = AgentLockState::new("A");
        agent.insert(entry("local", "echo", PluginKind::Standard));
        agent.insert(entry("local", "echo", PluginKind::Parameterized));

        assert_eq!(agent.len(), 2);
    }

    #[test]
    fn ensure_agent_refreshes_name() {
        let mut lock = LockFile::new();
        lock.ensure_agent("a", "Old");
        lock.ensure_agent("a", "New");

        assert_eq!(lock.agent("a").unwrap().name, "New");
    }
}
