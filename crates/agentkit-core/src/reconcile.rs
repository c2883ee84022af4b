//! Per-agent reconciliation of declared plugins against the lock state
//!
//! Every declared plugin ends in exactly one of Added, Updated, Unchanged or
//! Failed; lock entries nobody declared any more end as Removed. Installs run
//! on a bounded pool of scoped threads and every lock state mutation happens
//! under one mutex.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use agentkit_lock::{AgentLockState, LockEntry, PluginKey, PluginKind};
use serde::Serialize;

use crate::Result;
use crate::declaration::PluginDeclaration;
use crate::loader::Loader;
use crate::source::Source;
use crate::sync::SyncOptions;

/// Terminal state of one plugin in one sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginStatus {
    Added,
    Updated,
    Unchanged,
    Removed,
    Failed,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Removed => "removed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginOutcome {
    pub agent_id: String,
    pub kind: PluginKind,
    pub key: PluginKey,
    pub version: String,
    pub status: PluginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A declaration paired with its resolved source.
pub struct PreparedPlugin {
    pub declaration: PluginDeclaration,
    pub source: Box<dyn Source>,
    pub key: PluginKey,
}

impl PreparedPlugin {
    pub fn new(declaration: PluginDeclaration, source: Box<dyn Source>) -> Self {
        let key = source.identity();
        Self {
            declaration,
            source,
            key,
        }
    }

    pub fn kind(&self) -> PluginKind {
        self.declaration.kind
    }
}

/// Result of reconciling one agent.
#[derive(Debug, Default)]
pub struct AgentReconciliation {
    pub outcomes: Vec<PluginOutcome>,
    pub duplicates_removed: usize,
    pub cancelled: bool,
}

struct Shared<'s> {
    state: Mutex<&'s mut AgentLockState>,
    visited: Mutex<BTreeSet<(PluginKind, PluginKey)>>,
    outcomes: Mutex<Vec<(usize, PluginOutcome)>>,
    next: AtomicUsize,
    duplicates: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Applies declared plugins to one agent's lock state.
pub struct Reconciler<'a> {
    loader: &'a dyn Loader,
    options: &'a SyncOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(loader: &'a dyn Loader, options: &'a SyncOptions) -> Self {
        Self { loader, options }
    }

    /// Reconcile `plugins` against `state`.
    ///
    /// Removals are skipped when the run is cancelled, since unvisited
    /// entries may simply not have been reached.
    pub fn reconcile(
        &self,
        agent_id: &str,
        plugins: &[PreparedPlugin],
        state: &mut AgentLockState,
    ) -> AgentReconciliation {
        let shared = Shared {
            state: Mutex::new(state),
            visited: Mutex::new(BTreeSet::new()),
            outcomes: Mutex::new(Vec::with_capacity(plugins.len())),
            next: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
        };

        let workers = self.options.jobs.max(1).min(plugins.len());
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| self.worker(agent_id, plugins, &shared));
            }
        });

        let cancelled = self.options.is_cancelled()
            && shared.next.load(Ordering::SeqCst) < plugins.len();

        let Shared {
            state,
            visited,
            outcomes,
            duplicates,
            ..
        } = shared;
        let state = state.into_inner().unwrap_or_else(PoisonError::into_inner);
        let visited = visited.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut outcomes = outcomes.into_inner().unwrap_or_else(PoisonError::into_inner);
        outcomes.sort_by_key(|(index, _)| *index);
        let mut outcomes: Vec<PluginOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

        if cancelled {
            tracing::warn!(agent = %agent_id, "Sync cancelled, skipping removals");
        } else {
            outcomes.extend(remove_unvisited(agent_id, state, &visited, self.options.quiet));
        }

        AgentReconciliation {
            outcomes,
            duplicates_removed: duplicates.into_inner(),
            cancelled,
        }
    }

    fn worker(&self, agent_id: &str, plugins: &[PreparedPlugin], shared: &Shared<'_>) {
        loop {
            if self.options.is_cancelled() {
                return;
            }
            let index = shared.next.fetch_add(1, Ordering::SeqCst);
            let Some(plugin) = plugins.get(index) else {
                return;
            };
            let outcome = self.process(agent_id, plugin, shared);
            lock(&shared.outcomes).push((index, outcome));
        }
    }

    fn process(&self, agent_id: &str, plugin: &PreparedPlugin, shared: &Shared<'_>) -> PluginOutcome {
        let kind = plugin.kind();
        let key = &plugin.key;

        let stored = {
            let mut state = lock(&shared.state);
            if let Some(url) = plugin.source.repo_url() {
                let removed = repair_duplicates(&mut state, kind, key, &url);
                shared.duplicates.fetch_add(removed, Ordering::SeqCst);
            }
            state.get(kind, key).map(|entry| entry.fingerprint.clone())
        };
        lock(&shared.visited).insert((kind, key.clone()));

        let status = match stored {
            None => PluginStatus::Added,
            Some(fingerprint) if self.options.force || fingerprint.is_empty() => {
                PluginStatus::Updated
            }
            Some(fingerprint) => {
                let observed = plugin.source.observe();
                if observed == fingerprint {
                    PluginStatus::Unchanged
                } else {
                    tracing::debug!(
                        agent = %agent_id,
                        plugin = %key,
                        stored = %fingerprint,
                        observed = %observed,
                        "Fingerprint changed"
                    );
                    PluginStatus::Updated
                }
            }
        };

        let mut outcome = PluginOutcome {
            agent_id: agent_id.to_string(),
            kind,
            key: key.clone(),
            version: plugin.declaration.version().to_string(),
            status,
            error: None,
        };

        if status == PluginStatus::Unchanged {
            if let Some(entry) = lock(&shared.state).get_mut(kind, key) {
                let declared = plugin
                    .source
                    .lock_entry(&plugin.declaration, entry.fingerprint.clone());
                refresh_metadata(entry, declared);
            }
            self.log(&outcome);
            return outcome;
        }

        match self.apply(plugin) {
            Ok(entry) => {
                lock(&shared.state).insert(entry);
            }
            Err(e) => {
                tracing::warn!(agent = %agent_id, plugin = %key, kind = %kind, error = %e, "Plugin failed to install");
                outcome.status = PluginStatus::Failed;
                outcome.error = Some(e.to_string());
            }
        }
        self.log(&outcome);
        outcome
    }

    /// Materialize and load, then build the lock entry from the fresh state.
    fn apply(&self, plugin: &PreparedPlugin) -> Result<LockEntry> {
        let dir = plugin.source.materialize()?;
        let handle = self
            .loader
            .load(&dir, plugin.source.sub_path(), &plugin.declaration)?;
        tracing::debug!(
            plugin = %plugin.key,
            name = %handle.plugin().identity().name,
            capabilities = handle.plugin().capabilities().len(),
            location = %handle.location().display(),
            "Loaded plugin"
        );
        let fingerprint = plugin.source.fingerprint();
        Ok(plugin.source.lock_entry(&plugin.declaration, fingerprint))
    }

    fn log(&self, outcome: &PluginOutcome) {
        if self.options.quiet {
            tracing::debug!(agent = %outcome.agent_id, plugin = %outcome.key, kind = %outcome.kind, status = %outcome.status, "Plugin reconciled");
        } else {
            tracing::info!(agent = %outcome.agent_id, plugin = %outcome.key, kind = %outcome.kind, status = %outcome.status, "Plugin reconciled");
        }
    }
}

/// Keep only the first entry of `kind` whose repository matches `url`, stored under `key`.
///
/// Returns how many duplicates were deleted.
fn repair_duplicates(
    state: &mut AgentLockState,
    kind: PluginKind,
    key: &PluginKey,
    url: &str,
) -> usize {
    let matches: Vec<PluginKey> = state
        .plugins
        .get(&kind)
        .map(|entries| {
            entries
                .iter()
                .filter(|(_, entry)| {
                    entry
                        .repo_url
                        .as_deref()
                        .is_some_and(|stored| agentkit_git::normalize(stored) == url)
                })
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default();

    let Some((survivor, duplicates)) = matches.split_first() else {
        return 0;
    };

    for duplicate in duplicates {
        tracing::warn!(plugin = %duplicate, kept = %survivor, url = %url, "Removing duplicate lock entry");
        state.remove(kind, duplicate);
    }

    if survivor != key
        && let Some(mut entry) = state.remove(kind, survivor)
    {
        tracing::info!(from = %survivor, to = %key, "Re-keying lock entry");
        entry.rekey(key);
        state.insert(entry);
    }

    duplicates.len()
}

/// Copy what the declaration controls onto an entry whose content is unchanged.
/// The fingerprint and install time stay as they are.
fn refresh_metadata(entry: &mut LockEntry, declared: LockEntry) {
    entry.variables = declared.variables;
    entry.version = declared.version;
    entry.command = declared.command;
    entry.args = declared.args;
    entry.sub_path = declared.sub_path;
    entry.source_path = declared.source_path;
}

fn remove_unvisited(
    agent_id: &str,
    state: &mut AgentLockState,
    visited: &BTreeSet<(PluginKind, PluginKey)>,
    quiet: bool,
) -> Vec<PluginOutcome> {
    let stale: Vec<(PluginKind, PluginKey)> = state
        .entries()
        .filter(|(kind, key, _)| !visited.contains(&(*kind, (*key).clone())))
        .map(|(kind, key, _)| (kind, key.clone()))
        .collect();

    let mut outcomes = Vec::with_capacity(stale.len());
    for (kind, key) in stale {
        let Some(entry) = state.remove(kind, &key) else {
            continue;
        };
        if quiet {
            tracing::debug!(agent = %agent_id, plugin = %key, kind = %kind, "Removed undeclared plugin");
        } else {
            tracing::info!(agent = %agent_id, plugin = %key, kind = %kind, "Removed undeclared plugin");
        }
        outcomes.push(PluginOutcome {
            agent_id: agent_id.to_string(),
            kind,
            key,
            version: entry.version,
            status: PluginStatus::Removed,
            error: None,
        });
    }
    state.prune_empty();
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_lock::SourceKind;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn remote_entry(namespace: &str, name: &str, url: &str) -> LockEntry {
        LockEntry {
            namespace: namespace.to_string(),
            name: name.to_string(),
            full_name: format!("{namespace}/{name}"),
            version: "main".to_string(),
            source_type: SourceKind::Remote,
            plugin_type: PluginKind::Standard,
            fingerprint: "abc".to_string(),
            installed_at: Utc::now(),
            variables: BTreeMap::new(),
            command: None,
            args: Vec::new(),
            source_path: None,
            repo_url: Some(url.to_string()),
            sub_path: None,
        }
    }

    #[test]
    fn duplicates_collapse_onto_current_key() {
        let mut state = AgentLockState::new("A");
        state.insert(remote_entry("acme", "old-a", "https://github.com/acme/agentkit-plugin-x"));
        state.insert(remote_entry("acme", "old-b", "github.com/Acme/agentkit-plugin-x.git"));
        state.insert(remote_entry("acme", "other", "https://github.com/acme/agentkit-plugin-y"));

        let key = PluginKey::new("acme", "x");
        let removed = repair_duplicates(
            &mut state,
            PluginKind::Standard,
            &key,
            "github.com/acme/agentkit-plugin-x",
        );

        assert_eq!(removed, 1);
        assert_eq!(state.len(), 2);
        let survivor = state.get(PluginKind::Standard, &key).unwrap();
        assert_eq!(survivor.full_name, "acme/x");
    }

    #[test]
    fn no_match_leaves_state_alone() {
        let mut state = AgentLockState::new("A");
        state.insert(remote_entry("acme", "y", "https://github.com/acme/agentkit-plugin-y"));

        let removed = repair_duplicates(
            &mut state,
            PluginKind::Standard,
            &PluginKey::new("acme", "x"),
            "github.com/acme/agentkit-plugin-x",
        );

        assert_eq!(removed, 0);
        assert_eq!(state.len(), 1);
    }
}
