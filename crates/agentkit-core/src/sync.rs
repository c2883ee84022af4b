//! SyncEngine implementation
//!
//! The SyncEngine validates every declaration, reconciles each selected agent
//! against the lockfile, and removes agents that are no longer declared.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use agentkit_fs::ProjectPath;
use agentkit_lock::{LockFile, PluginKey, PluginKind};
use serde::Serialize;

use crate::declaration::AgentDeclaration;
use crate::loader::{Loader, ManifestLoader};
use crate::reconcile::{PluginOutcome, PluginStatus, PreparedPlugin, Reconciler};
use crate::source::{self, SourceContext};
use crate::{Error, Result};

/// Default number of plugins installed in parallel.
pub const DEFAULT_JOBS: usize = 4;

/// Options for a sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Only sync the agent with this id
    pub agent_filter: Option<String>,
    /// Reinstall everything, re-cloning remote sources
    pub force: bool,
    /// Log per-plugin results at debug instead of info
    pub quiet: bool,
    /// Upper bound on concurrent installs
    pub jobs: usize,
    /// Classify remote sources from cached clones only
    pub offline: bool,
    /// Set to stop starting new plugins
    pub cancel: Arc<AtomicBool>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            agent_filter: None,
            force: false,
            quiet: false,
            jobs: DEFAULT_JOBS,
            offline: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SyncOptions {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Request cancellation. In-flight installs still finish.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Counts per terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub failed: usize,
}

impl Stats {
    pub fn record(&mut self, status: PluginStatus) {
        match status {
            PluginStatus::Added => self.added += 1,
            PluginStatus::Updated => self.updated += 1,
            PluginStatus::Unchanged => self.unchanged += 1,
            PluginStatus::Removed => self.removed += 1,
            PluginStatus::Failed => self.failed += 1,
        }
    }
}

/// Report from a sync operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub stats: Stats,
    pub outcomes: Vec<PluginOutcome>,
    /// Agents dropped from the lockfile because they are no longer declared
    pub removed_agents: Vec<String>,
    /// Lock entries deleted because another entry tracked the same repository
    pub duplicates_removed: usize,
    pub cancelled: bool,
}

impl SyncReport {
    fn push(&mut self, outcome: PluginOutcome) {
        self.stats.record(outcome.status);
        self.outcomes.push(outcome);
    }

    /// Keys of every plugin that ended in `status`.
    pub fn keys(&self, status: PluginStatus) -> BTreeSet<PluginKey> {
        self.outcomes
            .iter()
            .filter(|o| o.status == status)
            .map(|o| o.key.clone())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0
    }
}

/// Engine for synchronizing declared plugins with the lockfile
pub struct SyncEngine {
    base_dir: PathBuf,
    cache_root: PathBuf,
    loader: Box<dyn Loader>,
}

impl SyncEngine {
    /// Create an engine resolving relative paths against `base_dir`.
    ///
    /// Remote checkouts go to `.agentkit/plugins` below `base_dir` unless
    /// [`with_cache_root`](Self::with_cache_root) says otherwise.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let cache_root = ProjectPath::cache_root(&base_dir);
        Self {
            base_dir,
            cache_root,
            loader: Box::new(ManifestLoader::new()),
        }
    }

    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Reconcile `agents` into `lock`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] when the filter matches nothing and
    /// [`Error::Config`] when any selected declaration is invalid. In both
    /// cases `lock` is untouched. Per-plugin failures are reported in the
    /// returned [`SyncReport`], not as errors.
    pub fn sync(
        &self,
        agents: &[AgentDeclaration],
        lock: &mut LockFile,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let selected: Vec<&AgentDeclaration> = match &options.agent_filter {
            Some(id) => agents.iter().filter(|a| &a.id == id).collect(),
            None => agents.iter().collect(),
        };
        if let Some(id) = &options.agent_filter
            && selected.is_empty()
        {
            return Err(Error::AgentNotFound { id: id.clone() });
        }

        let prepared = self.prepare(&selected, options)?;

        let mut report = SyncReport::default();
        let reconciler = Reconciler::new(self.loader.as_ref(), options);

        for (agent, plugins) in selected.iter().zip(&prepared) {
            if options.is_cancelled() {
                report.cancelled = true;
                break;
            }
            tracing::debug!(agent = %agent.id, plugins = plugins.len(), "Reconciling agent");
            let state = lock.ensure_agent(&agent.id, &agent.name);
            let result = reconciler.reconcile(&agent.id, plugins, state);

            report.duplicates_removed += result.duplicates_removed;
            for outcome in result.outcomes {
                report.push(outcome);
            }
            if result.cancelled {
                report.cancelled = true;
                break;
            }
        }

        if options.agent_filter.is_none() && !report.cancelled {
            let declared: BTreeSet<String> = agents.iter().map(|a| a.id.clone()).collect();
            for (id, state) in lock.cleanup_agents(&declared) {
                for (kind, key, entry) in state.entries() {
                    report.push(PluginOutcome {
                        agent_id: id.clone(),
                        kind,
                        key: key.clone(),
                        version: entry.version.clone(),
                        status: PluginStatus::Removed,
                        error: None,
                    });
                }
                report.removed_agents.push(id);
            }
        }

        tracing::info!(
            added = report.stats.added,
            updated = report.stats.updated,
            unchanged = report.stats.unchanged,
            removed = report.stats.removed,
            failed = report.stats.failed,
            cancelled = report.cancelled,
            "Sync finished"
        );
        Ok(report)
    }

    /// Load the lockfile at `lock_path`, sync, and save it once.
    pub fn sync_file(
        &self,
        agents: &[AgentDeclaration],
        lock_path: &Path,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let mut lock = LockFile::load_or_recover(lock_path)?;
        let report = self.sync(agents, &mut lock, options)?;
        lock.save(lock_path)?;
        Ok(report)
    }

    /// Validate every selected declaration and resolve its source.
    fn prepare(
        &self,
        agents: &[&AgentDeclaration],
        options: &SyncOptions,
    ) -> Result<Vec<Vec<PreparedPlugin>>> {
        let context = SourceContext {
            base_dir: self.base_dir.clone(),
            cache_root: self.cache_root.clone(),
            force: options.force,
            offline: options.offline,
        };

        agents
            .iter()
            .map(|agent| {
                let config_error = |message: String| Error::Config {
                    agent: agent.id.clone(),
                    message,
                };

                let mut seen: BTreeSet<(PluginKind, PluginKey)> = BTreeSet::new();
                let mut prepared = Vec::with_capacity(agent.plugins.len());
                for (index, declaration) in agent.plugins.iter().enumerate() {
                    declaration
                        .validate()
                        .map_err(|e| config_error(format!("plugin #{}: {e}", index + 1)))?;

                    let source = source::resolve(declaration, &context).map_err(|e| match e {
                        Error::Git(git) => config_error(format!("plugin #{}: {git}", index + 1)),
                        other => other,
                    })?;

                    let plugin = PreparedPlugin::new(declaration.clone(), source);
                    if !seen.insert((plugin.kind(), plugin.key.clone())) {
                        return Err(config_error(format!(
                            "{} plugin '{}' is declared more than once",
                            plugin.kind(),
                            plugin.key
                        )));
                    }
                    prepared.push(plugin);
                }
                Ok(prepared)
            })
            .collect()
    }
}
