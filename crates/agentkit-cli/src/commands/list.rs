//! List command: show installed plugins recorded in the lockfile

use std::path::Path;

use agentkit_lock::{LockFile, PluginKind};
use colored::Colorize;
use serde::Serialize;

use crate::error::{CliError, Result};

use super::resolve_lockfile;

/// One installed plugin, as printed by `list --json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedPlugin {
    pub agent_id: String,
    pub kind: PluginKind,
    pub key: String,
    pub version: String,
    pub source: String,
    pub fingerprint: String,
    pub installed_at: String,
}

/// Collect the rows for `agent` (or every agent) from the lockfile.
pub fn collect(lock: &LockFile, agent: Option<&str>) -> Result<Vec<ListedPlugin>> {
    if let Some(id) = agent
        && lock.agent(id).is_none()
    {
        return Err(CliError::user(format!("Agent '{id}' has no lock entries")));
    }

    let rows = lock
        .agents
        .iter()
        .filter(|(id, _)| agent.is_none_or(|wanted| wanted == id.as_str()))
        .flat_map(|(id, state)| {
            state.entries().map(move |(kind, key, entry)| ListedPlugin {
                agent_id: id.clone(),
                kind,
                key: key.to_string(),
                version: entry.version.clone(),
                source: entry.source_type.as_str().to_string(),
                fingerprint: entry.fingerprint.clone(),
                installed_at: entry.installed_at.to_rfc3339(),
            })
        })
        .collect();
    Ok(rows)
}

/// Run the list command
pub fn run_list(
    config_path: &Path,
    lockfile: Option<&Path>,
    agent: Option<&str>,
    json: bool,
) -> Result<()> {
    let lock_path = resolve_lockfile(config_path, lockfile);
    let lock = LockFile::load(&lock_path)?;
    let rows = collect(&lock, agent)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!(
            "No plugins installed. Run {} first.",
            "agentkit sync".cyan()
        );
        return Ok(());
    }

    let mut current: Option<&str> = None;
    for row in &rows {
        if current != Some(row.agent_id.as_str()) {
            println!("{}:", row.agent_id.cyan().bold());
            current = Some(row.agent_id.as_str());
        }
        let short: String = row.fingerprint.chars().take(12).collect();
        println!(
            "  {:<32} {:<10} {:<16} {} {}",
            row.key.green(),
            row.version,
            row.kind.as_str(),
            row.source.dimmed(),
            short.dimmed()
        );
    }
    println!();
    println!("{} {} plugin(s)", "Total:".dimmed(), rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_core::{AgentDeclaration, PluginDeclaration, SyncEngine, SyncOptions};
    use agentkit_test_utils::TestProject;

    fn synced() -> (TestProject, LockFile) {
        let project = TestProject::new();
        project.native_plugin("plugins/echo", "echo");
        project.native_plugin("plugins/clock", "clock");
        let agents = vec![
            AgentDeclaration::new(
                "one",
                "One",
                vec![PluginDeclaration::local("plugins/echo", PluginKind::Standard)],
            ),
            AgentDeclaration::new(
                "two",
                "Two",
                vec![PluginDeclaration::local("plugins/clock", PluginKind::Standard)],
            ),
        ];
        let mut lock = LockFile::new();
        SyncEngine::new(project.root())
            .sync(&agents, &mut lock, &SyncOptions::default())
            .unwrap();
        (project, lock)
    }

    #[test]
    fn collects_every_agent_in_order() {
        let (_project, lock) = synced();

        let rows = collect(&lock, None).unwrap();

        let keys: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.agent_id.as_str(), r.key.as_str()))
            .collect();
        assert_eq!(keys, vec![("one", "local/echo"), ("two", "local/clock")]);
        assert_eq!(rows[0].source, "local");
    }

    #[test]
    fn filters_by_agent() {
        let (_project, lock) = synced();

        let rows = collect(&lock, Some("two")).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "local/clock");
    }

    #[test]
    fn unknown_agent_is_a_user_error() {
        let (_project, lock) = synced();

        assert!(matches!(collect(&lock, Some("three")), Err(CliError::User { .. })));
    }

    #[test]
    fn missing_lockfile_lists_nothing() {
        let project = TestProject::new();

        let result = run_list(&project.path("agentkit.yaml"), None, None, true);

        assert!(result.is_ok());
    }
}
