//! Sync command implementation
//!
//! Loads the configuration, runs the engine against the lockfile, and prints
//! one line per plugin followed by a summary.

use std::path::Path;

use agentkit_core::{PluginOutcome, PluginStatus, SyncEngine, SyncOptions, SyncReport};
use colored::{ColoredString, Colorize};

use crate::config::Config;
use crate::error::{CliError, Result};

use super::resolve_lockfile;

/// Run the sync command
///
/// Per-plugin failures are printed, not returned, unless `strict` is set.
pub fn run_sync(
    config_path: &Path,
    lockfile: Option<&Path>,
    options: &SyncOptions,
    strict: bool,
) -> Result<SyncReport> {
    let config = Config::load(config_path)?;
    let lock_path = resolve_lockfile(config_path, lockfile);

    if !options.quiet {
        println!(
            "{} Syncing {} agent(s) from {}",
            "=>".blue().bold(),
            config.agents.len(),
            config_path.display().to_string().cyan()
        );
    }

    let engine = SyncEngine::new(&config.base_dir);
    let report = engine.sync_file(&config.agents, &lock_path, options)?;

    if !options.quiet {
        print_outcomes(&report);
    }
    print_summary(&report);

    if strict && report.has_failures() {
        return Err(CliError::user(format!(
            "{} plugin(s) failed to sync",
            report.stats.failed
        )));
    }
    Ok(report)
}

fn glyph(status: PluginStatus) -> ColoredString {
    match status {
        PluginStatus::Added => "+".green().bold(),
        PluginStatus::Updated => "↻".yellow().bold(),
        PluginStatus::Unchanged => "·".dimmed(),
        PluginStatus::Removed => "-".red().bold(),
        PluginStatus::Failed => "✗".red().bold(),
    }
}

fn outcome_line(outcome: &PluginOutcome) -> String {
    let mut line = format!(
        "   {} {} {} ({}) {}",
        glyph(outcome.status),
        outcome.key.to_string().cyan(),
        outcome.version,
        outcome.kind,
        outcome.status.as_str().dimmed()
    );
    if let Some(error) = &outcome.error {
        line.push_str(&format!(": {}", error.red()));
    }
    line
}

fn print_outcomes(report: &SyncReport) {
    let mut current: Option<&str> = None;
    for outcome in &report.outcomes {
        if current != Some(outcome.agent_id.as_str()) {
            println!("{}", outcome.agent_id.bold());
            current = Some(outcome.agent_id.as_str());
        }
        println!("{}", outcome_line(outcome));
    }
}

fn print_summary(report: &SyncReport) {
    let stats = &report.stats;
    println!(
        "{} {} added, {} updated, {} unchanged, {} removed, {} failed",
        "Sync complete:".bold(),
        stats.added.to_string().green(),
        stats.updated.to_string().yellow(),
        stats.unchanged,
        stats.removed.to_string().red(),
        if stats.failed > 0 {
            stats.failed.to_string().red().bold()
        } else {
            stats.failed.to_string().normal()
        }
    );
    if report.duplicates_removed > 0 {
        println!(
            "{} removed {} duplicate lock entries",
            "note:".yellow().bold(),
            report.duplicates_removed
        );
    }
    if !report.removed_agents.is_empty() {
        println!(
            "{} dropped agents no longer declared: {}",
            "note:".yellow().bold(),
            report.removed_agents.join(", ")
        );
    }
    if report.cancelled {
        println!("{} sync was cancelled before all plugins ran", "warning:".yellow().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_lock::{PluginKey, PluginKind};
    use agentkit_test_utils::TestProject;

    fn config(project: &TestProject) -> std::path::PathBuf {
        project.native_plugin("plugins/echo", "echo");
        project.write_config(
            "agents:\n  - id: helper\n    name: Helper\n    plugins:\n      - source: local\n        path: plugins/echo\n",
        )
    }

    #[test]
    fn sync_writes_default_lockfile() {
        let project = TestProject::new();
        let path = config(&project);

        let report = run_sync(&path, None, &SyncOptions::default(), false).unwrap();

        assert_eq!(report.stats.added, 1);
        project.assert_file_exists("agentkit.lock.json");
    }

    #[test]
    fn strict_turns_failures_into_an_error() {
        let project = TestProject::new();
        let path = project.write_config(
            "agents:\n  - id: helper\n    name: Helper\n    plugins:\n      - source: local\n        path: plugins/missing\n",
        );

        let lenient = run_sync(&path, None, &SyncOptions::default(), false).unwrap();
        assert_eq!(lenient.stats.failed, 1);

        let strict = run_sync(&path, None, &SyncOptions::default(), true);
        assert!(matches!(strict, Err(CliError::User { .. })));
    }

    #[test]
    fn missing_config_is_a_user_error() {
        let project = TestProject::new();

        let result = run_sync(&project.path("nope.yaml"), None, &SyncOptions::default(), false);

        assert!(matches!(result, Err(CliError::User { .. })));
    }

    #[test]
    fn failed_line_carries_the_error() {
        colored::control::set_override(false);
        let outcome = PluginOutcome {
            agent_id: "helper".to_string(),
            kind: PluginKind::Standard,
            key: PluginKey::new("local", "b"),
            version: "local".to_string(),
            status: PluginStatus::Failed,
            error: Some("not found".to_string()),
        };

        assert_eq!(
            outcome_line(&outcome),
            "   ✗ local/b local (standard) failed: not found"
        );
    }
}
