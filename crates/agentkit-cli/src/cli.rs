//! CLI argument parsing using clap derive

use std::path::PathBuf;

use agentkit_core::sync::DEFAULT_JOBS;
use clap::{Parser, Subcommand};

/// agentkit - Keep agent plugins in sync with their declarations
#[derive(Parser, Debug)]
#[command(name = "agentkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install, update and remove plugins so the lockfile matches the config
    ///
    /// Examples:
    ///   agentkit sync                    # Sync every agent in agentkit.yaml
    ///   agentkit sync --agent helper     # Only the agent with id "helper"
    ///   agentkit sync --offline          # Trust cached clones of remote plugins
    Sync {
        /// Configuration file declaring agents and plugins
        #[arg(short, long, default_value = "agentkit.yaml", env = "AGENTKIT_CONFIG")]
        config: PathBuf,

        /// Lockfile path (defaults to agentkit.lock.json next to the config)
        #[arg(short, long)]
        lockfile: Option<PathBuf>,

        /// Only sync this agent
        #[arg(short, long)]
        agent: Option<String>,

        /// Reinstall every plugin, re-cloning remote sources
        #[arg(long)]
        force: bool,

        /// Only print the summary
        #[arg(short, long)]
        quiet: bool,

        /// Number of plugins installed in parallel
        #[arg(short, long, default_value_t = DEFAULT_JOBS)]
        jobs: usize,

        /// Do not contact remote repositories
        #[arg(long)]
        offline: bool,

        /// Exit with an error when any plugin fails
        #[arg(long)]
        strict: bool,
    },

    /// Show what the lockfile records
    List {
        /// Configuration file whose lockfile is listed
        #[arg(short, long, default_value = "agentkit.yaml", env = "AGENTKIT_CONFIG")]
        config: PathBuf,

        /// Lockfile path (overrides the one derived from --config)
        #[arg(short, long)]
        lockfile: Option<PathBuf>,

        /// Only list this agent
        #[arg(short, long)]
        agent: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}
