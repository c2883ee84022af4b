//! agentkit CLI
//!
//! Syncs the plugins declared in `agentkit.yaml` into `agentkit.lock.json`.

mod cli;
mod commands;
mod config;
mod error;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use agentkit_core::SyncOptions;
use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Verbose wins over RUST_LOG
    if cli.verbose || std::env::var_os("RUST_LOG").is_some() {
        let filter = if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::from_default_env()
        };
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("{}: tracing subscriber already set", "warning".yellow().bold());
        }
        tracing::debug!("Verbose mode enabled");
    }

    execute_command(cli.command)
}

fn execute_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Sync {
            config,
            lockfile,
            agent,
            force,
            quiet,
            jobs,
            offline,
            strict,
        } => {
            let options = SyncOptions {
                agent_filter: agent,
                force,
                quiet,
                jobs: jobs.max(1),
                offline,
                ..SyncOptions::default()
            };
            install_cancel_handler(&options.cancel);
            commands::run_sync(&config, lockfile.as_deref(), &options, strict).map(|_| ())
        }
        Commands::List {
            config,
            lockfile,
            agent,
            json,
        } => commands::run_list(&config, lockfile.as_deref(), agent.as_deref(), json),
    }
}

/// Route SIGINT/SIGTERM into the sync cancel flag.
///
/// The first signal stops new plugins from starting while in-flight installs
/// finish. A second one exits immediately.
fn install_cancel_handler(cancel: &Arc<AtomicBool>) {
    use signal_hook::consts::{SIGINT, SIGTERM};

    for signal in [SIGINT, SIGTERM] {
        let registered = signal_hook::flag::register_conditional_shutdown(signal, 1, Arc::clone(cancel))
            .and_then(|_| signal_hook::flag::register(signal, Arc::clone(cancel)));
        if let Err(e) = registered {
            tracing::warn!(signal, error = %e, "Failed to install cancel handler");
        }
    }
}
