// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # clustermount CLI
//!
//! The `clustermount` binary drives the cluster plugins by hand: it fires
//! lifecycle events at the configured plugin chain, or runs the EFS access
//! reconciler directly.
//!
//! ## Commands
//!
//! - `clustermount cluster start|add-node|remove-node|shutdown` - Lifecycle events
//! - `clustermount efs authorize|deauthorize|endpoint` - Filesystem access
//! - `clustermount config show|validate|generate` - Configuration management
//!
//! `--dry-run` swaps AWS and SSH for in-memory stand-ins and prints the
//! commands the nodes would have received.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use clustermount::commands::{self, ClusterCommand, ConfigCommand, EfsCommand};

/// clustermount - Shared EFS storage for compute clusters
#[derive(Parser)]
#[command(name = "clustermount")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CLUSTERMOUNT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CLUSTERMOUNT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Rehearse against an in-memory directory and simulated nodes
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fire cluster lifecycle events
    #[command(name = "cluster")]
    Cluster {
        #[command(subcommand)]
        command: ClusterCommand,
    },

    /// Manage filesystem access directly
    #[command(name = "efs")]
    Efs {
        #[command(subcommand)]
        command: EfsCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Cluster { command }) => {
            commands::cluster::handle_command(command, cli.config, cli.dry_run).await
        }
        Some(Commands::Efs { command }) => {
            commands::efs::handle_command(command, cli.config, cli.dry_run).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
