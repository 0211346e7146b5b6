// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use clustermount_core::domain::cluster_config::ClusterConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./clustermount.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = ClusterConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CLUSTERMOUNT_CONFIG_PATH: {}",
            std::env::var("CLUSTERMOUNT_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./clustermount.yaml");
        println!("  4. ~/.clustermount/config.yaml");
        println!("  5. /etc/clustermount/config.yaml");
        println!();
    }

    if as_yaml {
        let yaml = serde_yaml::to_string(&config).context("Failed to render configuration")?;
        print!("{}", yaml);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Cluster:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  User: {}", config.spec.cluster.user);
    match config.credential() {
        Some(credential) => println!("  Credential: {}", credential),
        None => println!("  Credential: {}", "(none)".dimmed()),
    }
    for node in config.all_nodes() {
        println!("  - {}", node);
    }
    println!();

    println!("{}", "Access:".bold());
    println!("  ssh: {}@*:{} via {}", config.spec.ssh.user, config.spec.ssh.port, config.spec.ssh.binary);
    println!(
        "  aws: {} (region: {}, profile: {})",
        config.spec.aws.binary,
        config.spec.aws.region.as_deref().unwrap_or("(default)"),
        config.spec.aws.profile.as_deref().unwrap_or("(default)")
    );
    println!(
        "  timeouts: command {}s, api {}s",
        config.spec.timeouts.command_secs, config.spec.timeouts.api_secs
    );
    println!();

    println!("{}", "Plugins:".bold());
    match &config.spec.plugins.efs {
        Some(efs) => println!(
            "  efs: {} at {} (parallelism {})",
            efs.fs_id, efs.mount_point, efs.mount_parallelism
        ),
        None => println!("  efs: {}", "(disabled)".dimmed()),
    }
    let whoami = config.spec.plugins.whoami.as_ref().is_some_and(|w| w.enabled);
    println!("  whoami: {}", if whoami { "enabled" } else { "disabled" });
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ClusterConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse_and_validate() {
        for template in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let manifest = ClusterConfigManifest::from_yaml_str(template).unwrap();
            manifest.validate().unwrap();
        }
    }

    #[tokio::test]
    async fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("clustermount.yaml");

        generate(output.clone(), false).await.unwrap();

        let manifest = ClusterConfigManifest::from_yaml_file(&output).unwrap();
        assert_eq!(manifest.kind, "ClusterConfig");
    }
}
