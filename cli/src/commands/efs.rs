// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Direct filesystem access commands
//!
//! Commands: authorize, deauthorize, endpoint

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use clustermount_core::{
    application::AccessReconciler,
    domain::{
        cluster_config::ClusterConfigManifest,
        filesystem::{efs_endpoint, AvailabilityZone, Credential, FilesystemId},
    },
};

use crate::commands::print_events;
use crate::embedded::EmbeddedRuntime;

#[derive(Args)]
pub struct AccessTarget {
    /// Filesystem id (default: plugins.efs.fs_id)
    #[arg(long)]
    fs_id: Option<String>,

    /// Security group id (default: the cluster credential)
    #[arg(long)]
    credential: Option<String>,
}

#[derive(Subcommand)]
pub enum EfsCommand {
    /// Attach the credential to every mount target of the filesystem
    Authorize {
        #[command(flatten)]
        target: AccessTarget,
    },

    /// Detach the credential from every mount target of the filesystem
    Deauthorize {
        #[command(flatten)]
        target: AccessTarget,
    },

    /// Print the zone-local endpoint of the filesystem
    Endpoint {
        /// Availability zone, e.g. us-east-1a
        #[arg(long)]
        zone: String,

        /// Filesystem id (default: plugins.efs.fs_id)
        #[arg(long)]
        fs_id: Option<String>,
    },
}

pub async fn handle_command(command: EfsCommand, config_path: Option<PathBuf>, dry_run: bool) -> Result<()> {
    match command {
        EfsCommand::Authorize { target } => reconcile(target, config_path, dry_run, true).await,
        EfsCommand::Deauthorize { target } => reconcile(target, config_path, dry_run, false).await,
        EfsCommand::Endpoint { zone, fs_id } => endpoint(zone, fs_id, config_path),
    }
}

async fn reconcile(target: AccessTarget, config_path: Option<PathBuf>, dry_run: bool, authorize: bool) -> Result<()> {
    let runtime = EmbeddedRuntime::for_access(config_path, dry_run)?;
    let fs_id = resolve_fs_id(target.fs_id, runtime.manifest())?;
    let credential = match target.credential {
        Some(c) => Credential::new(c),
        None => runtime
            .manifest()
            .credential()
            .context("No credential given and none configured for the cluster")?,
    };

    let reconciler = runtime.reconciler(&fs_id);
    let mut events = runtime.event_bus().subscribe();

    let result = if authorize {
        reconciler.authorize(&fs_id, &credential).await
    } else {
        reconciler.deauthorize(&fs_id, &credential).await
    };
    print_events(&events.drain());
    result?;

    let verb = if authorize { "authorized on" } else { "deauthorized from" };
    let suffix = if runtime.is_dry_run() { " (dry run)" } else { "" };
    println!("{}", format!("✓ {} {} {}{}", credential, verb, fs_id, suffix).green());
    Ok(())
}

fn endpoint(zone: String, fs_id: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let fs_id = match fs_id {
        Some(id) => FilesystemId::new(id),
        None => {
            let manifest = ClusterConfigManifest::load_or_default(config_path)
                .context("Failed to load configuration")?;
            resolve_fs_id(None, &manifest)?
        }
    };

    println!("{}", efs_endpoint(&AvailabilityZone::new(zone), &fs_id));
    Ok(())
}

fn resolve_fs_id(explicit: Option<String>, manifest: &ClusterConfigManifest) -> Result<FilesystemId> {
    match (explicit, &manifest.spec.plugins.efs) {
        (Some(id), _) => Ok(FilesystemId::new(id)),
        (None, Some(efs)) => Ok(efs.fs_id.clone()),
        (None, None) => anyhow::bail!("No filesystem given: pass --fs-id or configure plugins.efs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clustermount_core::domain::cluster_config::EfsPluginConfig;

    #[tokio::test]
    async fn test_reconcile_with_flags_needs_no_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("clustermount.yaml");
        std::fs::write(
            &config,
            "apiVersion: clustermount/v1\nkind: ClusterConfig\nmetadata:\n  name: adhoc\nspec:\n  cluster:\n    master: { alias: master, host: 10.0.0.10 }\n",
        )
        .unwrap();

        let target = AccessTarget {
            fs_id: Some("fs-x".to_string()),
            credential: Some("sg-y".to_string()),
        };
        reconcile(target, Some(config.clone()), true, true).await.unwrap();

        let target = AccessTarget {
            fs_id: Some("fs-x".to_string()),
            credential: None,
        };
        let err = reconcile(target, Some(config), true, true).await.unwrap_err();
        assert!(err.to_string().contains("No credential given"));
    }

    #[test]
    fn test_resolve_fs_id_prefers_flag() {
        let mut manifest = ClusterConfigManifest::default();
        assert!(resolve_fs_id(None, &manifest).is_err());

        manifest.spec.plugins.efs = Some(EfsPluginConfig {
            fs_id: FilesystemId::new("fs-configured"),
            mount_point: "/mnt/myefs".to_string(),
            mount_parallelism: 1,
        });
        assert_eq!(resolve_fs_id(None, &manifest).unwrap(), FilesystemId::new("fs-configured"));
        assert_eq!(
            resolve_fs_id(Some("fs-flag".to_string()), &manifest).unwrap(),
            FilesystemId::new("fs-flag")
        );
    }
}
