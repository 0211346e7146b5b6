// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process wiring of the core services.
//!
//! Loads the manifest, picks the adapters (AWS CLI + SSH, or in-memory
//! directory + simulated nodes under `--dry-run`) and hands out the plugin
//! chain and reconciler built on them.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use clustermount_core::{
    application::{build_plugin_chain, PluginChain, StandardAccessReconciler},
    domain::{
        cluster::ClusterContext,
        cluster_config::ClusterConfigManifest,
        filesystem::{FilesystemEndpointDirectory, FilesystemId},
        node::RemoteExecutor,
    },
    infrastructure::{
        directory::{create_endpoint_directory, DirectoryBackend, InMemoryEndpointDirectory},
        event_bus::EventBus,
        remote::{create_remote_executor, ExecutedCommand, MockRemoteExecutor, RemoteBackend},
    },
};

/// Handles kept only in dry-run mode so the rehearsal can be reported
struct Rehearsal {
    directory: Arc<InMemoryEndpointDirectory>,
    executor: Arc<MockRemoteExecutor>,
}

pub struct EmbeddedRuntime {
    manifest: ClusterConfigManifest,
    directory: Arc<dyn FilesystemEndpointDirectory>,
    executor: Arc<dyn RemoteExecutor>,
    event_bus: Arc<EventBus>,
    rehearsal: Option<Rehearsal>,
}

impl EmbeddedRuntime {
    /// Runtime for lifecycle commands; the whole manifest must validate.
    pub fn new(config_path: Option<PathBuf>, dry_run: bool) -> Result<Self> {
        let manifest = ClusterConfigManifest::load_or_default(config_path)
            .context("Failed to load configuration")?;

        manifest
            .validate()
            .context("Configuration validation failed")?;

        Ok(Self::from_manifest(manifest, dry_run))
    }

    /// Runtime for direct filesystem access. The cluster inventory may be
    /// absent when the command line names the filesystem and credential.
    pub fn for_access(config_path: Option<PathBuf>, dry_run: bool) -> Result<Self> {
        let manifest = ClusterConfigManifest::load_or_default(config_path)
            .context("Failed to load configuration")?;

        manifest
            .validate_access()
            .context("Configuration validation failed")?;

        Ok(Self::from_manifest(manifest, dry_run))
    }

    pub fn from_manifest(manifest: ClusterConfigManifest, dry_run: bool) -> Self {
        let event_bus = Arc::new(EventBus::with_default_capacity());
        let timeouts = &manifest.spec.timeouts;

        if dry_run {
            info!("Dry run: using in-memory filesystem directory and simulated nodes");
            let directory = Arc::new(InMemoryEndpointDirectory::new());
            if let Some(efs) = &manifest.spec.plugins.efs {
                directory.seed_filesystem(&efs.fs_id);
            }
            let executor = Arc::new(MockRemoteExecutor::new());

            return Self {
                directory: directory.clone(),
                executor: executor.clone(),
                event_bus,
                rehearsal: Some(Rehearsal { directory, executor }),
                manifest,
            };
        }

        let aws = &manifest.spec.aws;
        let directory = create_endpoint_directory(
            DirectoryBackend::AwsCli {
                binary: aws.binary.clone(),
                region: aws.region.clone(),
                profile: aws.profile.clone(),
            },
            timeouts.api(),
        );
        let executor = create_remote_executor(RemoteBackend::Ssh(manifest.spec.ssh.clone()), timeouts.command());
        debug!("Using aws binary '{}' and ssh binary '{}'", aws.binary, manifest.spec.ssh.binary);

        Self {
            directory,
            executor,
            event_bus,
            rehearsal: None,
            manifest,
        }
    }

    pub fn manifest(&self) -> &ClusterConfigManifest {
        &self.manifest
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn is_dry_run(&self) -> bool {
        self.rehearsal.is_some()
    }

    pub fn cluster_context(&self) -> Result<ClusterContext> {
        self.manifest.cluster_context()
    }

    pub fn plugin_chain(&self) -> PluginChain {
        build_plugin_chain(
            &self.manifest,
            self.directory.clone(),
            self.executor.clone(),
            self.event_bus.clone(),
        )
    }

    /// Reconciler for direct `efs` commands. In dry-run mode `fs_id` is
    /// seeded into the in-memory directory first.
    pub fn reconciler(&self, fs_id: &FilesystemId) -> StandardAccessReconciler {
        if let Some(rehearsal) = &self.rehearsal {
            rehearsal.directory.seed_filesystem(fs_id);
        }
        StandardAccessReconciler::new(
            self.directory.clone(),
            self.event_bus.clone(),
            self.manifest.spec.timeouts.api(),
        )
    }

    /// Commands the simulated nodes received, empty outside dry-run mode
    pub fn rehearsed_commands(&self) -> Vec<ExecutedCommand> {
        self.rehearsal
            .as_ref()
            .map(|r| r.executor.history())
            .unwrap_or_default()
    }
}
