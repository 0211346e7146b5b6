// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Node Mounter Application Service
//!
//! Mounts the shared filesystem on one node over NFSv4.1, idempotently:
//! 1. create the mount point (mode 0777) when missing
//! 2. ask the instance metadata service for the node's availability zone
//! 3. derive the zone-local endpoint
//! 4. skip when `/proc/mounts` already lists the mount point (fixed-string
//!    `grep`, then an exact match on the mount-point field)
//! 5. otherwise run the mount command

use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::events::MountEvent;
use crate::domain::filesystem::{efs_endpoint, mount_command, mount_table_query, AvailabilityZone, MountSpec};
use crate::domain::node::{ExecOptions, ExecutorError, Node, RemoteExecutor};
use crate::infrastructure::event_bus::EventBus;

pub const MOUNT_POINT_MODE: u32 = 0o777;
pub const ZONE_QUERY_COMMAND: &str = "ec2metadata --availability-zone";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    AlreadyMounted,
}

impl fmt::Display for MountOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mounted => write!(f, "mounted"),
            Self::AlreadyMounted => write!(f, "already mounted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPhase {
    /// Checking for or creating the mount point
    Mkdir,
    LocalityQuery,
    /// Reading the mount table
    MountCheck,
    MountExec,
}

impl fmt::Display for MountPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mkdir => write!(f, "mkdir"),
            Self::LocalityQuery => write!(f, "locality-query"),
            Self::MountCheck => write!(f, "mount-check"),
            Self::MountExec => write!(f, "mount-exec"),
        }
    }
}

#[derive(Debug, Error)]
#[error("{phase} failed on node {node}: {cause}")]
pub struct MountError {
    /// Alias of the node that failed
    pub node: String,
    pub phase: MountPhase,
    #[source]
    pub cause: ExecutorError,
}

impl MountError {
    fn new(node: &Node, phase: MountPhase, cause: ExecutorError) -> Self {
        Self {
            node: node.alias.clone(),
            phase,
            cause,
        }
    }
}

/// Returns the `/proc/mounts` line whose mount-point field is `mount_point`.
///
/// `grep` matches substrings, so `/mnt/efs2` must not count as `/mnt/efs`.
pub fn find_mount_entry<'a>(lines: &'a [String], mount_point: &str) -> Option<&'a str> {
    let wanted = normalize(mount_point);
    lines
        .iter()
        .map(String::as_str)
        .find(|line| line.split_whitespace().nth(1).map(normalize) == Some(wanted))
}

fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait NodeMounter: Send + Sync {
    async fn ensure_mounted(&self, node: &Node, spec: &MountSpec) -> Result<MountOutcome, MountError>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardNodeMounter {
    executor: Arc<dyn RemoteExecutor>,
    event_bus: Arc<EventBus>,
    command_timeout: Duration,
}

impl StandardNodeMounter {
    pub fn new(executor: Arc<dyn RemoteExecutor>, event_bus: Arc<EventBus>, command_timeout: Duration) -> Self {
        Self {
            executor,
            event_bus,
            command_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        command: &str,
        call: impl Future<Output = Result<T, ExecutorError>>,
    ) -> Result<T, ExecutorError> {
        match tokio::time::timeout(self.command_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::Timeout {
                command: command.to_string(),
                seconds: self.command_timeout.as_secs(),
            }),
        }
    }

    async fn ensure_mount_point(&self, node: &Node, mount_point: &str) -> Result<(), MountError> {
        let exists = self
            .bounded(mount_point, self.executor.path_exists(node, mount_point))
            .await
            .map_err(|e| MountError::new(node, MountPhase::Mkdir, e))?;

        if exists {
            debug!("[{}] {} already exists", node.alias, mount_point);
            return Ok(());
        }

        self.bounded(
            mount_point,
            self.executor.make_directories(node, mount_point, MOUNT_POINT_MODE),
        )
        .await
        .map_err(|e| MountError::new(node, MountPhase::Mkdir, e))?;

        info!("[{}] Created mount point {}", node.alias, mount_point);
        self.event_bus.publish_mount_event(MountEvent::MountPointCreated {
            node: node.alias.clone(),
            mount_point: mount_point.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn query_zone(&self, node: &Node) -> Result<AvailabilityZone, MountError> {
        let output = self
            .bounded(
                ZONE_QUERY_COMMAND,
                self.executor.execute(node, ZONE_QUERY_COMMAND, ExecOptions::default()),
            )
            .await
            .map_err(|e| MountError::new(node, MountPhase::LocalityQuery, e))?;

        match output.first_line().map(str::trim) {
            Some(zone) if zone.len() > 1 => Ok(AvailabilityZone::new(zone)),
            _ => Err(MountError::new(
                node,
                MountPhase::LocalityQuery,
                ExecutorError::UnexpectedOutput {
                    command: ZONE_QUERY_COMMAND.to_string(),
                    reason: format!("no availability zone in {:?}", output.lines),
                },
            )),
        }
    }

    async fn mount(&self, node: &Node, spec: &MountSpec) -> Result<MountOutcome, MountError> {
        let mount_point = spec.mount_point.as_str();

        self.ensure_mount_point(node, mount_point).await?;

        let zone = self.query_zone(node).await?;
        let endpoint = efs_endpoint(&zone, &spec.fs_id);
        debug!("[{}] EFS endpoint for zone {} is {}", node.alias, zone, endpoint);

        let query = mount_table_query(mount_point);
        let mount_info = self
            .bounded(&query, self.executor.execute(node, &query, ExecOptions::lenient()))
            .await
            .map_err(|e| MountError::new(node, MountPhase::MountCheck, e))?;

        if let Some(entry) = find_mount_entry(&mount_info.lines, mount_point) {
            warn!("[{}] {} is already a mount point", node.alias, mount_point);
            info!("[{}] {}", node.alias, entry);
            self.event_bus.publish_mount_event(MountEvent::AlreadyMounted {
                node: node.alias.clone(),
                mount_point: mount_point.to_string(),
                mount_entry: entry.to_string(),
                checked_at: Utc::now(),
            });
            return Ok(MountOutcome::AlreadyMounted);
        }

        let command = mount_command(&endpoint, mount_point);
        self.bounded(&command, self.executor.execute(node, &command, ExecOptions::default()))
            .await
            .map_err(|e| MountError::new(node, MountPhase::MountExec, e))?;

        info!("[{}] Mounted {} at {}", node.alias, endpoint, mount_point);
        self.event_bus.publish_mount_event(MountEvent::Mounted {
            node: node.alias.clone(),
            endpoint,
            mount_point: mount_point.to_string(),
            mounted_at: Utc::now(),
        });
        Ok(MountOutcome::Mounted)
    }
}

#[async_trait]
impl NodeMounter for StandardNodeMounter {
    async fn ensure_mounted(&self, node: &Node, spec: &MountSpec) -> Result<MountOutcome, MountError> {
        let result = self.mount(node, spec).await;

        if let Err(e) = &result {
            self.event_bus.publish_mount_event(MountEvent::MountFailed {
                node: node.alias.clone(),
                mount_point: spec.mount_point.clone(),
                reason: e.to_string(),
                failed_at: Utc::now(),
            });
        }
        result
    }
}
