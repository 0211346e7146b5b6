// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Access Reconciler Application Service
//!
//! Keeps one security group attached to every mount target of a shared
//! filesystem while a cluster exists, and detaches it at shutdown:
//! - Domain layer: `FilesystemEndpointDirectory` trait, credential set helpers
//! - Event bus: one `AccessEvent` per mount target processed
//!
//! Mount targets are listed fresh on every call. The read-modify-write of a
//! target's credential set is not atomic at the provider, so calls for the
//! same filesystem must be serialized. Calls through one reconciler instance
//! are serialized internally; separate processes must coordinate themselves.

use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::events::AccessEvent;
use crate::domain::filesystem::{
    remove_credential, union_credentials, Credential, DirectoryError, FilesystemEndpointDirectory,
    FilesystemId, MountTarget, MountTargetId,
};
use crate::infrastructure::event_bus::EventBus;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    /// Listing the filesystem's mount targets
    Discover,
    /// Reading a target's attached credentials
    Fetch,
    /// Writing a target's attached credentials
    Update,
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discover => write!(f, "discover"),
            Self::Fetch => write!(f, "fetch"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// Authorization change failed. `target` is `None` only for `Discover`.
#[derive(Debug)]
pub struct ReconcileError {
    pub fs_id: FilesystemId,
    pub target: Option<MountTargetId>,
    pub phase: ReconcilePhase,
    pub cause: DirectoryError,
}

impl ReconcileError {
    fn new(fs_id: &FilesystemId, target: Option<&MountTargetId>, phase: ReconcilePhase, cause: DirectoryError) -> Self {
        Self {
            fs_id: fs_id.clone(),
            target: target.cloned(),
            phase,
            cause,
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(
                f,
                "{} failed on mount target {} of {}: {}",
                self.phase, target, self.fs_id, self.cause
            ),
            None => write!(f, "{} failed for {}: {}", self.phase, self.fs_id, self.cause),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait AccessReconciler: Send + Sync {
    /// Attach `credential` to every mount target of `fs_id` (idempotent)
    async fn authorize(&self, fs_id: &FilesystemId, credential: &Credential) -> Result<(), ReconcileError>;

    /// Detach `credential` from every mount target of `fs_id`.
    /// Targets without it are left untouched and count as success.
    async fn deauthorize(&self, fs_id: &FilesystemId, credential: &Credential) -> Result<(), ReconcileError>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardAccessReconciler {
    directory: Arc<dyn FilesystemEndpointDirectory>,
    event_bus: Arc<EventBus>,
    api_timeout: Duration,
    serial: Mutex<()>,
}

impl StandardAccessReconciler {
    pub fn new(directory: Arc<dyn FilesystemEndpointDirectory>, event_bus: Arc<EventBus>, api_timeout: Duration) -> Self {
        Self {
            directory,
            event_bus,
            api_timeout,
            serial: Mutex::new(()),
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, DirectoryError>>) -> Result<T, DirectoryError> {
        match tokio::time::timeout(self.api_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DirectoryError::Timeout(self.api_timeout.as_secs())),
        }
    }

    async fn discover(&self, fs_id: &FilesystemId) -> Result<Vec<MountTarget>, ReconcileError> {
        let targets = self
            .bounded(self.directory.list_mount_targets(fs_id))
            .await
            .map_err(|cause| ReconcileError::new(fs_id, None, ReconcilePhase::Discover, cause))?;

        if targets.is_empty() {
            warn!("Filesystem {} has no mount targets; nothing to reconcile", fs_id);
            self.event_bus.publish_access_event(AccessEvent::NoMountTargets {
                fs_id: fs_id.clone(),
                checked_at: Utc::now(),
            });
        } else {
            debug!("Filesystem {} has {} mount target(s)", fs_id, targets.len());
        }

        Ok(targets)
    }

    async fn fetch(&self, fs_id: &FilesystemId, target: &MountTarget) -> Result<Vec<Credential>, ReconcileError> {
        self.bounded(self.directory.get_attached_credentials(&target.id))
            .await
            .map_err(|cause| ReconcileError::new(fs_id, Some(&target.id), ReconcilePhase::Fetch, cause))
    }

    async fn update(&self, fs_id: &FilesystemId, target: &MountTarget, credentials: &[Credential]) -> Result<(), ReconcileError> {
        self.bounded(self.directory.set_attached_credentials(&target.id, credentials))
            .await
            .map_err(|cause| ReconcileError::new(fs_id, Some(&target.id), ReconcilePhase::Update, cause))
    }
}

#[async_trait]
impl AccessReconciler for StandardAccessReconciler {
    async fn authorize(&self, fs_id: &FilesystemId, credential: &Credential) -> Result<(), ReconcileError> {
        let _serial = self.serial.lock().await;
        info!("Authorizing security group {} on filesystem {}", credential, fs_id);

        for target in self.discover(fs_id).await? {
            let current = self.fetch(fs_id, &target).await?;
            let already_present = current.contains(credential);
            let updated = union_credentials(&current, credential);

            info!(
                "Authorizing EFS security group {} on mount target {} ({} group(s))",
                credential,
                target.id,
                updated.len()
            );
            self.update(fs_id, &target, &updated).await?;

            self.event_bus.publish_access_event(AccessEvent::CredentialAuthorized {
                fs_id: fs_id.clone(),
                target_id: target.id.clone(),
                credential: credential.clone(),
                already_present,
                authorized_at: Utc::now(),
            });
        }

        Ok(())
    }

    async fn deauthorize(&self, fs_id: &FilesystemId, credential: &Credential) -> Result<(), ReconcileError> {
        let _serial = self.serial.lock().await;
        info!("Deauthorizing security group {} on filesystem {}", credential, fs_id);

        for target in self.discover(fs_id).await? {
            let current = self.fetch(fs_id, &target).await?;

            match remove_credential(&current, credential) {
                Some(remaining) => {
                    self.update(fs_id, &target, &remaining).await?;
                    info!(
                        "Disassociated EFS security group {} from mount target {}",
                        credential, target.id
                    );
                    self.event_bus.publish_access_event(AccessEvent::CredentialRevoked {
                        fs_id: fs_id.clone(),
                        target_id: target.id.clone(),
                        credential: credential.clone(),
                        revoked_at: Utc::now(),
                    });
                }
                None => {
                    info!(
                        "Security group {} is not currently associated with mount target {}",
                        credential, target.id
                    );
                    self.event_bus.publish_access_event(AccessEvent::CredentialNotAttached {
                        fs_id: fs_id.clone(),
                        target_id: target.id.clone(),
                        credential: credential.clone(),
                        checked_at: Utc::now(),
                    });
                }
            }
        }

        Ok(())
    }
}
