// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory [`FilesystemEndpointDirectory`] for tests and dry runs.
//!
//! Records every call and can be told to fail a fetch or update on a given
//! mount target, or to stall long enough to trip a timeout.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::filesystem::{
    AvailabilityZone, Credential, DirectoryError, FilesystemEndpointDirectory, FilesystemId,
    MountTarget, MountTargetId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    List(FilesystemId),
    Get(MountTargetId),
    Set(MountTargetId, Vec<Credential>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InjectedFailure {
    Fetch,
    Update,
}

#[derive(Default)]
pub struct InMemoryEndpointDirectory {
    /// Mount target ids per filesystem, in listing order
    filesystems: Mutex<HashMap<FilesystemId, Vec<MountTargetId>>>,
    targets: Mutex<HashMap<MountTargetId, MountTarget>>,
    failures: Mutex<HashMap<MountTargetId, InjectedFailure>>,
    calls: Mutex<Vec<DirectoryCall>>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryEndpointDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-target directory used by `--dry-run`
    pub fn seeded(fs_id: &FilesystemId) -> Self {
        let directory = Self::new();
        directory.seed_filesystem(fs_id);
        directory
    }

    /// Give `fs_id` one empty mount target unless it is already known
    pub fn seed_filesystem(&self, fs_id: &FilesystemId) {
        if !self.filesystems.lock().contains_key(fs_id) {
            self.add_mount_target(fs_id, format!("fsmt-{}-dryrun", fs_id), None, Vec::new());
        }
    }

    /// Register a filesystem that has no mount targets yet
    pub fn add_filesystem(&self, fs_id: &FilesystemId) {
        self.filesystems.lock().entry(fs_id.clone()).or_default();
    }

    pub fn add_mount_target(
        &self,
        fs_id: &FilesystemId,
        target_id: impl Into<String>,
        zone: Option<&str>,
        credentials: Vec<Credential>,
    ) -> MountTargetId {
        let id = MountTargetId::new(target_id);
        let target = MountTarget {
            id: id.clone(),
            availability_zone: zone.map(AvailabilityZone::new),
            credentials,
        };
        self.filesystems
            .lock()
            .entry(fs_id.clone())
            .or_default()
            .push(id.clone());
        self.targets.lock().insert(id.clone(), target);
        id
    }

    /// Current credential list of a target, duplicates included
    pub fn credentials(&self, target_id: &MountTargetId) -> Vec<Credential> {
        self.targets
            .lock()
            .get(target_id)
            .map(|t| t.credentials.clone())
            .unwrap_or_default()
    }

    pub fn fail_fetch(&self, target_id: &MountTargetId) {
        self.failures.lock().insert(target_id.clone(), InjectedFailure::Fetch);
    }

    pub fn fail_update(&self, target_id: &MountTargetId) {
        self.failures.lock().insert(target_id.clone(), InjectedFailure::Update);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Delay applied to every call
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.calls.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, DirectoryCall::Set(..)))
            .count()
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn injected(&self, target_id: &MountTargetId, failure: InjectedFailure) -> bool {
        self.failures.lock().get(target_id) == Some(&failure)
    }
}

#[async_trait]
impl FilesystemEndpointDirectory for InMemoryEndpointDirectory {
    async fn list_mount_targets(&self, fs_id: &FilesystemId) -> Result<Vec<MountTarget>, DirectoryError> {
        self.calls.lock().push(DirectoryCall::List(fs_id.clone()));
        self.simulate_latency().await;

        let ids = self
            .filesystems
            .lock()
            .get(fs_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("filesystem {}", fs_id)))?;

        let targets = self.targets.lock();
        Ok(ids.iter().filter_map(|id| targets.get(id).cloned()).collect())
    }

    async fn get_attached_credentials(&self, target_id: &MountTargetId) -> Result<Vec<Credential>, DirectoryError> {
        self.calls.lock().push(DirectoryCall::Get(target_id.clone()));
        self.simulate_latency().await;

        if self.injected(target_id, InjectedFailure::Fetch) {
            return Err(DirectoryError::Api(format!("injected fetch failure on {}", target_id)));
        }

        self.targets
            .lock()
            .get(target_id)
            .map(|t| t.credentials.clone())
            .ok_or_else(|| DirectoryError::NotFound(format!("mount target {}", target_id)))
    }

    async fn set_attached_credentials(
        &self,
        target_id: &MountTargetId,
        credentials: &[Credential],
    ) -> Result<(), DirectoryError> {
        self.calls
            .lock()
            .push(DirectoryCall::Set(target_id.clone(), credentials.to_vec()));
        self.simulate_latency().await;

        if self.injected(target_id, InjectedFailure::Update) {
            return Err(DirectoryError::Api(format!("injected update failure on {}", target_id)));
        }

        let mut targets = self.targets.lock();
        let target = targets
            .get_mut(target_id)
            .ok_or_else(|| DirectoryError::NotFound(format!("mount target {}", target_id)))?;
        target.credentials = credentials.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let directory = InMemoryEndpointDirectory::new();
        let fs_id = FilesystemId::new("fs-1");
        directory.add_mount_target(&fs_id, "fsmt-b", Some("us-east-1b"), vec![]);
        directory.add_mount_target(&fs_id, "fsmt-a", Some("us-east-1a"), vec![]);

        let targets = directory.list_mount_targets(&fs_id).await.unwrap();
        let ids: Vec<_> = targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["fsmt-b", "fsmt-a"]);
    }

    #[tokio::test]
    async fn test_unknown_filesystem_is_not_found() {
        let directory = InMemoryEndpointDirectory::new();
        let err = directory
            .list_mount_targets(&FilesystemId::new("fs-missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_seed_filesystem_is_idempotent() {
        let fs_id = FilesystemId::new("fs-1");
        let directory = InMemoryEndpointDirectory::seeded(&fs_id);
        directory.seed_filesystem(&fs_id);

        let targets = directory.list_mount_targets(&fs_id).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id.as_str(), "fsmt-fs-1-dryrun");
    }

    #[tokio::test]
    async fn test_injected_update_failure_leaves_state() {
        let directory = InMemoryEndpointDirectory::new();
        let fs_id = FilesystemId::new("fs-1");
        let id = directory.add_mount_target(&fs_id, "fsmt-a", None, vec![Credential::new("sg-a")]);
        directory.fail_update(&id);

        let result = directory
            .set_attached_credentials(&id, &[Credential::new("sg-b")])
            .await;
        assert!(result.is_err());
        assert_eq!(directory.credentials(&id), vec![Credential::new("sg-a")]);
        assert_eq!(directory.write_count(), 1);
    }
}
