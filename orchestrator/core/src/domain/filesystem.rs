// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared Filesystem Domain - Anti-Corruption Layer for the EFS API
//!
//! Value objects for a shared network filesystem and its mount targets, plus
//! the `FilesystemEndpointDirectory` trait that isolates the domain from the
//! cloud provider's filesystem-service API.
//!
//! Endpoint derivation lives here as pure functions so the mount workflow and
//! the CLI agree on the exact DNS name and mount command.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::domain::node::shell_quote;

// ============================================================================
// Value Objects
// ============================================================================

/// Identifier of a shared filesystem resource (e.g. `fs-1234abcd`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilesystemId(pub String);

impl FilesystemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilesystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network-access grant attached to a mount target (a security group id).
///
/// Compared by equality only; credentials have no meaningful order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(pub String);

impl Credential {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one mount target (e.g. `fsmt-0a1b2c3d`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountTargetId(pub String);

impl MountTargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MountTargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider availability zone such as `us-east-1a`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityZone(pub String);

impl AvailabilityZone {
    pub fn new(zone: impl Into<String>) -> Self {
        Self(zone.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Region is the zone with its trailing zone letter stripped.
    pub fn region(&self) -> &str {
        let mut chars = self.0.char_indices();
        match chars.next_back() {
            Some((idx, _)) => &self.0[..idx],
            None => "",
        }
    }
}

impl fmt::Display for AvailabilityZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One network attachment point of a shared filesystem.
///
/// `credentials` reflects whatever the listing returned and may be empty;
/// reconciliation always re-reads the attached set before writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountTarget {
    pub id: MountTargetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<AvailabilityZone>,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

impl MountTarget {
    pub fn new(id: MountTargetId) -> Self {
        Self {
            id,
            availability_zone: None,
            credentials: Vec::new(),
        }
    }
}

/// Filesystem plus the path it should be mounted at on every node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    pub fs_id: FilesystemId,
    pub mount_point: String,
}

impl MountSpec {
    pub fn new(fs_id: FilesystemId, mount_point: impl Into<String>) -> Self {
        Self {
            fs_id,
            mount_point: mount_point.into(),
        }
    }
}

// ============================================================================
// Endpoint derivation
// ============================================================================

const EFS_SERVICE: &str = "efs";
const PROVIDER_DOMAIN: &str = "amazonaws.com";

/// DNS name of the zone-local mount target: `{zone}.{fsId}.efs.{region}.amazonaws.com`
pub fn efs_endpoint(zone: &AvailabilityZone, fs_id: &FilesystemId) -> String {
    format!(
        "{}.{}.{}.{}.{}",
        zone.as_str(),
        fs_id.as_str(),
        EFS_SERVICE,
        zone.region(),
        PROVIDER_DOMAIN
    )
}

/// Absolute path built only from `[A-Za-z0-9._/-]`, safe to pass to a
/// remote shell unquoted.
pub fn is_safe_mount_point(mount_point: &str) -> bool {
    mount_point.starts_with('/')
        && mount_point
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
}

fn shell_path(mount_point: &str) -> String {
    if is_safe_mount_point(mount_point) {
        mount_point.to_string()
    } else {
        shell_quote(mount_point)
    }
}

/// NFSv4.1 mount command issued on each node
pub fn mount_command(endpoint: &str, mount_point: &str) -> String {
    format!("mount -t nfs4 -ominorversion=1 {}:/ {}", endpoint, shell_path(mount_point))
}

/// Fixed-string lookup of `mount_point` in the node's mount table.
///
/// Only narrows the candidates; callers still match the mount-point field.
pub fn mount_table_query(mount_point: &str) -> String {
    format!("grep -F -- {} /proc/mounts", shell_quote(mount_point))
}

/// Set-union of `existing` and `credential`, keeping first-seen order.
///
/// Duplicates already present in `existing` are discarded.
pub fn union_credentials(existing: &[Credential], credential: &Credential) -> Vec<Credential> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(std::iter::once(credential))
        .filter(|c| seen.insert((*c).clone()))
        .cloned()
        .collect()
}

/// Removes every occurrence of `credential`. Returns `None` when it was not attached.
pub fn remove_credential(existing: &[Credential], credential: &Credential) -> Option<Vec<Credential>> {
    if !existing.contains(credential) {
        return None;
    }
    Some(existing.iter().filter(|c| *c != credential).cloned().collect())
}

// ============================================================================
// Collaborator trait
// ============================================================================

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Filesystem API call failed: {0}")]
    Api(String),
    #[error("Filesystem API call timed out after {0}s")]
    Timeout(u64),
    #[error("Invalid response from filesystem API: {0}")]
    InvalidResponse(String),
}

/// Mount target discovery and security-group attachment for a shared filesystem.
///
/// Implementations hold no cache; every call reflects the provider's current
/// state.
#[async_trait]
pub trait FilesystemEndpointDirectory: Send + Sync {
    /// List the mount targets of a filesystem
    async fn list_mount_targets(&self, fs_id: &FilesystemId) -> Result<Vec<MountTarget>, DirectoryError>;

    /// Credentials currently attached to a mount target
    async fn get_attached_credentials(&self, target_id: &MountTargetId) -> Result<Vec<Credential>, DirectoryError>;

    /// Replace the credential set attached to a mount target
    async fn set_attached_credentials(
        &self,
        target_id: &MountTargetId,
        credentials: &[Credential],
    ) -> Result<(), DirectoryError>;
}
