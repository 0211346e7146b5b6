// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::domain::filesystem::{Credential, FilesystemId, MountTargetId};

/// Security-group attachment changes on a filesystem's mount targets.
///
/// These form the audit trail of cluster-wide filesystem access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccessEvent {
    CredentialAuthorized {
        fs_id: FilesystemId,
        target_id: MountTargetId,
        credential: Credential,
        /// Whether the credential was already attached before this call
        already_present: bool,
        authorized_at: DateTime<Utc>,
    },
    CredentialRevoked {
        fs_id: FilesystemId,
        target_id: MountTargetId,
        credential: Credential,
        revoked_at: DateTime<Utc>,
    },
    CredentialNotAttached {
        fs_id: FilesystemId,
        target_id: MountTargetId,
        credential: Credential,
        checked_at: DateTime<Utc>,
    },
    NoMountTargets {
        fs_id: FilesystemId,
        checked_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MountEvent {
    MountPointCreated {
        node: String,
        mount_point: String,
        created_at: DateTime<Utc>,
    },
    Mounted {
        node: String,
        endpoint: String,
        mount_point: String,
        mounted_at: DateTime<Utc>,
    },
    AlreadyMounted {
        node: String,
        mount_point: String,
        /// Matching `/proc/mounts` line
        mount_entry: String,
        checked_at: DateTime<Utc>,
    },
    MountFailed {
        node: String,
        mount_point: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PluginEvent {
    PluginStarted {
        plugin: String,
        event: String,
        started_at: DateTime<Utc>,
    },
    PluginCompleted {
        plugin: String,
        event: String,
        completed_at: DateTime<Utc>,
    },
    PluginFailed {
        plugin: String,
        event: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    DiagnosticOutput {
        plugin: String,
        node: String,
        output: String,
        captured_at: DateTime<Utc>,
    },
}
