// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the clustermount CLI

pub mod cluster;
pub mod config;
pub mod efs;

pub use self::cluster::ClusterCommand;
pub use self::config::ConfigCommand;
pub use self::efs::EfsCommand;

use colored::Colorize;
use clustermount_core::{
    domain::events::{AccessEvent, MountEvent, PluginEvent},
    infrastructure::{event_bus::DomainEvent, remote::ExecutedCommand},
};

/// One-line summary of an audit event
pub fn describe_event(event: &DomainEvent) -> String {
    match event {
        DomainEvent::Access(AccessEvent::CredentialAuthorized {
            target_id,
            credential,
            already_present,
            ..
        }) => {
            if *already_present {
                format!("{} already attached to {}", credential, target_id)
            } else {
                format!("attached {} to {}", credential, target_id)
            }
        }
        DomainEvent::Access(AccessEvent::CredentialRevoked { target_id, credential, .. }) => {
            format!("detached {} from {}", credential, target_id)
        }
        DomainEvent::Access(AccessEvent::CredentialNotAttached { target_id, credential, .. }) => {
            format!("{} was not attached to {}", credential, target_id)
        }
        DomainEvent::Access(AccessEvent::NoMountTargets { fs_id, .. }) => {
            format!("{} has no mount targets", fs_id)
        }
        DomainEvent::Mount(MountEvent::MountPointCreated { node, mount_point, .. }) => {
            format!("[{}] created {}", node, mount_point)
        }
        DomainEvent::Mount(MountEvent::Mounted { node, endpoint, mount_point, .. }) => {
            format!("[{}] mounted {} at {}", node, endpoint, mount_point)
        }
        DomainEvent::Mount(MountEvent::AlreadyMounted { node, mount_point, .. }) => {
            format!("[{}] {} already mounted", node, mount_point)
        }
        DomainEvent::Mount(MountEvent::MountFailed { node, reason, .. }) => {
            format!("[{}] mount failed: {}", node, reason)
        }
        DomainEvent::Plugin(PluginEvent::PluginStarted { plugin, event, .. }) => {
            format!("plugin {} started {}", plugin, event)
        }
        DomainEvent::Plugin(PluginEvent::PluginCompleted { plugin, event, .. }) => {
            format!("plugin {} completed {}", plugin, event)
        }
        DomainEvent::Plugin(PluginEvent::PluginFailed { plugin, event, reason, .. }) => {
            format!("plugin {} failed {}: {}", plugin, event, reason)
        }
        DomainEvent::Plugin(PluginEvent::DiagnosticOutput { plugin, node, output, .. }) => {
            format!("{} on {}: {}", plugin, node, output)
        }
    }
}

pub(crate) fn print_events(events: &[DomainEvent]) {
    if events.is_empty() {
        return;
    }
    println!("{}", "Events:".bold());
    for event in events {
        let line = describe_event(event);
        match event {
            DomainEvent::Mount(MountEvent::MountFailed { .. })
            | DomainEvent::Plugin(PluginEvent::PluginFailed { .. }) => println!("  {}", line.red()),
            _ => println!("  {}", line),
        }
    }
}

pub(crate) fn print_rehearsal(commands: &[ExecutedCommand]) {
    if commands.is_empty() {
        return;
    }
    println!("{}", "Dry run, commands that would have run:".bold());
    for command in commands {
        println!("  [{}] {}", command.node.dimmed(), command.command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clustermount_core::domain::filesystem::{Credential, FilesystemId, MountTargetId};

    #[test]
    fn test_describe_access_events() {
        let authorized = DomainEvent::Access(AccessEvent::CredentialAuthorized {
            fs_id: FilesystemId::new("fs-1234abcd"),
            target_id: MountTargetId::new("fsmt-a"),
            credential: Credential::new("sg-cluster"),
            already_present: true,
            authorized_at: Utc::now(),
        });
        assert_eq!(describe_event(&authorized), "sg-cluster already attached to fsmt-a");

        let revoked = DomainEvent::Access(AccessEvent::CredentialRevoked {
            fs_id: FilesystemId::new("fs-1234abcd"),
            target_id: MountTargetId::new("fsmt-a"),
            credential: Credential::new("sg-cluster"),
            revoked_at: Utc::now(),
        });
        assert_eq!(describe_event(&revoked), "detached sg-cluster from fsmt-a");
    }

    #[test]
    fn test_describe_mount_event() {
        let event = DomainEvent::Mount(MountEvent::AlreadyMounted {
            node: "node001".to_string(),
            mount_point: "/mnt/myefs".to_string(),
            mount_entry: "host:/ /mnt/myefs nfs4 rw 0 0".to_string(),
            checked_at: Utc::now(),
        });
        assert_eq!(describe_event(&event), "[node001] /mnt/myefs already mounted");
    }
}
