// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Operators and the CLI subscribe to audit access changes and mounts.
// Events are not persisted.

use crate::domain::events::{AccessEvent, MountEvent, PluginEvent};
use crate::domain::filesystem::FilesystemId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Access(AccessEvent),
    Mount(MountEvent),
    Plugin(PluginEvent),
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_access_event(&self, event: AccessEvent) {
        self.publish(DomainEvent::Access(event));
    }

    pub fn publish_mount_event(&self, event: MountEvent) {
        self.publish(DomainEvent::Mount(event));
    }

    pub fn publish_plugin_event(&self, event: PluginEvent) {
        self.publish(DomainEvent::Plugin(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all domain events
    pub fn subscribe(&self) -> EventReceiver {
        let receiver = self.sender.subscribe();
        EventReceiver { receiver }
    }

    /// Subscribe to access changes of a single filesystem
    pub fn subscribe_filesystem(&self, fs_id: FilesystemId) -> AccessEventReceiver {
        let receiver = self.sender.subscribe();
        AccessEventReceiver { receiver, fs_id }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Drain everything currently buffered
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

/// Receiver for access events of one filesystem (filtered)
pub struct AccessEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    fs_id: FilesystemId,
}

impl AccessEventReceiver {
    pub async fn recv(&mut self) -> Result<AccessEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;

            if let DomainEvent::Access(access_event) = event {
                if self.matches_filesystem(&access_event) {
                    return Ok(access_event);
                }
            }
        }
    }

    fn matches_filesystem(&self, event: &AccessEvent) -> bool {
        match event {
            AccessEvent::CredentialAuthorized { fs_id, .. } => fs_id == &self.fs_id,
            AccessEvent::CredentialRevoked { fs_id, .. } => fs_id == &self.fs_id,
            AccessEvent::CredentialNotAttached { fs_id, .. } => fs_id == &self.fs_id,
            AccessEvent::NoMountTargets { fs_id, .. } => fs_id == &self.fs_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filesystem::{Credential, MountTargetId};
    use chrono::Utc;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish_mount_event(MountEvent::Mounted {
            node: "node001".to_string(),
            endpoint: "us-east-1a.fs-1.efs.us-east-1.amazonaws.com".to_string(),
            mount_point: "/mnt/efs".to_string(),
            mounted_at: Utc::now(),
        });

        let received = receiver.recv().await.unwrap();
        match received {
            DomainEvent::Mount(MountEvent::Mounted { node, .. }) => {
                assert_eq!(node, "node001");
            }
            _ => panic!("Wrong event type received"),
        }
    }

    #[tokio::test]
    async fn test_filesystem_event_filtering() {
        let event_bus = EventBus::new(10);
        let fs_id = FilesystemId::new("fs-mine");
        let mut receiver = event_bus.subscribe_filesystem(fs_id.clone());

        event_bus.publish_access_event(AccessEvent::NoMountTargets {
            fs_id: FilesystemId::new("fs-other"),
            checked_at: Utc::now(),
        });
        event_bus.publish_access_event(AccessEvent::CredentialRevoked {
            fs_id: fs_id.clone(),
            target_id: MountTargetId::new("fsmt-1"),
            credential: Credential::new("sg-a"),
            revoked_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            AccessEvent::CredentialRevoked { fs_id: id, .. } => assert_eq!(id, fs_id),
            other => panic!("Wrong event received: {:?}", other),
        }
    }

    #[test]
    fn test_drain_without_publish_is_empty() {
        let event_bus = EventBus::new(4);
        let mut receiver = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 1);
        assert!(receiver.drain().is_empty());
    }
}
