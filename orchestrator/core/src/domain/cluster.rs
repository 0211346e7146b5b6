// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cluster Lifecycle Contract
//!
//! The host orchestrator (the `clustermount` CLI, or any other provisioning
//! tool behind an adapter) fires four lifecycle events. Plugins implement
//! [`ClusterLifecycleHandler`] and receive every piece of state they need as
//! explicit parameters: a handler instance holds configuration only, so the
//! same instance may serve concurrent clusters.
//!
//! | Event | Handler method |
//! |-------|----------------|
//! | `Start` | `on_start` |
//! | `NodeAdded` | `on_node_added` |
//! | `NodeRemoved` | `on_node_removed` |
//! | `Shutdown` | `on_shutdown` |

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::domain::filesystem::Credential;
use crate::domain::node::Node;

/// Snapshot of the cluster handed to every lifecycle call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterContext {
    pub name: String,
    pub master: Node,
    /// All members including the master
    pub nodes: Vec<Node>,
    /// Login user for cluster workloads
    pub user: String,
    /// Security group shared by every node in the cluster
    pub credential: Credential,
}

impl ClusterContext {
    pub fn find_node(&self, alias: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.alias == alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "node", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Start,
    NodeAdded(Node),
    NodeRemoved(Node),
    Shutdown,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::NodeAdded(node) => write!(f, "node-added({})", node.alias),
            Self::NodeRemoved(node) => write!(f, "node-removed({})", node.alias),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Plugin capability invoked by the host orchestrator
#[async_trait]
pub trait ClusterLifecycleHandler: Send + Sync {
    /// Plugin name used in logs and error context
    fn name(&self) -> &str;

    /// Cluster has been provisioned and all nodes are reachable
    async fn on_start(&self, ctx: &ClusterContext) -> Result<()>;

    async fn on_node_added(&self, _ctx: &ClusterContext, _node: &Node) -> Result<()> {
        Ok(())
    }

    async fn on_node_removed(&self, _ctx: &ClusterContext, _node: &Node) -> Result<()> {
        Ok(())
    }

    /// Runs before the cluster's instances are terminated
    async fn on_shutdown(&self, _ctx: &ClusterContext) -> Result<()> {
        Ok(())
    }

    /// Route an event to the matching callback
    async fn handle(&self, event: &LifecycleEvent, ctx: &ClusterContext) -> Result<()> {
        match event {
            LifecycleEvent::Start => self.on_start(ctx).await,
            LifecycleEvent::NodeAdded(node) => self.on_node_added(ctx, node).await,
            LifecycleEvent::NodeRemoved(node) => self.on_node_removed(ctx, node).await,
            LifecycleEvent::Shutdown => self.on_shutdown(ctx).await,
        }
    }
}
