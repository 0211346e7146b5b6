// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! EFS lifecycle plugin
//!
//! Wires the cluster lifecycle to the two EFS services: the cluster's
//! security group is attached to every mount target at start and detached at
//! shutdown, and every node (including late joiners) gets the filesystem
//! mounted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::info;

use crate::application::access_reconciler::AccessReconciler;
use crate::application::node_mounter::{MountOutcome, NodeMounter};
use crate::domain::cluster::{ClusterContext, ClusterLifecycleHandler};
use crate::domain::filesystem::MountSpec;
use crate::domain::node::Node;

pub const EFS_PLUGIN_NAME: &str = "efs";

pub struct EfsPlugin {
    reconciler: Arc<dyn AccessReconciler>,
    mounter: Arc<dyn NodeMounter>,
    spec: MountSpec,
    mount_parallelism: usize,
}

impl EfsPlugin {
    pub fn new(
        reconciler: Arc<dyn AccessReconciler>,
        mounter: Arc<dyn NodeMounter>,
        spec: MountSpec,
        mount_parallelism: usize,
    ) -> Self {
        Self {
            reconciler,
            mounter,
            spec,
            mount_parallelism: mount_parallelism.max(1),
        }
    }

    pub fn mount_spec(&self) -> &MountSpec {
        &self.spec
    }

    async fn mount_node(&self, node: &Node) -> Result<MountOutcome> {
        info!("Mounting {} on {}", self.spec.fs_id, node);
        self.mounter
            .ensure_mounted(node, &self.spec)
            .await
            .with_context(|| format!("Failed to mount {} on {}", self.spec.mount_point, node.alias))
    }

    async fn mount_all(&self, nodes: &[Node]) -> Result<()> {
        if self.mount_parallelism == 1 {
            for node in nodes {
                self.mount_node(node).await?;
            }
            return Ok(());
        }

        // Collected first: a borrowing closure inside the stream is not Send under async_trait
        let pending: Vec<_> = nodes.iter().map(|node| self.mount_node(node)).collect();
        stream::iter(pending)
            .buffer_unordered(self.mount_parallelism)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterLifecycleHandler for EfsPlugin {
    fn name(&self) -> &str {
        EFS_PLUGIN_NAME
    }

    async fn on_start(&self, ctx: &ClusterContext) -> Result<()> {
        info!("Configuring EFS for cluster {}", ctx.name);
        self.reconciler
            .authorize(&self.spec.fs_id, &ctx.credential)
            .await
            .with_context(|| format!("Failed to authorize {} on {}", ctx.credential, self.spec.fs_id))?;

        self.mount_all(&ctx.nodes).await
    }

    async fn on_node_added(&self, _ctx: &ClusterContext, node: &Node) -> Result<()> {
        self.mount_node(node).await.map(|_| ())
    }

    async fn on_node_removed(&self, _ctx: &ClusterContext, node: &Node) -> Result<()> {
        info!("No need to remove {} from EFS", node.alias);
        Ok(())
    }

    async fn on_shutdown(&self, ctx: &ClusterContext) -> Result<()> {
        info!("Removing cluster {} access to {}", ctx.name, self.spec.fs_id);
        self.reconciler
            .deauthorize(&self.spec.fs_id, &ctx.credential)
            .await
            .with_context(|| format!("Failed to deauthorize {} on {}", ctx.credential, self.spec.fs_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::access_reconciler::StandardAccessReconciler;
    use crate::application::node_mounter::StandardNodeMounter;
    use crate::domain::filesystem::{Credential, FilesystemId, MountTargetId};
    use crate::infrastructure::directory::InMemoryEndpointDirectory;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::remote::MockRemoteExecutor;
    use std::time::Duration;

    struct Harness {
        plugin: EfsPlugin,
        directory: Arc<InMemoryEndpointDirectory>,
        executor: Arc<MockRemoteExecutor>,
        target: MountTargetId,
    }

    fn harness(parallelism: usize) -> Harness {
        let fs_id = FilesystemId::new("fs-1234abcd");
        let directory = Arc::new(InMemoryEndpointDirectory::new());
        let target = directory.add_mount_target(&fs_id, "fsmt-a", Some("us-east-1a"), vec![Credential::new("sg-default")]);
        let executor = Arc::new(MockRemoteExecutor::new());
        let event_bus = Arc::new(EventBus::with_default_capacity());

        let reconciler = Arc::new(StandardAccessReconciler::new(
            directory.clone(),
            event_bus.clone(),
            Duration::from_secs(5),
        ));
        let mounter = Arc::new(StandardNodeMounter::new(executor.clone(), event_bus, Duration::from_secs(5)));
        let plugin = EfsPlugin::new(reconciler, mounter, MountSpec::new(fs_id, "/mnt/myefs"), parallelism);

        Harness {
            plugin,
            directory,
            executor,
            target,
        }
    }

    fn context() -> ClusterContext {
        let master = Node::new("master", "10.0.0.10");
        ClusterContext {
            name: "mycluster".to_string(),
            master: master.clone(),
            nodes: vec![master, Node::new("node001", "10.0.0.11"), Node::new("node002", "10.0.0.12")],
            user: "sgeadmin".to_string(),
            credential: Credential::new("sg-cluster"),
        }
    }

    #[tokio::test]
    async fn test_start_authorizes_then_mounts_every_node() {
        let h = harness(1);
        let ctx = context();

        h.plugin.on_start(&ctx).await.unwrap();

        assert_eq!(
            h.directory.credentials(&h.target),
            vec![Credential::new("sg-default"), Credential::new("sg-cluster")]
        );
        for node in &ctx.nodes {
            assert_eq!(h.executor.count_commands(&node.alias, "mount -t nfs4"), 1);
        }
    }

    #[tokio::test]
    async fn test_start_with_parallel_mounts() {
        let h = harness(4);
        let ctx = context();

        h.plugin.on_start(&ctx).await.unwrap();

        for node in &ctx.nodes {
            assert_eq!(h.executor.mounts(&node.alias).len(), 1);
        }
    }

    #[tokio::test]
    async fn test_start_fails_fast_on_mount_error() {
        let h = harness(1);
        let ctx = context();
        h.executor.make_unreachable("node001");

        let err = h.plugin.on_start(&ctx).await.unwrap_err();

        assert!(format!("{:#}", err).contains("node001"));
        assert_eq!(h.executor.count_commands("master", "mount -t nfs4"), 1);
        assert_eq!(h.executor.history().iter().filter(|c| c.node == "node002").count(), 0);
    }

    #[tokio::test]
    async fn test_parallel_start_fails_on_mount_error() {
        let h = harness(4);
        let ctx = context();
        h.executor.make_unreachable("node001");

        let err = h.plugin.on_start(&ctx).await.unwrap_err();

        assert!(format!("{:#}", err).contains("node001"));
        assert!(h.executor.mounts("node001").is_empty());
        assert_eq!(
            h.directory.credentials(&h.target),
            vec![Credential::new("sg-default"), Credential::new("sg-cluster")]
        );
    }

    #[tokio::test]
    async fn test_node_added_mounts_without_authorizing() {
        let h = harness(1);
        let ctx = context();
        let node = Node::new("node003", "10.0.0.13");

        h.plugin.on_node_added(&ctx, &node).await.unwrap();

        assert_eq!(h.directory.calls().len(), 0);
        assert_eq!(h.executor.count_commands("node003", "mount -t nfs4"), 1);
    }

    #[tokio::test]
    async fn test_node_removed_is_noop() {
        let h = harness(1);
        let ctx = context();

        h.plugin.on_node_removed(&ctx, &ctx.nodes[1]).await.unwrap();

        assert!(h.executor.history().is_empty());
        assert!(h.directory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_restores_credentials() {
        let h = harness(1);
        let ctx = context();

        h.plugin.on_start(&ctx).await.unwrap();
        h.plugin.on_shutdown(&ctx).await.unwrap();

        assert_eq!(h.directory.credentials(&h.target), vec![Credential::new("sg-default")]);
    }
}
