// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Diagnostic plugin: reports which account commands run as on the master.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::domain::cluster::{ClusterContext, ClusterLifecycleHandler};
use crate::domain::events::PluginEvent;
use crate::domain::node::{ExecOptions, RemoteExecutor};
use crate::infrastructure::event_bus::EventBus;

pub const WHOAMI_PLUGIN_NAME: &str = "whoami";

pub struct WhoamiPlugin {
    executor: Arc<dyn RemoteExecutor>,
    event_bus: Arc<EventBus>,
}

impl WhoamiPlugin {
    pub fn new(executor: Arc<dyn RemoteExecutor>, event_bus: Arc<EventBus>) -> Self {
        Self { executor, event_bus }
    }
}

#[async_trait]
impl ClusterLifecycleHandler for WhoamiPlugin {
    fn name(&self) -> &str {
        WHOAMI_PLUGIN_NAME
    }

    async fn on_start(&self, ctx: &ClusterContext) -> Result<()> {
        info!("Running whoami plugin");

        let output = self
            .executor
            .execute(&ctx.master, "whoami", ExecOptions::default())
            .await
            .with_context(|| format!("whoami failed on {}", ctx.master))?;

        let user = output
            .first_line()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow::anyhow!("whoami returned no output on {}", ctx.master))?;

        info!("whoami?: {}", user);
        self.event_bus.publish_plugin_event(PluginEvent::DiagnosticOutput {
            plugin: WHOAMI_PLUGIN_NAME.to_string(),
            node: ctx.master.alias.clone(),
            output: user.to_string(),
            captured_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filesystem::Credential;
    use crate::domain::node::{CommandOutput, Node};
    use crate::infrastructure::event_bus::DomainEvent;
    use crate::infrastructure::remote::MockRemoteExecutor;

    fn context() -> ClusterContext {
        let mut master = Node::new("master", "10.0.0.10");
        master.user = Some("sgeadmin".to_string());
        ClusterContext {
            name: "mycluster".to_string(),
            master: master.clone(),
            nodes: vec![master, Node::new("node001", "10.0.0.11")],
            user: "sgeadmin".to_string(),
            credential: Credential::new("sg-cluster"),
        }
    }

    #[tokio::test]
    async fn test_reports_master_user() {
        let executor = Arc::new(MockRemoteExecutor::new());
        let event_bus = Arc::new(EventBus::with_default_capacity());
        let mut receiver = event_bus.subscribe();
        let plugin = WhoamiPlugin::new(executor.clone(), event_bus);

        plugin.on_start(&context()).await.unwrap();

        assert_eq!(executor.count_commands("master", "whoami"), 1);
        assert_eq!(executor.count_commands("node001", "whoami"), 0);
        match receiver.drain().as_slice() {
            [DomainEvent::Plugin(PluginEvent::DiagnosticOutput { node, output, .. })] => {
                assert_eq!(node, "master");
                assert_eq!(output, "sgeadmin");
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_output_is_error() {
        let executor = Arc::new(MockRemoteExecutor::new());
        executor.respond("whoami", CommandOutput::new(vec![], 0));
        let plugin = WhoamiPlugin::new(executor, Arc::new(EventBus::with_default_capacity()));

        assert!(plugin.on_start(&context()).await.is_err());
    }

    #[tokio::test]
    async fn test_other_events_do_nothing() {
        let executor = Arc::new(MockRemoteExecutor::new());
        let plugin = WhoamiPlugin::new(executor.clone(), Arc::new(EventBus::with_default_capacity()));
        let ctx = context();

        plugin.on_node_added(&ctx, &ctx.nodes[1]).await.unwrap();
        plugin.on_shutdown(&ctx).await.unwrap();

        assert!(executor.history().is_empty());
    }
}
