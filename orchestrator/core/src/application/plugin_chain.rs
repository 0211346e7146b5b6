// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Plugin Chain - Application Layer
//!
//! Ordered set of [`ClusterLifecycleHandler`]s that a lifecycle event is
//! delivered to, plus the factory that builds the chain from a manifest.
//!
//! # Dispatch rules
//!
//! - Handlers run one at a time in configuration order.
//! - The first failing handler stops the chain; its error is returned with
//!   the plugin name and event as context.
//! - Every handler invocation is bracketed by `PluginStarted` and
//!   `PluginCompleted`/`PluginFailed` events on the bus.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::application::access_reconciler::StandardAccessReconciler;
use crate::application::efs_plugin::EfsPlugin;
use crate::application::node_mounter::StandardNodeMounter;
use crate::application::whoami_plugin::WhoamiPlugin;
use crate::domain::cluster::{ClusterContext, ClusterLifecycleHandler, LifecycleEvent};
use crate::domain::cluster_config::ClusterConfigManifest;
use crate::domain::events::PluginEvent;
use crate::domain::filesystem::FilesystemEndpointDirectory;
use crate::domain::node::RemoteExecutor;
use crate::infrastructure::event_bus::EventBus;

pub struct PluginChain {
    handlers: Vec<Arc<dyn ClusterLifecycleHandler>>,
    event_bus: Arc<EventBus>,
}

impl PluginChain {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            handlers: Vec::new(),
            event_bus,
        }
    }

    pub fn push(&mut self, handler: Arc<dyn ClusterLifecycleHandler>) {
        self.handlers.push(handler);
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn dispatch(&self, event: &LifecycleEvent, ctx: &ClusterContext) -> Result<()> {
        info!("Dispatching {} for cluster {} to {} plugin(s)", event, ctx.name, self.handlers.len());

        for handler in &self.handlers {
            let plugin = handler.name().to_string();
            self.event_bus.publish_plugin_event(PluginEvent::PluginStarted {
                plugin: plugin.clone(),
                event: event.to_string(),
                started_at: Utc::now(),
            });

            if let Err(e) = handler.handle(event, ctx).await {
                error!("Plugin '{}' failed during {}: {:#}", plugin, event, e);
                self.event_bus.publish_plugin_event(PluginEvent::PluginFailed {
                    plugin: plugin.clone(),
                    event: event.to_string(),
                    reason: format!("{:#}", e),
                    failed_at: Utc::now(),
                });
                return Err(e.context(format!("Plugin '{}' failed during {}", plugin, event)));
            }

            self.event_bus.publish_plugin_event(PluginEvent::PluginCompleted {
                plugin,
                event: event.to_string(),
                completed_at: Utc::now(),
            });
        }
        Ok(())
    }
}

/// Builds the chain configured in `spec.plugins`, EFS first.
pub fn build_plugin_chain(
    manifest: &ClusterConfigManifest,
    directory: Arc<dyn FilesystemEndpointDirectory>,
    executor: Arc<dyn RemoteExecutor>,
    event_bus: Arc<EventBus>,
) -> PluginChain {
    let plugins = &manifest.spec.plugins;
    let timeouts = &manifest.spec.timeouts;
    let mut chain = PluginChain::new(event_bus.clone());

    if let Some(efs) = &plugins.efs {
        let reconciler = Arc::new(StandardAccessReconciler::new(directory, event_bus.clone(), timeouts.api()));
        let mounter = Arc::new(StandardNodeMounter::new(executor.clone(), event_bus.clone(), timeouts.command()));
        chain.push(Arc::new(EfsPlugin::new(
            reconciler,
            mounter,
            efs.mount_spec(),
            efs.mount_parallelism,
        )));
    }

    if plugins.whoami.as_ref().is_some_and(|w| w.enabled) {
        chain.push(Arc::new(WhoamiPlugin::new(executor, event_bus)));
    }

    chain
}
