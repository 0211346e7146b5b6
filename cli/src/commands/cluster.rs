// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cluster lifecycle commands
//!
//! Commands: start, add-node, remove-node, shutdown

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use clustermount_core::domain::{cluster::{ClusterContext, LifecycleEvent}, node::Node};

use crate::commands::{print_events, print_rehearsal};
use crate::embedded::EmbeddedRuntime;

#[derive(Subcommand)]
pub enum ClusterCommand {
    /// Run the start hooks of every configured plugin
    Start,

    /// Run the node-added hooks for one node
    AddNode {
        /// Node alias from the manifest, or a new alias with --host
        alias: String,

        /// Address of a node that is not in the manifest
        #[arg(long)]
        host: Option<String>,
    },

    /// Run the node-removed hooks for one node
    RemoveNode {
        alias: String,
    },

    /// Run the shutdown hooks of every configured plugin
    Shutdown,
}

pub async fn handle_command(command: ClusterCommand, config_path: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let runtime = EmbeddedRuntime::new(config_path, dry_run)?;
    let ctx = runtime.cluster_context()?;

    let event = match command {
        ClusterCommand::Start => LifecycleEvent::Start,
        ClusterCommand::AddNode { alias, host } => LifecycleEvent::NodeAdded(resolve_node(&ctx, alias, host)?),
        ClusterCommand::RemoveNode { alias } => LifecycleEvent::NodeRemoved(resolve_node(&ctx, alias, None)?),
        ClusterCommand::Shutdown => LifecycleEvent::Shutdown,
    };

    let chain = runtime.plugin_chain();
    if chain.is_empty() {
        println!("{}", "No plugins configured; nothing to do.".yellow());
        return Ok(());
    }

    let mut events = runtime.event_bus().subscribe();
    let result = chain
        .dispatch(&event, &ctx)
        .await
        .with_context(|| format!("Cluster {} failed during {}", ctx.name, event));

    print_events(&events.drain());
    print_rehearsal(&runtime.rehearsed_commands());

    result?;
    println!(
        "{}",
        format!("✓ {} handled by {}", event, chain.names().join(", ")).green()
    );
    Ok(())
}

fn resolve_node(ctx: &ClusterContext, alias: String, host: Option<String>) -> Result<Node> {
    match (ctx.find_node(&alias), host) {
        (_, Some(host)) => Ok(Node::new(alias, host)),
        (Some(node), None) => Ok(node.clone()),
        (None, None) => anyhow::bail!(
            "Node '{}' is not in cluster {}; pass --host to describe it",
            alias, ctx.name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clustermount_core::domain::filesystem::Credential;

    fn context() -> ClusterContext {
        let master = Node::new("master", "10.0.0.10");
        ClusterContext {
            name: "mycluster".to_string(),
            master: master.clone(),
            nodes: vec![master, Node::new("node001", "10.0.0.11")],
            user: "sgeadmin".to_string(),
            credential: Credential::new("sg-cluster"),
        }
    }

    #[test]
    fn test_resolve_known_node() {
        let node = resolve_node(&context(), "node001".to_string(), None).unwrap();
        assert_eq!(node.host, "10.0.0.11");
    }

    #[test]
    fn test_resolve_new_node_needs_host() {
        assert!(resolve_node(&context(), "node009".to_string(), None).is_err());

        let node = resolve_node(&context(), "node009".to_string(), Some("10.0.0.19".to_string())).unwrap();
        assert_eq!(node.alias, "node009");
        assert_eq!(node.host, "10.0.0.19");
    }
}
