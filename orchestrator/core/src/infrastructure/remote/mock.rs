// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scripted in-memory [`RemoteExecutor`].
//!
//! Simulates just enough of a node for the mount workflow: a set of existing
//! paths, a `/proc/mounts` table that `mount -t nfs4` appends to, a metadata
//! zone, and `whoami`. Anything else succeeds with no output unless a
//! response or failure was scripted for it.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use crate::domain::node::{CommandOutput, ExecOptions, ExecutorError, Node, RemoteExecutor};

const DEFAULT_ZONE: &str = "us-east-1a";

#[derive(Debug, Default, Clone)]
struct NodeState {
    paths: HashSet<String>,
    modes: HashMap<String, u32>,
    mounts: Vec<String>,
    zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    pub node: String,
    pub command: String,
}

#[derive(Default)]
pub struct MockRemoteExecutor {
    nodes: Mutex<HashMap<String, NodeState>>,
    /// Command prefix -> (exit status, output)
    failures: Mutex<Vec<(String, i32, Vec<String>)>>,
    responses: Mutex<HashMap<String, CommandOutput>>,
    unreachable: Mutex<HashSet<String>>,
    /// Command prefixes whose channel drops
    dropped: Mutex<Vec<String>>,
    history: Mutex<Vec<ExecutedCommand>>,
}

impl MockRemoteExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_zone(&self, alias: &str, zone: &str) {
        self.nodes.lock().entry(alias.to_string()).or_default().zone = Some(zone.to_string());
    }

    pub fn add_path(&self, alias: &str, path: &str) {
        self.nodes
            .lock()
            .entry(alias.to_string())
            .or_default()
            .paths
            .insert(path.to_string());
    }

    /// Append a raw `/proc/mounts` line
    pub fn add_mount_entry(&self, alias: &str, line: &str) {
        self.nodes
            .lock()
            .entry(alias.to_string())
            .or_default()
            .mounts
            .push(line.to_string());
    }

    /// Commands starting with `prefix` exit with `status` and `output`
    pub fn fail_command(&self, prefix: &str, status: i32, output: &[&str]) {
        self.failures.lock().push((
            prefix.to_string(),
            status,
            output.iter().map(|l| l.to_string()).collect(),
        ));
    }

    /// Fixed response for an exact command on any node
    pub fn respond(&self, command: &str, output: CommandOutput) {
        self.responses.lock().insert(command.to_string(), output);
    }

    /// Every call against this node fails with a transport error
    pub fn make_unreachable(&self, alias: &str) {
        self.unreachable.lock().insert(alias.to_string());
    }

    /// Commands starting with `prefix` fail with a transport error on every node
    pub fn drop_connection_on(&self, prefix: &str) {
        self.dropped.lock().push(prefix.to_string());
    }

    pub fn mounts(&self, alias: &str) -> Vec<String> {
        self.nodes
            .lock()
            .get(alias)
            .map(|s| s.mounts.clone())
            .unwrap_or_default()
    }

    pub fn path_mode(&self, alias: &str, path: &str) -> Option<u32> {
        self.nodes.lock().get(alias).and_then(|s| s.modes.get(path).copied())
    }

    pub fn history(&self) -> Vec<ExecutedCommand> {
        self.history.lock().clone()
    }

    /// Executed commands on `alias` that start with `prefix`
    pub fn count_commands(&self, alias: &str, prefix: &str) -> usize {
        self.history
            .lock()
            .iter()
            .filter(|c| c.node == alias && c.command.starts_with(prefix))
            .count()
    }

    fn record(&self, node: &Node, command: &str) -> Result<(), ExecutorError> {
        self.history.lock().push(ExecutedCommand {
            node: node.alias.clone(),
            command: command.to_string(),
        });
        if self.unreachable.lock().contains(&node.alias) {
            return Err(ExecutorError::Transport(format!("{} is unreachable", node)));
        }
        if self.dropped.lock().iter().any(|p| command.starts_with(p.as_str())) {
            return Err(ExecutorError::Transport(format!("connection to {} closed", node)));
        }
        Ok(())
    }

    fn scripted_failure(&self, command: &str) -> Option<(i32, Vec<String>)> {
        self.failures
            .lock()
            .iter()
            .find(|(prefix, _, _)| command.starts_with(prefix.as_str()))
            .map(|(_, status, output)| (*status, output.clone()))
    }

    fn simulate(&self, node: &Node, command: &str) -> CommandOutput {
        if let Some(output) = self.responses.lock().get(command) {
            return output.clone();
        }

        let mut nodes = self.nodes.lock();
        let state = nodes.entry(node.alias.clone()).or_default();

        if command == "ec2metadata --availability-zone" {
            let zone = state.zone.clone().unwrap_or_else(|| DEFAULT_ZONE.to_string());
            return CommandOutput::new(vec![zone], 0);
        }

        if command == "whoami" {
            let user = node.user.clone().unwrap_or_else(|| "root".to_string());
            return CommandOutput::new(vec![user], 0);
        }

        if let Some(pattern) = command
            .strip_prefix("grep -F -- ")
            .and_then(|rest| rest.strip_suffix(" /proc/mounts"))
            .map(unquote)
        {
            let lines: Vec<String> = state
                .mounts
                .iter()
                .filter(|l| l.contains(pattern.as_str()))
                .cloned()
                .collect();
            let status = if lines.is_empty() { 1 } else { 0 };
            return CommandOutput::new(lines, status);
        }

        if command.starts_with("mount -t nfs4 ") {
            let mut parts = command.split_whitespace().rev();
            if let (Some(mount_point), Some(source)) = (parts.next(), parts.next()) {
                state
                    .mounts
                    .push(format!("{} {} nfs4 rw,relatime,vers=4.1 0 0", source, unquote(mount_point)));
            }
            return CommandOutput::new(Vec::new(), 0);
        }

        CommandOutput::new(Vec::new(), 0)
    }
}

/// Reverse of `shell_quote` for a single word
fn unquote(word: &str) -> String {
    match word.strip_prefix('\'').and_then(|w| w.strip_suffix('\'')) {
        Some(inner) => inner.replace(r"'\''", "'"),
        None => word.to_string(),
    }
}

#[async_trait]
impl RemoteExecutor for MockRemoteExecutor {
    async fn path_exists(&self, node: &Node, path: &str) -> Result<bool, ExecutorError> {
        self.record(node, &format!("test -e {}", path))?;
        Ok(self
            .nodes
            .lock()
            .get(&node.alias)
            .map(|s| s.paths.contains(path))
            .unwrap_or(false))
    }

    async fn make_directories(&self, node: &Node, path: &str, mode: u32) -> Result<(), ExecutorError> {
        let command = format!("mkdir -p {}", path);
        self.record(node, &command)?;
        if let Some((status, output)) = self.scripted_failure(&command) {
            return Err(ExecutorError::CommandFailed {
                command,
                exit_status: status,
                output,
            });
        }

        let mut nodes = self.nodes.lock();
        let state = nodes.entry(node.alias.clone()).or_default();
        state.paths.insert(path.to_string());
        state.modes.insert(path.to_string(), mode);
        Ok(())
    }

    async fn execute(&self, node: &Node, command: &str, opts: ExecOptions) -> Result<CommandOutput, ExecutorError> {
        self.record(node, command)?;

        let output = match self.scripted_failure(command) {
            Some((status, lines)) => CommandOutput::new(lines, status),
            None => self.simulate(node, command),
        };

        if opts.fails_on(output.exit_status) {
            return Err(ExecutorError::CommandFailed {
                command: command.to_string(),
                exit_status: output.exit_status,
                output: output.lines,
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filesystem::mount_table_query;

    #[tokio::test]
    async fn test_mount_appends_to_mount_table() {
        let executor = MockRemoteExecutor::new();
        let node = Node::new("node001", "10.0.0.11");

        executor
            .execute(&node, "mount -t nfs4 -ominorversion=1 host:/ /mnt/efs", ExecOptions::default())
            .await
            .unwrap();

        let grep = executor
            .execute(&node, &mount_table_query("/mnt/efs"), ExecOptions::lenient())
            .await
            .unwrap();
        assert_eq!(grep.exit_status, 0);
        assert_eq!(grep.lines, vec!["host:/ /mnt/efs nfs4 rw,relatime,vers=4.1 0 0".to_string()]);
    }

    #[tokio::test]
    async fn test_grep_miss_respects_options() {
        let executor = MockRemoteExecutor::new();
        let node = Node::new("node001", "10.0.0.11");

        let lenient = executor
            .execute(&node, &mount_table_query("/mnt/efs"), ExecOptions::lenient())
            .await
            .unwrap();
        assert!(lenient.lines.is_empty());

        let strict = executor
            .execute(&node, &mount_table_query("/mnt/efs"), ExecOptions::default())
            .await;
        assert!(matches!(strict, Err(ExecutorError::CommandFailed { exit_status: 1, .. })));
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let executor = MockRemoteExecutor::new();
        let node = Node::new("node002", "10.0.0.12");
        executor.make_unreachable("node002");

        let err = executor.path_exists(&node, "/mnt/efs").await.unwrap_err();
        assert!(matches!(err, ExecutorError::Transport(_)));
        assert_eq!(executor.history().len(), 1);
    }

    #[tokio::test]
    async fn test_quoted_mount_point_round_trips_through_mount_table() {
        let executor = MockRemoteExecutor::new();
        let node = Node::new("node001", "10.0.0.11");

        executor
            .execute(&node, "mount -t nfs4 -ominorversion=1 host:/ '/mnt/x[1]'", ExecOptions::default())
            .await
            .unwrap();

        let grep = executor
            .execute(&node, &mount_table_query("/mnt/x[1]"), ExecOptions::lenient())
            .await
            .unwrap();
        assert_eq!(grep.lines, vec!["host:/ /mnt/x[1] nfs4 rw,relatime,vers=4.1 0 0".to_string()]);
    }
}
