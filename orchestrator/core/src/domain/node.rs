// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use crate::domain::filesystem::Credential;

/// A cluster member as reported by the orchestrator.
///
/// The remote execution channel is not part of the node; it is the
/// `RemoteExecutor` owned by the host layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Cluster-unique alias (`master`, `node001`, ...)
    pub alias: String,

    /// Address used to reach the node
    pub host: String,

    /// Login user override (falls back to the executor's default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// SSH port override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Security groups the orchestrator assigned, cluster group first
    #[serde(default)]
    pub cluster_groups: Vec<Credential>,
}

impl Node {
    pub fn new(alias: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            host: host.into(),
            user: None,
            port: None,
            cluster_groups: Vec::new(),
        }
    }

    pub fn with_cluster_groups(mut self, groups: Vec<Credential>) -> Self {
        self.cluster_groups = groups;
        self
    }

    /// The cluster-level security group, if the orchestrator assigned one
    pub fn cluster_group(&self) -> Option<&Credential> {
        self.cluster_groups.first()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.alias, self.host)
    }
}

/// How a non-zero exit status is treated by `RemoteExecutor::execute`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// Return `ExecutorError::CommandFailed` on non-zero exit
    pub raise_on_failure: bool,
    /// Treat any exit status as success (overrides `raise_on_failure`)
    pub ignore_exit_status: bool,
}

impl ExecOptions {
    /// Output is wanted regardless of exit status (e.g. `grep` lookups)
    pub fn lenient() -> Self {
        Self {
            raise_on_failure: false,
            ignore_exit_status: true,
        }
    }

    /// Whether a given exit status should be surfaced as an error
    pub fn fails_on(&self, exit_status: i32) -> bool {
        exit_status != 0 && self.raise_on_failure && !self.ignore_exit_status
    }
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            raise_on_failure: true,
            ignore_exit_status: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub lines: Vec<String>,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn new(lines: Vec<String>, exit_status: i32) -> Self {
        Self { lines, exit_status }
    }

    /// Splits raw text into lines, dropping the trailing empty line
    pub fn from_text(text: &str, exit_status: i32) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            exit_status,
        }
    }

    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Command '{command}' exited with status {exit_status}: {}", .output.join("\n"))]
    CommandFailed {
        command: String,
        exit_status: i32,
        output: Vec<String>,
    },
    #[error("Command '{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },
    #[error("Command '{command}' returned unusable output: {reason}")]
    UnexpectedOutput { command: String, reason: String },
    #[error("Remote channel failure: {0}")]
    Transport(String),
}

/// Single-quote `value` for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Shell access to cluster nodes
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Whether `path` exists on the node's filesystem
    async fn path_exists(&self, node: &Node, path: &str) -> Result<bool, ExecutorError>;

    /// Create `path` and its parents with the given permission bits
    async fn make_directories(&self, node: &Node, path: &str, mode: u32) -> Result<(), ExecutorError>;

    /// Run a shell command and collect its output lines
    async fn execute(&self, node: &Node, command: &str, opts: ExecOptions) -> Result<CommandOutput, ExecutorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/mnt/myefs"), "'/mnt/myefs'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_exec_options_failure_policy() {
        assert!(ExecOptions::default().fails_on(1));
        assert!(!ExecOptions::default().fails_on(0));
        assert!(!ExecOptions::lenient().fails_on(1));

        let ignore = ExecOptions {
            raise_on_failure: true,
            ignore_exit_status: true,
        };
        assert!(!ignore.fails_on(2));
    }

    #[test]
    fn test_command_output_from_text() {
        let output = CommandOutput::from_text("us-east-1a\n", 0);
        assert_eq!(output.lines, vec!["us-east-1a".to_string()]);
        assert_eq!(output.first_line(), Some("us-east-1a"));
        assert!(CommandOutput::from_text("", 1).is_empty());
    }

    #[test]
    fn test_cluster_group_is_first_assigned() {
        let node = Node::new("master", "10.0.0.10")
            .with_cluster_groups(vec![Credential::new("sg-cluster"), Credential::new("sg-extra")]);
        assert_eq!(node.cluster_group(), Some(&Credential::new("sg-cluster")));
        assert_eq!(node.to_string(), "master (10.0.0.10)");
    }
}
