// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! OpenSSH-backed [`RemoteExecutor`]
//!
//! Every call spawns one non-interactive `ssh` process bounded by the
//! configured command timeout. Exit status 255 is reserved by ssh for
//! connection failures and is always reported as a transport error.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::cluster_config::SshConfig;
use crate::domain::node::{shell_quote, CommandOutput, ExecOptions, ExecutorError, Node, RemoteExecutor};
use crate::infrastructure::process::{self, ProcessError};

const SSH_CONNECTION_FAILURE: i32 = 255;

pub struct SshExecutor {
    binary: String,
    default_user: String,
    default_port: u16,
    identity_file: Option<PathBuf>,
    options: Vec<String>,
    timeout: Duration,
}

impl SshExecutor {
    pub fn new(config: &SshConfig, timeout: Duration) -> Self {
        Self {
            binary: config.binary.clone(),
            default_user: config.user.clone(),
            default_port: config.port,
            identity_file: config.identity_file.clone(),
            options: config.options.clone(),
            timeout,
        }
    }

    fn ssh_args(&self, node: &Node, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().to_string());
        }
        args.push("-p".to_string());
        args.push(node.port.unwrap_or(self.default_port).to_string());

        let user = node.user.as_deref().unwrap_or(&self.default_user);
        args.push(format!("{}@{}", user, node.host));
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    async fn run(&self, node: &Node, command: &str) -> Result<process::ProcessOutput, ExecutorError> {
        debug!("[{}] $ {}", node.alias, command);
        let output = process::run(&self.binary, &self.ssh_args(node, command), self.timeout)
            .await
            .map_err(|e| match e {
                ProcessError::Timeout { timeout, .. } => ExecutorError::Timeout {
                    command: command.to_string(),
                    seconds: timeout.as_secs(),
                },
                other => ExecutorError::Transport(other.to_string()),
            })?;

        if output.exit_code == SSH_CONNECTION_FAILURE {
            return Err(ExecutorError::Transport(format!(
                "ssh to {} failed: {}",
                node,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn path_exists(&self, node: &Node, path: &str) -> Result<bool, ExecutorError> {
        let command = format!("test -e {}", shell_quote(path));
        let output = self.run(node, &command).await?;
        match output.exit_code {
            0 => Ok(true),
            1 => Ok(false),
            status => Err(ExecutorError::CommandFailed {
                command,
                exit_status: status,
                output: output.stderr.lines().map(str::to_string).collect(),
            }),
        }
    }

    async fn make_directories(&self, node: &Node, path: &str, mode: u32) -> Result<(), ExecutorError> {
        let quoted = shell_quote(path);
        let command = format!("mkdir -p {} && chmod {:o} {}", quoted, mode, quoted);
        let output = self.run(node, &command).await?;
        if output.success() {
            Ok(())
        } else {
            Err(ExecutorError::CommandFailed {
                command,
                exit_status: output.exit_code,
                output: output.stderr.lines().map(str::to_string).collect(),
            })
        }
    }

    async fn execute(&self, node: &Node, command: &str, opts: ExecOptions) -> Result<CommandOutput, ExecutorError> {
        let output = self.run(node, command).await?;

        if opts.fails_on(output.exit_code) {
            let lines = output
                .stdout
                .lines()
                .chain(output.stderr.lines())
                .map(str::to_string)
                .collect();
            return Err(ExecutorError::CommandFailed {
                command: command.to_string(),
                exit_status: output.exit_code,
                output: lines,
            });
        }

        if output.exit_code != 0 && !opts.ignore_exit_status {
            warn!(
                "[{}] '{}' exited with status {}: {}",
                node.alias,
                command,
                output.exit_code,
                output.stderr.trim()
            );
        }

        Ok(CommandOutput::from_text(&output.stdout, output.exit_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> SshExecutor {
        let config = SshConfig {
            identity_file: Some(PathBuf::from("/home/me/.ssh/cluster")),
            options: vec!["ConnectTimeout=10".to_string()],
            ..SshConfig::default()
        };
        SshExecutor::new(&config, Duration::from_secs(60))
    }

    #[test]
    fn test_ssh_args_defaults() {
        let node = Node::new("node001", "10.0.0.11");
        let args = executor().ssh_args(&node, "whoami");
        assert_eq!(
            args,
            vec![
                "-o", "BatchMode=yes", "-o", "StrictHostKeyChecking=accept-new",
                "-o", "ConnectTimeout=10", "-i", "/home/me/.ssh/cluster",
                "-p", "22", "root@10.0.0.11", "--", "whoami",
            ]
        );
    }

    #[test]
    fn test_ssh_args_node_overrides() {
        let mut node = Node::new("master", "master.internal");
        node.user = Some("ubuntu".to_string());
        node.port = Some(2222);
        let args = executor().ssh_args(&node, "true");
        assert!(args.windows(2).any(|w| w[0] == "-p" && w[1] == "2222"));
        assert!(args.contains(&"ubuntu@master.internal".to_string()));
    }
}
