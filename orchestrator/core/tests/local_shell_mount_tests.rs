// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

#![cfg(unix)]

use async_trait::async_trait;
use clustermount_core::application::node_mounter::ZONE_QUERY_COMMAND;
use clustermount_core::application::{MountOutcome, NodeMounter, StandardNodeMounter};
use clustermount_core::domain::filesystem::{FilesystemId, MountSpec};
use clustermount_core::domain::node::{CommandOutput, ExecOptions, ExecutorError, Node, RemoteExecutor};
use clustermount_core::infrastructure::event_bus::EventBus;
use clustermount_core::infrastructure::process;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Runs node commands through the local `sh` against a fixture mount table.
/// The mount command itself is only recorded.
struct LocalShell {
    mount_table: PathBuf,
    commands: Mutex<Vec<String>>,
}

impl LocalShell {
    fn new(mount_table: PathBuf) -> Self {
        Self {
            mount_table,
            commands: Mutex::new(Vec::new()),
        }
    }

    fn mount_commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .filter(|c| c.starts_with("mount "))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for LocalShell {
    async fn path_exists(&self, _node: &Node, _path: &str) -> Result<bool, ExecutorError> {
        Ok(true)
    }

    async fn make_directories(&self, _node: &Node, _path: &str, _mode: u32) -> Result<(), ExecutorError> {
        Ok(())
    }

    async fn execute(&self, _node: &Node, command: &str, opts: ExecOptions) -> Result<CommandOutput, ExecutorError> {
        self.commands.lock().push(command.to_string());

        if command == ZONE_QUERY_COMMAND {
            return Ok(CommandOutput::new(vec!["us-east-1a".to_string()], 0));
        }
        if command.starts_with("mount ") {
            return Ok(CommandOutput::new(Vec::new(), 0));
        }

        let local = command.replace("/proc/mounts", &self.mount_table.to_string_lossy());
        let output = process::run("sh", &["-c".to_string(), local], Duration::from_secs(10))
            .await
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;

        let result = CommandOutput::from_text(&output.stdout, output.exit_code);
        if opts.fails_on(result.exit_status) {
            return Err(ExecutorError::CommandFailed {
                command: command.to_string(),
                exit_status: result.exit_status,
                output: result.lines,
            });
        }
        Ok(result)
    }
}

fn mounter(shell: Arc<LocalShell>) -> StandardNodeMounter {
    StandardNodeMounter::new(shell, Arc::new(EventBus::with_default_capacity()), Duration::from_secs(10))
}

#[tokio::test]
async fn test_regex_characters_in_mounted_path_are_detected() {
    let node = Node::new("node001", "10.0.0.11");

    for mount_point in ["/mnt/x[1]", "/mnt/a*b", "/mnt/^top$"] {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("mounts");
        std::fs::write(
            &table,
            format!("proc /proc proc rw 0 0\nhost:/ {} nfs4 rw,vers=4.1 0 0\n", mount_point),
        )
        .unwrap();
        let shell = Arc::new(LocalShell::new(table));

        let spec = MountSpec::new(FilesystemId::new("fs-1"), mount_point);
        let outcome = mounter(shell.clone()).ensure_mounted(&node, &spec).await.unwrap();

        assert_eq!(outcome, MountOutcome::AlreadyMounted, "{}", mount_point);
        assert!(shell.mount_commands().is_empty(), "{}", mount_point);
    }
}

#[tokio::test]
async fn test_prefix_sibling_is_not_a_mount() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("mounts");
    std::fs::write(&table, "host:/ /mnt/efs2 nfs4 rw,vers=4.1 0 0\n").unwrap();
    let shell = Arc::new(LocalShell::new(table));
    let node = Node::new("node001", "10.0.0.11");

    let spec = MountSpec::new(FilesystemId::new("fs-1"), "/mnt/efs");
    let outcome = mounter(shell.clone()).ensure_mounted(&node, &spec).await.unwrap();

    assert_eq!(outcome, MountOutcome::Mounted);
    assert_eq!(
        shell.mount_commands(),
        vec!["mount -t nfs4 -ominorversion=1 us-east-1a.fs-1.efs.us-east-1.amazonaws.com:/ /mnt/efs".to_string()]
    );
}
