// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote Execution Infrastructure
//!
//! Concrete implementations of the `RemoteExecutor` trait.

pub mod ssh;
pub mod mock;

pub use ssh::SshExecutor;
pub use mock::{ExecutedCommand, MockRemoteExecutor};

use std::sync::Arc;
use std::time::Duration;
use crate::domain::cluster_config::SshConfig;
use crate::domain::node::RemoteExecutor;

/// Remote execution backend configuration
#[derive(Debug, Clone)]
pub enum RemoteBackend {
    /// OpenSSH client (production)
    Ssh(SshConfig),

    /// Simulated nodes (dry runs and tests)
    Mock,
}

/// Factory function to create a remote executor from configuration
pub fn create_remote_executor(backend: RemoteBackend, command_timeout: Duration) -> Arc<dyn RemoteExecutor> {
    match backend {
        RemoteBackend::Ssh(config) => Arc::new(SshExecutor::new(&config, command_timeout)),
        RemoteBackend::Mock => Arc::new(MockRemoteExecutor::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{ExecOptions, Node};

    #[test]
    fn test_factory_ssh() {
        let executor = create_remote_executor(RemoteBackend::Ssh(SshConfig::default()), Duration::from_secs(120));
        assert!(Arc::strong_count(&executor) == 1);
    }

    #[tokio::test]
    async fn test_factory_mock_answers_whoami() {
        let executor = create_remote_executor(RemoteBackend::Mock, Duration::from_secs(1));
        let output = executor
            .execute(&Node::new("master", "127.0.0.1"), "whoami", ExecOptions::default())
            .await
            .unwrap();
        assert_eq!(output.first_line(), Some("root"));
    }
}
