// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Filesystem Endpoint Directory Infrastructure
//!
//! Concrete implementations of the `FilesystemEndpointDirectory` trait.

pub mod aws_cli;
pub mod memory;

pub use aws_cli::AwsCliEndpointDirectory;
pub use memory::{DirectoryCall, InMemoryEndpointDirectory};

use std::sync::Arc;
use std::time::Duration;
use crate::domain::filesystem::{FilesystemEndpointDirectory, FilesystemId};

/// Directory backend configuration
#[derive(Debug, Clone)]
pub enum DirectoryBackend {
    /// `aws efs` CLI (production)
    AwsCli {
        binary: String,
        region: Option<String>,
        profile: Option<String>,
    },

    /// In-memory directory seeded with one empty mount target (dry runs)
    InMemory { fs_id: FilesystemId },
}

/// Factory function to create an endpoint directory from configuration
pub fn create_endpoint_directory(backend: DirectoryBackend, api_timeout: Duration) -> Arc<dyn FilesystemEndpointDirectory> {
    match backend {
        DirectoryBackend::AwsCli { binary, region, profile } => {
            Arc::new(AwsCliEndpointDirectory::new(binary, region, profile, api_timeout))
        }
        DirectoryBackend::InMemory { fs_id } => Arc::new(InMemoryEndpointDirectory::seeded(&fs_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_in_memory_is_seeded() {
        let fs_id = FilesystemId::new("fs-1234abcd");
        let directory = create_endpoint_directory(
            DirectoryBackend::InMemory { fs_id: fs_id.clone() },
            Duration::from_secs(1),
        );

        let targets = directory.list_mount_targets(&fs_id).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert!(targets[0].credentials.is_empty());
    }

    #[test]
    fn test_factory_aws_cli() {
        let directory = create_endpoint_directory(
            DirectoryBackend::AwsCli {
                binary: "aws".to_string(),
                region: None,
                profile: None,
            },
            Duration::from_secs(30),
        );

        assert!(Arc::strong_count(&directory) == 1);
    }
}
