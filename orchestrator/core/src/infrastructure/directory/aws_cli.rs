// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AWS CLI adapter for [`FilesystemEndpointDirectory`]
//!
//! Drives `aws efs ...` with `--output json` and maps the responses onto the
//! domain value objects. Credentials, region and profile resolution are left
//! to the CLI's own configuration chain unless overridden.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::filesystem::{
    AvailabilityZone, Credential, DirectoryError, FilesystemEndpointDirectory, FilesystemId,
    MountTarget, MountTargetId,
};
use crate::infrastructure::process::{self, ProcessError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeMountTargetsResponse {
    #[serde(default)]
    mount_targets: Vec<MountTargetDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MountTargetDescription {
    mount_target_id: String,
    #[serde(default)]
    availability_zone_name: Option<String>,
    #[serde(default)]
    life_cycle_state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecurityGroupsResponse {
    security_groups: Vec<String>,
}

pub struct AwsCliEndpointDirectory {
    binary: String,
    region: Option<String>,
    profile: Option<String>,
    timeout: Duration,
}

impl AwsCliEndpointDirectory {
    pub fn new(binary: impl Into<String>, region: Option<String>, profile: Option<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            region,
            profile,
            timeout,
        }
    }

    /// `efs <operation> [--region r] [--profile p] --output json <extra>`
    fn build_args(&self, operation: &str, extra: &[String]) -> Vec<String> {
        let mut args = vec!["efs".to_string(), operation.to_string()];
        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        if let Some(profile) = &self.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args.push("--output".to_string());
        args.push("json".to_string());
        args.extend(extra.iter().cloned());
        args
    }

    async fn invoke(&self, operation: &str, extra: &[String]) -> Result<String, DirectoryError> {
        let args = self.build_args(operation, extra);
        let output = process::run(&self.binary, &args, self.timeout)
            .await
            .map_err(|e| match e {
                ProcessError::Timeout { timeout, .. } => DirectoryError::Timeout(timeout.as_secs()),
                other => DirectoryError::Api(other.to_string()),
            })?;

        debug!("aws efs {} finished in {}ms (exit {})", operation, output.duration_ms, output.exit_code);

        if output.success() {
            Ok(output.stdout)
        } else {
            Err(classify_failure(&output.stderr))
        }
    }
}

fn classify_failure(stderr: &str) -> DirectoryError {
    let message = stderr.trim().to_string();
    if message.contains("MountTargetNotFound") || message.contains("FileSystemNotFound") {
        DirectoryError::NotFound(message)
    } else {
        DirectoryError::Api(message)
    }
}

pub(crate) fn parse_mount_targets(json: &str) -> Result<Vec<MountTarget>, DirectoryError> {
    let response: DescribeMountTargetsResponse = serde_json::from_str(json)
        .map_err(|e| DirectoryError::InvalidResponse(format!("describe-mount-targets: {}", e)))?;

    Ok(response
        .mount_targets
        .into_iter()
        .map(|mt| {
            if let Some(state) = &mt.life_cycle_state {
                debug!("Mount target {} is {}", mt.mount_target_id, state);
            }
            MountTarget {
                id: MountTargetId::new(mt.mount_target_id),
                availability_zone: mt.availability_zone_name.map(AvailabilityZone::new),
                credentials: Vec::new(),
            }
        })
        .collect())
}

pub(crate) fn parse_security_groups(json: &str) -> Result<Vec<Credential>, DirectoryError> {
    let response: DescribeSecurityGroupsResponse = serde_json::from_str(json).map_err(|e| {
        DirectoryError::InvalidResponse(format!("describe-mount-target-security-groups: {}", e))
    })?;
    Ok(response.security_groups.into_iter().map(Credential::new).collect())
}

#[async_trait]
impl FilesystemEndpointDirectory for AwsCliEndpointDirectory {
    async fn list_mount_targets(&self, fs_id: &FilesystemId) -> Result<Vec<MountTarget>, DirectoryError> {
        let stdout = self
            .invoke("describe-mount-targets", &["--file-system-id".to_string(), fs_id.to_string()])
            .await?;
        parse_mount_targets(&stdout)
    }

    async fn get_attached_credentials(&self, target_id: &MountTargetId) -> Result<Vec<Credential>, DirectoryError> {
        let stdout = self
            .invoke(
                "describe-mount-target-security-groups",
                &["--mount-target-id".to_string(), target_id.to_string()],
            )
            .await?;
        parse_security_groups(&stdout)
    }

    async fn set_attached_credentials(
        &self,
        target_id: &MountTargetId,
        credentials: &[Credential],
    ) -> Result<(), DirectoryError> {
        let mut extra = vec![
            "--mount-target-id".to_string(),
            target_id.to_string(),
            "--security-groups".to_string(),
        ];
        extra.extend(credentials.iter().map(|c| c.to_string()));

        self.invoke("modify-mount-target-security-groups", &extra).await?;
        info!("Updated security groups on {}: {:?}", target_id, credentials);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mount_targets() {
        let json = r#"{
            "MountTargets": [
                {
                    "OwnerId": "123456789012",
                    "MountTargetId": "fsmt-aaaa1111",
                    "FileSystemId": "fs-1234abcd",
                    "SubnetId": "subnet-1",
                    "LifeCycleState": "available",
                    "IpAddress": "10.0.1.25",
                    "AvailabilityZoneName": "us-east-1a"
                },
                {
                    "MountTargetId": "fsmt-bbbb2222",
                    "FileSystemId": "fs-1234abcd"
                }
            ]
        }"#;

        let targets = parse_mount_targets(json).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, MountTargetId::new("fsmt-aaaa1111"));
        assert_eq!(targets[0].availability_zone, Some(AvailabilityZone::new("us-east-1a")));
        assert_eq!(targets[1].availability_zone, None);
        assert!(targets[1].credentials.is_empty());
    }

    #[test]
    fn test_parse_security_groups() {
        let json = r#"{ "SecurityGroups": ["sg-a", "sg-b"] }"#;
        let groups = parse_security_groups(json).unwrap();
        assert_eq!(groups, vec![Credential::new("sg-a"), Credential::new("sg-b")]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_security_groups("not json"),
            Err(DirectoryError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_build_args_includes_region_and_profile() {
        let directory = AwsCliEndpointDirectory::new(
            "aws",
            Some("us-east-1".to_string()),
            Some("ops".to_string()),
            Duration::from_secs(5),
        );
        let args = directory.build_args("describe-mount-targets", &["--file-system-id".to_string(), "fs-1".to_string()]);
        assert_eq!(
            args,
            vec![
                "efs", "describe-mount-targets", "--region", "us-east-1", "--profile", "ops",
                "--output", "json", "--file-system-id", "fs-1",
            ]
        );
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("An error occurred (MountTargetNotFound) when calling ..."),
            DirectoryError::NotFound(_)
        ));
        assert!(matches!(classify_failure("AccessDenied"), DirectoryError::Api(_)));
    }
}
