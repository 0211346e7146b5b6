// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Cluster Configuration Types
//
// Defines the configuration schema read by the clustermount host, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Cluster inventory (master, nodes, shared credential)
// - Remote shell and cloud CLI settings
// - Per-call timeouts
// - Plugin settings (efs, whoami)

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::domain::cluster::ClusterContext;
use crate::domain::filesystem::{is_safe_mount_point, Credential, FilesystemId, MountSpec};
use crate::domain::node::Node;

pub const API_VERSION: &str = "clustermount/v1";
pub const KIND: &str = "ClusterConfig";

/// Top-level Kubernetes-style cluster configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfigManifest {
    /// API version (must be "clustermount/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ClusterConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ClusterConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Cluster name (also the tag used by the provisioning tool)
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfigSpec {
    pub cluster: ClusterInventory,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInventory {
    /// Security group granting the cluster access to the filesystem.
    /// Defaults to the master's first cluster group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,

    /// Login user for cluster workloads
    #[serde(default = "default_cluster_user")]
    pub user: String,

    pub master: Node,

    /// Worker nodes (the master is implicitly a member)
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// ssh client binary
    #[serde(default = "default_ssh_binary")]
    pub binary: String,

    /// Default login user when a node has none
    #[serde(default = "default_ssh_user")]
    pub user: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,

    /// Extra `-o` options passed verbatim
    #[serde(default)]
    pub options: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            binary: default_ssh_binary(),
            user: default_ssh_user(),
            port: default_ssh_port(),
            identity_file: None,
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// aws CLI binary
    #[serde(default = "default_aws_binary")]
    pub binary: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            binary: default_aws_binary(),
            region: None,
            profile: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound for one remote command
    #[serde(default = "default_command_secs")]
    pub command_secs: u64,

    /// Upper bound for one filesystem API call
    #[serde(default = "default_api_secs")]
    pub api_secs: u64,
}

impl TimeoutConfig {
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn api(&self) -> Duration {
        Duration::from_secs(self.api_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            command_secs: default_command_secs(),
            api_secs: default_api_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efs: Option<EfsPluginConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whoami: Option<WhoamiPluginConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfsPluginConfig {
    pub fs_id: FilesystemId,

    /// Absolute path the filesystem is mounted at on every node
    pub mount_point: String,

    /// Nodes mounted concurrently at cluster start (1 = sequential)
    #[serde(default = "default_mount_parallelism")]
    pub mount_parallelism: usize,
}

impl EfsPluginConfig {
    pub fn mount_spec(&self) -> MountSpec {
        MountSpec::new(self.fs_id.clone(), self.mount_point.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoamiPluginConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_cluster_user() -> String {
    "sgeadmin".to_string()
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_aws_binary() -> String {
    "aws".to_string()
}

fn default_command_secs() -> u64 {
    120
}

fn default_api_secs() -> u64 {
    30
}

fn default_mount_parallelism() -> usize {
    1
}

impl Default for ClusterConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "default-cluster".to_string(),
                labels: None,
            },
            spec: ClusterConfigSpec {
                cluster: ClusterInventory {
                    credential: None,
                    user: default_cluster_user(),
                    master: Node::new("master", "127.0.0.1"),
                    nodes: Vec::new(),
                },
                ssh: SshConfig::default(),
                aws: AwsConfig::default(),
                timeouts: TimeoutConfig::default(),
                plugins: PluginsConfig::default(),
            },
        }
    }
}

impl ClusterConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CLUSTERMOUNT_CONFIG_PATH environment variable
    /// 2. ./clustermount.yaml (working directory)
    /// 3. ~/.clustermount/config.yaml (user home)
    /// 4. /etc/clustermount/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CLUSTERMOUNT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./clustermount.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".clustermount").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/clustermount/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using empty defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        let fs_id = std::env::var("CLUSTERMOUNT_FS_ID").ok();
        let mount_point = std::env::var("CLUSTERMOUNT_MOUNT_POINT").ok();

        match (self.spec.plugins.efs.as_mut(), fs_id, mount_point) {
            (Some(efs), fs_id, mount_point) => {
                if let Some(fs_id) = fs_id {
                    tracing::info!("Environment override: CLUSTERMOUNT_FS_ID={}", fs_id);
                    efs.fs_id = FilesystemId::new(fs_id);
                }
                if let Some(mount_point) = mount_point {
                    tracing::info!("Environment override: CLUSTERMOUNT_MOUNT_POINT={}", mount_point);
                    efs.mount_point = mount_point;
                }
            }
            (None, Some(fs_id), Some(mount_point)) => {
                tracing::info!(
                    "Environment override: enabling efs plugin for {} at {}",
                    fs_id, mount_point
                );
                self.spec.plugins.efs = Some(EfsPluginConfig {
                    fs_id: FilesystemId::new(fs_id),
                    mount_point,
                    mount_parallelism: default_mount_parallelism(),
                });
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                tracing::warn!(
                    "CLUSTERMOUNT_FS_ID and CLUSTERMOUNT_MOUNT_POINT must both be set to enable the efs plugin. Ignoring."
                );
            }
            (None, None, None) => {}
        }

        if let Ok(region) = std::env::var("CLUSTERMOUNT_AWS_REGION") {
            tracing::info!("Environment override: CLUSTERMOUNT_AWS_REGION={}", region);
            self.spec.aws.region = Some(region);
        }
    }

    /// Cluster credential, falling back to the master's first cluster group
    pub fn credential(&self) -> Option<Credential> {
        self.spec
            .cluster
            .credential
            .clone()
            .or_else(|| self.spec.cluster.master.cluster_group().cloned())
    }

    /// Master followed by workers
    pub fn all_nodes(&self) -> Vec<Node> {
        std::iter::once(self.spec.cluster.master.clone())
            .chain(self.spec.cluster.nodes.iter().cloned())
            .collect()
    }

    pub fn cluster_context(&self) -> anyhow::Result<ClusterContext> {
        let credential = self.credential().ok_or_else(|| {
            anyhow::anyhow!(
                "No cluster credential configured: set spec.cluster.credential or give the master a cluster group"
            )
        })?;

        Ok(ClusterContext {
            name: self.metadata.name.clone(),
            master: self.spec.cluster.master.clone(),
            nodes: self.all_nodes(),
            user: self.spec.cluster.user.clone(),
            credential,
        })
    }

    /// Checks needed by direct filesystem access: manifest header, timeouts
    /// and the EFS plugin settings when present. The cluster inventory is
    /// not required.
    pub fn validate_access(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version, API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.spec.timeouts.command_secs == 0 || self.spec.timeouts.api_secs == 0 {
            anyhow::bail!("spec.timeouts values must be greater than zero");
        }

        if let Some(efs) = &self.spec.plugins.efs {
            if !efs.fs_id.as_str().starts_with("fs-") {
                anyhow::bail!("Invalid fs_id: '{}'. Expected 'fs-...'", efs.fs_id);
            }
            if !efs.mount_point.starts_with('/') {
                anyhow::bail!("mount_point must be an absolute path: '{}'", efs.mount_point);
            }
            if !is_safe_mount_point(&efs.mount_point) {
                anyhow::bail!(
                    "mount_point may only contain letters, digits, '.', '_', '-' and '/': '{}'",
                    efs.mount_point
                );
            }
            if efs.mount_parallelism == 0 {
                anyhow::bail!("mount_parallelism must be at least 1");
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_access()?;

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        match self.credential() {
            Some(c) if !c.as_str().is_empty() => {}
            _ => anyhow::bail!("spec.cluster.credential cannot be empty"),
        }

        let mut aliases = HashSet::new();
        for node in self.all_nodes() {
            if node.alias.is_empty() {
                anyhow::bail!("Node alias cannot be empty (host: {})", node.host);
            }
            if node.host.is_empty() {
                anyhow::bail!("Node host cannot be empty for: {}", node.alias);
            }
            if !aliases.insert(node.alias.clone()) {
                anyhow::bail!("Duplicate node alias: {}", node.alias);
            }
        }

        Ok(())
    }
}
