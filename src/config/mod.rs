//! Application configuration for opsdiag

use crate::error::{OpsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration stored in ~/.opsdiag/config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Per-attempt timeout of a cluster call, in seconds
    #[serde(default = "default_soft_timeout")]
    pub soft_timeout_secs: u64,

    /// Deadline over all attempts of a cluster call, in seconds
    #[serde(default = "default_hard_timeout")]
    pub hard_timeout_secs: u64,

    /// Per-container log byte cap
    #[serde(default = "default_log_byte_cap")]
    pub log_byte_cap: i64,

    /// Per-container log wall-clock cap, in seconds
    #[serde(default = "default_hard_timeout")]
    pub log_timeout_secs: u64,

    /// Upper bound of the bundle worker pool
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Minimum Kubernetes server version as `major.minor`
    #[serde(default = "default_min_k8s_version")]
    pub min_k8s_version: String,

    #[serde(default)]
    pub node: NodeRequirements,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            soft_timeout_secs: default_soft_timeout(),
            hard_timeout_secs: default_hard_timeout(),
            log_byte_cap: default_log_byte_cap(),
            log_timeout_secs: default_hard_timeout(),
            max_workers: default_max_workers(),
            min_k8s_version: default_min_k8s_version(),
            node: NodeRequirements::default(),
        }
    }
}

impl AppConfig {
    pub fn soft_timeout(&self) -> Duration {
        Duration::from_secs(self.soft_timeout_secs)
    }

    pub fn hard_timeout(&self) -> Duration {
        Duration::from_secs(self.hard_timeout_secs)
    }

    pub fn log_timeout(&self) -> Duration {
        Duration::from_secs(self.log_timeout_secs)
    }
}

/// Node capacity requirements used by the pre-deployment checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequirements {
    #[serde(default = "default_architectures")]
    pub architectures: Vec<String>,

    #[serde(default = "default_min_vcpu")]
    pub min_vcpu: u32,

    /// Kubernetes quantity, e.g. `16G`
    #[serde(default = "default_min_memory")]
    pub min_memory: String,

    /// Kubernetes quantity, e.g. `30G`
    #[serde(default = "default_min_storage")]
    pub min_storage: String,
}

impl Default for NodeRequirements {
    fn default() -> Self {
        Self {
            architectures: default_architectures(),
            min_vcpu: default_min_vcpu(),
            min_memory: default_min_memory(),
            min_storage: default_min_storage(),
        }
    }
}

fn default_soft_timeout() -> u64 {
    15
}

fn default_hard_timeout() -> u64 {
    60
}

fn default_log_byte_cap() -> i64 {
    8 * 1024 * 1024
}

fn default_max_workers() -> usize {
    16
}

fn default_min_k8s_version() -> String {
    "1.20".to_string()
}

fn default_architectures() -> Vec<String> {
    vec!["amd64".to_string(), "arm64".to_string()]
}

fn default_min_vcpu() -> u32 {
    4
}

fn default_min_memory() -> String {
    "16G".to_string()
}

fn default_min_storage() -> String {
    "30G".to_string()
}

/// Get the opsdiag config directory (~/.opsdiag)
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".opsdiag"))
        .ok_or_else(|| OpsError::Config("Could not determine home directory".to_string()))
}

/// Load application config from ~/.opsdiag/config.toml
pub fn load_config() -> Result<AppConfig> {
    let path = config_dir()?.join("config.toml");
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        parse_config(&content)
    } else {
        Ok(AppConfig::default())
    }
}

/// Parse a config document; missing keys take their defaults
pub fn parse_config(content: &str) -> Result<AppConfig> {
    toml::from_str(content).map_err(|e| OpsError::Config(e.to_string()))
}
