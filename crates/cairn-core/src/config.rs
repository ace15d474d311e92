//! Configuration system for Cairn.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CAIRN_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/cairn/config.toml
//!   3. ~/.config/cairn/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::DISCOVERY_PORT;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    /// Local services this node hosts. Kept first so it serializes ahead of the tables.
    pub services: Vec<HostedService>,
    pub node: NodeConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Network interface name. Empty = take it from the command line.
    pub interface: String,
    /// UDP port discovery responders listen on.
    pub discovery_port: u16,
    /// Loopback port for the status API.
    pub api_port: u16,
    /// Load average per core above which the node reports itself busy.
    pub busy_load_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Lifetime of a cached remote instance since it was last seen.
    pub ttl_secs: u64,
    /// Max replies collected per discovery round.
    pub wait_for_results: usize,
    /// Discovery round deadline.
    pub timeout_ms: u64,
    /// Period of the deployment re-announcement task.
    pub announce_interval_secs: u64,
}

/// A service declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedService {
    pub name: String,
    pub version: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            discovery_port: DISCOVERY_PORT,
            api_port: 9180,
            busy_load_threshold: 0.8,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            wait_for_results: 10,
            timeout_ms: 2000,
            announce_interval_secs: 60,
        }
    }
}

impl DiscoveryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn announce_interval(&self) -> Duration {
        Duration::from_secs(self.announce_interval_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("cairn")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CairnConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            CairnConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a specific file, without env overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CAIRN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&CairnConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply CAIRN_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("CAIRN_NODE__INTERFACE") {
            self.node.interface = v;
        }
        if let Some(p) = get("CAIRN_NODE__DISCOVERY_PORT").and_then(|v| v.parse().ok()) {
            self.node.discovery_port = p;
        }
        if let Some(p) = get("CAIRN_NODE__API_PORT").and_then(|v| v.parse().ok()) {
            self.node.api_port = p;
        }
        if let Some(t) = get("CAIRN_NODE__BUSY_LOAD_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.node.busy_load_threshold = t;
        }
        if let Some(t) = get("CAIRN_DISCOVERY__TTL_SECS").and_then(|v| v.parse().ok()) {
            self.discovery.ttl_secs = t;
        }
        if let Some(n) = get("CAIRN_DISCOVERY__WAIT_FOR_RESULTS").and_then(|v| v.parse().ok()) {
            self.discovery.wait_for_results = n;
        }
        if let Some(t) = get("CAIRN_DISCOVERY__TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.discovery.timeout_ms = t;
        }
        if let Some(t) = get("CAIRN_DISCOVERY__ANNOUNCE_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.discovery.announce_interval_secs = t;
        }
    }
}
