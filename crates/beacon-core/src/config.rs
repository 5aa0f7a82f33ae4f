//! Configuration system for Beacon.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BEACON_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/beacon/config.toml
//!   3. ~/.config/beacon/config.toml

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::Framing;

/// Service type for generic node presence. Browsed for peers.
pub const NODE_SERVICE_TYPE: &str = "_darknet._udp.local.";

/// Service type for the app server. Advertised with the signal.
pub const APP_SERVER_SERVICE_TYPE: &str = "_darknetapp._tcp.local.";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    pub identity: IdentityConfig,
    pub network: NetworkConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Human-readable node name. Empty = host name.
    pub node_name: String,
    /// Text placed before `server -=<name>=-` in the advertised instance name.
    pub instance_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the inbound TLS app server binds to.
    /// A loopback address keeps the service off the network entirely.
    pub app_server_bind: IpAddr,
    /// TCP port for the app server. 0 = OS-assigned.
    pub app_server_port: u16,
    /// Port of the local JSON status API (always bound to 127.0.0.1).
    pub api_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub node_service_type: String,
    pub app_server_service_type: String,
    /// Signal framing. Legacy is what deployed apps understand.
    pub framing: Framing,
    /// Backoff between host readiness checks.
    pub readiness_poll_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            instance_prefix: "Beacon 0.1 DarknetAppServer ".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            app_server_bind: IpAddr::from([0, 0, 0, 0]),
            app_server_port: 7859,
            api_port: 9101,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            node_service_type: NODE_SERVICE_TYPE.to_string(),
            app_server_service_type: APP_SERVER_SERVICE_TYPE.to_string(),
            framing: Framing::Legacy,
            readiness_poll_ms: 1000,
        }
    }
}

impl DiscoveryConfig {
    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }
}

impl IdentityConfig {
    /// The configured node name, falling back to $HOSTNAME, then "beacon".
    pub fn resolved_node_name(&self) -> String {
        if !self.node_name.is_empty() {
            return self.node_name.clone();
        }
        std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "beacon".to_string())
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("beacon")
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

impl BeaconConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            BeaconConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BEACON_CONFIG")
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
            let text = toml::to_string_pretty(&BeaconConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply BEACON_* overrides. `lookup` maps a variable name to its value.
    ///
    /// Unparseable values are ignored and the previous setting kept.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BEACON_IDENTITY__NODE_NAME") {
            self.identity.node_name = v;
        }
        if let Some(v) = lookup("BEACON_NETWORK__APP_SERVER_BIND") {
            if let Ok(addr) = v.parse() {
                self.network.app_server_bind = addr;
            }
        }
        if let Some(v) = lookup("BEACON_NETWORK__APP_SERVER_PORT") {
            if let Ok(p) = v.parse() {
                self.network.app_server_port = p;
            }
        }
        if let Some(v) = lookup("BEACON_NETWORK__API_PORT") {
            if let Ok(p) = v.parse() {
                self.network.api_port = p;
            }
        }
        if let Some(v) = lookup("BEACON_DISCOVERY__FRAMING") {
            if let Ok(f) = v.parse() {
                self.discovery.framing = f;
            }
        }
    }
}
