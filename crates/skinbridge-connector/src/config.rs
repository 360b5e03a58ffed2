//! Connector configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty or missing file
//! yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use skinbridge_bridge::BridgeConfig;
use skinbridge_overlay::OverlayConfig;
use skinbridge_protocol::{LogLevel, CONNECT_TIMEOUT_MS, DEFAULT_BRIDGE_URL, RECONNECT_DELAY_MS};

use crate::error::{ConnectorError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    pub bridge: BridgeSection,
    pub overlay: OverlayConfig,
    pub logging: LoggingSection,
    pub host: HostSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub url: String,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_BRIDGE_URL.to_string(),
            reconnect_delay_ms: RECONNECT_DELAY_MS,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
        }
    }
}

impl BridgeSection {
    pub fn to_bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            url: self.url.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    /// Forward log events to the controller.
    pub forward: bool,
    /// Lowest level forwarded to the controller.
    pub forward_level: LogLevel,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            forward: true,
            forward_level: LogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSection {
    /// JSON snapshot of the host tree. Without one the tree stays empty.
    pub snapshot: Option<PathBuf>,
    pub poll_interval_ms: u64,
    /// Read `click` / `reload` / `quit` commands from stdin.
    pub stdin_commands: bool,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            snapshot: None,
            poll_interval_ms: 500,
            stdin_commands: true,
        }
    }
}

impl ConnectorConfig {
    /// `<config_dir>/skinbridge/config.toml`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("skinbridge").join("config.toml"))
    }

    /// Load from `explicit` if given, else from the default path if that
    /// file exists, else fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConnectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConnectorError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}
