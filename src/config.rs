//! Configuration for a queue provider node
//!
//! Configuration is supplied once at construction and never changes after
//! start. It can be built in code with [`ProviderConfig::new`] or loaded from a
//! TOML file. Every field has a default, so a file only needs the keys it wants
//! to change.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::MAX_FRAME_SIZE;
use crate::transport::PeerAddress;

/// Main provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Node addressing and role
    pub node: NodeSettings,

    /// Socket timeouts and limits
    pub transport: TransportSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Node addressing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Port the outbound channel binds on all interfaces (0 = OS-assigned)
    pub local_port: u16,

    /// Remote peers to pull work from, as `host:port`
    pub peers: Vec<String>,

    /// When false the node only sends and never opens inbound channels
    pub can_take_work: bool,
}

/// Transport timing and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// How long an enqueue waits for a connected peer to accept the message
    pub send_timeout_ms: u64,

    /// Listener poll timeout; bounds shutdown latency
    pub receive_timeout_ms: u64,

    /// Timeout for each connection attempt to a peer
    pub connect_timeout_ms: u64,

    /// Delay between reconnection attempts to an unreachable peer
    pub reconnect_interval_ms: u64,

    /// Largest frame accepted from a peer
    pub max_frame_bytes: u32,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            local_port: 5555,
            peers: vec![],
            can_take_work: true,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            send_timeout_ms: 3000,
            receive_timeout_ms: 3000,
            connect_timeout_ms: 1000,
            reconnect_interval_ms: 500,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl TransportSettings {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl ProviderConfig {
    /// Build a configuration in code with default transport settings
    pub fn new<I, S>(local_port: u16, peers: I, can_take_work: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            node: NodeSettings {
                local_port,
                peers: peers.into_iter().map(Into::into).collect(),
                can_take_work,
            },
            ..Default::default()
        }
    }

    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_path(&path.as_ref().to_string_lossy());
        let path = PathBuf::from(path);

        if !path.exists() {
            return Err(Error::config_not_found(path));
        }

        debug!(path = %path.display(), "Loading configuration file");
        let content = fs::read_to_string(&path).map_err(|e| Error::ConfigNotFound {
            path: path.clone(),
            source: Some(e),
        })?;

        let mut config = Self::from_toml_str(&content)?;
        config.expand_paths();
        info!(path = %path.display(), "Configuration loaded from file");

        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.message().to_string(),
            source: Some(e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(format!("Failed to serialize: {}", e)))
    }

    /// Expand ~ and environment variables in paths
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for peer in &self.node.peers {
            PeerAddress::remote(peer.as_str())
                .map_err(|e| Error::config_field_invalid("node.peers", e.to_string()))?;
        }

        let transport = &self.transport;
        let timeouts = [
            ("transport.send_timeout_ms", transport.send_timeout_ms),
            ("transport.receive_timeout_ms", transport.receive_timeout_ms),
            ("transport.connect_timeout_ms", transport.connect_timeout_ms),
            ("transport.reconnect_interval_ms", transport.reconnect_interval_ms),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(Error::config_field_invalid(field, "must be greater than 0"));
            }
        }

        if transport.max_frame_bytes == 0 || transport.max_frame_bytes > MAX_FRAME_SIZE {
            return Err(Error::config_field_invalid(
                "transport.max_frame_bytes",
                format!("must be between 1 and {}", MAX_FRAME_SIZE),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Commented configuration template with every default spelled out
    pub fn default_toml() -> &'static str {
        r#"# peerqueue node configuration

[node]
# Port this node's outbound channel binds on all interfaces (0 = OS-assigned)
local_port = 5555

# Peers to pull work from, as host:port
peers = []

# When false, the node only sends work and never receives any
can_take_work = true

[transport]
# How long an enqueue waits for a connected peer to accept the message
send_timeout_ms = 3000

# Listener poll timeout; an upper bound on shutdown latency
receive_timeout_ms = 3000

# Timeout for each connection attempt to a peer
connect_timeout_ms = 1000

# Delay between reconnection attempts to an unreachable peer
reconnect_interval_ms = 500

# Largest frame accepted from a peer, in bytes
max_frame_bytes = 16777216

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.peerqueue/logs/node.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}
