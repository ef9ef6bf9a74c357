//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of messages kept per origin unless configured otherwise
pub const DEFAULT_CAPACITY: usize = 100;

/// Root configuration for note-relay
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Bus topic names
    #[serde(default)]
    pub topics: TopicsConfig,
    /// Message store settings
    #[serde(default)]
    pub store: StoreConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Link to the peer relay
    #[serde(default)]
    pub peer: PeerConfig,
}

/// Topic names used on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Topic that locally published messages are emitted to
    #[serde(default = "default_local_outbound")]
    pub local_outbound: String,
    /// Topic the peer publishes to and this process consumes from
    #[serde(default = "default_remote_inbound")]
    pub remote_inbound: String,
}

fn default_local_outbound() -> String {
    "notes.local".to_string()
}

fn default_remote_inbound() -> String {
    "notes.remote".to_string()
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            local_outbound: default_local_outbound(),
            remote_inbound: default_remote_inbound(),
        }
    }
}

/// Message store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum messages retained per origin
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Link to the peer relay.
///
/// With neither side set the process runs without a peer. Both may be set
/// at once; each accepted or dialed connection carries our outbound topic
/// to the peer and feeds the peer's records into our inbound topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Address to accept peer connections on, e.g. `0.0.0.0:3100`
    #[serde(default)]
    pub listen: Option<String>,
    /// Peer to dial, e.g. `ws://10.0.0.2:3100`
    #[serde(default)]
    pub connect: Option<String>,
    /// Seconds to wait before redialing a lost peer
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,
}

fn default_retry_secs() -> u64 {
    5
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            listen: None,
            connect: None,
            retry_secs: default_retry_secs(),
        }
    }
}

impl PeerConfig {
    /// Whether any peer link is configured
    pub fn is_enabled(&self) -> bool {
        self.listen.is_some() || self.connect.is_some()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}
