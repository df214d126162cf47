//! Configuration management.
//!
//! One TOML file configures both pipelines. Sections:
//!
//! - [`NodeConfig`] - this node's identity: mesh name, coordinates,
//!   supernode role
//! - [`WalkerConfig`] - crawl tuning: per-attempt timeout, retry budget,
//!   jitter, artifact path
//! - [`LqmConfig`] - monitor tuning: Babel socket path, state document path
//! - [`LoggingConfig`] - log level and optional log file
//!
//! All values are validated on load; a config that passes [`Config::load`]
//! will not surprise the services later.
//!
//! ```toml
//! [node]
//! name = "KD2ABC-hub"
//! latitude = 33.178
//! longitude = -96.712
//!
//! [walker]
//! enabled = true
//! output_path = "/meshmap/data/out.json"
//!
//! [lqm]
//! enabled = true
//! ```

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// This node's identity on the mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Mesh hostname, without the `.local.mesh` suffix. Used as the crawl
    /// root and to recognize this node in neighbors' tracker tables.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Whether this node aggregates tunnels for others. Stretches Babel
    /// update intervals.
    #[serde(default)]
    pub supernode: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            latitude: None,
            longitude: None,
            supernode: false,
        }
    }
}

/// Crawl tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Per-attempt fetch timeout, seconds.
    #[serde(default = "default_walker_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_walker_retries")]
    pub retries: u32,
    /// Upper bound of the uniform pre-attempt jitter sleep, seconds.
    #[serde(default = "default_walker_jitter")]
    pub jitter_secs: u64,
    #[serde(default = "default_walker_output")]
    pub output_path: String,
}

fn default_walker_timeout() -> u64 {
    120
}

fn default_walker_retries() -> u32 {
    5
}

fn default_walker_jitter() -> u64 {
    5
}

fn default_walker_output() -> String {
    "/meshmap/data/out.json".to_string()
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: default_walker_timeout(),
            retries: default_walker_retries(),
            jitter_secs: default_walker_jitter(),
            output_path: default_walker_output(),
        }
    }
}

impl WalkerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }
}

/// Monitor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LqmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_babel_socket")]
    pub babel_socket: String,
    /// Where the state document is published each tick.
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

fn default_babel_socket() -> String {
    crate::babel::DEFAULT_SOCKET_PATH.to_string()
}

fn default_state_path() -> String {
    "/tmp/lqm.info".to_string()
}

impl Default for LqmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            babel_socket: default_babel_socket(),
            state_path: default_state_path(),
        }
    }
}

/// Log level and sinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`. Empty means `info`.
    #[serde(default)]
    pub level: String,
    /// Optional log file; console logging stays on when attached to a TTY.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub walker: WalkerConfig,
    #[serde(default)]
    pub lqm: LqmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub async fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("cannot read config file {path}: {e}"))?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| anyhow!("cannot parse config file {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Write a default configuration file for the operator to edit.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config {
            node: NodeConfig {
                name: "CHANGEME-node".to_string(),
                ..NodeConfig::default()
            },
            ..Config::default()
        };
        let serialized = toml::to_string_pretty(&config)?;
        fs::write(path, serialized).await?;
        Ok(())
    }

    /// Reject configurations the services would choke on later.
    pub fn validate(&self) -> Result<()> {
        if (self.walker.enabled || self.lqm.enabled) && self.node.name.trim().is_empty() {
            return Err(anyhow!("node.name must be set"));
        }
        if let Some(lat) = self.node.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(anyhow!("node.latitude out of range: {lat}"));
            }
        }
        if let Some(lon) = self.node.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(anyhow!("node.longitude out of range: {lon}"));
            }
        }
        if self.walker.enabled {
            if self.walker.retries == 0 {
                return Err(anyhow!("walker.retries must be at least 1"));
            }
            if self.walker.output_path.trim().is_empty() {
                return Err(anyhow!("walker.output_path must be set"));
            }
        }
        if self.lqm.enabled && self.lqm.babel_socket.trim().is_empty() {
            return Err(anyhow!("lqm.babel_socket must be set"));
        }
        Ok(())
    }
}
