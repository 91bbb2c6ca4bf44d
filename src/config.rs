//! Configuration management for PowLedger

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Fixed node identifier; a random one is generated when absent.
    #[serde(default)]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsensusConfig {
    /// Seconds between background conflict resolutions; 0 disables the loop.
    #[serde(default)]
    pub resolve_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            identifier: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bootstrap_peers: Vec::new(),
            peer_timeout_secs: default_peer_timeout(),
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> Result<SocketAddr, ChainError> {
        self.node.bind_address.parse().map_err(|e| {
            ChainError::ConfigError(format!(
                "Invalid node.bind_address {:?}: {}",
                self.node.bind_address, e
            ))
        })
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.network.peer_timeout_secs)
    }

    pub fn resolve_interval(&self) -> Option<Duration> {
        match self.consensus.resolve_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Validate critical values
    pub fn validate(&self) -> Result<(), ChainError> {
        self.bind_addr()?;

        if self.network.peer_timeout_secs == 0 {
            return Err(ChainError::ConfigError(
                "network.peer_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(id) = &self.node.identifier {
            if id.trim().is_empty() {
                return Err(ChainError::ConfigError(
                    "node.identifier must not be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Load configuration from `path`, falling back to defaults when the file is absent.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let config: Config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str)?
    } else {
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

fn default_bind_address() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_peer_timeout() -> u64 {
    5
}
