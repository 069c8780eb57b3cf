//! Configuration management for ProofChain

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bootstrap_peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    /// Upper bound on a single peer's `/chain` request.
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout_secs: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            peer_timeout_secs: default_peer_timeout(),
        }
    }
}

impl ConsensusConfig {
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinerConfig {
    /// Abandon a proof search after this long. Unset means search until found.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Recipient of mining rewards. Random when unset.
    #[serde(default)]
    pub node_identifier: Option<String>,
}

impl MinerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.port == 0 {
            return Err(ChainError::Config("network.port must be non-zero".to_string()));
        }
        if self.consensus.peer_timeout_secs == 0 {
            return Err(ChainError::Config(
                "consensus.peer_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.miner.timeout_secs == Some(0) {
            return Err(ChainError::Config("miner.timeout_secs must be non-zero".to_string()));
        }
        if self.miner.node_identifier.as_deref().is_some_and(str::is_empty) {
            return Err(ChainError::Config("miner.node_identifier must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Load the config at `path`, falling back to defaults when the file is absent.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let source = fs::read_to_string(path)?;
    Config::from_toml(&source)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_peer_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.network.port, 5000);
        assert_eq!(config.consensus.peer_timeout(), Duration::from_secs(5));
        assert!(config.miner.timeout().is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[network]\nport = 5001\nbootstrap_peers = [\"http://127.0.0.1:5002\"]\n\n[miner]\ntimeout_secs = 30"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.network.port, 5001);
        assert_eq!(config.network.host, "0.0.0.0");
        assert_eq!(config.network.bootstrap_peers, vec!["http://127.0.0.1:5002"]);
        assert_eq!(config.miner.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.consensus.peer_timeout_secs, 5);
    }

    #[test]
    fn test_rejects_zero_values() {
        assert!(Config::from_toml("[network]\nport = 0").is_err());
        assert!(Config::from_toml("[consensus]\npeer_timeout_secs = 0").is_err());
        assert!(Config::from_toml("[miner]\nnode_identifier = \"\"").is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(Config::from_toml("[network"), Err(ChainError::Config(_))));
    }
}
