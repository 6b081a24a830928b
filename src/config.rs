//! Bridge configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! is a valid configuration.
//!
//! ```toml
//! worker_threads = 4
//! log_level = "info"
//! debug = false
//! arity_policy = "decline"
//!
//! [node]
//! peer_name = "alice"
//! ping_latency_ms = 5
//! boot_addrs = ["/ip4/127.0.0.1/tcp/10666/p2p/16Uiu2HAm"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::ArityPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Worker threads of the native runtime. `0` uses one per core.
    pub worker_threads: usize,
    /// Base log filter, in `EnvFilter` syntax.
    pub log_level: String,
    /// Start with debug logging enabled.
    pub debug: bool,
    pub arity_policy: ArityPolicy,
    pub node: NodeConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            log_level: "info".to_string(),
            debug: false,
            arity_policy: ArityPolicy::default(),
            node: NodeConfig::default(),
        }
    }
}

/// Settings of the in-memory node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Seed of the node's identity; the same name yields the same ids.
    pub peer_name: String,
    /// Simulated round trip of one ping probe.
    pub ping_latency_ms: u64,
    /// Peers known before `StartQuorum` adds its own.
    pub boot_addrs: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            peer_name: "quorum-bridge".to_string(),
            ping_latency_ms: 5,
            boot_addrs: Vec::new(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => {
                let config = Self::from_toml_file(path)?;
                tracing::debug!(path = %path.display(), "loaded config");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log_level must not be empty".into()));
        }
        if self.node.peer_name.is_empty() {
            return Err(ConfigError::Invalid("node.peer_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(BridgeConfig::from_toml_str("").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "worker_threads = 2\narity_policy = \"reject\"\n\n[node]\npeer_name = \"alice\"\nping_latency_ms = 0"
        )
        .unwrap();

        let config = BridgeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.arity_policy, ArityPolicy::Reject);
        assert_eq!(config.node.peer_name, "alice");
        assert_eq!(config.node.ping_latency_ms, 0);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_unknown_policy_is_a_parse_error() {
        let err = BridgeConfig::from_toml_str("arity_policy = \"ignore\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = BridgeConfig::from_toml_file("/nonexistent/bridge.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/bridge.toml"));
    }

    #[test]
    fn test_empty_peer_name_is_invalid() {
        let err = BridgeConfig::from_toml_str("[node]\npeer_name = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
