use crate::cli::Args;
use crate::NodeError;
use consensus::ConsensusConfig;
use consensus_core::config::Params;
use consensus_core::network::NetworkType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub consensus: EngineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub network: NetworkType,
}

/// Local resource knobs of the engine; consensus parameters come from the network preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub utxo_cache_max_bytes: usize,
    pub utxo_diff_eviction_window: u64,
    pub orphan_pool_capacity: usize,
    pub block_body_cache_capacity: usize,
    pub prune_finalized_diffs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let defaults = ConsensusConfig::default();
        Self {
            utxo_cache_max_bytes: defaults.utxo_cache_max_bytes,
            utxo_diff_eviction_window: defaults.utxo_diff_eviction_window,
            orphan_pool_capacity: defaults.orphan_pool_capacity,
            block_body_cache_capacity: defaults.block_body_cache_capacity,
            prune_finalized_diffs: defaults.prune_finalized_diffs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data"), in_memory: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Config {
    /// Load configuration from file if it exists, otherwise use defaults
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, NodeError> {
        Ok(toml::from_str(content)?)
    }

    /// Override config with CLI arguments
    pub fn apply_cli_overrides(&mut self, args: &Args) -> Result<(), NodeError> {
        if let Some(network) = &args.network {
            self.network.network = network.parse().map_err(NodeError::Config)?;
        }
        if let Some(data_dir) = &args.data_dir {
            self.storage.data_dir = data_dir.clone();
        }
        if args.in_memory {
            self.storage.in_memory = true;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        Ok(())
    }

    /// Engine configuration for the selected network
    pub fn consensus_config(&self) -> ConsensusConfig {
        let mut config = ConsensusConfig::new(Params::for_network(self.network.network));
        config.utxo_cache_max_bytes = self.consensus.utxo_cache_max_bytes;
        config.utxo_diff_eviction_window = self.consensus.utxo_diff_eviction_window;
        config.orphan_pool_capacity = self.consensus.orphan_pool_capacity;
        config.block_body_cache_capacity = self.consensus.block_body_cache_capacity;
        config.prune_finalized_diffs = self.consensus.prune_finalized_diffs;
        config
    }

    /// Per-network subdirectory of the data directory
    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join(self.network.network.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [network]
            network = "simnet"

            [consensus]
            orphan_pool_capacity = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.network.network, NetworkType::Simnet);
        assert_eq!(config.consensus.orphan_pool_capacity, 7);
        assert_eq!(config.consensus.utxo_diff_eviction_window, EngineConfig::default().utxo_diff_eviction_window);
        assert_eq!(config.logging.level, "info");

        let consensus = config.consensus_config();
        assert_eq!(consensus.params, Params::simnet());
        assert_eq!(consensus.orphan_pool_capacity, 7);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/jiopad.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.network.network, NetworkType::Mainnet);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();
        let args = Args {
            network: Some("devnet".to_string()),
            data_dir: Some(PathBuf::from("/tmp/jio")),
            log_level: Some("debug".to_string()),
            in_memory: true,
            ..Default::default()
        };
        config.apply_cli_overrides(&args).unwrap();
        assert_eq!(config.network.network, NetworkType::Devnet);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/jio/devnet"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.storage.in_memory);

        let bad = Args { network: Some("moon".to_string()), ..Default::default() };
        assert!(matches!(config.apply_cli_overrides(&bad), Err(NodeError::Config(_))));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(matches!(Config::from_toml("[network]\nnetwork = 5"), Err(NodeError::Toml(_))));
    }
}
