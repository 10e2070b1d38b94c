//! Configuration types for the RGB wallet library
//!
//! Manages the Bitcoin network selection, the indexer (Esplora) endpoint,
//! the data directory wallets live in and the allocation limits applied to
//! newly created wallets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Global wallet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub bitcoin: BitcoinConfig,
    /// Optional custom data directory (wallet directories are created inside it)
    pub data_dir: Option<String>,
    /// Maximum number of RGB allocations a single UTXO may hold
    pub max_allocations_per_utxo: u32,
}

/// Bitcoin network and indexer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinConfig {
    pub network: BitcoinNetwork,
    pub indexer_url: String,
}

/// Bitcoin network
///
/// Serialized as `"Mainnet"`, `"Testnet"`, `"Signet"` or `"Regtest"`, which is
/// the form C callers pass across the FFI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitcoinNetwork {
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl BitcoinNetwork {
    /// BIP44 coin type used in account derivation paths
    pub fn coin_type(&self) -> u32 {
        match self {
            BitcoinNetwork::Mainnet => 0,
            _ => 1,
        }
    }

    /// Default Esplora endpoint for this network
    pub fn default_indexer_url(&self) -> &'static str {
        match self {
            BitcoinNetwork::Mainnet => "https://mempool.space/api",
            BitcoinNetwork::Testnet => "https://mempool.space/testnet/api",
            BitcoinNetwork::Signet => "https://mempool.space/signet/api",
            BitcoinNetwork::Regtest => "http://localhost:3002",
        }
    }
}

impl fmt::Display for BitcoinNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for BitcoinNetwork {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "bitcoin" => Ok(BitcoinNetwork::Mainnet),
            "testnet" | "testnet3" => Ok(BitcoinNetwork::Testnet),
            "signet" => Ok(BitcoinNetwork::Signet),
            "regtest" => Ok(BitcoinNetwork::Regtest),
            _ => Err(ConfigError::InvalidNetwork(s.to_string())),
        }
    }
}

impl From<BitcoinNetwork> for bitcoin::Network {
    fn from(network: BitcoinNetwork) -> Self {
        match network {
            BitcoinNetwork::Mainnet => bitcoin::Network::Bitcoin,
            BitcoinNetwork::Testnet => bitcoin::Network::Testnet,
            BitcoinNetwork::Signet => bitcoin::Network::Signet,
            BitcoinNetwork::Regtest => bitcoin::Network::Regtest,
        }
    }
}

impl GlobalConfig {
    /// Create default configuration for the given network
    pub fn for_network(network: BitcoinNetwork) -> Self {
        Self {
            bitcoin: BitcoinConfig {
                network,
                indexer_url: network.default_indexer_url().to_string(),
            },
            data_dir: None,
            max_allocations_per_utxo: 1,
        }
    }

    /// Create default configuration for regtest
    pub fn default_regtest() -> Self {
        Self::for_network(BitcoinNetwork::Regtest)
    }

    /// Resolve the data directory, falling back to `~/.rgblib/data`
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(default_config_dir()?.join("data")),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::default_regtest()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("Config directory not found")]
    DirectoryNotFound,
}

/// Configuration overrides from CLI arguments or environment variables
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub network: Option<BitcoinNetwork>,
    pub indexer_url: Option<String>,
    pub data_dir: Option<String>,
    pub max_allocations_per_utxo: Option<u32>,
}

impl ConfigOverrides {
    /// Create empty overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Create overrides from environment variables
    ///
    /// Reads `BITCOIN_NETWORK`, `INDEXER_URL` (or `ESPLORA_URL`),
    /// `RGBLIB_DATA_DIR` and `MAX_ALLOCATIONS_PER_UTXO`. Unparseable values
    /// are ignored.
    pub fn from_env() -> Self {
        Self {
            network: std::env::var("BITCOIN_NETWORK")
                .ok()
                .and_then(|s| s.parse().ok()),
            indexer_url: std::env::var("INDEXER_URL")
                .or_else(|_| std::env::var("ESPLORA_URL"))
                .ok(),
            data_dir: std::env::var("RGBLIB_DATA_DIR").ok(),
            max_allocations_per_utxo: std::env::var("MAX_ALLOCATIONS_PER_UTXO")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Merge with another set of overrides (other takes precedence)
    pub fn merge(mut self, other: Self) -> Self {
        if other.network.is_some() {
            self.network = other.network;
        }
        if other.indexer_url.is_some() {
            self.indexer_url = other.indexer_url;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.max_allocations_per_utxo.is_some() {
            self.max_allocations_per_utxo = other.max_allocations_per_utxo;
        }
        self
    }
}

/// Get the default configuration directory path
///
/// Returns: `~/.rgblib/`
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".rgblib"))
        .ok_or(ConfigError::DirectoryNotFound)
}

/// Get the default configuration file path
///
/// Returns: `~/.rgblib/config.json`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join("config.json"))
}

/// Load configuration from file with overrides
///
/// # Priority (highest to lowest):
/// 1. CLI overrides (passed as argument)
/// 2. Environment variables
/// 3. Config file
/// 4. Network defaults
///
/// # Arguments
///
/// * `config_path` - Path to config file (optional, uses default if None)
/// * `cli_overrides` - Overrides from CLI arguments
///
/// # Example
///
/// ```ignore
/// use rgblib::config::{load_config, BitcoinNetwork, ConfigOverrides};
///
/// let mut cli_overrides = ConfigOverrides::new();
/// cli_overrides.network = Some(BitcoinNetwork::Regtest);
///
/// let config = load_config(None, cli_overrides)?;
/// ```
pub fn load_config(
    config_path: Option<&Path>,
    cli_overrides: ConfigOverrides,
) -> Result<GlobalConfig, ConfigError> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str(&contents)?
    } else {
        GlobalConfig::for_network(cli_overrides.network.unwrap_or(BitcoinNetwork::Regtest))
    };

    apply_overrides(&mut config, ConfigOverrides::from_env());
    apply_overrides(&mut config, cli_overrides);

    if config.max_allocations_per_utxo == 0 {
        return Err(ConfigError::Invalid(
            "max_allocations_per_utxo must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

/// Save configuration to file
///
/// Creates parent directories if they don't exist.
///
/// # Arguments
///
/// * `config` - Configuration to save
/// * `config_path` - Path to save config (optional, uses default if None)
pub fn save_config(config: &GlobalConfig, config_path: Option<&Path>) -> Result<(), ConfigError> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;

    Ok(())
}

fn apply_overrides(config: &mut GlobalConfig, overrides: ConfigOverrides) {
    // A network switch resets the indexer URL unless one is given explicitly
    if let Some(network) = overrides.network {
        if config.bitcoin.network != network {
            config.bitcoin.network = network;
            if overrides.indexer_url.is_none() {
                config.bitcoin.indexer_url = network.default_indexer_url().to_string();
            }
        }
    }

    if let Some(url) = overrides.indexer_url {
        config.bitcoin.indexer_url = url;
    }

    if let Some(data_dir) = overrides.data_dir {
        config.data_dir = Some(data_dir);
    }

    if let Some(max) = overrides.max_allocations_per_utxo {
        config.max_allocations_per_utxo = max;
    }
}
