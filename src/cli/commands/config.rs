//! Config command implementations

use crate::config::{BitcoinNetwork, ConfigError, GlobalConfig};

/// Initialize configuration file with network-specific defaults
///
/// Defaults to regtest.
pub fn init(network: Option<BitcoinNetwork>) -> Result<(), ConfigError> {
    let network = network.unwrap_or(BitcoinNetwork::Regtest);

    let config = GlobalConfig::for_network(network);
    crate::config::save_config(&config, None)?;

    let config_path = crate::config::default_config_path()?;
    println!("✓ Configuration initialized for {}", network);
    println!("  Config file: {}", config_path.display());
    println!("  Indexer:     {}", config.bitcoin.indexer_url);

    Ok(())
}
