//! Integration tests for configuration loading and persistence
//!
//! Tests default configuration per network, saving and reloading config
//! files, CLI override precedence and validation of loaded values.

use rgblib::config::{load_config, save_config, ConfigOverrides, GlobalConfig};
use rgblib::BitcoinNetwork;
use tempfile::TempDir;

#[test]
fn test_default_config_per_network() {
    let regtest = GlobalConfig::default_regtest();
    assert_eq!(regtest.bitcoin.network, BitcoinNetwork::Regtest);
    assert_eq!(regtest.bitcoin.indexer_url, "http://localhost:3002");
    assert_eq!(regtest.max_allocations_per_utxo, 1);
    assert!(regtest.data_dir.is_none());

    let signet = GlobalConfig::for_network(BitcoinNetwork::Signet);
    assert_eq!(signet.bitcoin.indexer_url, "https://mempool.space/signet/api");
}

#[test]
fn test_saved_config_is_reloaded() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.json");

    let mut config = GlobalConfig::for_network(BitcoinNetwork::Testnet);
    config.data_dir = Some("/var/lib/rgblib".to_string());
    config.max_allocations_per_utxo = 3;
    save_config(&config, Some(&config_path)).expect("Failed to save config");
    assert!(config_path.exists(), "Parent directories should be created");

    // explicit overrides so environment variables cannot leak in
    let overrides = ConfigOverrides {
        network: Some(BitcoinNetwork::Testnet),
        indexer_url: Some(config.bitcoin.indexer_url.clone()),
        data_dir: Some("/var/lib/rgblib".to_string()),
        max_allocations_per_utxo: Some(3),
    };
    let loaded = load_config(Some(&config_path), overrides).expect("Failed to load config");
    assert_eq!(loaded.bitcoin.network, BitcoinNetwork::Testnet);
    assert_eq!(loaded.data_dir.as_deref(), Some("/var/lib/rgblib"));
    assert_eq!(loaded.max_allocations_per_utxo, 3);
}

#[test]
fn test_cli_overrides_take_precedence() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.json");
    save_config(&GlobalConfig::default_regtest(), Some(&config_path))
        .expect("Failed to save config");

    let overrides = ConfigOverrides {
        network: Some(BitcoinNetwork::Regtest),
        indexer_url: Some("http://127.0.0.1:9999".to_string()),
        data_dir: Some(temp_dir.path().to_string_lossy().to_string()),
        max_allocations_per_utxo: Some(2),
    };
    let config = load_config(Some(&config_path), overrides).expect("Failed to load config");

    assert_eq!(config.bitcoin.indexer_url, "http://127.0.0.1:9999");
    assert_eq!(config.max_allocations_per_utxo, 2);
    assert_eq!(
        config.data_dir().expect("data dir should resolve"),
        temp_dir.path()
    );
}

#[test]
fn test_overrides_merge_prefers_later_values() {
    let base = ConfigOverrides {
        network: Some(BitcoinNetwork::Signet),
        indexer_url: Some("http://a".to_string()),
        ..ConfigOverrides::new()
    };
    let cli = ConfigOverrides {
        indexer_url: Some("http://b".to_string()),
        ..ConfigOverrides::new()
    };
    let merged = base.merge(cli);
    assert_eq!(merged.network, Some(BitcoinNetwork::Signet));
    assert_eq!(merged.indexer_url.as_deref(), Some("http://b"));
    assert!(merged.data_dir.is_none());
}

#[test]
fn test_zero_allocations_per_utxo_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let overrides = ConfigOverrides {
        max_allocations_per_utxo: Some(0),
        ..ConfigOverrides::new()
    };
    let result = load_config(Some(&temp_dir.path().join("missing.json")), overrides);
    assert!(result.is_err(), "Zero allocations per UTXO should be invalid");
}

#[test]
fn test_network_parsing_accepts_aliases_in_any_case() {
    assert_eq!(
        "Regtest".parse::<BitcoinNetwork>().expect("valid network"),
        BitcoinNetwork::Regtest
    );
    assert_eq!(
        "BITCOIN".parse::<BitcoinNetwork>().expect("valid network"),
        BitcoinNetwork::Mainnet
    );
    assert_eq!(
        "testnet3".parse::<BitcoinNetwork>().expect("valid network"),
        BitcoinNetwork::Testnet
    );
    assert!("liquid".parse::<BitcoinNetwork>().is_err());
}

#[test]
fn test_network_serializes_in_pascal_case() {
    let json = serde_json::to_string(&BitcoinNetwork::Regtest).expect("Failed to serialize");
    assert_eq!(json, "\"Regtest\"");
}

#[test]
fn test_network_override_resets_indexer_url() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.json");
    save_config(&GlobalConfig::default_regtest(), Some(&config_path))
        .expect("Failed to save config");

    let overrides = ConfigOverrides {
        network: Some(BitcoinNetwork::Signet),
        ..ConfigOverrides::new()
    };
    let config = load_config(Some(&config_path), overrides).expect("Failed to load config");
    assert_eq!(config.bitcoin.network, BitcoinNetwork::Signet);
    assert_eq!(config.bitcoin.indexer_url, "https://mempool.space/signet/api");
}
