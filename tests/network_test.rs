//! Integration tests for indexer access
//!
//! Tests protocol selection from the indexer URL, fee rate interpolation and
//! the Esplora client against the local stand-in from `common`. The Electrum
//! test needs a running regtest Electrum server and is ignored by default.

mod common;

use std::collections::HashMap;
use std::str::FromStr;

use bitcoin::Txid;
use common::{electrum_url, fake_esplora, FAKE_TIP_HEIGHT};
use rgblib::bitcoin::{interpolate_fee_estimation, Indexer, IndexerKind, NetworkError};
use rgblib::BitcoinNetwork;

fn estimates() -> HashMap<u16, f64> {
    HashMap::from([(1, 20.0), (6, 4.0), (144, 1.0)])
}

#[test]
fn test_indexer_kind_follows_url_scheme() {
    for url in ["tcp://localhost:50001", "ssl://electrum.example:50002", "TCP://host:1"] {
        assert_eq!(
            IndexerKind::from_url(url).expect("Electrum URL"),
            IndexerKind::Electrum,
            "{url}"
        );
    }
    for url in ["http://localhost:3002", "https://esplora.example/api"] {
        assert_eq!(
            IndexerKind::from_url(url).expect("Esplora URL"),
            IndexerKind::Esplora,
            "{url}"
        );
    }
    for url in ["localhost:50001", "ftp://host", ""] {
        assert!(
            matches!(IndexerKind::from_url(url), Err(NetworkError::InvalidUrl(_))),
            "{url} should be rejected"
        );
    }
}

#[test]
fn test_exact_fee_target_is_returned() {
    assert_eq!(interpolate_fee_estimation(&estimates(), 6), Some(4.0));
}

#[test]
fn test_fee_target_between_estimates_is_interpolated() {
    // 3 blocks sits 2/5 of the way from 1 (20.0) to 6 (4.0)
    let rate = interpolate_fee_estimation(&estimates(), 3).expect("Rate expected");
    assert!((rate - 13.6).abs() < 1e-9, "Unexpected rate {rate}");
}

#[test]
fn test_fee_target_outside_estimates_uses_closest() {
    let only_high = HashMap::from([(10, 2.0)]);
    assert_eq!(interpolate_fee_estimation(&only_high, 2), Some(2.0));
    assert_eq!(interpolate_fee_estimation(&estimates(), 500), Some(1.0));
    assert_eq!(interpolate_fee_estimation(&HashMap::new(), 6), None);
}

#[test]
fn test_esplora_indexer_queries() {
    let indexer = Indexer::new(&fake_esplora(), BitcoinNetwork::Regtest)
        .expect("Failed to create Esplora indexer");
    assert_eq!(indexer.kind(), IndexerKind::Esplora);
    assert_eq!(indexer.network(), BitcoinNetwork::Regtest);
    assert_eq!(indexer.get_height().expect("Failed to get height"), FAKE_TIP_HEIGHT);
    assert_eq!(indexer.fee_estimation(6).expect("Failed to estimate fee"), 4.0);

    let txid = Txid::from_str(&"a".repeat(64)).expect("valid txid");
    assert_eq!(
        indexer
            .tx_confirmations(&txid)
            .expect("Failed to get confirmations"),
        Some(1),
        "A transaction in the tip block has one confirmation"
    );
}

#[test]
fn test_unreachable_electrum_fails_on_creation() {
    let result = Indexer::new("tcp://127.0.0.1:9", BitcoinNetwork::Regtest);
    assert!(result.is_err());
}

#[test]
#[ignore] // Requires a regtest Electrum server
fn test_electrum_indexer_queries() {
    let indexer = Indexer::new(&electrum_url(), BitcoinNetwork::Regtest)
        .expect("Failed to connect to Electrum");
    assert_eq!(indexer.kind(), IndexerKind::Electrum);
    assert!(indexer.is_available().expect("Availability check failed"));
    assert!(indexer.get_height().expect("Failed to get height") > 0);
    indexer.get_tip_hash().expect("Failed to get tip hash");
}
