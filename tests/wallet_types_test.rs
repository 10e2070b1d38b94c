//! Tests for the wallet's public data types
//!
//! Covers the JSON shape C callers send and the outpoint conversions used
//! when talking to BDK.

use std::str::FromStr;

use bdk_wallet::bitcoin::{OutPoint as BdkOutPoint, Txid};
use rgblib::wallet::{DatabaseType, Outpoint};
use rgblib::{BitcoinNetwork, WalletData};

#[test]
fn test_wallet_data_accepts_string_allocations() {
    let json = r#"{
        "data_dir": "/tmp/rgblib",
        "bitcoin_network": "Regtest",
        "database_type": "Sqlite",
        "max_allocations_per_utxo": "5",
        "pubkey": "tpub",
        "mnemonic": null
    }"#;
    let data: WalletData = serde_json::from_str(json).expect("Failed to parse wallet data");
    assert_eq!(data.max_allocations_per_utxo, 5);
    assert_eq!(data.bitcoin_network, BitcoinNetwork::Regtest);
    assert_eq!(data.database_type, DatabaseType::Sqlite);
    assert!(data.vanilla_keychain.is_none());

    let numeric = json.replace(r#""5""#, "7");
    let data: WalletData = serde_json::from_str(&numeric).expect("Failed to parse wallet data");
    assert_eq!(data.max_allocations_per_utxo, 7);

    let bad = json.replace(r#""5""#, r#""five""#);
    assert!(serde_json::from_str::<WalletData>(&bad).is_err());
}

#[test]
fn test_outpoint_display_and_conversion() {
    let outpoint = Outpoint {
        txid: "e".repeat(64),
        vout: 3,
    };
    assert_eq!(outpoint.to_string(), format!("{}:3", "e".repeat(64)));

    let bdk = BdkOutPoint::try_from(&outpoint).expect("Failed to convert outpoint");
    assert_eq!(bdk.txid, Txid::from_str(&"e".repeat(64)).expect("valid txid"));
    assert_eq!(Outpoint::from(bdk), outpoint);

    let invalid = Outpoint {
        txid: "zz".to_string(),
        vout: 0,
    };
    assert!(BdkOutPoint::try_from(&invalid).is_err());
}
