//! Integration tests for key management
//!
//! Tests mnemonic generation, BIP86 account derivation for every network,
//! restoring keys from a phrase and the error mapping of invalid input.

use rgblib::keys::{
    derive_account_xpub, descriptor_from_xpub, generate_mnemonic, parse_mnemonic, parse_xpub,
    KEYCHAIN_BTC, KEYCHAIN_RGB,
};
use rgblib::{generate_keys, restore_keys, BitcoinNetwork, Error};

/// BIP86 test mnemonic
const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

#[test]
fn test_generated_keys_are_12_words_and_unique() {
    let keys1 = generate_keys(BitcoinNetwork::Regtest).expect("Failed to generate keys");
    let keys2 = generate_keys(BitcoinNetwork::Regtest).expect("Failed to generate second keys");

    assert_eq!(
        keys1.mnemonic.split_whitespace().count(),
        12,
        "Mnemonic should have exactly 12 words"
    );
    assert_ne!(keys1.mnemonic, keys2.mnemonic, "Mnemonics should be unique");
    assert_ne!(keys1.account_xpub, keys2.account_xpub);
}

#[test]
fn test_bip86_account_xpub_matches_reference_vector() {
    let keys = restore_keys(BitcoinNetwork::Mainnet, TEST_MNEMONIC).expect("Failed to restore keys");

    assert_eq!(
        keys.account_xpub,
        "xpub6BgBgsespWvERF3LHQu6CnqdvfEvtMcQjYrcRzx53QJjSxarj2afYWcLteoGVky7D3UKDP9QyrLprQ3VCECoY49yfdDEHGCtMMj92pReUsQ",
        "Account xpub should follow m/86'/0'/0'"
    );
    assert!(keys.xpub.starts_with("xpub"));
    assert_eq!(keys.account_xpub_fingerprint.len(), 8);
}

#[test]
fn test_test_networks_share_coin_type_but_not_mainnet() {
    let regtest = restore_keys(BitcoinNetwork::Regtest, TEST_MNEMONIC).expect("regtest keys");
    let testnet = restore_keys(BitcoinNetwork::Testnet, TEST_MNEMONIC).expect("testnet keys");
    let signet = restore_keys(BitcoinNetwork::Signet, TEST_MNEMONIC).expect("signet keys");
    let mainnet = restore_keys(BitcoinNetwork::Mainnet, TEST_MNEMONIC).expect("mainnet keys");

    assert!(regtest.account_xpub.starts_with("tpub"));
    assert_eq!(regtest.account_xpub, testnet.account_xpub);
    assert_eq!(regtest.account_xpub, signet.account_xpub);
    assert_ne!(
        regtest.account_xpub_fingerprint, mainnet.account_xpub_fingerprint,
        "Coin type 1 and coin type 0 accounts should differ"
    );
}

#[test]
fn test_restore_returns_the_generated_keys() {
    let keys = generate_keys(BitcoinNetwork::Testnet).expect("Failed to generate keys");
    let restored =
        restore_keys(BitcoinNetwork::Testnet, &keys.mnemonic).expect("Failed to restore keys");
    assert_eq!(keys, restored);

    let padded = format!("  {}\n", keys.mnemonic);
    let restored = restore_keys(BitcoinNetwork::Testnet, &padded)
        .expect("Surrounding whitespace should be accepted");
    assert_eq!(keys.account_xpub, restored.account_xpub);

    let mnemonic = parse_mnemonic(&keys.mnemonic).expect("Mnemonic should parse");
    let xpub = derive_account_xpub(&mnemonic, BitcoinNetwork::Testnet).expect("xpub");
    assert_eq!(xpub.to_string(), keys.account_xpub);
}

#[test]
fn test_invalid_mnemonic_maps_to_invalid_mnemonic_error() {
    let err = restore_keys(BitcoinNetwork::Regtest, "not a valid phrase")
        .expect_err("Invalid phrase should be rejected");
    assert!(matches!(Error::from(err), Error::InvalidMnemonic { .. }));

    // valid words, bad checksum
    let bad_checksum = TEST_MNEMONIC.replace("about", "abandon");
    let err = restore_keys(BitcoinNetwork::Regtest, &bad_checksum)
        .expect_err("Bad checksum should be rejected");
    assert!(matches!(Error::from(err), Error::InvalidMnemonic { .. }));
}

#[test]
fn test_descriptors_use_requested_keychain() {
    let keys = generate_keys(BitcoinNetwork::Regtest).expect("Failed to generate keys");
    let xpub = parse_xpub(&keys.account_xpub).expect("Failed to parse xpub");
    let colored = descriptor_from_xpub(&xpub, KEYCHAIN_RGB);
    let vanilla = descriptor_from_xpub(&xpub, KEYCHAIN_BTC);
    assert!(colored.starts_with("tr("));
    assert!(colored.ends_with("/9/*)"), "Colored keychain is 9: {colored}");
    assert!(vanilla.ends_with("/1/*)"), "Vanilla keychain is 1: {vanilla}");
}

#[test]
fn test_account_xpub_matches_between_derivations() {
    let mnemonic = generate_mnemonic().expect("Failed to generate mnemonic");
    let from_priv = derive_account_xpub(&mnemonic, BitcoinNetwork::Testnet)
        .expect("Failed to derive account xpub");
    let keys = restore_keys(BitcoinNetwork::Testnet, &mnemonic.to_string())
        .expect("Failed to restore keys");
    assert_eq!(from_priv.to_string(), keys.account_xpub);
}
