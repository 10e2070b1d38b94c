//! Key generation and derivation
//!
//! Provides BIP39 mnemonic generation, BIP86 account derivation and the
//! taproot descriptors used for the colored and vanilla keychains.

use aes_gcm::aead::OsRng;
use bitcoin::bip32::{DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::Secp256k1;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::BitcoinNetwork;

/// Keychain index holding RGB-colored UTXOs
pub const KEYCHAIN_RGB: u8 = 9;

/// Default keychain index for vanilla (non-RGB) UTXOs
pub const KEYCHAIN_BTC: u8 = 1;

const PURPOSE: u32 = 86;
const ACCOUNT: u32 = 0;

/// Key derivation errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("BIP39 error: {0}")]
    Bip39(String),

    #[error("BIP32 derivation error: {0}")]
    Bip32(String),
}

/// A set of Bitcoin keys used by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keys {
    /// Mnemonic phrase
    pub mnemonic: String,
    /// Master xpub
    pub xpub: String,
    /// Account-level xpub (m/86'/coin'/0')
    pub account_xpub: String,
    /// Fingerprint of the account-level xpub
    pub account_xpub_fingerprint: String,
}

/// Generate a new BIP39 mnemonic (12 words)
///
/// Creates a 128-bit entropy mnemonic phrase for wallet key derivation.
pub fn generate_mnemonic() -> Result<bip39::Mnemonic, KeyError> {
    let mut entropy = [0u8; 16];
    OsRng.fill_bytes(&mut entropy);

    bip39::Mnemonic::from_entropy(&entropy).map_err(|e| KeyError::Bip39(e.to_string()))
}

/// Generate a fresh set of [`Keys`] for the given network
///
/// # Example
///
/// ```ignore
/// let keys = generate_keys(BitcoinNetwork::Regtest)?;
/// println!("{}", keys.account_xpub);
/// ```
pub fn generate_keys(network: BitcoinNetwork) -> Result<Keys, KeyError> {
    let mnemonic = generate_mnemonic()?;
    keys_from_mnemonic(network, &mnemonic)
}

/// Recreate the [`Keys`] belonging to an existing mnemonic phrase
///
/// # Arguments
///
/// * `network` - Target network
/// * `mnemonic` - English BIP39 phrase
pub fn restore_keys(network: BitcoinNetwork, mnemonic: &str) -> Result<Keys, KeyError> {
    let mnemonic = parse_mnemonic(mnemonic)?;
    keys_from_mnemonic(network, &mnemonic)
}

/// Parse an English BIP39 phrase
pub fn parse_mnemonic(mnemonic: &str) -> Result<bip39::Mnemonic, KeyError> {
    bip39::Mnemonic::parse_in(bip39::Language::English, mnemonic.trim())
        .map_err(|e| KeyError::Bip39(e.to_string()))
}

fn keys_from_mnemonic(
    network: BitcoinNetwork,
    mnemonic: &bip39::Mnemonic,
) -> Result<Keys, KeyError> {
    let secp = Secp256k1::new();
    let master = master_xprv(mnemonic, network)?;
    let xpub = Xpub::from_priv(&secp, &master);
    let account_xprv = derive_account_xprv(mnemonic, network)?;
    let account_xpub = Xpub::from_priv(&secp, &account_xprv);

    Ok(Keys {
        mnemonic: mnemonic.to_string(),
        xpub: xpub.to_string(),
        account_xpub: account_xpub.to_string(),
        account_xpub_fingerprint: account_xpub.fingerprint().to_string(),
    })
}

fn master_xprv(mnemonic: &bip39::Mnemonic, network: BitcoinNetwork) -> Result<Xpriv, KeyError> {
    let seed = mnemonic.to_seed("");
    Xpriv::new_master(bitcoin::Network::from(network), &seed)
        .map_err(|e| KeyError::Bip32(format!("Failed to create master key: {}", e)))
}

/// Derive the account-level xprv at m/86'/coin'/0'
///
/// BIP86 is specifically designed for single-key P2TR outputs, which RGB
/// tapret commitments require.
///
/// - Mainnet: m/86'/0'/0'
/// - Testnet, Signet, Regtest: m/86'/1'/0'
pub fn derive_account_xprv(
    mnemonic: &bip39::Mnemonic,
    network: BitcoinNetwork,
) -> Result<Xpriv, KeyError> {
    let secp = Secp256k1::new();
    let master = master_xprv(mnemonic, network)?;

    let path_str = format!("m/{}'/{}'/{}'", PURPOSE, network.coin_type(), ACCOUNT);
    let derivation_path = DerivationPath::from_str(&path_str)
        .map_err(|e| KeyError::Bip32(format!("Invalid derivation path: {}", e)))?;

    master
        .derive_priv(&secp, &derivation_path)
        .map_err(|e| KeyError::Bip32(format!("Derivation failed: {}", e)))
}

/// Account-level xpub matching [`derive_account_xprv`]
pub fn derive_account_xpub(
    mnemonic: &bip39::Mnemonic,
    network: BitcoinNetwork,
) -> Result<Xpub, KeyError> {
    let secp = Secp256k1::new();
    Ok(Xpub::from_priv(&secp, &derive_account_xprv(mnemonic, network)?))
}

/// Parse an account xpub string
pub fn parse_xpub(xpub: &str) -> Result<Xpub, KeyError> {
    Xpub::from_str(xpub).map_err(|e| KeyError::Bip32(e.to_string()))
}

/// Taproot descriptor for a keychain, with private keys
pub fn descriptor_from_xprv(account_xprv: &Xpriv, keychain: u8) -> String {
    format!("tr({}/{}/*)", account_xprv, keychain)
}

/// Taproot descriptor for a keychain, public keys only (watch-only wallets)
pub fn descriptor_from_xpub(account_xpub: &Xpub, keychain: u8) -> String {
    format!("tr({}/{}/*)", account_xpub, keychain)
}
