//! Storage data models
//!
//! Wallet profiles let the CLI reopen a wallet by name. A profile holds the
//! public wallet parameters in clear and the mnemonic encrypted with the
//! user's password.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BitcoinNetwork;
use crate::storage::crypto::{decrypt_mnemonic, encrypt_mnemonic, CryptoError};

/// Persisted wallet profile
///
/// Saved to: `~/.rgblib/wallets/<name>/profile.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletProfile {
    /// Wallet name (unique identifier)
    pub name: String,

    /// Network this wallet operates on
    pub network: BitcoinNetwork,

    /// Account-level xpub
    pub account_xpub: String,

    /// Fingerprint of the account-level xpub (names the wallet directory)
    pub fingerprint: String,

    /// Directory the library wallet directory lives in
    pub data_dir: String,

    pub max_allocations_per_utxo: u32,

    pub vanilla_keychain: Option<u8>,

    /// Encrypted BIP39 mnemonic (hex), absent for watch-only profiles
    pub encrypted_mnemonic: Option<String>,

    /// When the profile was created
    pub created_at: DateTime<Utc>,

    /// Last blockchain sync timestamp
    pub last_sync: Option<DateTime<Utc>>,
}

/// Clear-text parameters of a new profile
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub network: BitcoinNetwork,
    pub account_xpub: String,
    pub fingerprint: String,
    pub data_dir: String,
    pub max_allocations_per_utxo: u32,
    pub vanilla_keychain: Option<u8>,
}

impl WalletProfile {
    /// Build a profile, encrypting the mnemonic when one is provided
    pub fn new(
        params: NewProfile,
        mnemonic: Option<&str>,
        password: &str,
    ) -> Result<Self, CryptoError> {
        let encrypted_mnemonic = match mnemonic {
            Some(m) => Some(encrypt_mnemonic(m, password)?),
            None => None,
        };

        Ok(Self {
            name: params.name,
            network: params.network,
            account_xpub: params.account_xpub,
            fingerprint: params.fingerprint,
            data_dir: params.data_dir,
            max_allocations_per_utxo: params.max_allocations_per_utxo,
            vanilla_keychain: params.vanilla_keychain,
            encrypted_mnemonic,
            created_at: Utc::now(),
            last_sync: None,
        })
    }

    /// Decrypt the stored mnemonic
    ///
    /// Returns `None` for watch-only profiles.
    pub fn mnemonic(&self, password: &str) -> Result<Option<String>, CryptoError> {
        match &self.encrypted_mnemonic {
            Some(enc) => Ok(Some(decrypt_mnemonic(enc, password)?)),
            None => Ok(None),
        }
    }

    pub fn is_watch_only(&self) -> bool {
        self.encrypted_mnemonic.is_none()
    }

    /// Update last sync timestamp
    pub fn update_sync_time(&mut self) {
        self.last_sync = Some(Utc::now());
    }
}
