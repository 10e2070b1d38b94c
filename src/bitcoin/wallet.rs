//! Bitcoin wallet wrapper using BDK
//!
//! The RGB wallet keeps two keychains in a single BDK wallet: the colored
//! keychain (BDK `External`) holds UTXOs that may carry RGB allocations, the
//! vanilla keychain (BDK `Internal`) holds plain bitcoin.

use crate::config::BitcoinNetwork;
use bdk_wallet::rusqlite::Connection;
use bdk_wallet::{KeychainKind, LocalOutput, PersistedWallet, Wallet};
use std::path::{Path, PathBuf};

/// BDK database file inside the wallet directory
pub const BDK_DB_NAME: &str = "bdk.sqlite";

/// Errors that can occur during Bitcoin wallet operations
#[derive(Debug, thiserror::Error)]
pub enum BitcoinWalletError {
    #[error("BDK create error: {0}")]
    Create(String),

    #[error("BDK load error: {0}")]
    Load(String),

    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] bdk_wallet::rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bitcoin wallet wrapper around BDK
///
/// Provides UTXO bookkeeping and address derivation with SQLite
/// persistence. Private keys are extracted from the descriptors when present,
/// a wallet built from xpub descriptors is watch-only.
pub struct BitcoinWallet {
    wallet: PersistedWallet<Connection>,
    conn: Connection,
    network: BitcoinNetwork,
    db_path: PathBuf,
}

impl BitcoinWallet {
    /// Load the wallet stored in `wallet_dir`, or create it
    ///
    /// # Arguments
    ///
    /// * `colored_descriptor` - Descriptor of the colored keychain (`tr(.../9/*)`)
    /// * `vanilla_descriptor` - Descriptor of the vanilla keychain (`tr(.../1/*)`)
    /// * `network` - Bitcoin network
    /// * `wallet_dir` - Directory holding the BDK database
    ///
    /// # Example
    ///
    /// ```ignore
    /// let colored = descriptor_from_xprv(&account_xprv, KEYCHAIN_RGB);
    /// let vanilla = descriptor_from_xprv(&account_xprv, KEYCHAIN_BTC);
    /// let wallet = BitcoinWallet::new(colored, vanilla, BitcoinNetwork::Regtest, &wallet_dir)?;
    /// ```
    pub fn new(
        colored_descriptor: String,
        vanilla_descriptor: String,
        network: BitcoinNetwork,
        wallet_dir: &Path,
    ) -> Result<Self, BitcoinWalletError> {
        std::fs::create_dir_all(wallet_dir)?;

        let db_path = wallet_dir.join(BDK_DB_NAME);
        let mut conn = Connection::open(&db_path)?;

        let wallet = match Wallet::load()
            .descriptor(KeychainKind::External, Some(colored_descriptor.clone()))
            .descriptor(KeychainKind::Internal, Some(vanilla_descriptor.clone()))
            .extract_keys()
            .check_network(network.into())
            .load_wallet(&mut conn)
            .map_err(|e| BitcoinWalletError::Load(format!("Failed to load wallet: {}", e)))?
        {
            Some(wallet) => wallet,
            None => {
                log::debug!("Creating new BDK wallet at {:?}", db_path);
                Wallet::create(colored_descriptor, vanilla_descriptor)
                    .network(network.into())
                    .create_wallet(&mut conn)
                    .map_err(|e| {
                        BitcoinWalletError::Create(format!("Failed to create wallet: {}", e))
                    })?
            }
        };

        Ok(Self {
            wallet,
            conn,
            network,
            db_path,
        })
    }

    /// Get the underlying BDK wallet reference
    pub fn inner(&self) -> &Wallet {
        &self.wallet
    }

    /// Get mutable reference to the underlying BDK wallet
    pub fn inner_mut(&mut self) -> &mut Wallet {
        &mut self.wallet
    }

    pub fn network(&self) -> BitcoinNetwork {
        self.network
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Persist wallet changes to the SQLite database
    ///
    /// Returns `true` if changes were persisted.
    pub fn persist(&mut self) -> Result<bool, BitcoinWalletError> {
        let changed = self.wallet.persist(&mut self.conn)?;
        Ok(changed)
    }

    /// Reveal and persist a new address on the colored keychain
    pub fn new_colored_address(&mut self) -> Result<bitcoin::Address, BitcoinWalletError> {
        let info = self.wallet.reveal_next_address(KeychainKind::External);
        self.persist()?;
        Ok(info.address)
    }

    /// Reveal and persist a new address on the vanilla keychain
    pub fn new_vanilla_address(&mut self) -> Result<bitcoin::Address, BitcoinWalletError> {
        let info = self.wallet.reveal_next_address(KeychainKind::Internal);
        self.persist()?;
        Ok(info.address)
    }

    /// Unspent outputs of a single keychain
    pub fn unspents(&self, keychain: KeychainKind) -> Vec<LocalOutput> {
        self.wallet
            .list_unspent()
            .filter(|u| u.keychain == keychain)
            .collect()
    }

    /// Sum of the unspent vanilla outputs, in sats
    pub fn vanilla_funds(&self) -> u64 {
        self.unspents(KeychainKind::Internal)
            .iter()
            .map(|u| u.txout.value.to_sat())
            .sum()
    }
}
