//! Bitcoin wallet layer using BDK
//!
//! Handles UTXO bookkeeping, blockchain sync and transaction operations

pub mod balance;
pub mod network;
pub mod sync;
pub mod utxo;
pub mod wallet;

pub use balance::{keychain_balance, list_utxos, KeychainBalance, UtxoInfo};
pub use network::{
    interpolate_fee_estimation, ElectrumClient, EsploraClient, Indexer, IndexerKind, NetworkError,
};
pub use sync::{full_scan_wallet, sync_wallet, SyncError, SyncResult};
pub use utxo::{
    build_drain_psbt, build_send_psbt, build_split_psbt, extract_tx, psbt_fee, sign_psbt,
    FeeRateConfig, UtxoError,
};
pub use wallet::{BitcoinWallet, BitcoinWalletError};
