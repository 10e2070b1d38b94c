//! Blockchain synchronization operations

use crate::bitcoin::{BitcoinWallet, BitcoinWalletError, Indexer, NetworkError};
use bdk_electrum::{electrum_client, BdkElectrumClient};
use bdk_esplora::EsploraExt;
use bdk_wallet::bitcoin::BlockHash;

const PARALLEL_REQUESTS: usize = 5;
const ELECTRUM_BATCH_SIZE: usize = 5;

/// Errors that can occur during sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] BitcoinWalletError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Esplora sync error: {0}")]
    Esplora(String),

    #[error("Electrum sync error: {0}")]
    Electrum(String),

    #[error("Sync failed: {0}")]
    Failed(String),
}

/// Result of a blockchain sync operation
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Current blockchain height after sync
    pub height: u32,

    /// Current tip block hash
    pub tip_hash: BlockHash,

    /// Number of new transactions discovered
    pub new_txs: usize,
}

/// Sync revealed scripts of the wallet with the blockchain
///
/// # Example
///
/// ```ignore
/// let result = sync_wallet(&mut wallet, &indexer)?;
/// println!("Synced to height: {}", result.height);
/// ```
pub fn sync_wallet(
    wallet: &mut BitcoinWallet,
    client: &Indexer,
) -> Result<SyncResult, SyncError> {
    log::info!("Starting blockchain sync...");

    let tip_height = client.get_height()?;
    let tip_hash = client.get_tip_hash()?;
    log::debug!("Blockchain tip: {} (height: {})", tip_hash, tip_height);

    let request = wallet.inner().start_sync_with_revealed_spks();
    let txs_before = wallet.inner().transactions().count();

    let update = match client {
        Indexer::Esplora(esplora) => esplora
            .inner()
            .sync(request, PARALLEL_REQUESTS)
            .map_err(|e| SyncError::Esplora(format!("Sync failed: {}", e)))?,
        Indexer::Electrum(electrum) => {
            populate_tx_cache(wallet, electrum.inner());
            electrum
                .inner()
                .sync(request, ELECTRUM_BATCH_SIZE, true)
                .map_err(|e| SyncError::Electrum(format!("Sync failed: {}", e)))?
        }
    };

    wallet
        .inner_mut()
        .apply_update(update)
        .map_err(|e| SyncError::Failed(format!("Failed to apply update: {}", e)))?;

    finish(wallet, tip_height, tip_hash, txs_before)
}

/// Full scan of both keychains up to `stop_gap` unused scripts
///
/// Used when going online to discover outputs on addresses that were never
/// revealed locally (e.g. after restoring a wallet).
pub fn full_scan_wallet(
    wallet: &mut BitcoinWallet,
    client: &Indexer,
    stop_gap: usize,
) -> Result<SyncResult, SyncError> {
    log::info!("Starting full scan (stop gap {})...", stop_gap);

    let tip_height = client.get_height()?;
    let tip_hash = client.get_tip_hash()?;

    let request = wallet.inner().start_full_scan();
    let txs_before = wallet.inner().transactions().count();

    let update = match client {
        Indexer::Esplora(esplora) => esplora
            .inner()
            .full_scan(request, stop_gap, PARALLEL_REQUESTS)
            .map_err(|e| SyncError::Esplora(format!("Full scan failed: {}", e)))?,
        Indexer::Electrum(electrum) => {
            populate_tx_cache(wallet, electrum.inner());
            electrum
                .inner()
                .full_scan(request, stop_gap, ELECTRUM_BATCH_SIZE, true)
                .map_err(|e| SyncError::Electrum(format!("Full scan failed: {}", e)))?
        }
    };

    wallet
        .inner_mut()
        .apply_update(update)
        .map_err(|e| SyncError::Failed(format!("Failed to apply update: {}", e)))?;

    finish(wallet, tip_height, tip_hash, txs_before)
}

// known transactions don't need to be fetched again
fn populate_tx_cache(
    wallet: &BitcoinWallet,
    client: &BdkElectrumClient<electrum_client::Client>,
) {
    client.populate_tx_cache(
        wallet
            .inner()
            .tx_graph()
            .full_txs()
            .map(|tx_node| tx_node.tx),
    );
}

fn finish(
    wallet: &mut BitcoinWallet,
    height: u32,
    tip_hash: BlockHash,
    txs_before: usize,
) -> Result<SyncResult, SyncError> {
    let new_txs = wallet
        .inner()
        .transactions()
        .count()
        .saturating_sub(txs_before);

    if wallet.persist()? {
        log::debug!("Wallet state persisted to database");
    }

    log::info!("Sync complete: height={}, new_txs={}", height, new_txs);

    Ok(SyncResult {
        height,
        tip_hash,
        new_txs,
    })
}
