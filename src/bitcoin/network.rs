//! Bitcoin network layer over Esplora or Electrum indexers

use crate::config::BitcoinNetwork;
use bdk_electrum::electrum_client::{
    self, Client as RawElectrumClient, ConfigBuilder, ElectrumApi, Param,
};
use bdk_electrum::BdkElectrumClient;
use bdk_esplora::esplora_client::{self, BlockingClient};
use bdk_wallet::bitcoin::{BlockHash, Transaction, Txid};
use std::collections::HashMap;
use std::time::Duration;

/// Seconds before an indexer request is abandoned
pub const INDEXER_TIMEOUT: u8 = 30;

const INDEXER_RETRIES: u8 = 3;

/// Errors that can occur during network operations
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Esplora client error: {0}")]
    Esplora(#[from] esplora_client::Error),

    #[error("Electrum client error: {0}")]
    Electrum(#[from] electrum_client::Error),

    #[error("Invalid indexer URL: {0}")]
    InvalidUrl(String),

    #[error("Network request failed: {0}")]
    Request(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Cannot estimate fees")]
    CannotEstimateFees,

    #[error("Network unavailable")]
    Unavailable,
}

/// Protocol spoken by an indexer, chosen from its URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerKind {
    /// `tcp://` or `ssl://`
    Electrum,
    /// `http://` or `https://`
    Esplora,
}

impl IndexerKind {
    pub fn from_url(url: &str) -> Result<Self, NetworkError> {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| NetworkError::InvalidUrl(url.to_string()))?;
        match scheme.as_str() {
            "tcp" | "ssl" => Ok(IndexerKind::Electrum),
            "http" | "https" => Ok(IndexerKind::Esplora),
            _ => Err(NetworkError::InvalidUrl(url.to_string())),
        }
    }
}

/// Esplora client wrapper for blockchain queries
///
/// Provides a blocking interface to query blockchain data from an Esplora
/// server and to broadcast transactions.
pub struct EsploraClient {
    client: BlockingClient,
    network: BitcoinNetwork,
    url: String,
}

impl EsploraClient {
    /// Create a new Esplora client
    ///
    /// # Arguments
    ///
    /// * `url` - Esplora server URL (e.g., "http://localhost:3002")
    /// * `network` - Bitcoin network
    pub fn new(url: &str, network: BitcoinNetwork) -> Result<Self, NetworkError> {
        Self::with_timeout(url, network, Duration::from_secs(INDEXER_TIMEOUT as u64))
    }

    /// Create a new Esplora client with custom timeout
    pub fn with_timeout(
        url: &str,
        network: BitcoinNetwork,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let builder = esplora_client::Builder::new(url)
            .timeout(timeout.as_secs())
            .max_retries(INDEXER_RETRIES as usize);
        let client = BlockingClient::from_builder(builder);

        Ok(Self {
            client,
            network,
            url: url.to_string(),
        })
    }

    /// Get the underlying Esplora client reference
    pub fn inner(&self) -> &BlockingClient {
        &self.client
    }

    pub fn network(&self) -> BitcoinNetwork {
        self.network
    }

    /// Get the Esplora server URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the current blockchain tip height
    pub fn get_height(&self) -> Result<u32, NetworkError> {
        self.client
            .get_height()
            .map_err(|e| NetworkError::Request(format!("Failed to get height: {}", e)))
    }

    /// Get the current blockchain tip block hash
    pub fn get_tip_hash(&self) -> Result<BlockHash, NetworkError> {
        self.client
            .get_tip_hash()
            .map_err(|e| NetworkError::Request(format!("Failed to get tip hash: {}", e)))
    }

    /// Broadcast a finalized transaction
    ///
    /// The server's rejection message is preserved in the error so callers can
    /// tell fee problems apart from other failures.
    pub fn broadcast(&self, tx: &Transaction) -> Result<(), NetworkError> {
        self.client
            .broadcast(tx)
            .map_err(|e| NetworkError::Broadcast(e.to_string()))
    }

    /// Fee estimates in sat/vB keyed by confirmation target (blocks)
    pub fn get_fee_estimates(&self) -> Result<HashMap<u16, f64>, NetworkError> {
        self.client
            .get_fee_estimates()
            .map_err(|e| NetworkError::Request(format!("Failed to get fee estimates: {}", e)))
    }

    /// Number of confirmations of a transaction, `None` if unconfirmed or unknown
    pub fn tx_confirmations(&self, txid: &Txid) -> Result<Option<u32>, NetworkError> {
        let status = self
            .client
            .get_tx_status(txid)
            .map_err(|e| NetworkError::Request(format!("Failed to get tx status: {}", e)))?;

        match (status.confirmed, status.block_height) {
            (true, Some(height)) => {
                let tip = self.get_height()?;
                Ok(Some(tip.saturating_sub(height) + 1))
            }
            _ => Ok(None),
        }
    }
}

/// Electrum client wrapper
///
/// Connecting happens in [`ElectrumClient::new`], so an unreachable server
/// fails there rather than on the first query.
pub struct ElectrumClient {
    client: BdkElectrumClient<RawElectrumClient>,
    network: BitcoinNetwork,
    url: String,
}

impl ElectrumClient {
    pub fn new(url: &str, network: BitcoinNetwork) -> Result<Self, NetworkError> {
        let config = ConfigBuilder::new()
            .timeout(Some(INDEXER_TIMEOUT))
            .retry(INDEXER_RETRIES)
            .build();
        let raw = RawElectrumClient::from_config(url, config)?;

        Ok(Self {
            client: BdkElectrumClient::new(raw),
            network,
            url: url.to_string(),
        })
    }

    pub fn inner(&self) -> &BdkElectrumClient<RawElectrumClient> {
        &self.client
    }

    pub fn network(&self) -> BitcoinNetwork {
        self.network
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn get_height(&self) -> Result<u32, NetworkError> {
        let tip = self
            .client
            .inner
            .block_headers_subscribe()
            .map_err(|e| NetworkError::Request(format!("Failed to get height: {}", e)))?;
        u32::try_from(tip.height)
            .map_err(|_| NetworkError::Request(format!("Invalid height {}", tip.height)))
    }

    pub fn get_tip_hash(&self) -> Result<BlockHash, NetworkError> {
        let tip = self
            .client
            .inner
            .block_headers_subscribe()
            .map_err(|e| NetworkError::Request(format!("Failed to get tip hash: {}", e)))?;
        Ok(tip.header.block_hash())
    }

    pub fn broadcast(&self, tx: &Transaction) -> Result<(), NetworkError> {
        self.client
            .transaction_broadcast(tx)
            .map(|_| ())
            .map_err(|e| NetworkError::Broadcast(e.to_string()))
    }

    /// Fee rate in sat/vB for a confirmation target
    pub fn fee_estimation(&self, blocks: u16) -> Result<f64, NetworkError> {
        // BTC/kB
        let estimate = self
            .client
            .inner
            .estimate_fee(blocks as usize)
            .map_err(|e| NetworkError::Request(format!("Failed to estimate fee: {}", e)))?;
        if estimate < 0.0 {
            return Err(NetworkError::CannotEstimateFees);
        }
        Ok(estimate * 100_000_000.0 / 1_000.0)
    }

    pub fn tx_confirmations(&self, txid: &Txid) -> Result<Option<u32>, NetworkError> {
        let details = match self.client.inner.raw_call(
            "blockchain.transaction.get",
            vec![Param::String(txid.to_string()), Param::Bool(true)],
        ) {
            Ok(details) => details,
            Err(e) if e.to_string().contains("No such mempool or blockchain transaction") => {
                return Ok(None)
            }
            Err(e) => {
                return Err(NetworkError::Request(format!(
                    "Failed to get tx status: {}",
                    e
                )))
            }
        };

        match details.get("confirmations").and_then(|c| c.as_u64()) {
            Some(0) | None => Ok(None),
            Some(confirmations) => Ok(Some(u32::try_from(confirmations).unwrap_or(u32::MAX))),
        }
    }
}

/// An Esplora or Electrum indexer
pub enum Indexer {
    Esplora(Box<EsploraClient>),
    Electrum(Box<ElectrumClient>),
}

impl Indexer {
    /// Connect to the indexer at `url`, picking the protocol from its scheme
    pub fn new(url: &str, network: BitcoinNetwork) -> Result<Self, NetworkError> {
        match IndexerKind::from_url(url)? {
            IndexerKind::Esplora => Ok(Indexer::Esplora(Box::new(EsploraClient::new(
                url, network,
            )?))),
            IndexerKind::Electrum => Ok(Indexer::Electrum(Box::new(ElectrumClient::new(
                url, network,
            )?))),
        }
    }

    pub fn kind(&self) -> IndexerKind {
        match self {
            Indexer::Esplora(_) => IndexerKind::Esplora,
            Indexer::Electrum(_) => IndexerKind::Electrum,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Indexer::Esplora(client) => client.url(),
            Indexer::Electrum(client) => client.url(),
        }
    }

    pub fn network(&self) -> BitcoinNetwork {
        match self {
            Indexer::Esplora(client) => client.network(),
            Indexer::Electrum(client) => client.network(),
        }
    }

    pub fn get_height(&self) -> Result<u32, NetworkError> {
        match self {
            Indexer::Esplora(client) => client.get_height(),
            Indexer::Electrum(client) => client.get_height(),
        }
    }

    pub fn get_tip_hash(&self) -> Result<BlockHash, NetworkError> {
        match self {
            Indexer::Esplora(client) => client.get_tip_hash(),
            Indexer::Electrum(client) => client.get_tip_hash(),
        }
    }

    /// Check if the indexer answers queries
    pub fn is_available(&self) -> Result<bool, NetworkError> {
        match self.get_height() {
            Ok(_) => Ok(true),
            Err(NetworkError::Request(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn broadcast(&self, tx: &Transaction) -> Result<(), NetworkError> {
        match self {
            Indexer::Esplora(client) => client.broadcast(tx),
            Indexer::Electrum(client) => client.broadcast(tx),
        }
    }

    /// Fee rate in sat/vB for a confirmation target
    pub fn fee_estimation(&self, blocks: u16) -> Result<f64, NetworkError> {
        match self {
            Indexer::Esplora(client) => {
                let estimates = client.get_fee_estimates()?;
                interpolate_fee_estimation(&estimates, blocks)
                    .ok_or(NetworkError::CannotEstimateFees)
            }
            Indexer::Electrum(client) => client.fee_estimation(blocks),
        }
    }

    pub fn tx_confirmations(&self, txid: &Txid) -> Result<Option<u32>, NetworkError> {
        match self {
            Indexer::Esplora(client) => client.tx_confirmations(txid),
            Indexer::Electrum(client) => client.tx_confirmations(txid),
        }
    }
}

/// Pick the fee rate for a confirmation target from an estimates map
///
/// Exact targets are returned as-is. Otherwise the rate is linearly
/// interpolated between the closest lower and higher targets, or taken from
/// the only side available. Returns `None` when there are no estimates.
pub fn interpolate_fee_estimation(estimates: &HashMap<u16, f64>, blocks: u16) -> Option<f64> {
    if let Some(rate) = estimates.get(&blocks) {
        return Some(*rate);
    }

    let lower = estimates
        .iter()
        .filter(|(k, _)| **k < blocks)
        .max_by_key(|(k, _)| **k);
    let upper = estimates
        .iter()
        .filter(|(k, _)| **k > blocks)
        .min_by_key(|(k, _)| **k);

    match (lower, upper) {
        (Some((lk, lv)), Some((uk, uv))) => {
            let span = (*uk - *lk) as f64;
            let pos = (blocks - *lk) as f64;
            Some(lv + (uv - lv) * pos / span)
        }
        (Some((_, v)), None) | (None, Some((_, v))) => Some(*v),
        (None, None) => None,
    }
}

impl std::fmt::Debug for EsploraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsploraClient")
            .field("network", &self.network)
            .field("url", &self.url)
            .finish()
    }
}

impl std::fmt::Debug for ElectrumClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElectrumClient")
            .field("network", &self.network)
            .field("url", &self.url)
            .finish()
    }
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Indexer::Esplora(client) => client.fmt(f),
            Indexer::Electrum(client) => client.fmt(f),
        }
    }
}
