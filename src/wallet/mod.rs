//! RGB wallet
//!
//! [`Wallet`] ties together the BDK wallet (colored and vanilla keychains),
//! the RGB ledger and the local contract store. Operations that don't touch
//! the network live in `offline`, the ones needing an indexer in `online`.

pub mod backup;
pub mod offline;
pub mod online;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use bdk_wallet::bitcoin::{OutPoint as BdkOutPoint, Txid};
use serde::{Deserialize, Deserializer, Serialize};

use crate::bitcoin::{BitcoinWallet, Indexer};
use crate::config::BitcoinNetwork;
use crate::database::{
    AssetSchema, LocalRgbAllocation, LocalUnspent, RgbLibDatabase, TransferStatus, TransportType,
};
use crate::error::Error;
use crate::rgb::{AssetIface, Media};

pub use crate::keys::{KEYCHAIN_BTC, KEYCHAIN_RGB};
pub use backup::restore_backup;

/// Sats of vanilla funds below which UTXO creation is reported as impossible
pub const MIN_BTC_REQUIRED: u64 = 2000;

pub const MAX_TRANSPORT_ENDPOINTS: usize = 3;

/// Default validity of a receive request, in seconds
pub const DURATION_RCV_TRANSFER: u32 = 86400;

/// Default size of created UTXOs, in sats
pub const UTXO_SIZE: u32 = 1000;

/// Default number of UTXOs to create
pub const UTXO_NUM: u8 = 5;

/// Minimum fee rate, in sat/vB
pub const MIN_FEE_RATE: u64 = 1;

pub const MIN_BLOCK_ESTIMATION: u16 = 1;
pub const MAX_BLOCK_ESTIMATION: u16 = 1008;

pub const MAX_ATTACHMENTS: usize = 20;

/// Stop gap used by the full scan when going online
pub const STOP_GAP: usize = 20;

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DatabaseType {
    #[default]
    Sqlite,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Data that defines a wallet
///
/// `max_allocations_per_utxo` is accepted both as a JSON number and as a
/// string, since C callers build this object by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletData {
    /// Directory holding the wallet directories
    pub data_dir: String,
    pub bitcoin_network: BitcoinNetwork,
    #[serde(default)]
    pub database_type: DatabaseType,
    #[serde(deserialize_with = "number_or_string")]
    pub max_allocations_per_utxo: u32,
    /// Account-level xpub
    pub pubkey: String,
    /// Mnemonic, `None` for watch-only wallets
    pub mnemonic: Option<String>,
    #[serde(default)]
    pub vanilla_keychain: Option<u8>,
}

/// Handle proving a wallet went online
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Online {
    pub id: u64,
    pub indexer_url: String,
}

/// Bitcoin balances of the two keychains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BtcBalance {
    pub vanilla: Balance,
    pub colored: Balance,
}

/// A balance, in sats or asset units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub settled: u64,
    pub future: u64,
    pub spendable: u64,
}

/// A Non-Inflatable Asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetNIA {
    pub asset_id: String,
    pub asset_iface: AssetIface,
    pub ticker: String,
    pub name: String,
    pub details: Option<String>,
    pub precision: u8,
    pub issued_supply: u64,
    pub timestamp: i64,
    pub added_at: i64,
    pub balance: Balance,
    pub media: Option<Media>,
}

/// A Collectible Fungible Asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCFA {
    pub asset_id: String,
    pub asset_iface: AssetIface,
    pub name: String,
    pub details: Option<String>,
    pub precision: u8,
    pub issued_supply: u64,
    pub timestamp: i64,
    pub added_at: i64,
    pub balance: Balance,
    pub media: Option<Media>,
}

/// A Unique Digital Asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUDA {
    pub asset_id: String,
    pub asset_iface: AssetIface,
    pub ticker: String,
    pub name: String,
    pub details: Option<String>,
    pub precision: u8,
    pub issued_supply: u64,
    pub timestamp: i64,
    pub added_at: i64,
    pub balance: Balance,
    pub token: Option<TokenLight>,
}

/// Assets grouped by schema, `None` for schemas that were not requested
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Assets {
    pub nia: Option<Vec<AssetNIA>>,
    pub uda: Option<Vec<AssetUDA>>,
    pub cfa: Option<Vec<AssetCFA>>,
}

/// Token of a UDA as listed with the asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLight {
    pub index: u32,
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub details: Option<String>,
    pub embedded_media: bool,
    pub media: Option<Media>,
    pub attachments: BTreeMap<u8, Media>,
    pub reserves: bool,
}

/// Token of a UDA as returned by the asset metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub index: u32,
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub details: Option<String>,
    pub media: Option<Media>,
    pub attachments: BTreeMap<u8, Media>,
}

impl From<TokenLight> for Token {
    fn from(token: TokenLight) -> Self {
        Self {
            index: token.index,
            ticker: token.ticker,
            name: token.name,
            details: token.details,
            media: token.media,
            attachments: token.attachments,
        }
    }
}

/// Asset metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub asset_iface: AssetIface,
    pub asset_schema: AssetSchema,
    pub issued_supply: u64,
    pub timestamp: i64,
    pub name: String,
    pub precision: u8,
    pub ticker: Option<String>,
    pub details: Option<String>,
    pub token: Option<Token>,
}

/// Result of a receive request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveData {
    pub invoice: String,
    pub recipient_id: String,
    pub expiration_timestamp: Option<i64>,
    pub batch_transfer_idx: i32,
}

/// Kind of an RGB transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    Issuance,
    ReceiveBlind,
    ReceiveWitness,
    Send,
}

/// Transport endpoint of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTransportEndpoint {
    pub endpoint: String,
    pub transport_type: TransportType,
    pub used: bool,
}

/// An RGB transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub idx: i32,
    pub batch_transfer_idx: i32,
    pub created_at: i64,
    pub updated_at: i64,
    pub status: TransferStatus,
    /// Requested (receive) or moved (issue, send) amount
    pub amount: u64,
    pub kind: TransferKind,
    pub txid: Option<String>,
    pub recipient_id: Option<String>,
    pub receive_utxo: Option<Outpoint>,
    pub change_utxo: Option<Outpoint>,
    pub expiration: Option<i64>,
    pub transport_endpoints: Vec<TransferTransportEndpoint>,
    pub invoice_string: Option<String>,
}

/// Kind of a bitcoin transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    RgbSend,
    Drain,
    CreateUtxos,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTime {
    pub height: u32,
    pub timestamp: u64,
}

/// A bitcoin transaction known to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_type: TransactionType,
    pub txid: String,
    pub received: u64,
    pub sent: u64,
    pub fee: u64,
    pub confirmation_time: Option<BlockTime>,
}

/// A wallet UTXO
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: Outpoint,
    pub btc_amount: u64,
    /// Whether the UTXO belongs to the colored keychain
    pub colorable: bool,
    pub exists: bool,
}

/// An RGB allocation on a UTXO
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbAllocation {
    pub asset_id: Option<String>,
    pub amount: u64,
    pub settled: bool,
}

impl From<LocalRgbAllocation> for RgbAllocation {
    fn from(allocation: LocalRgbAllocation) -> Self {
        Self {
            settled: allocation.settled(),
            asset_id: allocation.asset_id,
            amount: allocation.amount,
        }
    }
}

/// A UTXO with its RGB allocations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unspent {
    pub utxo: Utxo,
    pub rgb_allocations: Vec<RgbAllocation>,
    /// Receive requests waiting for the sender
    pub pending_blinded: u32,
}

impl From<LocalUnspent> for Unspent {
    fn from(unspent: LocalUnspent) -> Self {
        let pending_blinded = unspent
            .rgb_allocations
            .iter()
            .filter(|a| a.incoming && a.status.waiting_counterparty())
            .count() as u32;
        Self {
            utxo: Utxo {
                outpoint: unspent.utxo.outpoint(),
                btc_amount: unspent.utxo.btc_amount,
                colorable: true,
                exists: unspent.utxo.exists,
            },
            rgb_allocations: unspent
                .rgb_allocations
                .into_iter()
                .map(RgbAllocation::from)
                .collect(),
            pending_blinded,
        }
    }
}

impl From<bdk_wallet::LocalOutput> for Unspent {
    fn from(output: bdk_wallet::LocalOutput) -> Self {
        Self {
            utxo: Utxo {
                outpoint: output.outpoint.into(),
                btc_amount: output.txout.value.to_sat(),
                colorable: false,
                exists: true,
            },
            rgb_allocations: vec![],
            pending_blinded: 0,
        }
    }
}

/// A transaction output reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: String,
    pub vout: u32,
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl From<BdkOutPoint> for Outpoint {
    fn from(outpoint: BdkOutPoint) -> Self {
        Self {
            txid: outpoint.txid.to_string(),
            vout: outpoint.vout,
        }
    }
}

impl TryFrom<&Outpoint> for BdkOutPoint {
    type Error = Error;

    fn try_from(outpoint: &Outpoint) -> Result<Self, Self::Error> {
        let txid = Txid::from_str(&outpoint.txid).map_err(Error::internal)?;
        Ok(BdkOutPoint::new(txid, outpoint.vout))
    }
}

/// Pending status a refresh can be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshTransferStatus {
    WaitingCounterparty,
    WaitingConfirmations,
}

impl TryFrom<TransferStatus> for RefreshTransferStatus {
    type Error = Error;

    fn try_from(status: TransferStatus) -> Result<Self, Self::Error> {
        match status {
            TransferStatus::WaitingCounterparty => Ok(RefreshTransferStatus::WaitingCounterparty),
            TransferStatus::WaitingConfirmations => {
                Ok(RefreshTransferStatus::WaitingConfirmations)
            }
            other => Err(Error::internal(format!(
                "status {:?} cannot be refreshed",
                other
            ))),
        }
    }
}

/// Selects which pending transfers a refresh operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshFilter {
    pub status: RefreshTransferStatus,
    pub incoming: bool,
}

/// Outcome of refreshing a single batch transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedTransfer {
    pub updated_status: Option<TransferStatus>,
    pub failure: Option<String>,
}

pub(crate) struct OnlineData {
    pub(crate) id: u64,
    pub(crate) indexer_url: String,
    pub(crate) indexer: Indexer,
}

/// An RGB wallet
///
/// # Example
///
/// ```ignore
/// let keys = generate_keys(BitcoinNetwork::Regtest)?;
/// let mut wallet = Wallet::new(WalletData {
///     data_dir: "/tmp/rgb".to_string(),
///     bitcoin_network: BitcoinNetwork::Regtest,
///     database_type: DatabaseType::Sqlite,
///     max_allocations_per_utxo: 5,
///     pubkey: keys.account_xpub.clone(),
///     mnemonic: Some(keys.mnemonic.clone()),
///     vanilla_keychain: None,
/// })?;
/// let online = wallet.go_online(false, "http://localhost:3002".to_string())?;
/// wallet.create_utxos(online, false, None, None, 2, false)?;
/// ```
pub struct Wallet {
    pub(crate) wallet_data: WalletData,
    pub(crate) watch_only: bool,
    pub(crate) database: RgbLibDatabase,
    pub(crate) wallet_dir: PathBuf,
    pub(crate) bdk_wallet: BitcoinWallet,
    pub(crate) online_data: Option<OnlineData>,
    pub(crate) max_allocations_per_utxo: u32,
}
