//! Row types of the RGB ledger
//!
//! `idx` is the SQLite rowid. Insert methods ignore it and return the new
//! value.

use crate::database::enums::{
    AssetSchema, ColoringType, RecipientType, TransferStatus, TransportType,
    WalletTransactionType,
};
use crate::wallet::Outpoint;

/// A transaction output known to the colored keychain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTxo {
    pub idx: i32,
    pub txid: String,
    pub vout: u32,
    pub btc_amount: u64,
    pub spent: bool,
    /// False while the output has only been promised (e.g. a pending witness receive)
    pub exists: bool,
}

impl DbTxo {
    pub fn outpoint(&self) -> Outpoint {
        Outpoint {
            txid: self.txid.clone(),
            vout: self.vout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbAsset {
    pub idx: i32,
    pub media_idx: Option<i32>,
    pub id: String,
    pub schema: AssetSchema,
    pub added_at: i64,
    pub details: Option<String>,
    pub issued_supply: u64,
    pub name: String,
    pub precision: u8,
    pub ticker: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbBatchTransfer {
    pub idx: i32,
    pub txid: Option<String>,
    pub status: TransferStatus,
    pub expiration: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub min_confirmations: u8,
}

impl DbBatchTransfer {
    pub fn failed(&self) -> bool {
        self.status.failed()
    }

    pub fn pending(&self) -> bool {
        self.status.pending()
    }

    pub fn waiting_confirmations(&self) -> bool {
        self.status.waiting_confirmations()
    }

    pub fn waiting_counterparty(&self) -> bool {
        self.status.waiting_counterparty()
    }

    /// Whether every transfer in the batch is incoming
    pub fn incoming(&self, asset_transfers: &[DbAssetTransfer], transfers: &[DbTransfer]) -> bool {
        let ids: Vec<i32> = asset_transfers
            .iter()
            .filter(|t| t.batch_transfer_idx == self.idx)
            .map(|t| t.idx)
            .collect();
        transfers
            .iter()
            .filter(|t| ids.contains(&t.asset_transfer_idx))
            .all(|t| t.incoming)
    }

    pub fn asset_transfers(&self, asset_transfers: &[DbAssetTransfer]) -> Vec<DbAssetTransfer> {
        asset_transfers
            .iter()
            .filter(|t| t.batch_transfer_idx == self.idx)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbAssetTransfer {
    pub idx: i32,
    pub user_driven: bool,
    pub batch_transfer_idx: i32,
    /// `None` for receive requests that accept any asset
    pub asset_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTransfer {
    pub idx: i32,
    pub asset_transfer_idx: i32,
    pub amount: u64,
    pub incoming: bool,
    pub recipient_type: Option<RecipientType>,
    pub recipient_id: Option<String>,
    pub ack: Option<bool>,
    pub invoice_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbColoring {
    pub idx: i32,
    pub txo_idx: i32,
    pub asset_transfer_idx: i32,
    pub r#type: ColoringType,
    pub amount: u64,
}

impl DbColoring {
    pub fn incoming(&self) -> bool {
        self.r#type.incoming()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTransportEndpoint {
    pub idx: i32,
    pub transport_type: TransportType,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTransferTransportEndpoint {
    pub idx: i32,
    pub transfer_idx: i32,
    pub transport_endpoint_idx: i32,
    pub used: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbMedia {
    pub idx: i32,
    pub digest: String,
    pub mime: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbToken {
    pub idx: i32,
    pub asset_idx: i32,
    pub index: u32,
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub details: Option<String>,
    pub embedded_media: bool,
    pub reserves: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTokenMedia {
    pub idx: i32,
    pub token_idx: i32,
    pub media_idx: i32,
    /// `None` for the token's primary media, `Some(n)` for attachment n
    pub attachment_id: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbWalletTransaction {
    pub idx: i32,
    pub txid: String,
    pub r#type: WalletTransactionType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbBackupInfo {
    pub idx: i32,
    pub last_backup_timestamp: String,
    pub last_operation_timestamp: String,
}
