//! Enums persisted in the RGB ledger
//!
//! All of them are stored as small integers.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! db_enum {
    ($name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        impl $name {
            pub fn to_db(self) -> i64 {
                self as i64
            }

            pub fn from_db(value: i64) -> Option<Self> {
                match value {
                    $(x if x == $value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.to_db()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_i64()?;
                $name::from_db(raw).ok_or(FromSqlError::OutOfRange(raw))
            }
        }
    };
}

/// Role of an allocation on a TXO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColoringType {
    /// Placeholder for an expected incoming allocation
    Receive = 1,
    Issue = 2,
    /// Allocation spent by an outgoing transfer
    Input = 3,
    Change = 4,
}

db_enum!(ColoringType {
    Receive = 1,
    Issue = 2,
    Input = 3,
    Change = 4,
});

impl ColoringType {
    pub fn incoming(&self) -> bool {
        matches!(
            self,
            ColoringType::Receive | ColoringType::Change | ColoringType::Issue
        )
    }
}

/// The status of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Waiting for the counterparty to take action
    WaitingCounterparty = 1,
    /// Waiting for the transfer transaction to be confirmed
    WaitingConfirmations = 2,
    /// Settled transfer, this status is final
    Settled = 3,
    /// Failed transfer, this status is final
    Failed = 4,
}

db_enum!(TransferStatus {
    WaitingCounterparty = 1,
    WaitingConfirmations = 2,
    Settled = 3,
    Failed = 4,
});

impl TransferStatus {
    pub fn failed(&self) -> bool {
        *self == TransferStatus::Failed
    }

    pub fn pending(&self) -> bool {
        matches!(
            self,
            TransferStatus::WaitingCounterparty | TransferStatus::WaitingConfirmations
        )
    }

    pub fn settled(&self) -> bool {
        *self == TransferStatus::Settled
    }

    pub fn waiting_confirmations(&self) -> bool {
        *self == TransferStatus::WaitingConfirmations
    }

    pub fn waiting_counterparty(&self) -> bool {
        *self == TransferStatus::WaitingCounterparty
    }
}

/// Kind of recipient an incoming transfer was requested with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecipientType {
    /// Blinded UTXO
    Blind = 1,
    /// Witness output (the sender pays to one of our scripts)
    Witness = 2,
}

db_enum!(RecipientType {
    Blind = 1,
    Witness = 2,
});

/// Supported consignment transport types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    JsonRpc = 1,
}

db_enum!(TransportType { JsonRpc = 1 });

/// Wallet transactions not tied to an RGB transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletTransactionType {
    CreateUtxos = 1,
    Drain = 2,
}

db_enum!(WalletTransactionType {
    CreateUtxos = 1,
    Drain = 2,
});

/// RGB asset schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetSchema {
    /// Non-Inflatable Asset (RGB20 interface)
    Nia = 1,
    /// Unique Digital Asset (RGB21 interface)
    Uda = 2,
    /// Collectible Fungible Asset (RGB25 interface)
    Cfa = 3,
}

db_enum!(AssetSchema {
    Nia = 1,
    Uda = 2,
    Cfa = 3,
});

impl AssetSchema {
    pub const ALL: [AssetSchema; 3] = [AssetSchema::Nia, AssetSchema::Uda, AssetSchema::Cfa];
}
