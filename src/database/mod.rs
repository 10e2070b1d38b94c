//! RGB ledger persisted in SQLite
//!
//! Tracks colored TXOs, issued and received assets, batch transfers and the
//! allocations (colorings) they place on TXOs. Balances and allocation
//! statuses are derived from these tables.

pub mod enums;
pub mod models;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Error;
use crate::wallet::{Balance, Outpoint, TransferKind};

pub use enums::{
    AssetSchema, ColoringType, RecipientType, TransferStatus, TransportType,
    WalletTransactionType,
};
pub use models::*;

/// Ledger database file inside the wallet directory
pub const RGB_DB_NAME: &str = "rgb_lib_db.sqlite";

/// Database errors
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Snapshot of the transfer-related tables
#[derive(Debug, Clone, Default)]
pub struct DbData {
    pub batch_transfers: Vec<DbBatchTransfer>,
    pub asset_transfers: Vec<DbAssetTransfer>,
    pub transfers: Vec<DbTransfer>,
    pub colorings: Vec<DbColoring>,
    pub txos: Vec<DbTxo>,
}

/// A TXO with the RGB allocations placed on it
#[derive(Debug, Clone)]
pub struct LocalUnspent {
    pub utxo: DbTxo,
    pub rgb_allocations: Vec<LocalRgbAllocation>,
}

impl LocalUnspent {
    pub fn outpoint(&self) -> Outpoint {
        self.utxo.outpoint()
    }
}

/// An allocation as seen from a TXO
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalRgbAllocation {
    pub asset_id: Option<String>,
    pub amount: u64,
    /// Status of the transfer that produced the allocation
    pub status: TransferStatus,
    pub incoming: bool,
    /// Whether the allocation sits on a spent TXO
    pub txo_spent: bool,
}

impl LocalRgbAllocation {
    pub fn settled(&self) -> bool {
        !self.status.failed()
            && ((!self.txo_spent && self.incoming && self.status.settled())
                || (self.txo_spent && !self.incoming && self.status.waiting_confirmations()))
    }

    pub fn future(&self) -> bool {
        !self.txo_spent && self.incoming && !self.status.failed() && !self.settled()
    }
}

/// Transport endpoint attached to a transfer
#[derive(Debug, Clone)]
pub struct LocalTransportEndpoint {
    pub transport_type: TransportType,
    pub endpoint: String,
    pub used: bool,
}

/// Presentation data derived for a single transfer
#[derive(Debug, Clone)]
pub struct TransferData {
    pub kind: TransferKind,
    pub status: TransferStatus,
    pub batch_transfer_idx: i32,
    pub txid: Option<String>,
    pub receive_utxo: Option<Outpoint>,
    pub change_utxo: Option<Outpoint>,
    pub created_at: i64,
    pub updated_at: i64,
    pub expiration: Option<i64>,
}

fn get_amount(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: String = row.get(idx)?;
    raw.parse::<u64>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn read_txo(row: &Row<'_>) -> rusqlite::Result<DbTxo> {
    Ok(DbTxo {
        idx: row.get(0)?,
        txid: row.get(1)?,
        vout: row.get(2)?,
        btc_amount: get_amount(row, 3)?,
        spent: row.get(4)?,
        exists: row.get(5)?,
    })
}

fn read_asset(row: &Row<'_>) -> rusqlite::Result<DbAsset> {
    Ok(DbAsset {
        idx: row.get(0)?,
        media_idx: row.get(1)?,
        id: row.get(2)?,
        schema: row.get(3)?,
        added_at: row.get(4)?,
        details: row.get(5)?,
        issued_supply: get_amount(row, 6)?,
        name: row.get(7)?,
        precision: row.get(8)?,
        ticker: row.get(9)?,
        timestamp: row.get(10)?,
    })
}

fn read_batch_transfer(row: &Row<'_>) -> rusqlite::Result<DbBatchTransfer> {
    Ok(DbBatchTransfer {
        idx: row.get(0)?,
        txid: row.get(1)?,
        status: row.get(2)?,
        expiration: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        min_confirmations: row.get(6)?,
    })
}

fn read_transfer(row: &Row<'_>) -> rusqlite::Result<DbTransfer> {
    Ok(DbTransfer {
        idx: row.get(0)?,
        asset_transfer_idx: row.get(1)?,
        amount: get_amount(row, 2)?,
        incoming: row.get(3)?,
        recipient_type: row.get(4)?,
        recipient_id: row.get(5)?,
        ack: row.get(6)?,
        invoice_string: row.get(7)?,
    })
}

fn read_coloring(row: &Row<'_>) -> rusqlite::Result<DbColoring> {
    Ok(DbColoring {
        idx: row.get(0)?,
        txo_idx: row.get(1)?,
        asset_transfer_idx: row.get(2)?,
        r#type: row.get(3)?,
        amount: get_amount(row, 4)?,
    })
}

fn read_media(row: &Row<'_>) -> rusqlite::Result<DbMedia> {
    Ok(DbMedia {
        idx: row.get(0)?,
        digest: row.get(1)?,
        mime: row.get(2)?,
    })
}

const TXO_COLUMNS: &str = "idx, txid, vout, btc_amount, spent, exists_";
const ASSET_COLUMNS: &str =
    "idx, media_idx, id, schema, added_at, details, issued_supply, name, precision, ticker, timestamp";
const BATCH_TRANSFER_COLUMNS: &str =
    "idx, txid, status, expiration, created_at, updated_at, min_confirmations";
const TRANSFER_COLUMNS: &str =
    "idx, asset_transfer_idx, amount, incoming, recipient_type, recipient_id, ack, invoice_string";

/// RGB ledger handle
pub struct RgbLibDatabase {
    conn: Connection,
    path: PathBuf,
}

impl RgbLibDatabase {
    /// Open (and create if needed) the ledger inside `wallet_dir`
    pub fn open<P: AsRef<Path>>(wallet_dir: P) -> Result<Self, DatabaseError> {
        let path = wallet_dir.as_ref().join(RGB_DB_NAME);
        log::debug!("Opening RGB database: {}", path.display());

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;

        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside a SQLite transaction
    ///
    /// Every write `f` does through this handle is committed together, or
    /// rolled back when `f` returns an error.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(DatabaseError::from)?;
        let value = f(self)?;
        tx.commit().map_err(DatabaseError::from)?;
        Ok(value)
    }

    fn init_schema(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS txo (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                txid TEXT NOT NULL,
                vout INTEGER NOT NULL,
                btc_amount TEXT NOT NULL,
                spent BOOLEAN NOT NULL,
                exists_ BOOLEAN NOT NULL,
                UNIQUE(txid, vout)
            );
            CREATE TABLE IF NOT EXISTS media (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                digest TEXT NOT NULL UNIQUE,
                mime TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS asset (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                media_idx INTEGER REFERENCES media(idx),
                id TEXT NOT NULL UNIQUE,
                schema INTEGER NOT NULL,
                added_at INTEGER NOT NULL,
                details TEXT,
                issued_supply TEXT NOT NULL,
                name TEXT NOT NULL,
                precision INTEGER NOT NULL,
                ticker TEXT,
                timestamp INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS batch_transfer (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                txid TEXT,
                status INTEGER NOT NULL,
                expiration INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                min_confirmations INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS asset_transfer (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                user_driven BOOLEAN NOT NULL,
                batch_transfer_idx INTEGER NOT NULL
                    REFERENCES batch_transfer(idx) ON DELETE CASCADE,
                asset_id TEXT
            );
            CREATE TABLE IF NOT EXISTS transfer (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                asset_transfer_idx INTEGER NOT NULL
                    REFERENCES asset_transfer(idx) ON DELETE CASCADE,
                amount TEXT NOT NULL,
                incoming BOOLEAN NOT NULL,
                recipient_type INTEGER,
                recipient_id TEXT,
                ack BOOLEAN,
                invoice_string TEXT
            );
            CREATE TABLE IF NOT EXISTS coloring (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                txo_idx INTEGER NOT NULL REFERENCES txo(idx) ON DELETE CASCADE,
                asset_transfer_idx INTEGER NOT NULL
                    REFERENCES asset_transfer(idx) ON DELETE CASCADE,
                type INTEGER NOT NULL,
                amount TEXT NOT NULL,
                UNIQUE(txo_idx, asset_transfer_idx, type)
            );
            CREATE TABLE IF NOT EXISTS transport_endpoint (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                transport_type INTEGER NOT NULL,
                endpoint TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS transfer_transport_endpoint (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                transfer_idx INTEGER NOT NULL REFERENCES transfer(idx) ON DELETE CASCADE,
                transport_endpoint_idx INTEGER NOT NULL REFERENCES transport_endpoint(idx),
                used BOOLEAN NOT NULL,
                UNIQUE(transfer_idx, transport_endpoint_idx)
            );
            CREATE TABLE IF NOT EXISTS token (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                asset_idx INTEGER NOT NULL REFERENCES asset(idx),
                idx_in_contract INTEGER NOT NULL,
                ticker TEXT,
                name TEXT,
                details TEXT,
                embedded_media BOOLEAN NOT NULL,
                reserves BOOLEAN NOT NULL
            );
            CREATE TABLE IF NOT EXISTS token_media (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                token_idx INTEGER NOT NULL REFERENCES token(idx),
                media_idx INTEGER NOT NULL REFERENCES media(idx),
                attachment_id INTEGER
            );
            CREATE TABLE IF NOT EXISTS wallet_transaction (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                txid TEXT NOT NULL,
                type INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS pending_witness_script (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                script TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS backup_info (
                idx INTEGER PRIMARY KEY AUTOINCREMENT,
                last_backup_timestamp TEXT NOT NULL,
                last_operation_timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_coloring_txo ON coloring(txo_idx);
            CREATE INDEX IF NOT EXISTS idx_asset_transfer_batch ON asset_transfer(batch_transfer_idx);",
        )?;
        Ok(())
    }

    fn last_idx(&self) -> i32 {
        self.conn.last_insert_rowid() as i32
    }

    // txo

    pub fn set_txo(&self, txo: &DbTxo) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO txo (txid, vout, btc_amount, spent, exists_) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                txo.txid,
                txo.vout,
                txo.btc_amount.to_string(),
                txo.spent,
                txo.exists
            ],
        )?;
        Ok(self.last_idx())
    }

    pub fn update_txo(&self, txo: &DbTxo) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE txo SET btc_amount = ?1, spent = ?2, exists_ = ?3 WHERE idx = ?4",
            params![txo.btc_amount.to_string(), txo.spent, txo.exists, txo.idx],
        )?;
        Ok(())
    }

    pub fn del_txo(&self, idx: i32) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM txo WHERE idx = ?1", params![idx])?;
        Ok(())
    }

    pub fn get_txo(&self, outpoint: &Outpoint) -> Result<Option<DbTxo>, DatabaseError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM txo WHERE txid = ?1 AND vout = ?2", TXO_COLUMNS),
                params![outpoint.txid, outpoint.vout],
                read_txo,
            )
            .optional()?)
    }

    pub fn iter_txos(&self) -> Result<Vec<DbTxo>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM txo ORDER BY idx", TXO_COLUMNS))?;
        let rows = stmt.query_map([], read_txo)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // asset

    pub fn set_asset(&self, asset: &DbAsset) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO asset (media_idx, id, schema, added_at, details, issued_supply, name,
                precision, ticker, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                asset.media_idx,
                asset.id,
                asset.schema,
                asset.added_at,
                asset.details,
                asset.issued_supply.to_string(),
                asset.name,
                asset.precision,
                asset.ticker,
                asset.timestamp
            ],
        )?;
        Ok(self.last_idx())
    }

    pub fn get_asset(&self, asset_id: &str) -> Result<Option<DbAsset>, DatabaseError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM asset WHERE id = ?1", ASSET_COLUMNS),
                params![asset_id],
                read_asset,
            )
            .optional()?)
    }

    pub fn iter_assets(&self) -> Result<Vec<DbAsset>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM asset ORDER BY idx", ASSET_COLUMNS))?;
        let rows = stmt.query_map([], read_asset)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_asset_ids(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self.iter_assets()?.into_iter().map(|a| a.id).collect())
    }

    pub fn check_asset_exists(&self, asset_id: &str) -> Result<DbAsset, Error> {
        self.get_asset(asset_id)?.ok_or_else(|| Error::AssetNotFound {
            asset_id: asset_id.to_string(),
        })
    }

    // batch transfer

    pub fn set_batch_transfer(&self, bt: &DbBatchTransfer) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO batch_transfer (txid, status, expiration, created_at, updated_at,
                min_confirmations)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                bt.txid,
                bt.status,
                bt.expiration,
                bt.created_at,
                bt.updated_at,
                bt.min_confirmations
            ],
        )?;
        Ok(self.last_idx())
    }

    pub fn update_batch_transfer(&self, bt: &DbBatchTransfer) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE batch_transfer SET txid = ?1, status = ?2, expiration = ?3, updated_at = ?4
             WHERE idx = ?5",
            params![bt.txid, bt.status, bt.expiration, bt.updated_at, bt.idx],
        )?;
        Ok(())
    }

    /// Delete a batch transfer with its asset transfers, transfers and colorings
    pub fn del_batch_transfer(&self, idx: i32) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM batch_transfer WHERE idx = ?1", params![idx])?;
        Ok(())
    }

    pub fn iter_batch_transfers(&self) -> Result<Vec<DbBatchTransfer>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM batch_transfer ORDER BY idx",
            BATCH_TRANSFER_COLUMNS
        ))?;
        let rows = stmt.query_map([], read_batch_transfer)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_batch_transfer_or_fail(
        &self,
        idx: i32,
        batch_transfers: &[DbBatchTransfer],
    ) -> Result<DbBatchTransfer, Error> {
        batch_transfers
            .iter()
            .find(|t| t.idx == idx)
            .cloned()
            .ok_or(Error::BatchTransferNotFound { idx })
    }

    // asset transfer

    pub fn set_asset_transfer(&self, at: &DbAssetTransfer) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO asset_transfer (user_driven, batch_transfer_idx, asset_id)
             VALUES (?1, ?2, ?3)",
            params![at.user_driven, at.batch_transfer_idx, at.asset_id],
        )?;
        Ok(self.last_idx())
    }

    pub fn iter_asset_transfers(&self) -> Result<Vec<DbAssetTransfer>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT idx, user_driven, batch_transfer_idx, asset_id FROM asset_transfer ORDER BY idx",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DbAssetTransfer {
                idx: row.get(0)?,
                user_driven: row.get(1)?,
                batch_transfer_idx: row.get(2)?,
                asset_id: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // transfer

    pub fn set_transfer(&self, transfer: &DbTransfer) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO transfer (asset_transfer_idx, amount, incoming, recipient_type,
                recipient_id, ack, invoice_string)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                transfer.asset_transfer_idx,
                transfer.amount.to_string(),
                transfer.incoming,
                transfer.recipient_type,
                transfer.recipient_id,
                transfer.ack,
                transfer.invoice_string
            ],
        )?;
        Ok(self.last_idx())
    }

    pub fn update_transfer_amount(&self, idx: i32, amount: u64) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE transfer SET amount = ?1 WHERE idx = ?2",
            params![amount.to_string(), idx],
        )?;
        Ok(())
    }

    pub fn iter_transfers(&self) -> Result<Vec<DbTransfer>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM transfer ORDER BY idx", TRANSFER_COLUMNS))?;
        let rows = stmt.query_map([], read_transfer)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // coloring

    pub fn set_coloring(&self, coloring: &DbColoring) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO coloring (txo_idx, asset_transfer_idx, type, amount)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                coloring.txo_idx,
                coloring.asset_transfer_idx,
                coloring.r#type,
                coloring.amount.to_string()
            ],
        )?;
        Ok(self.last_idx())
    }

    pub fn del_coloring(&self, asset_transfer_idx: i32) -> Result<(), DatabaseError> {
        self.conn.execute(
            "DELETE FROM coloring WHERE asset_transfer_idx = ?1",
            params![asset_transfer_idx],
        )?;
        Ok(())
    }

    pub fn iter_colorings(&self) -> Result<Vec<DbColoring>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT idx, txo_idx, asset_transfer_idx, type, amount FROM coloring ORDER BY idx",
        )?;
        let rows = stmt.query_map([], read_coloring)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // transport endpoints

    /// Insert an endpoint, reusing the existing row if already known
    pub fn set_transport_endpoint(
        &self,
        transport_type: TransportType,
        endpoint: &str,
    ) -> Result<i32, DatabaseError> {
        if let Some(existing) = self.get_transport_endpoint(endpoint)? {
            return Ok(existing.idx);
        }
        self.conn.execute(
            "INSERT INTO transport_endpoint (transport_type, endpoint) VALUES (?1, ?2)",
            params![transport_type, endpoint],
        )?;
        Ok(self.last_idx())
    }

    pub fn get_transport_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<Option<DbTransportEndpoint>, DatabaseError> {
        Ok(self
            .conn
            .query_row(
                "SELECT idx, transport_type, endpoint FROM transport_endpoint WHERE endpoint = ?1",
                params![endpoint],
                |row| {
                    Ok(DbTransportEndpoint {
                        idx: row.get(0)?,
                        transport_type: row.get(1)?,
                        endpoint: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn set_transfer_transport_endpoint(
        &self,
        tte: &DbTransferTransportEndpoint,
    ) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO transfer_transport_endpoint (transfer_idx, transport_endpoint_idx, used)
             VALUES (?1, ?2, ?3)",
            params![tte.transfer_idx, tte.transport_endpoint_idx, tte.used],
        )?;
        Ok(self.last_idx())
    }

    pub fn get_transfer_transport_endpoints_data(
        &self,
        transfer_idx: i32,
    ) -> Result<Vec<LocalTransportEndpoint>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT te.transport_type, te.endpoint, tte.used
             FROM transfer_transport_endpoint tte
             JOIN transport_endpoint te ON te.idx = tte.transport_endpoint_idx
             WHERE tte.transfer_idx = ?1
             ORDER BY tte.idx",
        )?;
        let rows = stmt.query_map(params![transfer_idx], |row| {
            Ok(LocalTransportEndpoint {
                transport_type: row.get(0)?,
                endpoint: row.get(1)?,
                used: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // media and tokens

    /// Insert a media entry, reusing the existing row for the same digest
    pub fn set_media(&self, digest: &str, mime: &str) -> Result<i32, DatabaseError> {
        if let Some(existing) = self.get_media_by_digest(digest)? {
            return Ok(existing.idx);
        }
        self.conn.execute(
            "INSERT INTO media (digest, mime) VALUES (?1, ?2)",
            params![digest, mime],
        )?;
        Ok(self.last_idx())
    }

    pub fn get_media_by_digest(&self, digest: &str) -> Result<Option<DbMedia>, DatabaseError> {
        Ok(self
            .conn
            .query_row(
                "SELECT idx, digest, mime FROM media WHERE digest = ?1",
                params![digest],
                read_media,
            )
            .optional()?)
    }

    pub fn iter_media(&self) -> Result<Vec<DbMedia>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT idx, digest, mime FROM media ORDER BY idx")?;
        let rows = stmt.query_map([], read_media)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_token(&self, token: &DbToken) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO token (asset_idx, idx_in_contract, ticker, name, details,
                embedded_media, reserves)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.asset_idx,
                token.index,
                token.ticker,
                token.name,
                token.details,
                token.embedded_media,
                token.reserves
            ],
        )?;
        Ok(self.last_idx())
    }

    pub fn iter_tokens(&self) -> Result<Vec<DbToken>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT idx, asset_idx, idx_in_contract, ticker, name, details, embedded_media,
                reserves
             FROM token ORDER BY idx",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DbToken {
                idx: row.get(0)?,
                asset_idx: row.get(1)?,
                index: row.get(2)?,
                ticker: row.get(3)?,
                name: row.get(4)?,
                details: row.get(5)?,
                embedded_media: row.get(6)?,
                reserves: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_token_media(&self, token_media: &DbTokenMedia) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO token_media (token_idx, media_idx, attachment_id) VALUES (?1, ?2, ?3)",
            params![
                token_media.token_idx,
                token_media.media_idx,
                token_media.attachment_id
            ],
        )?;
        Ok(self.last_idx())
    }

    pub fn iter_token_medias(&self) -> Result<Vec<DbTokenMedia>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT idx, token_idx, media_idx, attachment_id FROM token_media ORDER BY idx",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DbTokenMedia {
                idx: row.get(0)?,
                token_idx: row.get(1)?,
                media_idx: row.get(2)?,
                attachment_id: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // wallet transactions and pending witness scripts

    pub fn set_wallet_transaction(
        &self,
        txid: &str,
        r#type: WalletTransactionType,
    ) -> Result<i32, DatabaseError> {
        self.conn.execute(
            "INSERT INTO wallet_transaction (txid, type) VALUES (?1, ?2)",
            params![txid, r#type],
        )?;
        Ok(self.last_idx())
    }

    pub fn iter_wallet_transactions(&self) -> Result<Vec<DbWalletTransaction>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT idx, txid, type FROM wallet_transaction ORDER BY idx")?;
        let rows = stmt.query_map([], |row| {
            Ok(DbWalletTransaction {
                idx: row.get(0)?,
                txid: row.get(1)?,
                r#type: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_pending_witness_script(&self, script: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO pending_witness_script (script) VALUES (?1)",
            params![script],
        )?;
        Ok(())
    }

    pub fn del_pending_witness_script(&self, script: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "DELETE FROM pending_witness_script WHERE script = ?1",
            params![script],
        )?;
        Ok(())
    }

    pub fn iter_pending_witness_scripts(&self) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT script FROM pending_witness_script ORDER BY idx")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // backup info

    pub fn get_backup_info(&self) -> Result<Option<DbBackupInfo>, DatabaseError> {
        Ok(self
            .conn
            .query_row(
                "SELECT idx, last_backup_timestamp, last_operation_timestamp
                 FROM backup_info ORDER BY idx LIMIT 1",
                [],
                |row| {
                    Ok(DbBackupInfo {
                        idx: row.get(0)?,
                        last_backup_timestamp: row.get(1)?,
                        last_operation_timestamp: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Store the timestamps, creating the single backup_info row if missing
    pub fn upsert_backup_info(
        &self,
        last_backup_timestamp: Option<&str>,
        last_operation_timestamp: &str,
    ) -> Result<(), DatabaseError> {
        match self.get_backup_info()? {
            Some(info) => {
                let backup_ts = last_backup_timestamp.unwrap_or(&info.last_backup_timestamp);
                self.conn.execute(
                    "UPDATE backup_info SET last_backup_timestamp = ?1,
                        last_operation_timestamp = ?2
                     WHERE idx = ?3",
                    params![backup_ts, last_operation_timestamp, info.idx],
                )?;
            }
            None => {
                self.conn.execute(
                    "INSERT INTO backup_info (last_backup_timestamp, last_operation_timestamp)
                     VALUES (?1, ?2)",
                    params![
                        last_backup_timestamp.unwrap_or("0"),
                        last_operation_timestamp
                    ],
                )?;
            }
        }
        Ok(())
    }

    // derived data

    pub fn get_db_data(&self, empty_transfers: bool) -> Result<DbData, DatabaseError> {
        Ok(DbData {
            batch_transfers: self.iter_batch_transfers()?,
            asset_transfers: self.iter_asset_transfers()?,
            transfers: if empty_transfers {
                vec![]
            } else {
                self.iter_transfers()?
            },
            colorings: self.iter_colorings()?,
            txos: self.iter_txos()?,
        })
    }

    pub fn get_unspent_txos(&self, txos: Vec<DbTxo>) -> Result<Vec<DbTxo>, DatabaseError> {
        let txos = if txos.is_empty() {
            self.iter_txos()?
        } else {
            txos
        };
        Ok(txos.into_iter().filter(|t| !t.spent).collect())
    }

    fn utxo_allocations(
        utxo: &DbTxo,
        colorings: &[DbColoring],
        asset_transfers: &[DbAssetTransfer],
        batch_transfers: &[DbBatchTransfer],
    ) -> Result<Vec<LocalRgbAllocation>, DatabaseError> {
        colorings
            .iter()
            .filter(|c| c.txo_idx == utxo.idx)
            .map(|c| {
                let asset_transfer = asset_transfers
                    .iter()
                    .find(|t| t.idx == c.asset_transfer_idx)
                    .ok_or_else(|| {
                        DatabaseError::InvalidData(format!(
                            "coloring {} has no asset transfer",
                            c.idx
                        ))
                    })?;
                let batch_transfer = batch_transfers
                    .iter()
                    .find(|t| t.idx == asset_transfer.batch_transfer_idx)
                    .ok_or_else(|| {
                        DatabaseError::InvalidData(format!(
                            "asset transfer {} has no batch transfer",
                            asset_transfer.idx
                        ))
                    })?;
                Ok(LocalRgbAllocation {
                    asset_id: asset_transfer.asset_id.clone(),
                    amount: c.amount,
                    status: batch_transfer.status,
                    incoming: c.incoming(),
                    txo_spent: utxo.spent,
                })
            })
            .collect()
    }

    /// Attach the allocations placed on each of `utxos`
    pub fn get_rgb_allocations(
        &self,
        utxos: Vec<DbTxo>,
        colorings: Option<Vec<DbColoring>>,
        batch_transfers: Option<Vec<DbBatchTransfer>>,
        asset_transfers: Option<Vec<DbAssetTransfer>>,
    ) -> Result<Vec<LocalUnspent>, DatabaseError> {
        let batch_transfers = match batch_transfers {
            Some(bt) => bt,
            None => self.iter_batch_transfers()?,
        };
        let asset_transfers = match asset_transfers {
            Some(at) => at,
            None => self.iter_asset_transfers()?,
        };
        let colorings = match colorings {
            Some(cs) => cs,
            None => self.iter_colorings()?,
        };

        utxos
            .into_iter()
            .map(|utxo| {
                let rgb_allocations =
                    Self::utxo_allocations(&utxo, &colorings, &asset_transfers, &batch_transfers)?;
                Ok(LocalUnspent {
                    utxo,
                    rgb_allocations,
                })
            })
            .collect()
    }

    /// Settled, future and spendable amounts of an asset
    ///
    /// Future includes pending incoming amounts (witness receives waiting for
    /// confirmations too) minus pending outgoing ones. Spendable excludes
    /// settled amounts sitting on UTXOs that are involved in pending
    /// operations.
    pub fn get_asset_balance(
        &self,
        asset_id: &str,
        data: Option<DbData>,
    ) -> Result<Balance, DatabaseError> {
        let data = match data {
            Some(d) => d,
            None => self.get_db_data(false)?,
        };
        // funded witness outputs are already counted through their coloring
        let colored_asset_transfers: HashSet<i32> =
            data.colorings.iter().map(|c| c.asset_transfer_idx).collect();

        let txos_allocations = self.get_rgb_allocations(
            data.txos,
            Some(data.colorings),
            Some(data.batch_transfers.clone()),
            Some(data.asset_transfers.clone()),
        )?;

        let asset_allocations: Vec<&LocalRgbAllocation> = txos_allocations
            .iter()
            .flat_map(|u| u.rgb_allocations.iter())
            .filter(|a| a.asset_id.as_deref() == Some(asset_id))
            .collect();

        let settled: u64 = asset_allocations
            .iter()
            .filter(|a| a.settled())
            .map(|a| a.amount)
            .sum();

        let mut pending_incoming: u64 = asset_allocations
            .iter()
            .filter(|a| !a.txo_spent && a.incoming && a.status.pending())
            .map(|a| a.amount)
            .sum();

        for transfer in data
            .transfers
            .iter()
            .filter(|t| t.incoming && t.recipient_type == Some(RecipientType::Witness))
        {
            let Some(asset_transfer) = data
                .asset_transfers
                .iter()
                .find(|at| at.idx == transfer.asset_transfer_idx)
            else {
                continue;
            };
            let waiting_confirmations = data
                .batch_transfers
                .iter()
                .find(|bt| bt.idx == asset_transfer.batch_transfer_idx)
                .map(|bt| bt.waiting_confirmations())
                .unwrap_or(false);
            if waiting_confirmations
                && !colored_asset_transfers.contains(&asset_transfer.idx)
                && asset_transfer.asset_id.as_deref() == Some(asset_id)
            {
                pending_incoming += transfer.amount;
            }
        }

        let pending_outgoing: u64 = asset_allocations
            .iter()
            .filter(|a| !a.incoming && a.status.pending())
            .map(|a| a.amount)
            .sum();

        let future = settled as i128 + pending_incoming as i128 - pending_outgoing as i128;

        let unspendable: u64 = txos_allocations
            .iter()
            .filter(|u| {
                (!u.utxo.spent
                    && u.rgb_allocations.iter().any(|a| {
                        (!a.incoming && !a.status.failed()) || (a.incoming && a.status.pending())
                    }))
                    || (u.utxo.spent
                        && u.rgb_allocations
                            .iter()
                            .any(|a| !a.incoming && a.status.waiting_confirmations()))
            })
            .map(|u| {
                u.rgb_allocations
                    .iter()
                    .filter(|a| a.asset_id.as_deref() == Some(asset_id) && a.settled())
                    .map(|a| a.amount)
                    .sum::<u64>()
            })
            .sum();

        Ok(Balance {
            settled,
            future: future.max(0) as u64,
            spendable: settled.saturating_sub(unspendable),
        })
    }

    /// Classify a transfer and locate its receive or change UTXO
    pub fn get_transfer_data(
        &self,
        transfer: &DbTransfer,
        asset_transfer: &DbAssetTransfer,
        batch_transfer: &DbBatchTransfer,
        txos: &[DbTxo],
        colorings: &[DbColoring],
    ) -> Result<TransferData, DatabaseError> {
        let transfer_colorings: Vec<&DbColoring> = colorings
            .iter()
            .filter(|c| c.asset_transfer_idx == asset_transfer.idx)
            .collect();

        let received: u64 = transfer_colorings
            .iter()
            .filter(|c| c.incoming())
            .map(|c| c.amount)
            .sum();
        let sent: u64 = transfer_colorings
            .iter()
            .filter(|c| !c.incoming())
            .map(|c| c.amount)
            .sum();

        let incoming = if received == 0 && sent == 0 {
            true
        } else {
            received > sent
        };

        let kind = if incoming {
            if !transfer_colorings.is_empty()
                && transfer_colorings
                    .iter()
                    .all(|c| c.r#type == ColoringType::Issue)
            {
                TransferKind::Issuance
            } else {
                match transfer.recipient_type {
                    Some(RecipientType::Witness) => TransferKind::ReceiveWitness,
                    Some(RecipientType::Blind) => TransferKind::ReceiveBlind,
                    None => {
                        return Err(DatabaseError::InvalidData(format!(
                            "incoming transfer {} has no recipient type",
                            transfer.idx
                        )))
                    }
                }
            }
        } else {
            TransferKind::Send
        };

        let utxo_for = |coloring_type: ColoringType| -> Option<Outpoint> {
            transfer_colorings
                .iter()
                .filter(|c| c.r#type == coloring_type)
                .find_map(|c| txos.iter().find(|t| t.idx == c.txo_idx))
                .map(|t| t.outpoint())
        };

        let (receive_utxo, change_utxo) = match kind {
            TransferKind::ReceiveBlind | TransferKind::ReceiveWitness => {
                (utxo_for(ColoringType::Receive), None)
            }
            TransferKind::Send => (None, utxo_for(ColoringType::Change)),
            TransferKind::Issuance => (None, None),
        };

        Ok(TransferData {
            kind,
            status: batch_transfer.status,
            batch_transfer_idx: batch_transfer.idx,
            txid: batch_transfer.txid.clone(),
            receive_utxo,
            change_utxo,
            created_at: batch_transfer.created_at,
            updated_at: batch_transfer.updated_at,
            expiration: batch_transfer.expiration,
        })
    }
}
