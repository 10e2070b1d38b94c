//! Wallet operations that talk to the indexer
//!
//! Every operation takes the [`Online`] object returned by
//! [`Wallet::go_online`] and checks it matches the wallet's indexer
//! connection. Transaction-building operations come in `_begin`/`_end`
//! pairs so the PSBT can be signed elsewhere.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

use bdk_wallet::bitcoin::address::NetworkUnchecked;
use bdk_wallet::bitcoin::{Address, OutPoint as BdkOutPoint, Psbt, ScriptBuf, Transaction, Txid};
use bdk_wallet::KeychainKind;

use crate::bitcoin::{
    build_drain_psbt, build_send_psbt, build_split_psbt, extract_tx, full_scan_wallet,
    sync_wallet, FeeRateConfig, Indexer, NetworkError, UtxoError,
};
use crate::database::{
    AssetSchema, ColoringType, DbAsset, DbAssetTransfer, DbBatchTransfer, DbColoring, DbToken,
    DbTokenMedia, DbTransfer, DbTxo, RecipientType, RgbLibDatabase, TransferStatus,
    WalletTransactionType,
};
use crate::error::Error;
use crate::rgb::{
    blind_seal, contract_exists, remove_contract, save_contract, validate_details, validate_name,
    validate_precision, validate_ticker, witness_recipient_id, Genesis, GenesisAllocation,
    GenesisMedia, GenesisToken, Invoice, Media, StoredMedia,
};
use crate::wallet::{
    now, AssetCFA, AssetNIA, AssetUDA, Online, OnlineData, Outpoint, RefreshFilter,
    RefreshTransferStatus, RefreshedTransfer, Wallet, MAX_ATTACHMENTS, MAX_BLOCK_ESTIMATION,
    MIN_BLOCK_ESTIMATION, MIN_FEE_RATE, STOP_GAP, UTXO_NUM, UTXO_SIZE,
};

const MIN_RELAY_FEE_NOT_MET: &str = "min relay fee not met";
const MAX_FEE_EXCEEDED: [&str; 2] = ["max-fee-exceeded", "absurdly-high-fee"];

/// Contracts and media files written by an issuance
///
/// Dropping the guard removes them unless [`NewFiles::keep`] was called.
struct NewFiles {
    contracts_dir: PathBuf,
    contracts: Vec<String>,
    media: Vec<PathBuf>,
    keep: bool,
}

impl NewFiles {
    fn new(contracts_dir: PathBuf) -> Self {
        Self {
            contracts_dir,
            contracts: vec![],
            media: vec![],
            keep: false,
        }
    }

    fn store_media(&mut self, file_path: &str, media_dir: &std::path::Path) -> Result<Media, Error> {
        let StoredMedia { media, created } = Media::store(file_path, media_dir)?;
        self.media.extend(created);
        Ok(media)
    }

    fn save_contract(&mut self, genesis: &Genesis) -> Result<String, Error> {
        let asset_id = save_contract(&self.contracts_dir, genesis)?;
        self.contracts.push(asset_id.clone());
        Ok(asset_id)
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for NewFiles {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for asset_id in &self.contracts {
            remove_contract(&self.contracts_dir, asset_id);
        }
        for path in &self.media {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Could not remove media {}: {}", path.display(), e);
            }
        }
    }
}

impl Wallet {
    fn online_data(&self) -> Result<&OnlineData, Error> {
        self.online_data.as_ref().ok_or(Error::Offline)
    }

    /// Check that `online` belongs to this wallet's indexer connection
    pub fn check_online(&self, online: Online) -> Result<(), Error> {
        let online_data = self.online_data()?;
        if online_data.id != online.id || online_data.indexer_url != online.indexer_url {
            log::error!("Cannot change online object");
            return Err(Error::CannotChangeOnline);
        }
        Ok(())
    }

    pub(crate) fn sync_if_requested(
        &mut self,
        online: Option<Online>,
        skip_sync: bool,
    ) -> Result<(), Error> {
        if !skip_sync {
            let online = online.ok_or(Error::OnlineNeeded)?;
            self.check_online(online)?;
            self.sync_db_txos(false)?;
        }
        Ok(())
    }

    fn check_fee_rate(&self, fee_rate: u64) -> Result<FeeRateConfig, Error> {
        if fee_rate < MIN_FEE_RATE {
            return Err(Error::InvalidFeeRate {
                details: format!("value under minimum {}", MIN_FEE_RATE),
            });
        }
        Ok(FeeRateConfig::new(fee_rate as f64)?)
    }

    fn parse_address(&self, address: &str) -> Result<ScriptBuf, Error> {
        let network = self.wallet_data.bitcoin_network;
        let address = Address::<NetworkUnchecked>::from_str(address)
            .map_err(|e| Error::InvalidAddress {
                details: e.to_string(),
            })?
            .require_network(network.into())
            .map_err(|e| Error::InvalidAddress {
                details: e.to_string(),
            })?;
        Ok(address.script_pubkey())
    }

    fn parse_psbt(psbt: &str) -> Result<Psbt, Error> {
        Psbt::from_str(psbt).map_err(|e| Error::InvalidPsbt {
            details: e.to_string(),
        })
    }

    /// Outpoints of every TXO in the ledger, kept away from plain bitcoin spends
    fn colored_outpoints(&self) -> Result<Vec<BdkOutPoint>, Error> {
        self.database
            .iter_txos()?
            .iter()
            .map(|t| BdkOutPoint::try_from(&t.outpoint()))
            .collect()
    }

    /// Sync BDK and bring the `txo` table up to date with colored UTXOs
    pub(crate) fn sync_db_txos(&mut self, full_scan: bool) -> Result<(), Error> {
        log::debug!("Syncing TXOs (full scan: {})...", full_scan);
        let online_data = self.online_data.as_ref().ok_or(Error::Offline)?;
        if full_scan {
            full_scan_wallet(&mut self.bdk_wallet, &online_data.indexer, STOP_GAP)?;
        } else {
            sync_wallet(&mut self.bdk_wallet, &online_data.indexer)?;
        }

        let db_txos = self.database.iter_txos()?;
        let pending_scripts = self.database.iter_pending_witness_scripts()?;
        for utxo in self.bdk_wallet.unspents(KeychainKind::External) {
            let outpoint = Outpoint::from(utxo.outpoint);
            match db_txos.iter().find(|t| t.outpoint() == outpoint) {
                Some(txo) if !txo.exists => {
                    let mut txo = txo.clone();
                    txo.exists = true;
                    self.database.update_txo(&txo)?;
                }
                Some(_) => {}
                None => {
                    self.database.set_txo(&DbTxo {
                        idx: 0,
                        txid: outpoint.txid.clone(),
                        vout: outpoint.vout,
                        btc_amount: utxo.txout.value.to_sat(),
                        spent: false,
                        exists: true,
                    })?;
                    log::debug!("New colored UTXO {}", outpoint);
                }
            }

            let script = hex::encode(utxo.txout.script_pubkey.as_bytes());
            if pending_scripts.contains(&script) {
                let txo = self
                    .database
                    .get_txo(&outpoint)?
                    .ok_or_else(|| Error::internal(format!("missing TXO {}", outpoint)))?;
                let recipient_id = witness_recipient_id(
                    &utxo.txout.script_pubkey,
                    self.wallet_data.bitcoin_network,
                )?;
                self.database.transaction(|db| {
                    Self::fund_witness_receive(db, &recipient_id, &txo)?;
                    db.del_pending_witness_script(&script)?;
                    Ok::<_, Error>(())
                })?;
            }
        }
        Ok(())
    }

    /// Attach a funded witness output to the receive waiting for it
    ///
    /// The receive moves to WaitingConfirmations with the funding txid, and
    /// the requested amount is colored on the new TXO. Receives that are no
    /// longer waiting for the counterparty are left alone.
    fn fund_witness_receive(
        db: &RgbLibDatabase,
        recipient_id: &str,
        txo: &DbTxo,
    ) -> Result<(), Error> {
        let db_data = db.get_db_data(false)?;
        let Some(transfer) = db_data.transfers.iter().find(|t| {
            t.incoming
                && t.recipient_type == Some(RecipientType::Witness)
                && t.recipient_id.as_deref() == Some(recipient_id)
        }) else {
            log::warn!("No transfer for funded recipient {}", recipient_id);
            return Ok(());
        };
        let asset_transfer = db_data
            .asset_transfers
            .iter()
            .find(|at| at.idx == transfer.asset_transfer_idx)
            .ok_or_else(|| Error::internal("transfer without asset transfer"))?;
        let batch_transfer = db
            .get_batch_transfer_or_fail(asset_transfer.batch_transfer_idx, &db_data.batch_transfers)?;
        if !batch_transfer.waiting_counterparty() {
            log::debug!(
                "Batch transfer {} is {:?}, not funding it",
                batch_transfer.idx,
                batch_transfer.status
            );
            return Ok(());
        }

        let amount = match &transfer.invoice_string {
            Some(invoice) => Invoice::new(invoice.clone())?.invoice_data().amount.unwrap_or(0),
            None => 0,
        };
        db.set_coloring(&DbColoring {
            idx: 0,
            txo_idx: txo.idx,
            asset_transfer_idx: asset_transfer.idx,
            r#type: ColoringType::Receive,
            amount,
        })?;
        db.update_transfer_amount(transfer.idx, amount)?;

        let mut updated = batch_transfer.clone();
        updated.txid = Some(txo.txid.clone());
        updated.status = TransferStatus::WaitingConfirmations;
        updated.updated_at = now();
        db.update_batch_transfer(&updated)?;
        log::info!(
            "Witness receive {} funded by {}",
            batch_transfer.idx,
            txo.outpoint()
        );
        Ok(())
    }

    /// Broadcast a signed PSBT and mark the colored TXOs it spends
    fn broadcast_psbt(&mut self, signed_psbt: Psbt, skip_sync: bool) -> Result<Transaction, Error> {
        let tx = extract_tx(signed_psbt).map_err(|e| Error::InvalidPsbt {
            details: e.to_string(),
        })?;
        let txid = tx.compute_txid().to_string();

        self.online_data()?.indexer.broadcast(&tx).map_err(|e| {
            let details = e.to_string();
            log::error!("Broadcast of {} failed: {}", txid, details);
            if details.contains(MIN_RELAY_FEE_NOT_MET) {
                Error::MinFeeNotMet { txid: txid.clone() }
            } else if MAX_FEE_EXCEEDED.iter().any(|m| details.contains(m)) {
                Error::MaxFeeExceeded { txid: txid.clone() }
            } else {
                Error::FailedBroadcast { details }
            }
        })?;
        log::debug!("Broadcasted TX {}", txid);

        self.bdk_wallet
            .inner_mut()
            .apply_unconfirmed_txs([(tx.clone(), now() as u64)]);
        self.bdk_wallet.persist()?;

        let db_txos = self.database.iter_txos()?;
        for input in &tx.input {
            let outpoint = Outpoint::from(input.previous_output);
            if let Some(txo) = db_txos.iter().find(|t| t.outpoint() == outpoint) {
                let mut txo = txo.clone();
                txo.spent = true;
                self.database.update_txo(&txo)?;
            }
        }

        if !skip_sync {
            self.sync_db_txos(false)?;
        }
        Ok(tx)
    }

    fn check_consistency(&mut self) -> Result<(), Error> {
        log::info!("Doing a consistency check...");
        self.sync_db_txos(true)?;

        let bdk_utxos: HashSet<Outpoint> = self
            .bdk_wallet
            .inner()
            .list_unspent()
            .map(|u| Outpoint::from(u.outpoint))
            .collect();
        let missing: Vec<String> = self
            .database
            .iter_txos()?
            .into_iter()
            .filter(|t| !t.spent && t.exists && !bdk_utxos.contains(&t.outpoint()))
            .map(|t| t.outpoint().to_string())
            .collect();
        if !missing.is_empty() {
            log::error!("Unspent TXOs missing from BDK: {:?}", missing);
            return Err(Error::Inconsistency {
                details: format!("spent bitcoins with another wallet: {}", missing.join(", ")),
            });
        }

        let contracts_dir = self.contracts_dir();
        for asset_id in self.database.get_asset_ids()? {
            if !contract_exists(&contracts_dir, &asset_id) {
                return Err(Error::Inconsistency {
                    details: format!("missing contract for asset {}", asset_id),
                });
            }
        }

        let media_dir = self.get_media_dir();
        for media in self.database.iter_media()? {
            if !media_dir.join(&media.digest).exists() {
                return Err(Error::Inconsistency {
                    details: format!("missing media file {}", media.digest),
                });
            }
        }

        log::info!("Consistency check completed");
        Ok(())
    }

    /// Connect the wallet to an indexer
    ///
    /// `tcp://` and `ssl://` URLs select an Electrum server, `http://` and
    /// `https://` an Esplora one.
    /// The returned [`Online`] object must be passed to online operations.
    /// Calling this again with the same URL returns the same object.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let online = wallet.go_online(false, "http://localhost:3002".to_string())?;
    /// wallet.sync(online)?;
    /// ```
    pub fn go_online(
        &mut self,
        skip_consistency_check: bool,
        indexer_url: String,
    ) -> Result<Online, Error> {
        log::info!("Going online with indexer {}...", indexer_url);

        let online = match &self.online_data {
            Some(online_data) if online_data.indexer_url == indexer_url => Online {
                id: online_data.id,
                indexer_url,
            },
            _ => {
                let indexer = Indexer::new(&indexer_url, self.wallet_data.bitcoin_network)
                    .map_err(|e| Error::InvalidIndexer {
                        details: e.to_string(),
                    })?;
                if !indexer.is_available().unwrap_or(false) {
                    return Err(Error::InvalidIndexer {
                        details: format!("indexer at {} is not reachable", indexer_url),
                    });
                }
                let id = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
                self.online_data = Some(OnlineData {
                    id,
                    indexer_url: indexer_url.clone(),
                    indexer,
                });
                Online { id, indexer_url }
            }
        };

        if !skip_consistency_check {
            self.check_consistency()?;
        }

        log::info!("Go online completed");
        Ok(online)
    }

    /// Sync the wallet with the indexer
    pub fn sync(&mut self, online: Online) -> Result<(), Error> {
        log::info!("Syncing...");
        self.check_online(online)?;
        self.sync_db_txos(false)?;
        self.update_backup_info(false)?;
        log::info!("Sync completed");
        Ok(())
    }

    /// Create new colored UTXOs, signing with the wallet keys
    ///
    /// Returns the number of UTXOs created.
    pub fn create_utxos(
        &mut self,
        online: Online,
        up_to: bool,
        num: Option<u8>,
        size: Option<u32>,
        fee_rate: u64,
        skip_sync: bool,
    ) -> Result<u8, Error> {
        log::info!("Creating UTXOs...");
        let unsigned_psbt =
            self.create_utxos_begin(online.clone(), up_to, num, size, fee_rate, skip_sync)?;
        let signed_psbt = self.sign_psbt(unsigned_psbt)?;
        self.create_utxos_end(online, signed_psbt, skip_sync)
    }

    /// Prepare a PSBT splitting vanilla funds into colored UTXOs
    ///
    /// # Arguments
    ///
    /// * `up_to` - Count already allocatable UTXOs towards `num`
    /// * `num` - UTXOs to create, default 5
    /// * `size` - Size of each UTXO in sats, default 1000
    /// * `fee_rate` - Fee rate in sat/vB
    pub fn create_utxos_begin(
        &mut self,
        online: Online,
        up_to: bool,
        num: Option<u8>,
        size: Option<u32>,
        fee_rate: u64,
        skip_sync: bool,
    ) -> Result<String, Error> {
        log::info!("Creating UTXOs (begin)...");
        self.check_online(online)?;
        let fee_rate = self.check_fee_rate(fee_rate)?;
        if !skip_sync {
            self.sync_db_txos(false)?;
        }

        let mut num = num.unwrap_or(UTXO_NUM);
        if up_to {
            let unspents = self.database.get_rgb_allocations(
                self.database.get_unspent_txos(vec![])?,
                None,
                None,
                None,
            )?;
            let allocatable = self.get_available_allocations(unspents, &[], None).len();
            if allocatable >= num as usize {
                return Err(Error::AllocationsAlreadyAvailable);
            }
            num -= allocatable as u8;
        }

        let size = size.unwrap_or(UTXO_SIZE) as u64;
        if size == 0 {
            return Err(Error::InvalidAmountZero);
        }

        let inputs: Vec<BdkOutPoint> = self
            .bdk_wallet
            .unspents(KeychainKind::Internal)
            .iter()
            .map(|u| u.outpoint)
            .collect();
        let available = self.bdk_wallet.vanilla_funds();
        let mut needed = size * num as u64;
        let count = (num as u64).min(available / size) as usize;
        log::debug!("Will try to create {} UTXOs of {} sats", count, size);

        let mut scripts = Vec::with_capacity(count);
        for _ in 0..count {
            scripts.push(self.bdk_wallet.new_colored_address()?.script_pubkey());
        }

        let mut available = available;
        while !scripts.is_empty() {
            match build_split_psbt(&mut self.bdk_wallet, &inputs, &scripts, size, &fee_rate) {
                Ok(psbt) => {
                    log::info!("Create UTXOs (begin) completed");
                    return Ok(psbt.to_string());
                }
                Err(UtxoError::InsufficientFunds {
                    needed: n,
                    available: a,
                }) => {
                    needed = n;
                    available = a;
                    scripts.pop();
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::warn!("Insufficient funds to create UTXOs");
        Err(Error::InsufficientBitcoins { needed, available })
    }

    /// Broadcast a signed UTXO creation PSBT
    ///
    /// Returns the number of colored UTXOs created, 0 when `skip_sync` is set.
    pub fn create_utxos_end(
        &mut self,
        online: Online,
        signed_psbt: String,
        skip_sync: bool,
    ) -> Result<u8, Error> {
        log::info!("Creating UTXOs (end)...");
        self.check_online(online)?;
        let psbt = Self::parse_psbt(&signed_psbt)?;
        let tx = self.broadcast_psbt(psbt, skip_sync)?;
        let txid = tx.compute_txid();
        self.database
            .set_wallet_transaction(&txid.to_string(), WalletTransactionType::CreateUtxos)?;

        let num_utxos_created = if skip_sync {
            0
        } else {
            self.bdk_wallet
                .unspents(KeychainKind::External)
                .iter()
                .filter(|u| u.outpoint.txid == txid)
                .count() as u8
        };

        self.update_backup_info(false)?;
        log::info!("Create UTXOs completed ({} created)", num_utxos_created);
        Ok(num_utxos_created)
    }

    /// Estimated fee rate (sat/vB) to confirm within `blocks` blocks
    pub fn get_fee_estimation(&self, online: Online, blocks: u16) -> Result<f64, Error> {
        self.check_online(online)?;
        if !(MIN_BLOCK_ESTIMATION..=MAX_BLOCK_ESTIMATION).contains(&blocks) {
            return Err(Error::InvalidEstimationBlocks);
        }
        match self.online_data()?.indexer.fee_estimation(blocks) {
            Err(NetworkError::CannotEstimateFees) => Err(Error::CannotEstimateFees),
            res => Ok(res?),
        }
    }

    fn issued_supply(amounts: &[u64]) -> Result<u64, Error> {
        if amounts.is_empty() {
            return Err(Error::NoIssuanceAmounts);
        }
        if amounts.contains(&0) {
            return Err(Error::InvalidAmountZero);
        }
        amounts
            .iter()
            .try_fold(0u64, |acc, a| acc.checked_add(*a))
            .ok_or(Error::TooHighIssuanceAmounts)
    }

    /// One distinct UTXO per amount, with the genesis allocation placed on it
    fn issue_allocations(
        &self,
        amounts: &[u64],
    ) -> Result<(Vec<(DbTxo, u64)>, Vec<GenesisAllocation>), Error> {
        let unspents = self.receivable_unspents()?;
        let mut utxos = Vec::with_capacity(amounts.len());
        let mut allocations = Vec::with_capacity(amounts.len());
        let mut exclude = vec![];
        for amount in amounts {
            let utxo = self.get_utxo(&exclude, Some(unspents.clone()), false)?;
            exclude.push(utxo.outpoint());
            allocations.push(GenesisAllocation::new(
                blind_seal(&utxo.txid, utxo.vout)?,
                *amount,
            ));
            utxos.push((utxo, *amount));
        }
        Ok((utxos, allocations))
    }

    /// Write a freshly issued asset and its settled issuance transfer
    fn store_issuance(
        db: &RgbLibDatabase,
        asset: &DbAsset,
        utxos: &[(DbTxo, u64)],
    ) -> Result<i32, Error> {
        let asset_idx = db.set_asset(asset)?;
        let created_at = now();
        let batch_transfer_idx = db.set_batch_transfer(&DbBatchTransfer {
            idx: 0,
            txid: None,
            status: TransferStatus::Settled,
            expiration: None,
            created_at,
            updated_at: created_at,
            min_confirmations: 0,
        })?;
        let asset_transfer_idx = db.set_asset_transfer(&DbAssetTransfer {
            idx: 0,
            user_driven: true,
            batch_transfer_idx,
            asset_id: Some(asset.id.clone()),
        })?;
        db.set_transfer(&DbTransfer {
            idx: 0,
            asset_transfer_idx,
            amount: asset.issued_supply,
            incoming: true,
            recipient_type: None,
            recipient_id: None,
            ack: None,
            invoice_string: None,
        })?;
        for (utxo, amount) in utxos {
            db.set_coloring(&DbColoring {
                idx: 0,
                txo_idx: utxo.idx,
                asset_transfer_idx,
                r#type: ColoringType::Issue,
                amount: *amount,
            })?;
        }
        Ok(asset_idx)
    }

    #[allow(clippy::too_many_arguments)]
    fn new_genesis(
        &self,
        schema: AssetSchema,
        ticker: Option<String>,
        name: String,
        details: Option<String>,
        precision: u8,
        issued_supply: u64,
        allocations: Vec<GenesisAllocation>,
        media: Option<GenesisMedia>,
        token: Option<GenesisToken>,
    ) -> Genesis {
        Genesis {
            schema,
            ticker,
            name,
            details,
            precision,
            issued_supply,
            timestamp: now(),
            network: self.wallet_data.bitcoin_network,
            allocations,
            media,
            token,
        }
    }

    fn db_asset(genesis: &Genesis, asset_id: &str, media_idx: Option<i32>) -> DbAsset {
        DbAsset {
            idx: 0,
            media_idx,
            id: asset_id.to_string(),
            schema: genesis.schema,
            added_at: genesis.timestamp,
            details: genesis.details.clone(),
            issued_supply: genesis.issued_supply,
            name: genesis.name.clone(),
            precision: genesis.precision,
            ticker: genesis.ticker.clone(),
            timestamp: genesis.timestamp,
        }
    }

    /// Issue a Non-Inflatable Asset
    ///
    /// Each amount is allocated to a different UTXO.
    pub fn issue_asset_nia(
        &mut self,
        online: Online,
        ticker: String,
        name: String,
        precision: u8,
        amounts: Vec<u64>,
    ) -> Result<AssetNIA, Error> {
        log::info!("Issuing NIA asset {}...", ticker);
        self.check_online(online)?;
        validate_ticker(&ticker)?;
        validate_name(&name)?;
        validate_precision(precision)?;
        let issued_supply = Self::issued_supply(&amounts)?;

        let (utxos, allocations) = self.issue_allocations(&amounts)?;
        let genesis = self.new_genesis(
            AssetSchema::Nia,
            Some(ticker),
            name,
            None,
            precision,
            issued_supply,
            allocations,
            None,
            None,
        );
        let mut new_files = NewFiles::new(self.contracts_dir());
        let asset_id = new_files.save_contract(&genesis)?;
        let asset = Self::db_asset(&genesis, &asset_id, None);
        self.database
            .transaction(|db| Self::store_issuance(db, &asset, &utxos))?;
        new_files.keep();
        self.update_backup_info(false)?;

        let db_data = self.database.get_db_data(false)?;
        let asset = self.asset_nia(&asset, &db_data, &[])?;
        log::info!("Issue asset NIA completed: {}", asset_id);
        Ok(asset)
    }

    /// Issue a Collectible Fungible Asset, optionally with a media file
    pub fn issue_asset_cfa(
        &mut self,
        online: Online,
        name: String,
        details: Option<String>,
        precision: u8,
        amounts: Vec<u64>,
        file_path: Option<String>,
    ) -> Result<AssetCFA, Error> {
        log::info!("Issuing CFA asset {}...", name);
        self.check_online(online)?;
        validate_name(&name)?;
        validate_details(details.as_deref())?;
        validate_precision(precision)?;
        let issued_supply = Self::issued_supply(&amounts)?;

        let mut new_files = NewFiles::new(self.contracts_dir());
        let media = file_path
            .map(|p| new_files.store_media(&p, &self.get_media_dir()))
            .transpose()?;
        let (utxos, allocations) = self.issue_allocations(&amounts)?;
        let genesis = self.new_genesis(
            AssetSchema::Cfa,
            None,
            name,
            details,
            precision,
            issued_supply,
            allocations,
            media.as_ref().map(GenesisMedia::from),
            None,
        );
        let asset_id = new_files.save_contract(&genesis)?;
        let asset = self.database.transaction(|db| {
            let media_idx = media
                .as_ref()
                .map(|m| db.set_media(&m.digest, &m.mime))
                .transpose()?;
            let asset = Self::db_asset(&genesis, &asset_id, media_idx);
            Self::store_issuance(db, &asset, &utxos)?;
            Ok::<_, Error>(asset)
        })?;
        new_files.keep();
        self.update_backup_info(false)?;

        let db_data = self.database.get_db_data(false)?;
        let asset = self.asset_cfa(&asset, &db_data, &self.database.iter_media()?)?;
        log::info!("Issue asset CFA completed: {}", asset_id);
        Ok(asset)
    }

    /// Issue a Unique Digital Asset
    ///
    /// The supply is a single token (index 0) with an optional media file and
    /// up to 20 attachments.
    #[allow(clippy::too_many_arguments)]
    pub fn issue_asset_uda(
        &mut self,
        online: Online,
        ticker: String,
        name: String,
        details: Option<String>,
        precision: u8,
        media_file_path: Option<String>,
        attachments_file_paths: Vec<String>,
    ) -> Result<AssetUDA, Error> {
        log::info!("Issuing UDA asset {}...", ticker);
        self.check_online(online)?;
        validate_ticker(&ticker)?;
        validate_name(&name)?;
        validate_details(details.as_deref())?;
        validate_precision(precision)?;
        if attachments_file_paths.len() > MAX_ATTACHMENTS {
            return Err(Error::TooManyAttachments {
                max: MAX_ATTACHMENTS,
            });
        }
        let amounts = [1];
        let issued_supply = Self::issued_supply(&amounts)?;

        let media_dir = self.get_media_dir();
        let mut new_files = NewFiles::new(self.contracts_dir());
        let media = media_file_path
            .map(|p| new_files.store_media(&p, &media_dir))
            .transpose()?;
        let mut attachments = BTreeMap::new();
        for (id, path) in attachments_file_paths.iter().enumerate() {
            attachments.insert(id as u8, new_files.store_media(path, &media_dir)?);
        }

        let (utxos, allocations) = self.issue_allocations(&amounts)?;
        let token = GenesisToken {
            index: 0,
            ticker: Some(ticker.clone()),
            name: Some(name.clone()),
            details: details.clone(),
            media: media.as_ref().map(GenesisMedia::from),
            attachments: attachments
                .iter()
                .map(|(id, m)| (*id, GenesisMedia::from(m)))
                .collect(),
        };
        let genesis = self.new_genesis(
            AssetSchema::Uda,
            Some(ticker),
            name,
            details,
            precision,
            issued_supply,
            allocations,
            None,
            Some(token),
        );
        let asset_id = new_files.save_contract(&genesis)?;
        let asset = Self::db_asset(&genesis, &asset_id, None);
        let asset_idx = self.database.transaction(|db| {
            let asset_idx = Self::store_issuance(db, &asset, &utxos)?;
            let token_idx = db.set_token(&DbToken {
                idx: 0,
                asset_idx,
                index: 0,
                ticker: genesis.ticker.clone(),
                name: Some(genesis.name.clone()),
                details: genesis.details.clone(),
                embedded_media: false,
                reserves: false,
            })?;
            let token_medias = media
                .iter()
                .map(|m| (None, m))
                .chain(attachments.iter().map(|(id, m)| (Some(*id), m)));
            for (attachment_id, m) in token_medias {
                let media_idx = db.set_media(&m.digest, &m.mime)?;
                db.set_token_media(&DbTokenMedia {
                    idx: 0,
                    token_idx,
                    media_idx,
                    attachment_id,
                })?;
            }
            Ok::<_, Error>(asset_idx)
        })?;
        new_files.keep();
        self.update_backup_info(false)?;

        let db_data = self.database.get_db_data(false)?;
        let mut asset = asset;
        asset.idx = asset_idx;
        let asset = self.asset_uda(
            &asset,
            &db_data,
            &self.database.iter_tokens()?,
            &self.database.iter_token_medias()?,
            &self.database.iter_media()?,
        )?;
        log::info!("Issue asset UDA completed: {}", asset_id);
        Ok(asset)
    }

    /// Send bitcoins from the vanilla keychain, signing with the wallet keys
    pub fn send_btc(
        &mut self,
        online: Online,
        address: String,
        amount: u64,
        fee_rate: u64,
        skip_sync: bool,
    ) -> Result<String, Error> {
        log::info!("Sending BTC...");
        let unsigned_psbt =
            self.send_btc_begin(online.clone(), address, amount, fee_rate, skip_sync)?;
        let signed_psbt = self.sign_psbt(unsigned_psbt)?;
        self.send_btc_end(online, signed_psbt, skip_sync)
    }

    /// Prepare a PSBT sending `amount` sats to `address`
    ///
    /// Colored UTXOs are never used as inputs.
    pub fn send_btc_begin(
        &mut self,
        online: Online,
        address: String,
        amount: u64,
        fee_rate: u64,
        skip_sync: bool,
    ) -> Result<String, Error> {
        log::info!("Sending BTC (begin) to {}...", address);
        self.check_online(online)?;
        let fee_rate = self.check_fee_rate(fee_rate)?;
        if !skip_sync {
            self.sync_db_txos(false)?;
        }
        if amount == 0 {
            return Err(Error::InvalidAmountZero);
        }

        let script_pubkey = self.parse_address(&address)?;
        let unspendable = self.colored_outpoints()?;
        let psbt = build_send_psbt(
            &mut self.bdk_wallet,
            script_pubkey,
            amount,
            &fee_rate,
            &unspendable,
        )?;
        log::info!("Send BTC (begin) completed");
        Ok(psbt.to_string())
    }

    /// Broadcast a signed send PSBT, returning its txid
    pub fn send_btc_end(
        &mut self,
        online: Online,
        signed_psbt: String,
        skip_sync: bool,
    ) -> Result<String, Error> {
        log::info!("Sending BTC (end)...");
        self.check_online(online)?;
        let psbt = Self::parse_psbt(&signed_psbt)?;
        let tx = self.broadcast_psbt(psbt, skip_sync)?;
        self.update_backup_info(false)?;
        log::info!("Send BTC completed");
        Ok(tx.compute_txid().to_string())
    }

    /// Send every spendable bitcoin to `address`, signing with the wallet keys
    ///
    /// Colored UTXOs are included only with `destroy_assets`.
    pub fn drain_to(
        &mut self,
        online: Online,
        address: String,
        destroy_assets: bool,
        fee_rate: u64,
    ) -> Result<String, Error> {
        log::info!("Draining to {} (destroy assets: {})...", address, destroy_assets);
        let unsigned_psbt =
            self.drain_to_begin(online.clone(), address, destroy_assets, fee_rate)?;
        let signed_psbt = self.sign_psbt(unsigned_psbt)?;
        self.drain_to_end(online, signed_psbt)
    }

    pub fn drain_to_begin(
        &mut self,
        online: Online,
        address: String,
        destroy_assets: bool,
        fee_rate: u64,
    ) -> Result<String, Error> {
        log::info!("Draining (begin)...");
        self.check_online(online)?;
        let fee_rate = self.check_fee_rate(fee_rate)?;
        self.sync_db_txos(false)?;

        let script_pubkey = self.parse_address(&address)?;
        let unspendable = if destroy_assets {
            vec![]
        } else {
            self.colored_outpoints()?
        };
        let psbt = build_drain_psbt(&mut self.bdk_wallet, script_pubkey, &fee_rate, &unspendable)?;
        log::info!("Drain (begin) completed");
        Ok(psbt.to_string())
    }

    pub fn drain_to_end(&mut self, online: Online, signed_psbt: String) -> Result<String, Error> {
        log::info!("Draining (end)...");
        self.check_online(online)?;
        let psbt = Self::parse_psbt(&signed_psbt)?;
        let tx = self.broadcast_psbt(psbt, false)?;
        let txid = tx.compute_txid().to_string();
        self.database
            .set_wallet_transaction(&txid, WalletTransactionType::Drain)?;
        self.update_backup_info(false)?;
        log::info!("Drain completed");
        Ok(txid)
    }

    fn fail_batch_transfer(&self, batch_transfer: &DbBatchTransfer) -> Result<(), Error> {
        let now = now();
        let mut updated = batch_transfer.clone();
        updated.status = TransferStatus::Failed;
        updated.expiration = Some(now);
        updated.updated_at = now;
        self.database.update_batch_transfer(&updated)?;
        log::debug!("Batch transfer {} set to failed", batch_transfer.idx);
        Ok(())
    }

    /// Set pending transfers waiting for the counterparty to failed
    ///
    /// With `batch_transfer_idx` only that batch transfer, otherwise every
    /// expired one. Returns whether anything changed.
    pub fn fail_transfers(
        &mut self,
        online: Online,
        batch_transfer_idx: Option<i32>,
        no_asset_only: bool,
        skip_sync: bool,
    ) -> Result<bool, Error> {
        log::info!(
            "Failing batch transfer with idx {:?} (no_asset_only: {})...",
            batch_transfer_idx,
            no_asset_only
        );
        self.check_online(online)?;
        if !skip_sync {
            self.sync_db_txos(false)?;
        }

        let db_data = self.database.get_db_data(false)?;
        let has_asset = |bt: &DbBatchTransfer| {
            bt.asset_transfers(&db_data.asset_transfers)
                .iter()
                .any(|at| at.asset_id.is_some())
        };

        let mut transfers_changed = false;
        if let Some(idx) = batch_transfer_idx {
            let batch_transfer = self
                .database
                .get_batch_transfer_or_fail(idx, &db_data.batch_transfers)?;
            if !batch_transfer.waiting_counterparty()
                || (no_asset_only && has_asset(&batch_transfer))
            {
                log::warn!("Refusing to fail batch transfer {}", idx);
                return Err(Error::CannotFailBatchTransfer);
            }
            self.fail_batch_transfer(&batch_transfer)?;
            transfers_changed = true;
        } else {
            let now = now();
            for batch_transfer in db_data.batch_transfers.iter().filter(|bt| {
                bt.waiting_counterparty() && bt.expiration.is_some_and(|e| e < now)
            }) {
                if no_asset_only && has_asset(batch_transfer) {
                    continue;
                }
                self.fail_batch_transfer(batch_transfer)?;
                transfers_changed = true;
            }
        }

        self.update_backup_info(false)?;
        log::info!("Fail transfers completed");
        Ok(transfers_changed)
    }

    fn refresh_batch_transfer(
        &self,
        batch_transfer: &DbBatchTransfer,
    ) -> Result<RefreshedTransfer, Error> {
        let unchanged = RefreshedTransfer {
            updated_status: None,
            failure: None,
        };
        match batch_transfer.status {
            TransferStatus::WaitingCounterparty => {
                if batch_transfer.expiration.is_some_and(|e| e < now()) {
                    self.fail_batch_transfer(batch_transfer)?;
                    return Ok(RefreshedTransfer {
                        updated_status: Some(TransferStatus::Failed),
                        failure: None,
                    });
                }
                Ok(unchanged)
            }
            TransferStatus::WaitingConfirmations => {
                let Some(txid) = &batch_transfer.txid else {
                    return Ok(unchanged);
                };
                let txid = Txid::from_str(txid).map_err(Error::internal)?;
                let confirmations = match self.online_data()?.indexer.tx_confirmations(&txid) {
                    Ok(c) => c.unwrap_or(0),
                    Err(e) => {
                        return Ok(RefreshedTransfer {
                            updated_status: None,
                            failure: Some(e.to_string()),
                        })
                    }
                };
                if confirmations < batch_transfer.min_confirmations as u32 {
                    return Ok(unchanged);
                }
                let mut updated = batch_transfer.clone();
                updated.status = TransferStatus::Settled;
                updated.updated_at = now();
                self.database.update_batch_transfer(&updated)?;
                Ok(RefreshedTransfer {
                    updated_status: Some(TransferStatus::Settled),
                    failure: None,
                })
            }
            TransferStatus::Settled | TransferStatus::Failed => Ok(unchanged),
        }
    }

    /// Advance pending transfers
    ///
    /// Expired transfers waiting for the counterparty fail, transfers waiting
    /// for confirmations settle once the indexer reports enough of them.
    /// `filter` restricts the transfers by status and direction, an empty
    /// filter refreshes every pending transfer.
    pub fn refresh(
        &mut self,
        online: Online,
        asset_id: Option<String>,
        filter: Vec<RefreshFilter>,
        skip_sync: bool,
    ) -> Result<BTreeMap<i32, RefreshedTransfer>, Error> {
        log::info!("Refreshing asset {:?}...", asset_id);
        self.check_online(online)?;
        if let Some(id) = &asset_id {
            self.database.check_asset_exists(id)?;
        }
        if !skip_sync {
            self.sync_db_txos(false)?;
        }

        let db_data = self.database.get_db_data(false)?;
        let asset_batch_idxs: Option<HashSet<i32>> = asset_id.as_ref().map(|id| {
            db_data
                .asset_transfers
                .iter()
                .filter(|at| at.asset_id.as_ref() == Some(id))
                .map(|at| at.batch_transfer_idx)
                .collect()
        });

        let mut refreshed = BTreeMap::new();
        for batch_transfer in db_data.batch_transfers.iter().filter(|bt| bt.pending()) {
            if asset_batch_idxs
                .as_ref()
                .is_some_and(|idxs| !idxs.contains(&batch_transfer.idx))
            {
                continue;
            }
            let status = RefreshTransferStatus::try_from(batch_transfer.status)?;
            let incoming = batch_transfer.incoming(&db_data.asset_transfers, &db_data.transfers);
            if !filter.is_empty()
                && !filter
                    .iter()
                    .any(|f| f.status == status && f.incoming == incoming)
            {
                continue;
            }
            refreshed.insert(
                batch_transfer.idx,
                self.refresh_batch_transfer(batch_transfer)?,
            );
        }

        if refreshed.values().any(|r| r.updated_status.is_some()) {
            self.update_backup_info(false)?;
        }
        log::info!("Refresh completed");
        Ok(refreshed)
    }
}
