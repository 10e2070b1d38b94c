//! Wallet operations that don't need an indexer

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

use bdk_wallet::bitcoin::{NetworkKind, Psbt};
use bdk_wallet::chain::ChainPosition;
use bdk_wallet::KeychainKind;

use crate::bitcoin::{keychain_balance, BitcoinWallet};
use crate::database::{
    AssetSchema, ColoringType, DbAsset, DbAssetTransfer, DbBatchTransfer, DbColoring, DbData,
    DbMedia, DbToken, DbTokenMedia, DbTransfer, DbTransferTransportEndpoint, LocalUnspent,
    RecipientType, RgbLibDatabase, TransferStatus, WalletTransactionType,
};
use crate::error::Error;
use crate::keys::{
    derive_account_xprv, derive_account_xpub, descriptor_from_xprv, descriptor_from_xpub,
    parse_mnemonic, parse_xpub,
};
use crate::rgb::media::MEDIA_DIR;
use crate::rgb::{
    blind_seal, blinded_recipient_id, witness_recipient_id, AssetIface, Invoice, InvoiceData,
    Media, TransportEndpoint, CONTRACTS_DIR,
};
use crate::wallet::{
    now, AssetCFA, AssetNIA, AssetUDA, Assets, Balance, BlockTime, BtcBalance, Metadata, Online,
    Outpoint, ReceiveData, Transaction, TransactionType, Transfer, TransferTransportEndpoint,
    TokenLight, Unspent, Wallet, WalletData, DURATION_RCV_TRANSFER, KEYCHAIN_BTC, KEYCHAIN_RGB,
    MAX_TRANSPORT_ENDPOINTS, MIN_BTC_REQUIRED,
};

/// Recipient of a receive request, before it is written to the ledger
struct PendingReceive {
    recipient_id: String,
    recipient_type: RecipientType,
    /// TXO receiving the allocation, blinded receives only
    txo_idx: Option<i32>,
    /// Hex script to watch for funding, witness receives only
    witness_script: Option<String>,
}

impl Wallet {
    /// Open the wallet described by `wallet_data`, creating it on first use
    ///
    /// The wallet directory is `<data_dir>/<xpub fingerprint>`. Without a
    /// mnemonic the wallet is watch-only.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let wallet = Wallet::new(wallet_data)?;
    /// println!("{}", wallet.get_wallet_dir().display());
    /// ```
    pub fn new(wallet_data: WalletData) -> Result<Self, Error> {
        let data_dir = PathBuf::from(&wallet_data.data_dir);
        if !data_dir.is_dir() {
            return Err(Error::InexistentDataDir);
        }

        let network = wallet_data.bitcoin_network;
        let account_xpub = parse_xpub(&wallet_data.pubkey)?;
        let network_kind = NetworkKind::from(bdk_wallet::bitcoin::Network::from(network));
        if account_xpub.network != network_kind {
            return Err(Error::InvalidPubkey {
                details: format!("pubkey is not valid for {}", network),
            });
        }

        let vanilla_keychain = wallet_data.vanilla_keychain.unwrap_or(KEYCHAIN_BTC);
        if vanilla_keychain == KEYCHAIN_RGB {
            return Err(Error::InvalidVanillaKeychain);
        }

        let (colored_descriptor, vanilla_descriptor) = match &wallet_data.mnemonic {
            Some(mnemonic) => {
                let mnemonic = parse_mnemonic(mnemonic)?;
                if derive_account_xpub(&mnemonic, network)? != account_xpub {
                    return Err(Error::InvalidBitcoinKeys);
                }
                let account_xprv = derive_account_xprv(&mnemonic, network)?;
                (
                    descriptor_from_xprv(&account_xprv, KEYCHAIN_RGB),
                    descriptor_from_xprv(&account_xprv, vanilla_keychain),
                )
            }
            None => (
                descriptor_from_xpub(&account_xpub, KEYCHAIN_RGB),
                descriptor_from_xpub(&account_xpub, vanilla_keychain),
            ),
        };

        let wallet_dir = data_dir.join(account_xpub.fingerprint().to_string());
        std::fs::create_dir_all(wallet_dir.join(MEDIA_DIR))?;
        std::fs::create_dir_all(wallet_dir.join(CONTRACTS_DIR))?;

        let bdk_wallet =
            BitcoinWallet::new(colored_descriptor, vanilla_descriptor, network, &wallet_dir)?;
        let database = RgbLibDatabase::open(&wallet_dir)?;
        let watch_only = wallet_data.mnemonic.is_none();

        log::info!(
            "Opened wallet {} on {} (watch-only: {})",
            wallet_dir.display(),
            network,
            watch_only
        );

        Ok(Self {
            max_allocations_per_utxo: wallet_data.max_allocations_per_utxo,
            wallet_data,
            watch_only,
            database,
            wallet_dir,
            bdk_wallet,
            online_data: None,
        })
    }

    pub fn get_wallet_data(&self) -> WalletData {
        self.wallet_data.clone()
    }

    pub fn get_wallet_dir(&self) -> PathBuf {
        self.wallet_dir.clone()
    }

    pub fn get_media_dir(&self) -> PathBuf {
        self.wallet_dir.join(MEDIA_DIR)
    }

    pub(crate) fn contracts_dir(&self) -> PathBuf {
        self.wallet_dir.join(CONTRACTS_DIR)
    }

    /// The RGB ledger of this wallet
    pub fn database(&self) -> &RgbLibDatabase {
        &self.database
    }

    /// Record that the wallet state changed, or that a backup was taken
    pub(crate) fn update_backup_info(&self, doing_backup: bool) -> Result<(), Error> {
        let timestamp = chrono::Utc::now().timestamp_micros().to_string();
        let last_backup = doing_backup.then_some(timestamp.as_str());
        self.database.upsert_backup_info(last_backup, &timestamp)?;
        Ok(())
    }

    /// Allocatable UTXOs among `unspents`
    ///
    /// Failed allocations are dropped first. A UTXO is kept when it exists,
    /// is not excluded, has room for one more allocation and is not an input
    /// of a pending send.
    pub(crate) fn get_available_allocations(
        &self,
        unspents: Vec<LocalUnspent>,
        exclude_utxos: &[Outpoint],
        max_allocations: Option<u32>,
    ) -> Vec<LocalUnspent> {
        let max_allocations =
            max_allocations.unwrap_or(self.max_allocations_per_utxo.saturating_sub(1)) as usize;
        unspents
            .into_iter()
            .map(|mut u| {
                u.rgb_allocations.retain(|a| !a.status.failed());
                u
            })
            .filter(|u| {
                u.utxo.exists
                    && !exclude_utxos.contains(&u.outpoint())
                    && u.rgb_allocations.len() <= max_allocations
                    && !u
                        .rgb_allocations
                        .iter()
                        .any(|a| !a.incoming && a.status.waiting_counterparty())
            })
            .collect()
    }

    pub(crate) fn detect_btc_unspendable_err(&self) -> Error {
        let available = self.bdk_wallet.vanilla_funds();
        if available < MIN_BTC_REQUIRED {
            Error::InsufficientBitcoins {
                needed: MIN_BTC_REQUIRED,
                available,
            }
        } else {
            Error::InsufficientAllocationSlots
        }
    }

    /// Pick a UTXO to place a new allocation on
    ///
    /// The least used UTXO wins. When every candidate already holds
    /// allocations, pending operations go to a UTXO that is already waiting
    /// for incoming allocations and other operations avoid those.
    pub(crate) fn get_utxo(
        &self,
        exclude_utxos: &[Outpoint],
        unspents: Option<Vec<LocalUnspent>>,
        pending_operation: bool,
    ) -> Result<crate::database::DbTxo, Error> {
        let unspents = match unspents {
            Some(u) => u,
            None => self.database.get_rgb_allocations(
                self.database.get_unspent_txos(vec![])?,
                None,
                None,
                None,
            )?,
        };

        let mut allocatable = self.get_available_allocations(unspents, exclude_utxos, None);
        allocatable.sort_by_key(|u| u.rgb_allocations.len());

        let chosen = match allocatable.first() {
            Some(first) if allocatable.len() > 1 && !first.rgb_allocations.is_empty() => allocatable
                .iter()
                .find(|u| u.rgb_allocations.iter().any(|a| a.future()) == pending_operation)
                .or(Some(first)),
            first => first,
        };

        match chosen {
            Some(unspent) => {
                log::debug!("Selected UTXO {}", unspent.outpoint());
                Ok(unspent.utxo.clone())
            }
            None => Err(self.detect_btc_unspendable_err()),
        }
    }

    /// Unspent colored TXOs, minus the inputs of pending sends
    pub(crate) fn receivable_unspents(&self) -> Result<Vec<LocalUnspent>, Error> {
        let unspents = self.database.get_rgb_allocations(
            self.database.get_unspent_txos(vec![])?,
            None,
            None,
            None,
        )?;
        Ok(unspents
            .into_iter()
            .filter(|u| {
                !u.rgb_allocations
                    .iter()
                    .any(|a| !a.incoming && a.status.waiting_counterparty())
            })
            .collect())
    }

    /// Get a new vanilla address
    pub fn get_address(&mut self) -> Result<String, Error> {
        let address = self.bdk_wallet.new_vanilla_address()?;
        Ok(address.to_string())
    }

    /// Bitcoin balance of the vanilla and colored keychains
    ///
    /// Syncs first unless `skip_sync` is set, which requires `online`.
    pub fn get_btc_balance(
        &mut self,
        online: Option<Online>,
        skip_sync: bool,
    ) -> Result<BtcBalance, Error> {
        log::info!("Getting BTC balance...");
        self.sync_if_requested(online, skip_sync)?;

        let balance = |keychain| {
            let b = keychain_balance(&self.bdk_wallet, keychain);
            Balance {
                settled: b.confirmed,
                future: b.total(),
                spendable: b.total() - b.immature,
            }
        };
        let btc_balance = BtcBalance {
            vanilla: balance(KeychainKind::Internal),
            colored: balance(KeychainKind::External),
        };
        log::info!("Get BTC balance completed");
        Ok(btc_balance)
    }

    fn check_transport_endpoints(
        &self,
        transport_endpoints: &[String],
    ) -> Result<Vec<TransportEndpoint>, Error> {
        if transport_endpoints.is_empty() || transport_endpoints.len() > MAX_TRANSPORT_ENDPOINTS {
            return Err(Error::InvalidTransportEndpoints {
                details: format!(
                    "must provide between 1 and {} transport endpoints",
                    MAX_TRANSPORT_ENDPOINTS
                ),
            });
        }

        let mut seen = HashSet::new();
        let mut endpoints = Vec::with_capacity(transport_endpoints.len());
        for raw in transport_endpoints {
            let endpoint = TransportEndpoint::new(raw.clone())?;
            if !seen.insert(endpoint.endpoint.clone()) {
                return Err(Error::InvalidTransportEndpoints {
                    details: "no duplicate transport endpoints allowed".to_string(),
                });
            }
            endpoints.push(endpoint);
        }
        Ok(endpoints)
    }

    #[allow(clippy::too_many_arguments)]
    fn store_receive(
        &self,
        asset_id: Option<String>,
        asset_iface: Option<AssetIface>,
        amount: Option<u64>,
        duration_seconds: Option<u32>,
        transport_endpoints: Vec<String>,
        min_confirmations: u8,
        receive: PendingReceive,
    ) -> Result<ReceiveData, Error> {
        let created_at = now();
        let duration = duration_seconds.unwrap_or(DURATION_RCV_TRANSFER);
        let expiration_timestamp = if duration == 0 {
            None
        } else {
            Some(created_at + duration as i64)
        };

        let invoice = Invoice::from_invoice_data(InvoiceData {
            recipient_id: receive.recipient_id.clone(),
            asset_iface,
            asset_id: asset_id.clone(),
            amount,
            expiration_timestamp,
            transport_endpoints: transport_endpoints.clone(),
            network: self.wallet_data.bitcoin_network,
        })?;

        let batch_transfer_idx = self.database.transaction(|db| {
            let batch_transfer_idx = db.set_batch_transfer(&DbBatchTransfer {
                idx: 0,
                txid: None,
                status: TransferStatus::WaitingCounterparty,
                expiration: expiration_timestamp,
                created_at,
                updated_at: created_at,
                min_confirmations,
            })?;
            let asset_transfer_idx = db.set_asset_transfer(&DbAssetTransfer {
                idx: 0,
                user_driven: true,
                batch_transfer_idx,
                asset_id,
            })?;
            let transfer_idx = db.set_transfer(&DbTransfer {
                idx: 0,
                asset_transfer_idx,
                amount: 0,
                incoming: true,
                recipient_type: Some(receive.recipient_type),
                recipient_id: Some(receive.recipient_id.clone()),
                ack: None,
                invoice_string: Some(invoice.invoice_string()),
            })?;
            for endpoint in &transport_endpoints {
                let transport_endpoint_idx =
                    db.set_transport_endpoint(crate::database::TransportType::JsonRpc, endpoint)?;
                db.set_transfer_transport_endpoint(&DbTransferTransportEndpoint {
                    idx: 0,
                    transfer_idx,
                    transport_endpoint_idx,
                    used: false,
                })?;
            }
            if let Some(txo_idx) = receive.txo_idx {
                db.set_coloring(&DbColoring {
                    idx: 0,
                    txo_idx,
                    asset_transfer_idx,
                    r#type: ColoringType::Receive,
                    amount: 0,
                })?;
            }
            if let Some(script) = &receive.witness_script {
                db.set_pending_witness_script(script)?;
            }
            Ok::<_, Error>(batch_transfer_idx)
        })?;

        self.update_backup_info(false)?;

        Ok(ReceiveData {
            invoice: invoice.invoice_string(),
            recipient_id: receive.recipient_id,
            expiration_timestamp,
            batch_transfer_idx,
        })
    }

    fn receive_asset_iface(&self, asset_id: &Option<String>) -> Result<Option<AssetIface>, Error> {
        match asset_id {
            Some(id) => {
                let asset = self.database.check_asset_exists(id)?;
                Ok(Some(AssetIface::from(asset.schema)))
            }
            None => Ok(None),
        }
    }

    /// Create a receive request on a blinded UTXO
    ///
    /// # Arguments
    ///
    /// * `asset_id` - Restrict the invoice to an asset, `None` accepts any
    /// * `amount` - Requested amount, informative
    /// * `duration_seconds` - Validity, 0 for no expiration, default 86400
    /// * `transport_endpoints` - 1 to 3 `rpc://` or `rpcs://` endpoints
    /// * `min_confirmations` - Confirmations required to settle
    pub fn blind_receive(
        &mut self,
        asset_id: Option<String>,
        amount: Option<u64>,
        duration_seconds: Option<u32>,
        transport_endpoints: Vec<String>,
        min_confirmations: u8,
    ) -> Result<ReceiveData, Error> {
        log::info!("Receiving via blinded UTXO for asset {:?}...", asset_id);
        let asset_iface = self.receive_asset_iface(&asset_id)?;
        self.check_transport_endpoints(&transport_endpoints)?;

        let unspents = self.receivable_unspents()?;
        let utxo = self.get_utxo(&[], Some(unspents), true)?;
        let seal = blind_seal(&utxo.txid, utxo.vout)?;
        let recipient_id = blinded_recipient_id(seal, self.wallet_data.bitcoin_network);
        log::debug!("Recipient ID: {}", recipient_id);

        let receive_data = self.store_receive(
            asset_id,
            asset_iface,
            amount,
            duration_seconds,
            transport_endpoints,
            min_confirmations,
            PendingReceive {
                recipient_id,
                recipient_type: RecipientType::Blind,
                txo_idx: Some(utxo.idx),
                witness_script: None,
            },
        )?;
        log::info!("Blind receive completed");
        Ok(receive_data)
    }

    /// Create a receive request paying to a fresh colored address
    ///
    /// Same arguments as [`Wallet::blind_receive`].
    pub fn witness_receive(
        &mut self,
        asset_id: Option<String>,
        amount: Option<u64>,
        duration_seconds: Option<u32>,
        transport_endpoints: Vec<String>,
        min_confirmations: u8,
    ) -> Result<ReceiveData, Error> {
        log::info!("Receiving via witness TX for asset {:?}...", asset_id);
        let asset_iface = self.receive_asset_iface(&asset_id)?;
        self.check_transport_endpoints(&transport_endpoints)?;

        let script_pubkey = self.bdk_wallet.new_colored_address()?.script_pubkey();
        let recipient_id =
            witness_recipient_id(&script_pubkey, self.wallet_data.bitcoin_network)?;
        log::debug!("Recipient ID: {}", recipient_id);

        let receive_data = self.store_receive(
            asset_id,
            asset_iface,
            amount,
            duration_seconds,
            transport_endpoints,
            min_confirmations,
            PendingReceive {
                recipient_id,
                recipient_type: RecipientType::Witness,
                txo_idx: None,
                witness_script: Some(hex::encode(script_pubkey.as_bytes())),
            },
        )?;
        log::info!("Witness receive completed");
        Ok(receive_data)
    }

    /// Sign a base64 PSBT with the wallet keys
    pub fn sign_psbt(&self, unsigned_psbt: String) -> Result<String, Error> {
        if self.watch_only {
            return Err(Error::WatchOnly);
        }
        let mut psbt = Psbt::from_str(&unsigned_psbt).map_err(|e| Error::InvalidPsbt {
            details: e.to_string(),
        })?;
        crate::bitcoin::sign_psbt(&self.bdk_wallet, &mut psbt).map_err(|e| Error::InvalidPsbt {
            details: e.to_string(),
        })?;
        Ok(psbt.to_string())
    }

    fn delete_batch_transfer(
        &self,
        batch_transfer: &DbBatchTransfer,
        db_data: &DbData,
    ) -> Result<(), Error> {
        for asset_transfer in batch_transfer.asset_transfers(&db_data.asset_transfers) {
            let txo_idxs: Vec<i32> = db_data
                .colorings
                .iter()
                .filter(|c| c.asset_transfer_idx == asset_transfer.idx)
                .map(|c| c.txo_idx)
                .collect();
            self.database.del_coloring(asset_transfer.idx)?;
            for txo in db_data
                .txos
                .iter()
                .filter(|t| !t.exists && txo_idxs.contains(&t.idx))
            {
                self.database.del_txo(txo.idx)?;
            }
        }
        self.database.del_batch_transfer(batch_transfer.idx)?;
        Ok(())
    }

    /// Delete failed batch transfers
    ///
    /// With `batch_transfer_idx` only that batch transfer is deleted and it
    /// must be failed. Without it every failed batch transfer is deleted.
    /// `no_asset_only` restricts deletion to transfers with no asset attached.
    /// Returns whether anything was deleted.
    pub fn delete_transfers(
        &self,
        batch_transfer_idx: Option<i32>,
        no_asset_only: bool,
    ) -> Result<bool, Error> {
        log::info!(
            "Deleting batch transfer with idx {:?} (no_asset_only: {})...",
            batch_transfer_idx,
            no_asset_only
        );
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
            if !batch_transfer.failed() || (no_asset_only && has_asset(&batch_transfer)) {
                log::warn!("Refusing to delete batch transfer {}", idx);
                return Err(Error::CannotDeleteBatchTransfer);
            }
            self.delete_batch_transfer(&batch_transfer, &db_data)?;
            transfers_changed = true;
        } else {
            for batch_transfer in db_data.batch_transfers.iter().filter(|bt| bt.failed()) {
                if no_asset_only && has_asset(batch_transfer) {
                    continue;
                }
                self.delete_batch_transfer(batch_transfer, &db_data)?;
                transfers_changed = true;
            }
        }

        self.update_backup_info(false)?;
        log::info!("Delete transfer completed");
        Ok(transfers_changed)
    }

    /// Balance of an RGB asset
    pub fn get_asset_balance(&self, asset_id: String) -> Result<Balance, Error> {
        self.database.check_asset_exists(&asset_id)?;
        Ok(self.database.get_asset_balance(&asset_id, None)?)
    }

    fn media_for(&self, media_idx: Option<i32>, medias: &[DbMedia]) -> Option<Media> {
        let media_dir = self.get_media_dir();
        media_idx
            .and_then(|idx| medias.iter().find(|m| m.idx == idx))
            .map(|m| Media::from_db_media(m, &media_dir))
    }

    fn token_light(
        &self,
        asset: &DbAsset,
        tokens: &[DbToken],
        token_medias: &[DbTokenMedia],
        medias: &[DbMedia],
    ) -> Option<TokenLight> {
        let token = tokens.iter().find(|t| t.asset_idx == asset.idx)?;
        let media_dir = self.get_media_dir();

        let mut media = None;
        let mut attachments = BTreeMap::new();
        for token_media in token_medias.iter().filter(|tm| tm.token_idx == token.idx) {
            let Some(db_media) = medias.iter().find(|m| m.idx == token_media.media_idx) else {
                continue;
            };
            let stored = Media::from_db_media(db_media, &media_dir);
            match token_media.attachment_id {
                Some(id) => {
                    attachments.insert(id, stored);
                }
                None => media = Some(stored),
            }
        }

        Some(TokenLight {
            index: token.index,
            ticker: token.ticker.clone(),
            name: token.name.clone(),
            details: token.details.clone(),
            embedded_media: token.embedded_media,
            media,
            attachments,
            reserves: token.reserves,
        })
    }

    /// Metadata of an RGB asset
    pub fn get_asset_metadata(&self, asset_id: String) -> Result<Metadata, Error> {
        let asset = self.database.check_asset_exists(&asset_id)?;
        let token = if asset.schema == AssetSchema::Uda {
            self.token_light(
                &asset,
                &self.database.iter_tokens()?,
                &self.database.iter_token_medias()?,
                &self.database.iter_media()?,
            )
            .map(Into::into)
        } else {
            None
        };

        Ok(Metadata {
            asset_iface: AssetIface::from(asset.schema),
            asset_schema: asset.schema,
            issued_supply: asset.issued_supply,
            timestamp: asset.timestamp,
            name: asset.name,
            precision: asset.precision,
            ticker: asset.ticker,
            details: asset.details,
            token,
        })
    }

    pub(crate) fn asset_nia(
        &self,
        asset: &DbAsset,
        db_data: &DbData,
        medias: &[DbMedia],
    ) -> Result<AssetNIA, Error> {
        Ok(AssetNIA {
            asset_id: asset.id.clone(),
            asset_iface: AssetIface::RGB20,
            ticker: asset.ticker.clone().unwrap_or_default(),
            name: asset.name.clone(),
            details: asset.details.clone(),
            precision: asset.precision,
            issued_supply: asset.issued_supply,
            timestamp: asset.timestamp,
            added_at: asset.added_at,
            balance: self
                .database
                .get_asset_balance(&asset.id, Some(db_data.clone()))?,
            media: self.media_for(asset.media_idx, medias),
        })
    }

    pub(crate) fn asset_cfa(
        &self,
        asset: &DbAsset,
        db_data: &DbData,
        medias: &[DbMedia],
    ) -> Result<AssetCFA, Error> {
        Ok(AssetCFA {
            asset_id: asset.id.clone(),
            asset_iface: AssetIface::RGB25,
            name: asset.name.clone(),
            details: asset.details.clone(),
            precision: asset.precision,
            issued_supply: asset.issued_supply,
            timestamp: asset.timestamp,
            added_at: asset.added_at,
            balance: self
                .database
                .get_asset_balance(&asset.id, Some(db_data.clone()))?,
            media: self.media_for(asset.media_idx, medias),
        })
    }

    pub(crate) fn asset_uda(
        &self,
        asset: &DbAsset,
        db_data: &DbData,
        tokens: &[DbToken],
        token_medias: &[DbTokenMedia],
        medias: &[DbMedia],
    ) -> Result<AssetUDA, Error> {
        Ok(AssetUDA {
            asset_id: asset.id.clone(),
            asset_iface: AssetIface::RGB21,
            ticker: asset.ticker.clone().unwrap_or_default(),
            name: asset.name.clone(),
            details: asset.details.clone(),
            precision: asset.precision,
            issued_supply: asset.issued_supply,
            timestamp: asset.timestamp,
            added_at: asset.added_at,
            balance: self
                .database
                .get_asset_balance(&asset.id, Some(db_data.clone()))?,
            token: self.token_light(asset, tokens, token_medias, medias),
        })
    }

    /// List known assets, grouped by schema
    ///
    /// An empty `filter_schemas` lists every schema.
    pub fn list_assets(&self, mut filter_schemas: Vec<AssetSchema>) -> Result<Assets, Error> {
        log::info!("Listing assets...");
        if filter_schemas.is_empty() {
            filter_schemas = AssetSchema::ALL.to_vec();
        }

        let db_data = self.database.get_db_data(false)?;
        let assets = self.database.iter_assets()?;
        let medias = self.database.iter_media()?;
        let of_schema = |schema: AssetSchema| assets.iter().filter(move |a| a.schema == schema);

        let mut result = Assets::default();
        for schema in filter_schemas {
            match schema {
                AssetSchema::Nia => {
                    result.nia = Some(
                        of_schema(schema)
                            .map(|a| self.asset_nia(a, &db_data, &medias))
                            .collect::<Result<_, _>>()?,
                    );
                }
                AssetSchema::Cfa => {
                    result.cfa = Some(
                        of_schema(schema)
                            .map(|a| self.asset_cfa(a, &db_data, &medias))
                            .collect::<Result<_, _>>()?,
                    );
                }
                AssetSchema::Uda => {
                    let tokens = self.database.iter_tokens()?;
                    let token_medias = self.database.iter_token_medias()?;
                    result.uda = Some(
                        of_schema(schema)
                            .map(|a| self.asset_uda(a, &db_data, &tokens, &token_medias, &medias))
                            .collect::<Result<_, _>>()?,
                    );
                }
            }
        }

        log::info!("List assets completed");
        Ok(result)
    }

    /// List user-driven transfers
    ///
    /// With `asset_id` the transfers of that asset, otherwise the transfers
    /// not tied to any asset yet.
    pub fn list_transfers(&self, asset_id: Option<String>) -> Result<Vec<Transfer>, Error> {
        if let Some(id) = &asset_id {
            self.database.check_asset_exists(id)?;
        }
        log::info!("Listing transfers for asset {:?}...", asset_id);

        let db_data = self.database.get_db_data(false)?;
        let mut transfers = vec![];
        for asset_transfer in db_data
            .asset_transfers
            .iter()
            .filter(|at| at.user_driven && at.asset_id == asset_id)
        {
            let batch_transfer = self
                .database
                .get_batch_transfer_or_fail(asset_transfer.batch_transfer_idx, &db_data.batch_transfers)?;
            for transfer in db_data
                .transfers
                .iter()
                .filter(|t| t.asset_transfer_idx == asset_transfer.idx)
            {
                let td = self.database.get_transfer_data(
                    transfer,
                    asset_transfer,
                    &batch_transfer,
                    &db_data.txos,
                    &db_data.colorings,
                )?;
                let transport_endpoints = self
                    .database
                    .get_transfer_transport_endpoints_data(transfer.idx)?
                    .into_iter()
                    .map(|e| TransferTransportEndpoint {
                        endpoint: e.endpoint,
                        transport_type: e.transport_type,
                        used: e.used,
                    })
                    .collect();
                transfers.push(Transfer {
                    idx: transfer.idx,
                    batch_transfer_idx: td.batch_transfer_idx,
                    created_at: td.created_at,
                    updated_at: td.updated_at,
                    status: td.status,
                    amount: transfer.amount,
                    kind: td.kind,
                    txid: td.txid,
                    recipient_id: transfer.recipient_id.clone(),
                    receive_utxo: td.receive_utxo,
                    change_utxo: td.change_utxo,
                    expiration: td.expiration,
                    transport_endpoints,
                    invoice_string: transfer.invoice_string.clone(),
                });
            }
        }

        log::info!("List transfers completed");
        Ok(transfers)
    }

    /// List colored UTXOs with their allocations, then vanilla UTXOs
    ///
    /// Spent TXOs whose outgoing transfer is still waiting for confirmations
    /// are included, since their allocations still count as settled.
    pub fn list_unspents(
        &mut self,
        online: Option<Online>,
        settled_only: bool,
        skip_sync: bool,
    ) -> Result<Vec<Unspent>, Error> {
        log::info!("Listing unspents...");
        self.sync_if_requested(online, skip_sync)?;

        let db_data = self.database.get_db_data(false)?;
        let pending_batch_idxs: Vec<i32> = db_data
            .batch_transfers
            .iter()
            .filter(|bt| bt.waiting_confirmations())
            .map(|bt| bt.idx)
            .collect();
        let pending_asset_transfer_idxs: Vec<i32> = db_data
            .asset_transfers
            .iter()
            .filter(|at| pending_batch_idxs.contains(&at.batch_transfer_idx))
            .map(|at| at.idx)
            .collect();
        let pending_txo_idxs: Vec<i32> = db_data
            .colorings
            .iter()
            .filter(|c| pending_asset_transfer_idxs.contains(&c.asset_transfer_idx))
            .map(|c| c.txo_idx)
            .collect();

        let mut allocation_txos: Vec<_> =
            db_data.txos.iter().filter(|t| !t.spent).cloned().collect();
        allocation_txos.extend(
            db_data
                .txos
                .iter()
                .filter(|t| t.spent && pending_txo_idxs.contains(&t.idx))
                .cloned(),
        );

        let mut txos_allocations = self.database.get_rgb_allocations(
            allocation_txos,
            Some(db_data.colorings),
            Some(db_data.batch_transfers),
            Some(db_data.asset_transfers),
        )?;
        for unspent in txos_allocations.iter_mut() {
            unspent
                .rgb_allocations
                .retain(|a| a.settled() || (!settled_only && a.future()));
        }

        let mut unspents: Vec<Unspent> = txos_allocations.into_iter().map(Unspent::from).collect();
        unspents.extend(
            self.bdk_wallet
                .unspents(KeychainKind::Internal)
                .into_iter()
                .map(Unspent::from),
        );

        log::info!("List unspents completed");
        Ok(unspents)
    }

    /// List the bitcoin transactions of the wallet
    pub fn list_transactions(
        &mut self,
        online: Option<Online>,
        skip_sync: bool,
    ) -> Result<Vec<Transaction>, Error> {
        log::info!("Listing transactions...");
        self.sync_if_requested(online, skip_sync)?;

        let rgb_send_txids: HashSet<String> = self
            .database
            .iter_batch_transfers()?
            .into_iter()
            .filter_map(|bt| bt.txid)
            .collect();
        let wallet_transactions = self.database.iter_wallet_transactions()?;
        let txids_of = |ty: WalletTransactionType| -> HashSet<&str> {
            wallet_transactions
                .iter()
                .filter(|t| t.r#type == ty)
                .map(|t| t.txid.as_str())
                .collect()
        };
        let drain_txids = txids_of(WalletTransactionType::Drain);
        let create_utxos_txids = txids_of(WalletTransactionType::CreateUtxos);

        let wallet = self.bdk_wallet.inner();
        let transactions = wallet
            .transactions()
            .map(|tx| {
                let txid = tx.tx_node.txid.to_string();
                let transaction_type = if drain_txids.contains(txid.as_str()) {
                    TransactionType::Drain
                } else if create_utxos_txids.contains(txid.as_str()) {
                    TransactionType::CreateUtxos
                } else if rgb_send_txids.contains(&txid) {
                    TransactionType::RgbSend
                } else {
                    TransactionType::User
                };
                let (sent, received) = wallet.sent_and_received(&tx.tx_node.tx);
                let fee = wallet
                    .calculate_fee(&tx.tx_node.tx)
                    .map(|f| f.to_sat())
                    .unwrap_or(0);
                let confirmation_time = match tx.chain_position {
                    ChainPosition::Confirmed { anchor, .. } => Some(BlockTime {
                        height: anchor.block_id.height,
                        timestamp: anchor.confirmation_time,
                    }),
                    ChainPosition::Unconfirmed { .. } => None,
                };
                Transaction {
                    transaction_type,
                    txid,
                    received: received.to_sat(),
                    sent: sent.to_sat(),
                    fee,
                    confirmation_time,
                }
            })
            .collect();

        log::info!("List transactions completed");
        Ok(transactions)
    }
}
