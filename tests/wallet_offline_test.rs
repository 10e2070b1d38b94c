//! Integration tests for offline wallet operations
//!
//! Tests wallet creation and validation, address generation, balances and
//! listings without an indexer, receive requests and transfer deletion.

mod common;

use common::{TestWalletEnv, ENDPOINT};
use rgblib::database::{DbTxo, RecipientType};
use rgblib::rgb::{recipient_network, recipient_type, Invoice};
use rgblib::wallet::{BtcBalance, TransferKind};
use rgblib::{generate_keys, AssetSchema, BitcoinNetwork, Error, TransferStatus, Wallet};

#[test]
fn test_wallet_dir_is_named_after_fingerprint() {
    let env = TestWalletEnv::new();
    let (wallet, keys) = env.new_wallet();

    let wallet_dir = wallet.get_wallet_dir();
    assert_eq!(wallet_dir, env.data_dir().join(&keys.account_xpub_fingerprint));
    assert!(wallet.get_media_dir().is_dir(), "Media dir should be created");
    assert_eq!(wallet.get_wallet_data().pubkey, keys.account_xpub);
}

#[test]
fn test_wallet_reopens_existing_directory() {
    let env = TestWalletEnv::new();
    let (mut wallet, keys) = env.new_wallet();
    wallet
        .witness_receive(None, None, None, vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create receive request");
    drop(wallet);

    let reopened = Wallet::new(env.wallet_data(&keys, 5)).expect("Failed to reopen wallet");
    let transfers = reopened
        .list_transfers(None)
        .expect("Failed to list transfers");
    assert_eq!(transfers.len(), 1, "Ledger should survive reopening");
}

#[test]
fn test_wallet_creation_validates_inputs() {
    let env = TestWalletEnv::new();
    let keys = generate_keys(BitcoinNetwork::Regtest).expect("Failed to generate keys");

    let mut data = env.wallet_data(&keys, 5);
    data.data_dir = env.path("missing").to_string_lossy().to_string();
    assert!(matches!(Wallet::new(data), Err(Error::InexistentDataDir)));

    let mut data = env.wallet_data(&keys, 5);
    data.vanilla_keychain = Some(9);
    assert!(matches!(Wallet::new(data), Err(Error::InvalidVanillaKeychain)));

    let other = generate_keys(BitcoinNetwork::Regtest).expect("Failed to generate keys");
    let mut data = env.wallet_data(&keys, 5);
    data.mnemonic = Some(other.mnemonic);
    assert!(matches!(Wallet::new(data), Err(Error::InvalidBitcoinKeys)));

    let mainnet = generate_keys(BitcoinNetwork::Mainnet).expect("Failed to generate keys");
    let data = env.wallet_data(&mainnet, 5);
    assert!(matches!(Wallet::new(data), Err(Error::InvalidPubkey { .. })));
}

#[test]
fn test_watch_only_wallet_cannot_sign() {
    let env = TestWalletEnv::new();
    let keys = generate_keys(BitcoinNetwork::Regtest).expect("Failed to generate keys");
    let mut data = env.wallet_data(&keys, 5);
    data.mnemonic = None;

    let mut wallet = Wallet::new(data).expect("Failed to create watch-only wallet");
    wallet.get_address().expect("Watch-only wallet should derive addresses");
    assert!(matches!(
        wallet.sign_psbt("cHNidP8B".to_string()),
        Err(Error::WatchOnly)
    ));
}

#[test]
fn test_addresses_are_fresh_regtest_taproot() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();

    let first = wallet.get_address().expect("Failed to get address");
    let second = wallet.get_address().expect("Failed to get second address");
    assert!(first.starts_with("bcrt1p"), "Expected a regtest taproot address: {}", first);
    assert_ne!(first, second, "Each call should reveal a new address");
}

#[test]
fn test_offline_balances_and_listings_are_empty() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();

    let balance = wallet
        .get_btc_balance(None, true)
        .expect("Skipping sync should work offline");
    assert_eq!(balance, BtcBalance::default());
    assert!(matches!(
        wallet.get_btc_balance(None, false),
        Err(Error::OnlineNeeded)
    ));

    let unspents = wallet
        .list_unspents(None, false, true)
        .expect("Failed to list unspents");
    assert!(unspents.is_empty());
    let transactions = wallet
        .list_transactions(None, true)
        .expect("Failed to list transactions");
    assert!(transactions.is_empty());

    let assets = wallet.list_assets(vec![]).expect("Failed to list assets");
    assert_eq!(assets.nia, Some(vec![]));
    assert_eq!(assets.cfa, Some(vec![]));
    assert_eq!(assets.uda, Some(vec![]));

    let assets = wallet
        .list_assets(vec![AssetSchema::Nia])
        .expect("Failed to list NIA assets");
    assert!(assets.nia.is_some());
    assert!(assets.cfa.is_none() && assets.uda.is_none());
}

#[test]
fn test_unknown_asset_is_reported() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let asset_id = "rgb:missing".to_string();

    assert!(matches!(
        wallet.get_asset_balance(asset_id.clone()),
        Err(Error::AssetNotFound { .. })
    ));
    assert!(matches!(
        wallet.list_transfers(Some(asset_id.clone())),
        Err(Error::AssetNotFound { .. })
    ));
    assert!(matches!(
        wallet.blind_receive(Some(asset_id), None, None, vec![ENDPOINT.to_string()], 1),
        Err(Error::AssetNotFound { .. })
    ));
}

#[test]
fn test_witness_receive_creates_pending_transfer() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();

    let receive_data = wallet
        .witness_receive(None, Some(100), None, vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create witness receive");
    assert!(receive_data.expiration_timestamp.is_some(), "Default duration applies");

    let invoice = Invoice::new(receive_data.invoice.clone()).expect("Invoice should parse");
    assert_eq!(invoice.invoice_data().recipient_id, receive_data.recipient_id);
    assert_eq!(invoice.invoice_data().amount, Some(100));
    assert!(matches!(invoice.recipient_type(), Ok(RecipientType::Witness)));
    assert_eq!(
        wallet
            .database()
            .iter_pending_witness_scripts()
            .expect("Failed to list pending scripts")
            .len(),
        1
    );

    let transfers = wallet.list_transfers(None).expect("Failed to list transfers");
    assert_eq!(transfers.len(), 1);
    let transfer = &transfers[0];
    assert_eq!(transfer.kind, TransferKind::ReceiveWitness);
    assert_eq!(transfer.status, TransferStatus::WaitingCounterparty);
    assert_eq!(transfer.batch_transfer_idx, receive_data.batch_transfer_idx);
    assert_eq!(transfer.recipient_id.as_ref(), Some(&receive_data.recipient_id));
    assert_eq!(transfer.transport_endpoints.len(), 1);
    assert_eq!(transfer.transport_endpoints[0].endpoint, ENDPOINT);
    assert!(!transfer.transport_endpoints[0].used);
}

#[test]
fn test_blind_receive_uses_colored_utxo() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let txo = DbTxo {
        idx: 0,
        txid: "b".repeat(64),
        vout: 0,
        btc_amount: 1000,
        spent: false,
        exists: true,
    };
    wallet.database().set_txo(&txo).expect("Failed to store TXO");
    let stored = wallet
        .database()
        .get_txo(&txo.outpoint())
        .expect("Failed to read TXO")
        .expect("TXO should be stored");
    assert_eq!(stored.btc_amount, 1000);

    let receive_data = wallet
        .blind_receive(None, None, Some(0), vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create blind receive");
    assert!(matches!(
        recipient_type(&receive_data.recipient_id),
        Ok(RecipientType::Blind)
    ));
    assert!(matches!(
        recipient_network(&receive_data.recipient_id),
        Ok(BitcoinNetwork::Regtest)
    ));
    assert_eq!(receive_data.expiration_timestamp, None, "Zero duration never expires");

    let transfers = wallet.list_transfers(None).expect("Failed to list transfers");
    assert_eq!(transfers[0].kind, TransferKind::ReceiveBlind);
    assert_eq!(transfers[0].receive_utxo, Some(txo.outpoint()));

    let unspents = wallet
        .list_unspents(None, false, true)
        .expect("Failed to list unspents");
    assert_eq!(unspents.len(), 1);
    assert_eq!(unspents[0].pending_blinded, 1);
    assert!(unspents[0].utxo.colorable);
}

#[test]
fn test_pending_transfers_cannot_be_deleted() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let receive_data = wallet
        .witness_receive(None, None, None, vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create witness receive");

    assert!(matches!(
        wallet.delete_transfers(Some(receive_data.batch_transfer_idx), false),
        Err(Error::CannotDeleteBatchTransfer)
    ));
    assert!(matches!(
        wallet.delete_transfers(Some(999), false),
        Err(Error::BatchTransferNotFound { idx: 999 })
    ));
    let deleted = wallet
        .delete_transfers(None, false)
        .expect("Deleting without failed transfers should succeed");
    assert!(!deleted);
}

fn add_txo(wallet: &Wallet, vout: u32, exists: bool) -> DbTxo {
    let mut txo = DbTxo {
        idx: 0,
        txid: "a".repeat(64),
        vout,
        btc_amount: 1000,
        spent: false,
        exists,
    };
    txo.idx = wallet.database().set_txo(&txo).expect("Failed to store TXO");
    txo
}

#[test]
fn test_blind_receive_without_utxos_reports_missing_bitcoins() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();

    let result = wallet.blind_receive(None, None, None, vec![ENDPOINT.to_string()], 1);

    assert!(matches!(
        result,
        Err(Error::InsufficientBitcoins {
            needed: 2000,
            available: 0
        })
    ));
}

#[test]
fn test_blind_receive_skips_inexistent_and_full_utxos() {
    let env = TestWalletEnv::new();
    let keys = generate_keys(BitcoinNetwork::Regtest).expect("Failed to generate keys");
    let mut wallet = Wallet::new(env.wallet_data(&keys, 2)).expect("Failed to create wallet");
    add_txo(&wallet, 0, false);
    let usable = add_txo(&wallet, 1, true);

    for _ in 0..2 {
        wallet
            .blind_receive(None, None, None, vec![ENDPOINT.to_string()], 1)
            .expect("Failed to create blind receive");
    }
    // the only existing UTXO is now full
    assert!(matches!(
        wallet.blind_receive(None, None, None, vec![ENDPOINT.to_string()], 1),
        Err(Error::InsufficientBitcoins { .. })
    ));

    let unspents = wallet
        .list_unspents(None, false, true)
        .expect("Failed to list unspents");
    let colored = unspents
        .iter()
        .find(|u| u.utxo.outpoint == usable.outpoint())
        .expect("Usable TXO should be listed");
    assert_eq!(colored.pending_blinded, 2);
    assert_eq!(colored.rgb_allocations.len(), 2);
}

#[test]
fn test_receive_validates_endpoints() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    add_txo(&wallet, 0, true);

    assert!(matches!(
        wallet.blind_receive(None, None, None, vec![], 1),
        Err(Error::InvalidTransportEndpoints { .. })
    ));
    let dup = vec![ENDPOINT.to_string(), ENDPOINT.to_string()];
    assert!(matches!(
        wallet.blind_receive(None, None, None, dup, 1),
        Err(Error::InvalidTransportEndpoints { .. })
    ));
    let four = (0..4).map(|i| format!("rpc://host{}:3000", i)).collect();
    assert!(matches!(
        wallet.blind_receive(None, None, None, four, 1),
        Err(Error::InvalidTransportEndpoints { .. })
    ));
    // would split the invoice query apart
    assert!(matches!(
        wallet.blind_receive(
            None,
            None,
            None,
            vec!["rpc://127.0.0.1:3000/json-rpc?a=b".to_string()],
            1
        ),
        Err(Error::InvalidTransportEndpoint { .. })
    ));
    assert!(wallet
        .list_transfers(None)
        .expect("Failed to list transfers")
        .is_empty());
}

#[test]
fn test_only_failed_transfers_can_be_deleted() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    add_txo(&wallet, 0, true);
    let receive = wallet
        .blind_receive(None, None, None, vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create blind receive");

    let mut bt = wallet
        .database()
        .iter_batch_transfers()
        .expect("Failed to list batch transfers")
        .remove(0);
    bt.status = TransferStatus::Failed;
    wallet
        .database()
        .update_batch_transfer(&bt)
        .expect("Failed to update batch transfer");

    assert!(wallet
        .delete_transfers(Some(receive.batch_transfer_idx), false)
        .expect("Failed transfer should be deleted"));
    assert!(wallet
        .database()
        .iter_colorings()
        .expect("Failed to list colorings")
        .is_empty());
    assert!(wallet
        .list_transfers(None)
        .expect("Failed to list transfers")
        .is_empty());
}

#[test]
fn test_failed_receive_write_leaves_no_rows() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    add_txo(&wallet, 0, true);
    common::fail_inserts_into(&wallet, "coloring");

    assert!(wallet
        .blind_receive(None, None, None, vec![ENDPOINT.to_string()], 1)
        .is_err());

    let db = wallet.database();
    assert!(db
        .iter_batch_transfers()
        .expect("Failed to list batch transfers")
        .is_empty());
    assert!(db
        .iter_asset_transfers()
        .expect("Failed to list asset transfers")
        .is_empty());
    assert!(db
        .iter_transfers()
        .expect("Failed to list transfers")
        .is_empty());
}

#[test]
fn test_failed_witness_receive_forgets_script() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    common::fail_inserts_into(&wallet, "pending_witness_script");

    assert!(wallet
        .witness_receive(None, None, None, vec![ENDPOINT.to_string()], 1)
        .is_err());

    let db = wallet.database();
    assert!(db
        .iter_pending_witness_scripts()
        .expect("Failed to list pending scripts")
        .is_empty());
    assert!(db
        .iter_batch_transfers()
        .expect("Failed to list batch transfers")
        .is_empty());
}
