//! Regtest integration tests
//!
//! Requires bitcoind (with a funded `mining_wallet`), an Esplora indexer and
//! an Electrum server, see `common` for the environment variables. Run with:
//! `cargo test --test online_flow_test -- --ignored --nocapture`

mod common;

use bdk_wallet::bitcoin::{Address, Network, ScriptBuf};
use common::{
    electrum_url, fund_wallet, indexer_url, mine, BitcoinRpcClient, TestWalletEnv, ENDPOINT,
};
use rgblib::wallet::{RefreshFilter, RefreshTransferStatus, TransactionType, TransferKind};
use rgblib::{AssetSchema, Error, TransferStatus};

fn require_regtest() {
    assert!(
        common::regtest_available(),
        "Regtest indexer not reachable at {}",
        indexer_url()
    );
}

#[test]
#[ignore]
fn test_go_online_and_reuse_online_object() {
    require_regtest();
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();

    let online = wallet
        .go_online(false, indexer_url())
        .expect("Failed to go online");
    let again = wallet
        .go_online(true, indexer_url())
        .expect("Failed to go online twice");
    assert_eq!(online, again, "Same indexer should keep the online object");

    wallet.sync(online.clone()).expect("Failed to sync");

    let mut forged = online;
    forged.id += 1;
    assert!(matches!(wallet.sync(forged), Err(Error::CannotChangeOnline)));

    assert!(matches!(
        wallet.go_online(true, "http://127.0.0.1:9".to_string()),
        Err(Error::InvalidIndexer { .. })
    ));
}

#[test]
#[ignore]
fn test_create_utxos_issue_and_list() {
    require_regtest();
    let rpc = BitcoinRpcClient::new();
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let online = wallet
        .go_online(false, indexer_url())
        .expect("Failed to go online");

    fund_wallet(&mut wallet, &rpc, 0.01);
    let balance = wallet
        .get_btc_balance(Some(online.clone()), false)
        .expect("Failed to get balance");
    assert_eq!(balance.vanilla.settled, 1_000_000);

    let created = wallet
        .create_utxos(online.clone(), false, Some(3), None, 2, false)
        .expect("Failed to create UTXOs");
    assert_eq!(created, 3);
    assert!(matches!(
        wallet.create_utxos(online.clone(), true, Some(3), None, 2, false),
        Err(Error::AllocationsAlreadyAvailable)
    ));
    mine(&rpc, 1);

    let asset = wallet
        .issue_asset_nia(
            online.clone(),
            "USDT".to_string(),
            "Tether".to_string(),
            2,
            vec![700, 77],
        )
        .expect("Failed to issue NIA");
    assert_eq!(asset.issued_supply, 777);
    assert_eq!(asset.balance.settled, 777);

    let assets = wallet
        .list_assets(vec![AssetSchema::Nia])
        .expect("Failed to list assets");
    assert_eq!(assets.nia.map(|a| a.len()), Some(1));

    let unspents = wallet
        .list_unspents(Some(online.clone()), true, false)
        .expect("Failed to list unspents");
    let allocated: u64 = unspents
        .iter()
        .flat_map(|u| u.rgb_allocations.iter())
        .filter(|a| a.asset_id.as_deref() == Some(asset.asset_id.as_str()))
        .map(|a| a.amount)
        .sum();
    assert_eq!(allocated, 777);

    let transactions = wallet
        .list_transactions(Some(online), false)
        .expect("Failed to list transactions");
    assert!(transactions
        .iter()
        .any(|t| t.transaction_type == TransactionType::CreateUtxos));
}

#[test]
#[ignore]
fn test_send_btc_and_drain() {
    require_regtest();
    let rpc = BitcoinRpcClient::new();
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let online = wallet
        .go_online(false, indexer_url())
        .expect("Failed to go online");
    fund_wallet(&mut wallet, &rpc, 0.001);
    wallet.sync(online.clone()).expect("Failed to sync");

    let address = rpc.get_new_address().expect("Failed to get address");
    assert!(matches!(
        wallet.send_btc(online.clone(), address.clone(), 1_000, 0, false),
        Err(Error::InvalidFeeRate { .. })
    ));
    let txid = wallet
        .send_btc(online.clone(), address.clone(), 10_000, 2, false)
        .expect("Failed to send BTC");
    assert_eq!(txid.len(), 64);
    mine(&rpc, 1);

    let txid = wallet
        .drain_to(online.clone(), address, false, 2)
        .expect("Failed to drain");
    mine(&rpc, 1);
    let transactions = wallet
        .list_transactions(Some(online.clone()), false)
        .expect("Failed to list transactions");
    assert!(transactions
        .iter()
        .any(|t| t.txid == txid && t.transaction_type == TransactionType::Drain));

    let balance = wallet
        .get_btc_balance(Some(online), false)
        .expect("Failed to get balance");
    assert_eq!(balance.vanilla.future, 0);
}

#[test]
#[ignore]
fn test_expired_receive_fails_on_refresh() {
    require_regtest();
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let online = wallet
        .go_online(false, indexer_url())
        .expect("Failed to go online");

    let receive_data = wallet
        .witness_receive(None, None, Some(1), vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create receive");
    std::thread::sleep(std::time::Duration::from_secs(2));

    let filter = vec![RefreshFilter {
        status: RefreshTransferStatus::WaitingCounterparty,
        incoming: true,
    }];
    let refreshed = wallet
        .refresh(online.clone(), None, filter, false)
        .expect("Failed to refresh");
    let result = refreshed
        .get(&receive_data.batch_transfer_idx)
        .expect("Receive should be refreshed");
    assert_eq!(result.updated_status, Some(TransferStatus::Failed));

    let deleted = wallet
        .delete_transfers(Some(receive_data.batch_transfer_idx), false)
        .expect("Failed transfers can be deleted");
    assert!(deleted);
}

#[test]
#[ignore]
fn test_fail_pending_receive() {
    require_regtest();
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let online = wallet
        .go_online(false, indexer_url())
        .expect("Failed to go online");

    let receive_data = wallet
        .witness_receive(None, None, None, vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create receive");
    let changed = wallet
        .fail_transfers(online, Some(receive_data.batch_transfer_idx), false, false)
        .expect("Failed to fail transfer");
    assert!(changed);

    let transfers = wallet.list_transfers(None).expect("Failed to list transfers");
    assert_eq!(transfers[0].status, TransferStatus::Failed);
}

#[test]
#[ignore]
fn test_witness_receive_settles_once_funded() {
    require_regtest();
    let rpc = BitcoinRpcClient::new();
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let online = wallet
        .go_online(false, indexer_url())
        .expect("Failed to go online");

    let receive_data = wallet
        .witness_receive(None, Some(42), None, vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create receive");
    let script = wallet
        .database()
        .iter_pending_witness_scripts()
        .expect("Failed to list pending scripts")
        .remove(0);
    let script = ScriptBuf::from_hex(&script).expect("Pending script should be hex");
    let address =
        Address::from_script(&script, Network::Regtest).expect("Script should be an address");
    rpc.send_to_address(&address.to_string(), 0.0001)
        .expect("Failed to fund witness output");
    mine(&rpc, 1);

    let refreshed = wallet
        .refresh(online.clone(), None, vec![], false)
        .expect("Failed to refresh");
    assert_eq!(
        refreshed[&receive_data.batch_transfer_idx].updated_status,
        Some(TransferStatus::Settled)
    );
    assert!(wallet
        .database()
        .iter_pending_witness_scripts()
        .expect("Failed to list pending scripts")
        .is_empty());

    let transfers = wallet.list_transfers(None).expect("Failed to list transfers");
    assert_eq!(transfers.len(), 1);
    let transfer = &transfers[0];
    assert_eq!(transfer.kind, TransferKind::ReceiveWitness);
    assert_eq!(transfer.status, TransferStatus::Settled);
    assert_eq!(transfer.amount, 42);
    assert!(transfer.txid.is_some());
    let receive_utxo = transfer
        .receive_utxo
        .clone()
        .expect("Funded receive should have its UTXO");
    assert_eq!(Some(&receive_utxo.txid), transfer.txid.as_ref());

    let unspents = wallet
        .list_unspents(Some(online), true, false)
        .expect("Failed to list unspents");
    let received = unspents
        .iter()
        .find(|u| u.utxo.outpoint == receive_utxo)
        .expect("Receive UTXO should be listed");
    assert_eq!(received.rgb_allocations.len(), 1);
    assert_eq!(received.rgb_allocations[0].amount, 42);
    assert!(received.rgb_allocations[0].settled);
}

#[test]
#[ignore]
fn test_electrum_indexer() {
    require_regtest();
    let rpc = BitcoinRpcClient::new();
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let online = wallet
        .go_online(false, electrum_url())
        .expect("Failed to go online with Electrum");

    fund_wallet(&mut wallet, &rpc, 0.001);
    let balance = wallet
        .get_btc_balance(Some(online.clone()), false)
        .expect("Failed to get balance");
    assert_eq!(balance.vanilla.settled, 100_000);

    let created = wallet
        .create_utxos(online.clone(), false, Some(1), None, 2, false)
        .expect("Failed to create UTXOs");
    assert_eq!(created, 1);
    mine(&rpc, 1);
    wallet.sync(online).expect("Failed to sync");
}
