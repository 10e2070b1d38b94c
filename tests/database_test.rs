//! Integration tests for the RGB ledger
//!
//! Tests allocation status predicates, the integer encoding of the stored
//! enums and the all-or-nothing behavior of ledger transactions.

use rgblib::database::{
    ColoringType, DatabaseError, DbBatchTransfer, DbTxo, LocalRgbAllocation, RgbLibDatabase,
    TransferStatus,
};
use tempfile::TempDir;

fn allocation(status: TransferStatus, incoming: bool, txo_spent: bool) -> LocalRgbAllocation {
    LocalRgbAllocation {
        asset_id: Some("rgb:asset".to_string()),
        amount: 10,
        status,
        incoming,
        txo_spent,
    }
}

fn batch_transfer() -> DbBatchTransfer {
    DbBatchTransfer {
        idx: 0,
        txid: None,
        status: TransferStatus::WaitingCounterparty,
        expiration: None,
        created_at: 1_700_000_000,
        updated_at: 1_700_000_000,
        min_confirmations: 1,
    }
}

#[test]
fn test_unspent_incoming_settled_allocation_is_settled() {
    let a = allocation(TransferStatus::Settled, true, false);
    assert!(a.settled());
    assert!(!a.future());
}

#[test]
fn test_pending_incoming_allocation_is_future() {
    let a = allocation(TransferStatus::WaitingCounterparty, true, false);
    assert!(!a.settled());
    assert!(a.future());
}

#[test]
fn test_outgoing_allocation_on_spent_txo_counts_until_confirmed() {
    let a = allocation(TransferStatus::WaitingConfirmations, false, true);
    assert!(a.settled());
    let failed = allocation(TransferStatus::Failed, false, true);
    assert!(!failed.settled());
    assert!(!failed.future());
}

#[test]
fn test_coloring_direction() {
    assert!(ColoringType::Receive.incoming());
    assert!(ColoringType::Issue.incoming());
    assert!(ColoringType::Change.incoming());
    assert!(!ColoringType::Input.incoming());
}

#[test]
fn test_status_db_values() {
    for status in [
        TransferStatus::WaitingCounterparty,
        TransferStatus::WaitingConfirmations,
        TransferStatus::Settled,
        TransferStatus::Failed,
    ] {
        assert_eq!(TransferStatus::from_db(status.to_db()), Some(status));
    }
    assert_eq!(TransferStatus::from_db(9), None);
    assert!(TransferStatus::WaitingCounterparty.pending());
    assert!(TransferStatus::WaitingConfirmations.pending());
    assert!(!TransferStatus::Settled.pending());
}

#[test]
fn test_transaction_commits_every_write() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let db = RgbLibDatabase::open(temp.path()).expect("Failed to open database");

    let idx = db
        .transaction(|db| {
            db.set_txo(&DbTxo {
                idx: 0,
                txid: "a".repeat(64),
                vout: 0,
                btc_amount: 1000,
                spent: false,
                exists: true,
            })?;
            db.set_batch_transfer(&batch_transfer())
        })
        .expect("Transaction should commit");

    assert!(idx > 0);
    assert_eq!(db.iter_txos().expect("Failed to list txos").len(), 1);
    assert_eq!(
        db.iter_batch_transfers()
            .expect("Failed to list batch transfers")
            .len(),
        1
    );
}

#[test]
fn test_failed_transaction_leaves_no_rows() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let db = RgbLibDatabase::open(temp.path()).expect("Failed to open database");

    let result: Result<(), DatabaseError> = db.transaction(|db| {
        db.set_batch_transfer(&batch_transfer())?;
        Err(DatabaseError::InvalidData("interrupted".to_string()))
    });

    assert!(result.is_err());
    assert!(db
        .iter_batch_transfers()
        .expect("Failed to list batch transfers")
        .is_empty());

    // the handle stays usable after a rollback
    db.set_batch_transfer(&batch_transfer())
        .expect("Insert after rollback should work");
    assert_eq!(
        db.iter_batch_transfers()
            .expect("Failed to list batch transfers")
            .len(),
        1
    );
}
