//! Integration tests for encrypted wallet backups
//!
//! Tests backup creation, restoring into a fresh data directory, password
//! checks, refusal to overwrite, malformed archives and the backup-needed
//! flag.

mod common;

use std::io::Write;
use std::path::Path;

use common::{TestWalletEnv, ENDPOINT};
use rgblib::storage::{decrypt_stream, encrypt_stream};
use rgblib::{restore_backup, Error, Wallet};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Write an archive shaped like a backup with the given entries
fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("Failed to create archive");
    let mut zip = ZipWriter::new(file);
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start entry");
        zip.write_all(data).expect("Failed to write entry");
    }
    zip.finish().expect("Failed to finish archive");
}

#[test]
fn test_backup_and_restore_round_trip() {
    let env = TestWalletEnv::new();
    let (mut wallet, keys) = env.new_wallet();
    let receive_data = wallet
        .witness_receive(None, None, None, vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create receive request");

    let backup_path = env.path("wallet.backup");
    let backup_path = backup_path.to_str().expect("valid path");
    wallet
        .backup(backup_path, "backup-password")
        .expect("Failed to back up wallet");
    drop(wallet);

    let restore_dir = env.path("restored");
    std::fs::create_dir_all(&restore_dir).expect("Failed to create restore dir");
    restore_backup(
        backup_path,
        "backup-password",
        restore_dir.to_str().expect("valid path"),
    )
    .expect("Failed to restore backup");
    assert!(
        restore_dir.join(&keys.account_xpub_fingerprint).is_dir(),
        "Backup should restore into the fingerprint directory"
    );

    let mut data = env.wallet_data(&keys, 5);
    data.data_dir = restore_dir.to_string_lossy().to_string();
    let restored = Wallet::new(data).expect("Failed to open restored wallet");
    let transfers = restored
        .list_transfers(None)
        .expect("Failed to list restored transfers");
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].recipient_id, Some(receive_data.recipient_id));
}

#[test]
fn test_restore_with_wrong_password_fails() {
    let env = TestWalletEnv::new();
    let (wallet, _) = env.new_wallet();
    let backup_path = env.path("wallet.backup");
    let backup_path = backup_path.to_str().expect("valid path");
    wallet
        .backup(backup_path, "right")
        .expect("Failed to back up wallet");

    let restore_dir = env.path("restored");
    std::fs::create_dir_all(&restore_dir).expect("Failed to create restore dir");
    let result = restore_backup(backup_path, "wrong", restore_dir.to_str().expect("valid path"));
    assert!(matches!(result, Err(Error::WrongPassword)));
}

#[test]
fn test_backup_refuses_to_overwrite() {
    let env = TestWalletEnv::new();
    let (wallet, _) = env.new_wallet();
    let backup_path = env.path("wallet.backup");
    let backup_path = backup_path.to_str().expect("valid path");
    std::fs::write(backup_path, b"existing").expect("Failed to write file");

    assert!(matches!(
        wallet.backup(backup_path, "password"),
        Err(Error::FileAlreadyExists { .. })
    ));
}

#[test]
fn test_restore_refuses_existing_wallet_dir() {
    let env = TestWalletEnv::new();
    let (wallet, _) = env.new_wallet();
    let backup_path = env.path("wallet.backup");
    let backup_path = backup_path.to_str().expect("valid path");
    wallet
        .backup(backup_path, "password")
        .expect("Failed to back up wallet");

    // the original data dir still holds the wallet
    let result = restore_backup(backup_path, "password", &env.data_dir_str());
    assert!(matches!(result, Err(Error::FileAlreadyExists { .. })));
}

#[test]
fn test_backup_info_tracks_operations() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    assert!(
        !wallet.backup_info().expect("Failed to get backup info"),
        "A fresh wallet needs no backup"
    );

    wallet
        .witness_receive(None, None, None, vec![ENDPOINT.to_string()], 1)
        .expect("Failed to create receive request");
    assert!(wallet.backup_info().expect("Failed to get backup info"));

    let backup_path = env.path("wallet.backup");
    wallet
        .backup(backup_path.to_str().expect("valid path"), "password")
        .expect("Failed to back up wallet");
    assert!(!wallet.backup_info().expect("Failed to get backup info"));
}

#[test]
fn test_restore_rejects_unknown_version() {
    let env = TestWalletEnv::new();
    let backup_path = env.path("wallet.backup");
    write_archive(
        &backup_path,
        &[("version", b"9"), ("fingerprint", b"abcd1234"), ("backup.enc", b"")],
    );

    let result = restore_backup(
        backup_path.to_str().expect("valid path"),
        "password",
        &env.data_dir_str(),
    );
    assert!(matches!(
        result,
        Err(Error::UnsupportedBackupVersion { version }) if version == "9"
    ));
}

#[test]
fn test_restore_rejects_fingerprint_escaping_target() {
    let env = TestWalletEnv::new();
    let target = env.path("restored");
    std::fs::create_dir_all(&target).expect("Failed to create restore dir");

    for fingerprint in ["../escape", "/etc", "a/b"] {
        let backup_path = env.path("crafted.backup");
        let _ = std::fs::remove_file(&backup_path);
        write_archive(
            &backup_path,
            &[
                ("version", b"1"),
                ("fingerprint", fingerprint.as_bytes()),
                ("backup.enc", b""),
            ],
        );
        let result = restore_backup(
            backup_path.to_str().expect("valid path"),
            "password",
            target.to_str().expect("valid path"),
        );
        assert!(
            matches!(result, Err(Error::Internal { .. })),
            "{fingerprint} should be refused"
        );
    }
    assert!(!env.path("escape").exists());
}

#[test]
fn test_restore_rejects_non_archive() {
    let env = TestWalletEnv::new();
    let backup_path = env.path("wallet.backup");
    std::fs::write(&backup_path, b"not a zip").expect("Failed to write file");

    let result = restore_backup(
        backup_path.to_str().expect("valid path"),
        "password",
        &env.data_dir_str(),
    );
    assert!(result.is_err());
}

#[cfg(unix)]
#[test]
fn test_backup_skips_symlink_loops() {
    let env = TestWalletEnv::new();
    let (wallet, keys) = env.new_wallet();
    let wallet_dir = wallet.get_wallet_dir();
    std::os::unix::fs::symlink(&wallet_dir, wallet_dir.join("loop"))
        .expect("Failed to create symlink");

    let backup_path = env.path("wallet.backup");
    let backup_path = backup_path.to_str().expect("valid path");
    wallet
        .backup(backup_path, "password")
        .expect("Backup should not follow symlinks");
    drop(wallet);

    let restore_dir = env.path("restored");
    restore_backup(backup_path, "password", restore_dir.to_str().expect("valid path"))
        .expect("Failed to restore backup");
    let restored_dir = restore_dir.join(&keys.account_xpub_fingerprint);
    assert!(restored_dir.is_dir());
    assert!(
        !restored_dir.join("loop").exists(),
        "Symlinks are not archived"
    );
}

#[test]
fn test_stream_encryption_spans_many_chunks() {
    // not a multiple of the chunk size, to exercise the short last chunk
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let mut encrypted = Vec::new();
    encrypt_stream(data.as_slice(), &mut encrypted, "password").expect("Failed to encrypt");
    assert!(encrypted.len() > data.len());

    let mut decrypted = Vec::new();
    decrypt_stream(encrypted.as_slice(), &mut decrypted, "password").expect("Failed to decrypt");
    assert_eq!(decrypted, data);

    let truncated = &encrypted[..encrypted.len() - 100];
    let mut out = Vec::new();
    assert!(decrypt_stream(truncated, &mut out, "password").is_err());
}
