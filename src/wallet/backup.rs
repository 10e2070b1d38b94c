//! Encrypted wallet backups
//!
//! A backup is a zip archive with three entries: the format `version`, the
//! wallet `fingerprint` and `backup.enc`, a password-encrypted zip of the
//! wallet directory. Both zips and the encryption are streamed through
//! temporary files so memory use does not depend on the wallet size.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Error;
use crate::storage::{decrypt_stream, encrypt_stream};
use crate::wallet::Wallet;

const BACKUP_VERSION: &str = "1";
const VERSION_ENTRY: &str = "version";
const FINGERPRINT_ENTRY: &str = "fingerprint";
const ENCRYPTED_ENTRY: &str = "backup.enc";
const STAGING_ZIP: &str = "backup.zip";

/// Zip the contents of `dir` into `zip_path`
///
/// Symlinks are not followed and not archived. Returns the number of files.
fn zip_dir(dir: &Path, zip_path: &Path) -> Result<usize, Error> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(zip_path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0;
    for entry in WalkDir::new(dir).follow_links(false).min_depth(1) {
        let entry = entry?;
        let name = archive_name(dir, entry.path())?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(name, options)?;
        } else if file_type.is_file() {
            zip.start_file(name, options)?;
            std::io::copy(&mut File::open(entry.path())?, &mut zip)?;
            files += 1;
        } else {
            log::debug!("Skipping {} (not a regular file)", entry.path().display());
        }
    }
    zip.finish()?.flush()?;
    Ok(files)
}

/// Slash-separated path of `path` relative to `root`
fn archive_name(root: &Path, path: &Path) -> Result<String, Error> {
    let relative = path.strip_prefix(root).map_err(Error::internal)?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Extract `zip_path` below `target`, refusing entries escaping it
fn unzip(zip_path: &Path, target: &Path) -> Result<usize, Error> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(zip_path)?))?;
    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(Error::internal(format!(
                "invalid path in backup: {}",
                entry.name()
            )));
        };
        let path = target.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::io::copy(&mut entry, &mut File::create(&path)?)?;
        files += 1;
    }
    Ok(files)
}

/// Resolve the wallet directory name stored in a backup
fn restore_path(root: &Path, fingerprint: &str) -> Result<PathBuf, Error> {
    let mut components = Path::new(fingerprint).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(root.join(fingerprint)),
        _ => Err(Error::internal(format!(
            "invalid fingerprint in backup: {fingerprint}"
        ))),
    }
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, Error> {
    let mut value = String::new();
    archive.by_name(name)?.read_to_string(&mut value)?;
    Ok(value.trim().to_string())
}

impl Wallet {
    /// Write an encrypted backup of the wallet to `backup_path`
    ///
    /// # Arguments
    ///
    /// * `backup_path` - Destination file, must not exist
    /// * `password` - Password used to encrypt the backup
    pub fn backup(&self, backup_path: &str, password: &str) -> Result<(), Error> {
        log::info!("Backing up to {}...", backup_path);
        if Path::new(backup_path).exists() {
            return Err(Error::FileAlreadyExists {
                path: backup_path.to_string(),
            });
        }

        self.update_backup_info(true)?;

        let fingerprint = self
            .wallet_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::internal("wallet directory has no name"))?;

        let staging = TempDir::new()?;
        let staging_zip = staging.path().join(STAGING_ZIP);
        let files = zip_dir(&self.wallet_dir, &staging_zip)?;
        log::debug!("Archived {} files", files);

        let mut outer = ZipWriter::new(BufWriter::new(File::create(backup_path)?));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        outer.start_file(VERSION_ENTRY, stored)?;
        outer.write_all(BACKUP_VERSION.as_bytes())?;
        outer.start_file(FINGERPRINT_ENTRY, stored)?;
        outer.write_all(fingerprint.as_bytes())?;
        outer.start_file(ENCRYPTED_ENTRY, stored)?;
        encrypt_stream(
            BufReader::new(File::open(&staging_zip)?),
            &mut outer,
            password,
        )?;
        outer.finish()?.flush()?;

        log::info!("Backup completed");
        Ok(())
    }

    /// Whether the wallet changed since the last backup
    ///
    /// Returns false when no operation was ever recorded.
    pub fn backup_info(&self) -> Result<bool, Error> {
        let Some(info) = self.database.get_backup_info()? else {
            return Ok(false);
        };
        let last_backup: i64 = info
            .last_backup_timestamp
            .parse()
            .map_err(Error::internal)?;
        let last_operation: i64 = info
            .last_operation_timestamp
            .parse()
            .map_err(Error::internal)?;
        Ok(last_backup < last_operation)
    }
}

/// Restore a backup into `<target_dir>/<fingerprint>`
///
/// # Example
///
/// ```ignore
/// restore_backup("/tmp/wallet.backup", "password", "/home/user/.rgblib")?;
/// ```
pub fn restore_backup(backup_path: &str, password: &str, target_dir: &str) -> Result<(), Error> {
    log::info!("Restoring backup {}...", backup_path);
    let mut archive = ZipArchive::new(BufReader::new(File::open(backup_path)?))?;

    let version = read_entry(&mut archive, VERSION_ENTRY)?;
    if version != BACKUP_VERSION {
        return Err(Error::UnsupportedBackupVersion { version });
    }

    let fingerprint = read_entry(&mut archive, FINGERPRINT_ENTRY)?;
    let wallet_dir = restore_path(Path::new(target_dir), &fingerprint)?;
    if wallet_dir.exists() && std::fs::read_dir(&wallet_dir)?.next().is_some() {
        return Err(Error::FileAlreadyExists {
            path: wallet_dir.to_string_lossy().to_string(),
        });
    }

    let staging = TempDir::new()?;
    let staging_zip = staging.path().join(STAGING_ZIP);
    decrypt_stream(
        archive.by_name(ENCRYPTED_ENTRY)?,
        BufWriter::new(File::create(&staging_zip)?),
        password,
    )?;

    let files = unzip(&staging_zip, &wallet_dir)?;
    log::info!("Restore completed ({} files)", files);
    Ok(())
}
