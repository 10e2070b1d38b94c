//! Backup command implementations

use super::{CliContext, CommandError};
use crate::wallet::restore_backup as restore_wallet_backup;

pub fn backup(ctx: &CliContext, path: &str, backup_password: &str) -> Result<(), CommandError> {
    let (wallet, profile) = ctx.open_wallet()?;
    wallet.backup(path, backup_password)?;
    println!("✓ Wallet '{}' backed up to {}", profile.name, path);
    Ok(())
}

/// Restore into the configured data dir
///
/// The profile is not recreated, use `wallet import` afterwards.
pub fn restore_backup(
    ctx: &CliContext,
    path: &str,
    backup_password: &str,
) -> Result<(), CommandError> {
    let data_dir = ctx.config.data_dir()?;
    restore_wallet_backup(path, backup_password, &data_dir.to_string_lossy())?;
    println!("✓ Backup restored into {}", data_dir.display());
    Ok(())
}
