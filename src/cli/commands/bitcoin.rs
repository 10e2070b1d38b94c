//! Bitcoin command implementations

use super::{print_json, CliContext, CommandError};
use crate::storage::file_system::update_profile;

pub fn get_address(ctx: &CliContext) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    print_json(&wallet.get_address()?)
}

pub fn get_btc_balance(ctx: &CliContext, skip_sync: bool) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = if skip_sync {
        None
    } else {
        Some(ctx.go_online(&mut wallet)?)
    };
    print_json(&wallet.get_btc_balance(online, skip_sync)?)
}

/// Sync and record the sync time in the profile
pub fn sync(ctx: &CliContext) -> Result<(), CommandError> {
    let (mut wallet, mut profile) = ctx.open_wallet()?;
    let online = ctx.go_online(&mut wallet)?;
    wallet.sync(online)?;

    profile.update_sync_time();
    update_profile(&profile, ctx.profiles_dir().as_deref())?;

    println!("✓ Wallet synced successfully");
    Ok(())
}

pub fn create_utxos(
    ctx: &CliContext,
    up_to: bool,
    num: Option<u8>,
    size: Option<u32>,
    fee_rate: u64,
    skip_sync: bool,
) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = ctx.go_online(&mut wallet)?;
    let created = wallet.create_utxos(online, up_to, num, size, fee_rate, skip_sync)?;
    print_json(&created)
}

pub fn get_fee_estimation(ctx: &CliContext, blocks: u16) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = ctx.go_online(&mut wallet)?;
    print_json(&wallet.get_fee_estimation(online, blocks)?)
}

pub fn send_btc(
    ctx: &CliContext,
    address: String,
    amount: u64,
    fee_rate: u64,
    skip_sync: bool,
) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = ctx.go_online(&mut wallet)?;
    let txid = wallet.send_btc(online, address, amount, fee_rate, skip_sync)?;
    print_json(&txid)
}

pub fn list_unspents(
    ctx: &CliContext,
    settled_only: bool,
    skip_sync: bool,
) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = if skip_sync {
        None
    } else {
        Some(ctx.go_online(&mut wallet)?)
    };
    print_json(&wallet.list_unspents(online, settled_only, skip_sync)?)
}

pub fn list_transactions(ctx: &CliContext, skip_sync: bool) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = if skip_sync {
        None
    } else {
        Some(ctx.go_online(&mut wallet)?)
    };
    print_json(&wallet.list_transactions(online, skip_sync)?)
}
