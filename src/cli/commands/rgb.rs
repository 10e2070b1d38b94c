//! RGB asset and transfer command implementations

use super::{print_json, CliContext, CommandError};
use crate::cli::args::ReceiveArgs;
use crate::database::AssetSchema;
use crate::wallet::RefreshFilter;

pub fn issue_nia(
    ctx: &CliContext,
    ticker: String,
    name: String,
    precision: u8,
    amounts: Vec<u64>,
) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = ctx.go_online(&mut wallet)?;
    print_json(&wallet.issue_asset_nia(online, ticker, name, precision, amounts)?)
}

pub fn issue_cfa(
    ctx: &CliContext,
    name: String,
    details: Option<String>,
    precision: u8,
    amounts: Vec<u64>,
    file: Option<String>,
) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = ctx.go_online(&mut wallet)?;
    print_json(&wallet.issue_asset_cfa(online, name, details, precision, amounts, file)?)
}

pub fn issue_uda(
    ctx: &CliContext,
    ticker: String,
    name: String,
    details: Option<String>,
    precision: u8,
    media: Option<String>,
    attachments: Vec<String>,
) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = ctx.go_online(&mut wallet)?;
    let asset =
        wallet.issue_asset_uda(online, ticker, name, details, precision, media, attachments)?;
    print_json(&asset)
}

pub fn list_assets(ctx: &CliContext, schemas: Vec<AssetSchema>) -> Result<(), CommandError> {
    let (wallet, _) = ctx.open_wallet()?;
    print_json(&wallet.list_assets(schemas)?)
}

pub fn get_asset_balance(ctx: &CliContext, asset_id: String) -> Result<(), CommandError> {
    let (wallet, _) = ctx.open_wallet()?;
    print_json(&wallet.get_asset_balance(asset_id)?)
}

pub fn blind_receive(ctx: &CliContext, args: ReceiveArgs) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let receive_data = wallet.blind_receive(
        args.asset_id,
        args.amount,
        args.duration,
        args.endpoints,
        args.min_confirmations,
    )?;
    print_json(&receive_data)
}

pub fn witness_receive(ctx: &CliContext, args: ReceiveArgs) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let receive_data = wallet.witness_receive(
        args.asset_id,
        args.amount,
        args.duration,
        args.endpoints,
        args.min_confirmations,
    )?;
    print_json(&receive_data)
}

pub fn list_transfers(ctx: &CliContext, asset_id: Option<String>) -> Result<(), CommandError> {
    let (wallet, _) = ctx.open_wallet()?;
    print_json(&wallet.list_transfers(asset_id)?)
}

pub fn refresh(
    ctx: &CliContext,
    asset_id: Option<String>,
    filter: Option<String>,
    skip_sync: bool,
) -> Result<(), CommandError> {
    let filter: Vec<RefreshFilter> = match filter {
        Some(json) => serde_json::from_str(&json)?,
        None => vec![],
    };
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = ctx.go_online(&mut wallet)?;
    print_json(&wallet.refresh(online, asset_id, filter, skip_sync)?)
}

pub fn fail_transfers(
    ctx: &CliContext,
    batch_transfer_idx: Option<i32>,
    no_asset_only: bool,
    skip_sync: bool,
) -> Result<(), CommandError> {
    let (mut wallet, _) = ctx.open_wallet()?;
    let online = ctx.go_online(&mut wallet)?;
    let changed = wallet.fail_transfers(online, batch_transfer_idx, no_asset_only, skip_sync)?;
    print_json(&changed)
}

pub fn delete_transfers(
    ctx: &CliContext,
    batch_transfer_idx: Option<i32>,
    no_asset_only: bool,
) -> Result<(), CommandError> {
    let (wallet, _) = ctx.open_wallet()?;
    print_json(&wallet.delete_transfers(batch_transfer_idx, no_asset_only)?)
}
