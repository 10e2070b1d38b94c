//! rgblib CLI
//!
//! Command-line interface driving the rgblib wallet API

use clap::Parser;
use rgblib::cli::args::{Cli, Commands, ConfigAction, KeysAction, WalletAction};
use rgblib::cli::commands::{self, CliContext, CommandError};
use rgblib::config::{load_config, BitcoinNetwork, ConfigOverrides};
use std::process;

fn run(cli: Cli) -> Result<(), CommandError> {
    let network = cli
        .network
        .as_deref()
        .map(str::parse::<BitcoinNetwork>)
        .transpose()?;

    let command = match cli.command {
        Commands::Config {
            action: ConfigAction::Init,
        } => return Ok(commands::config::init(network)?),
        command => command,
    };

    let overrides = ConfigOverrides {
        network,
        indexer_url: cli.indexer_url.clone(),
        data_dir: cli.data_dir.clone(),
        max_allocations_per_utxo: None,
    };
    let config = load_config(None, overrides)?;
    let bitcoin_network = config.bitcoin.network;
    let ctx = CliContext {
        wallet: cli.wallet,
        password: cli.password,
        skip_consistency_check: cli.skip_consistency_check,
        ..CliContext::new(config)
    };

    match command {
        // handled before loading the config
        Commands::Config { .. } => Ok(()),

        Commands::Keys { action } => match action {
            KeysAction::Generate => commands::keys::generate(bitcoin_network),
            KeysAction::Restore { mnemonic } => {
                commands::keys::restore(bitcoin_network, &mnemonic)
            }
        },

        Commands::Wallet { action } => match action {
            WalletAction::Create { name } => commands::wallet::create(&ctx, name),
            WalletAction::Import {
                name,
                mnemonic,
                watch_only,
            } => commands::wallet::import(&ctx, name, &mnemonic, watch_only),
            WalletAction::List => commands::wallet::list(&ctx),
        },

        Commands::GetAddress => commands::bitcoin::get_address(&ctx),

        Commands::GetBtcBalance { skip_sync } => {
            commands::bitcoin::get_btc_balance(&ctx, skip_sync)
        }

        Commands::Sync => commands::bitcoin::sync(&ctx),

        Commands::CreateUtxos {
            up_to,
            num,
            size,
            fee_rate,
            skip_sync,
        } => commands::bitcoin::create_utxos(&ctx, up_to, num, size, fee_rate, skip_sync),

        Commands::IssueNia {
            ticker,
            name,
            precision,
            amounts,
        } => commands::rgb::issue_nia(&ctx, ticker, name, precision, amounts),

        Commands::IssueCfa {
            name,
            details,
            precision,
            amounts,
            file,
        } => commands::rgb::issue_cfa(&ctx, name, details, precision, amounts, file),

        Commands::IssueUda {
            ticker,
            name,
            details,
            precision,
            media,
            attachments,
        } => commands::rgb::issue_uda(&ctx, ticker, name, details, precision, media, attachments),

        Commands::ListAssets { schemas } => commands::rgb::list_assets(&ctx, schemas),

        Commands::BlindReceive { receive } => commands::rgb::blind_receive(&ctx, receive),

        Commands::WitnessReceive { receive } => commands::rgb::witness_receive(&ctx, receive),

        Commands::ListTransfers { asset_id } => commands::rgb::list_transfers(&ctx, asset_id),

        Commands::ListUnspents {
            settled_only,
            skip_sync,
        } => commands::bitcoin::list_unspents(&ctx, settled_only, skip_sync),

        Commands::ListTransactions { skip_sync } => {
            commands::bitcoin::list_transactions(&ctx, skip_sync)
        }

        Commands::GetAssetBalance { asset_id } => {
            commands::rgb::get_asset_balance(&ctx, asset_id)
        }

        Commands::GetFeeEstimation { blocks } => {
            commands::bitcoin::get_fee_estimation(&ctx, blocks)
        }

        Commands::SendBtc {
            address,
            amount,
            fee_rate,
            skip_sync,
        } => commands::bitcoin::send_btc(&ctx, address, amount, fee_rate, skip_sync),

        Commands::Refresh {
            asset_id,
            filter,
            skip_sync,
        } => commands::rgb::refresh(&ctx, asset_id, filter, skip_sync),

        Commands::FailTransfers {
            batch_transfer_idx,
            no_asset_only,
            skip_sync,
        } => commands::rgb::fail_transfers(&ctx, batch_transfer_idx, no_asset_only, skip_sync),

        Commands::DeleteTransfers {
            batch_transfer_idx,
            no_asset_only,
        } => commands::rgb::delete_transfers(&ctx, batch_transfer_idx, no_asset_only),

        Commands::Backup {
            path,
            backup_password,
        } => commands::backup::backup(&ctx, &path, &backup_password),

        Commands::RestoreBackup {
            path,
            backup_password,
        } => commands::backup::restore_backup(&ctx, &path, &backup_password),
    }
}

fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
