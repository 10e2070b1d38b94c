//! CLI argument definitions using clap

use clap::{Parser, Subcommand};

use crate::database::AssetSchema;

#[derive(Parser, Debug)]
#[command(
    name = "rgblib-cli",
    version,
    about = "rgblib CLI - RGB wallet on top of BDK",
    long_about = None
)]
pub struct Cli {
    /// Wallet profile to use
    #[arg(short, long, global = true)]
    pub wallet: Option<String>,

    /// Network to use: regtest, signet, testnet, mainnet (overrides config)
    #[arg(short, long, global = true)]
    pub network: Option<String>,

    /// Esplora indexer URL (overrides config)
    #[arg(long, global = true)]
    pub indexer_url: Option<String>,

    /// Data directory holding wallet directories and profiles
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Password protecting the wallet profile
    #[arg(short, long, global = true)]
    pub password: Option<String>,

    /// Skip the consistency check when going online
    #[arg(long, global = true)]
    pub skip_consistency_check: bool,

    #[command(subcommand)]
    pub command: Commands,
}

fn parse_schema(s: &str) -> Result<AssetSchema, String> {
    match s.to_lowercase().as_str() {
        "nia" => Ok(AssetSchema::Nia),
        "uda" => Ok(AssetSchema::Uda),
        "cfa" => Ok(AssetSchema::Cfa),
        other => Err(format!("unknown schema '{}', use nia, uda or cfa", other)),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize or manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate or restore keys without creating a wallet
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Wallet profile management
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Get a new vanilla address
    GetAddress,

    /// Get the bitcoin balance of both keychains
    GetBtcBalance {
        /// Don't sync with the indexer first
        #[arg(long)]
        skip_sync: bool,
    },

    /// Sync the wallet with the indexer
    Sync,

    /// Create colored UTXOs from vanilla funds
    CreateUtxos {
        /// Count UTXOs with free allocation slots towards --num
        #[arg(long)]
        up_to: bool,

        /// Number of UTXOs to create (default: 5)
        #[arg(long)]
        num: Option<u8>,

        /// Size of each UTXO in sats (default: 1000)
        #[arg(long)]
        size: Option<u32>,

        /// Fee rate in sat/vB
        #[arg(long, default_value = "1")]
        fee_rate: u64,

        #[arg(long)]
        skip_sync: bool,
    },

    /// Issue a Non-Inflatable Asset
    IssueNia {
        #[arg(short, long)]
        ticker: String,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "0")]
        precision: u8,

        /// Comma-separated amounts, one UTXO each
        #[arg(short, long, value_delimiter = ',', required = true)]
        amounts: Vec<u64>,
    },

    /// Issue a Collectible Fungible Asset
    IssueCfa {
        #[arg(long)]
        name: String,

        #[arg(long)]
        details: Option<String>,

        #[arg(long, default_value = "0")]
        precision: u8,

        /// Comma-separated amounts, one UTXO each
        #[arg(short, long, value_delimiter = ',', required = true)]
        amounts: Vec<u64>,

        /// Media file to attach
        #[arg(long)]
        file: Option<String>,
    },

    /// Issue a Unique Digital Asset
    IssueUda {
        #[arg(short, long)]
        ticker: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        details: Option<String>,

        #[arg(long, default_value = "0")]
        precision: u8,

        /// Token media file
        #[arg(long)]
        media: Option<String>,

        /// Attachment files (repeatable)
        #[arg(long = "attachment")]
        attachments: Vec<String>,
    },

    /// List assets, optionally filtered by schema
    ListAssets {
        /// Comma-separated schemas: nia, uda, cfa
        #[arg(long, value_delimiter = ',', value_parser = parse_schema)]
        schemas: Vec<AssetSchema>,
    },

    /// Receive assets on a blinded UTXO
    BlindReceive {
        #[command(flatten)]
        receive: ReceiveArgs,
    },

    /// Receive assets on a new wallet address
    WitnessReceive {
        #[command(flatten)]
        receive: ReceiveArgs,
    },

    /// List transfers, optionally for a single asset
    ListTransfers {
        #[arg(long)]
        asset_id: Option<String>,
    },

    /// List wallet UTXOs with their allocations
    ListUnspents {
        #[arg(long)]
        settled_only: bool,

        #[arg(long)]
        skip_sync: bool,
    },

    /// List wallet transactions
    ListTransactions {
        #[arg(long)]
        skip_sync: bool,
    },

    /// Get the balance of an asset
    GetAssetBalance {
        #[arg(long)]
        asset_id: String,
    },

    /// Estimate the fee rate to confirm within a number of blocks
    GetFeeEstimation {
        #[arg(short, long)]
        blocks: u16,
    },

    /// Send bitcoins from the vanilla keychain
    SendBtc {
        #[arg(long)]
        address: String,

        /// Amount in satoshis
        #[arg(long)]
        amount: u64,

        /// Fee rate in sat/vB
        #[arg(long, default_value = "1")]
        fee_rate: u64,

        #[arg(long)]
        skip_sync: bool,
    },

    /// Refresh pending transfers
    Refresh {
        #[arg(long)]
        asset_id: Option<String>,

        /// JSON list of filters, e.g. '[{"status":"WaitingCounterparty","incoming":true}]'
        #[arg(long)]
        filter: Option<String>,

        #[arg(long)]
        skip_sync: bool,
    },

    /// Set transfers waiting for the counterparty to failed
    FailTransfers {
        #[arg(long)]
        batch_transfer_idx: Option<i32>,

        #[arg(long)]
        no_asset_only: bool,

        #[arg(long)]
        skip_sync: bool,
    },

    /// Delete failed transfers
    DeleteTransfers {
        #[arg(long)]
        batch_transfer_idx: Option<i32>,

        #[arg(long)]
        no_asset_only: bool,
    },

    /// Write an encrypted backup of the wallet
    Backup {
        /// Backup file to create
        #[arg(long)]
        path: String,

        /// Password encrypting the backup
        #[arg(long)]
        backup_password: String,
    },

    /// Restore a backup into the data directory
    RestoreBackup {
        #[arg(long)]
        path: String,

        #[arg(long)]
        backup_password: String,
    },
}

/// Parameters shared by blind and witness receives
#[derive(clap::Args, Debug)]
pub struct ReceiveArgs {
    /// Only accept this asset
    #[arg(long)]
    pub asset_id: Option<String>,

    #[arg(long)]
    pub amount: Option<u64>,

    /// Validity in seconds, 0 for no expiration (default: 86400)
    #[arg(long)]
    pub duration: Option<u32>,

    /// Transport endpoints (repeatable), e.g. rpc://127.0.0.1:3000/json-rpc
    #[arg(long = "endpoint", required = true)]
    pub endpoints: Vec<String>,

    #[arg(long, default_value = "1")]
    pub min_confirmations: u8,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Initialize configuration file with defaults for `--network`
    Init,
}

#[derive(Subcommand, Debug)]
pub enum KeysAction {
    /// Generate a new mnemonic and its account xpub
    Generate,

    /// Derive keys from an existing mnemonic
    Restore {
        #[arg(short, long)]
        mnemonic: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum WalletAction {
    /// Create a new wallet with a generated mnemonic
    Create {
        /// Name of the wallet
        name: String,
    },

    /// Import an existing wallet from a mnemonic phrase
    Import {
        /// Name of the wallet
        name: String,

        /// BIP39 mnemonic phrase
        #[arg(short, long)]
        mnemonic: String,

        /// Store only the xpub, the wallet won't be able to sign
        #[arg(long)]
        watch_only: bool,
    },

    /// List all wallet profiles
    List,
}
