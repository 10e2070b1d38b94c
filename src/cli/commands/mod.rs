//! CLI command implementations
//!
//! Commands print their result as pretty JSON on stdout.

pub mod backup;
pub mod bitcoin;
pub mod config;
pub mod keys;
pub mod rgb;
pub mod wallet;

use serde::Serialize;

use crate::config::{ConfigError, GlobalConfig};
use crate::error::Error;
use crate::storage::file_system::{load_profile, FileSystemError};
use crate::storage::{CryptoError, WalletProfile};
use crate::wallet::{DatabaseType, Online, Wallet, WalletData};

const PROFILES_DIR: &str = "profiles";

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("File system error: {0}")]
    FileSystem(#[from] FileSystemError),

    #[error("{0}")]
    RgbLib(#[from] Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Wallet not specified. Use --wallet <name>")]
    WalletNotSpecified,

    #[error("Password required. Use --password <password>")]
    PasswordRequired,
}

impl From<CryptoError> for CommandError {
    fn from(e: CryptoError) -> Self {
        CommandError::RgbLib(e.into())
    }
}

/// Resolved configuration plus the global CLI options
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: GlobalConfig,
    pub wallet: Option<String>,
    pub password: Option<String>,
    pub skip_consistency_check: bool,
}

impl CliContext {
    pub fn new(config: GlobalConfig) -> Self {
        Self {
            config,
            wallet: None,
            password: None,
            skip_consistency_check: false,
        }
    }

    /// Profiles live next to the data dir when one is configured
    pub fn profiles_dir(&self) -> Option<String> {
        self.config.data_dir.as_ref().map(|dir| {
            std::path::Path::new(dir)
                .join(PROFILES_DIR)
                .to_string_lossy()
                .to_string()
        })
    }

    pub(crate) fn password(&self) -> Result<&str, CommandError> {
        self.password
            .as_deref()
            .ok_or(CommandError::PasswordRequired)
    }

    /// Open the wallet named by `--wallet`
    pub fn open_wallet(&self) -> Result<(Wallet, WalletProfile), CommandError> {
        let name = self
            .wallet
            .as_deref()
            .ok_or(CommandError::WalletNotSpecified)?;
        let profile = load_profile(name, self.profiles_dir().as_deref())?;
        let mnemonic = if profile.is_watch_only() {
            None
        } else {
            profile.mnemonic(self.password()?)?
        };

        let wallet = Wallet::new(WalletData {
            data_dir: profile.data_dir.clone(),
            bitcoin_network: profile.network,
            database_type: DatabaseType::Sqlite,
            max_allocations_per_utxo: profile.max_allocations_per_utxo,
            pubkey: profile.account_xpub.clone(),
            mnemonic,
            vanilla_keychain: profile.vanilla_keychain,
        })?;
        log::debug!("Opened wallet '{}' ({})", profile.name, profile.fingerprint);
        Ok((wallet, profile))
    }

    /// Connect `wallet` to the configured indexer
    pub fn go_online(&self, wallet: &mut Wallet) -> Result<Online, CommandError> {
        Ok(wallet.go_online(
            self.skip_consistency_check,
            self.config.bitcoin.indexer_url.clone(),
        )?)
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
