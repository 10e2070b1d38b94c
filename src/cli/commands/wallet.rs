//! Wallet profile command implementations

use serde::Serialize;

use super::{print_json, CliContext, CommandError};
use crate::config::BitcoinNetwork;
use crate::error::Error;
use crate::keys::{generate_keys, restore_keys, Keys};
use crate::storage::file_system::{list_profiles, profile_exists, save_profile, FileSystemError};
use crate::storage::{NewProfile, WalletProfile};

#[derive(Debug, Serialize)]
struct CreatedWallet {
    name: String,
    network: BitcoinNetwork,
    fingerprint: String,
    account_xpub: String,
    first_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mnemonic: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProfileSummary {
    name: String,
    network: BitcoinNetwork,
    fingerprint: String,
    watch_only: bool,
    created_at: String,
    last_sync: Option<String>,
}

/// Store a profile for `keys` and initialize the wallet directory
fn store(
    ctx: &CliContext,
    name: String,
    keys: &Keys,
    watch_only: bool,
) -> Result<(WalletProfile, String), CommandError> {
    if profile_exists(&name, ctx.profiles_dir().as_deref()) {
        return Err(FileSystemError::WalletExists(name).into());
    }
    let password = ctx.password()?;
    let data_dir = ctx.config.data_dir()?;
    std::fs::create_dir_all(&data_dir).map_err(Error::from)?;

    let params = NewProfile {
        name,
        network: ctx.config.bitcoin.network,
        account_xpub: keys.account_xpub.clone(),
        fingerprint: keys.account_xpub_fingerprint.clone(),
        data_dir: data_dir.to_string_lossy().to_string(),
        max_allocations_per_utxo: ctx.config.max_allocations_per_utxo,
        vanilla_keychain: None,
    };
    let mnemonic = (!watch_only).then_some(keys.mnemonic.as_str());
    let profile = WalletProfile::new(params, mnemonic, password)?;
    save_profile(&profile, ctx.profiles_dir().as_deref())?;

    let ctx = CliContext {
        wallet: Some(profile.name.clone()),
        ..ctx.clone()
    };
    let (mut wallet, profile) = ctx.open_wallet()?;
    let first_address = wallet.get_address()?;
    Ok((profile, first_address))
}

/// Create a new wallet with a generated mnemonic
pub fn create(ctx: &CliContext, name: String) -> Result<(), CommandError> {
    let keys = generate_keys(ctx.config.bitcoin.network).map_err(Error::from)?;
    let (profile, first_address) = store(ctx, name, &keys, false)?;
    log::info!("Created wallet '{}'", profile.name);

    print_json(&CreatedWallet {
        name: profile.name,
        network: profile.network,
        fingerprint: profile.fingerprint,
        account_xpub: profile.account_xpub,
        first_address,
        mnemonic: Some(keys.mnemonic),
    })
}

/// Import an existing wallet from a mnemonic phrase
pub fn import(
    ctx: &CliContext,
    name: String,
    mnemonic: &str,
    watch_only: bool,
) -> Result<(), CommandError> {
    let keys = restore_keys(ctx.config.bitcoin.network, mnemonic).map_err(Error::from)?;
    let (profile, first_address) = store(ctx, name, &keys, watch_only)?;
    log::info!("Imported wallet '{}' (watch-only: {})", profile.name, watch_only);

    print_json(&CreatedWallet {
        name: profile.name,
        network: profile.network,
        fingerprint: profile.fingerprint,
        account_xpub: profile.account_xpub,
        first_address,
        mnemonic: None,
    })
}

/// List all wallet profiles
pub fn list(ctx: &CliContext) -> Result<(), CommandError> {
    let profiles: Vec<ProfileSummary> = list_profiles(ctx.profiles_dir().as_deref())?
        .into_iter()
        .map(|p| ProfileSummary {
            watch_only: p.is_watch_only(),
            name: p.name,
            network: p.network,
            fingerprint: p.fingerprint,
            created_at: p.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            last_sync: p
                .last_sync
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        })
        .collect();
    print_json(&profiles)
}
