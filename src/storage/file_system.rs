//! File system operations for wallet profiles
//!
//! Manages the profile directory structure and saving/loading profiles.

use std::fs;
use std::path::PathBuf;

use crate::storage::models::WalletProfile;

const PROFILE_FILE: &str = "profile.json";

/// File system errors
#[derive(Debug, thiserror::Error)]
pub enum FileSystemError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Wallet already exists: {0}")]
    WalletExists(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Wallets directory not found")]
    WalletsDirectoryNotFound,
}

/// Get the default profiles directory path
///
/// Returns: `~/.rgblib/wallets/`
pub fn default_wallets_dir() -> Result<PathBuf, FileSystemError> {
    let config_dir = crate::config::default_config_dir()
        .map_err(|_| FileSystemError::WalletsDirectoryNotFound)?;
    Ok(config_dir.join("wallets"))
}

/// Get the profiles directory (custom or default)
pub fn wallets_dir(custom_dir: Option<&str>) -> Result<PathBuf, FileSystemError> {
    match custom_dir {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => default_wallets_dir(),
    }
}

/// Get the directory path for a specific profile
///
/// # Arguments
///
/// * `wallet_name` - Name of the wallet
/// * `custom_base` - Optional custom base directory (for testing)
pub fn profile_dir(wallet_name: &str, custom_base: Option<&str>) -> Result<PathBuf, FileSystemError> {
    Ok(wallets_dir(custom_base)?.join(wallet_name))
}

/// Save a new profile to disk
///
/// # Errors
///
/// Returns error if:
/// - A profile with the same name already exists
/// - Cannot create directories or write the file
///
/// # Example
///
/// ```ignore
/// let profile = WalletProfile::new(params, Some(&keys.mnemonic), "password")?;
/// save_profile(&profile, None)?;
/// ```
pub fn save_profile(
    profile: &WalletProfile,
    custom_base: Option<&str>,
) -> Result<PathBuf, FileSystemError> {
    let path = profile_dir(&profile.name, custom_base)?;

    if path.join(PROFILE_FILE).exists() {
        return Err(FileSystemError::WalletExists(profile.name.clone()));
    }

    fs::create_dir_all(&path)?;
    fs::write(path.join(PROFILE_FILE), serde_json::to_string_pretty(profile)?)?;

    Ok(path)
}

/// Load a profile by name
pub fn load_profile(
    wallet_name: &str,
    custom_base: Option<&str>,
) -> Result<WalletProfile, FileSystemError> {
    let path = profile_dir(wallet_name, custom_base)?.join(PROFILE_FILE);

    if !path.exists() {
        return Err(FileSystemError::WalletNotFound(wallet_name.to_string()));
    }

    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Overwrite an existing profile (e.g. after updating `last_sync`)
pub fn update_profile(
    profile: &WalletProfile,
    custom_base: Option<&str>,
) -> Result<(), FileSystemError> {
    let path = profile_dir(&profile.name, custom_base)?;

    if !path.join(PROFILE_FILE).exists() {
        return Err(FileSystemError::WalletNotFound(profile.name.clone()));
    }

    fs::write(path.join(PROFILE_FILE), serde_json::to_string_pretty(profile)?)?;
    Ok(())
}

/// List all profiles, newest first
pub fn list_profiles(custom_base: Option<&str>) -> Result<Vec<WalletProfile>, FileSystemError> {
    let base = wallets_dir(custom_base)?;

    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut profiles = Vec::new();

    for entry in fs::read_dir(&base)? {
        let path = entry?.path();
        let profile_path = path.join(PROFILE_FILE);
        if !path.is_dir() || !profile_path.exists() {
            continue;
        }

        match fs::read_to_string(&profile_path)
            .map_err(FileSystemError::from)
            .and_then(|json| serde_json::from_str::<WalletProfile>(&json).map_err(Into::into))
        {
            Ok(profile) => profiles.push(profile),
            Err(e) => log::warn!("Skipping unreadable profile at {:?}: {}", path, e),
        }
    }

    profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(profiles)
}

/// Check if a profile exists
pub fn profile_exists(wallet_name: &str, custom_base: Option<&str>) -> bool {
    profile_dir(wallet_name, custom_base)
        .map(|p| p.join(PROFILE_FILE).exists())
        .unwrap_or(false)
}
