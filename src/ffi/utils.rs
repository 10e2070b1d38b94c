use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::ffi::{c_char, c_void, CStr, CString};
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::null_mut;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{COpaqueStruct, CResult, CResultString, CResultValue};
use crate::config::{BitcoinNetwork, ConfigError};
use crate::database::AssetSchema;
use crate::error::Error as RgbLibError;
use crate::keys;
use crate::wallet::{self, Online, RefreshFilter, Wallet, WalletData};

/// Errors raised while crossing the C boundary
#[derive(Debug, thiserror::Error)]
pub enum FfiError {
    #[error("Error converting JSON: {0}")]
    JsonConversion(#[from] serde_json::Error),

    #[error("{0}")]
    RgbLib(#[from] RgbLibError),

    #[error("Null pointer passed for {0}")]
    NullPointer(&'static str),

    #[error("Type mismatch")]
    TypeMismatch,

    #[error("Panic: {0}")]
    Panic(String),
}

impl From<ConfigError> for FfiError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidNetwork(network) => {
                FfiError::RgbLib(RgbLibError::InvalidBitcoinNetwork { network })
            }
            other => FfiError::RgbLib(other.into()),
        }
    }
}

impl From<keys::KeyError> for FfiError {
    fn from(e: keys::KeyError) -> Self {
        FfiError::RgbLib(e.into())
    }
}

/// Run `f`, turning a panic into [`FfiError::Panic`]
///
/// Handles touched by a panicking call may hold partially updated state;
/// the caller decides whether to keep using them.
pub fn catch_panic<T>(f: impl FnOnce() -> Result<T, FfiError>) -> Result<T, FfiError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("Panic caught at the C boundary: {}", message);
        Err(FfiError::Panic(message))
    })
}

fn type_hash<T: 'static>() -> u64 {
    let mut hasher = DefaultHasher::new();
    TypeId::of::<T>().hash(&mut hasher);
    hasher.finish()
}

impl COpaqueStruct {
    pub(crate) fn new<T: 'static>(value: T) -> Self {
        COpaqueStruct {
            ptr: Box::into_raw(Box::new(value)) as *const c_void,
            ty: type_hash::<T>(),
        }
    }

    fn raw(ptr: *mut c_char) -> Self {
        COpaqueStruct {
            ptr: ptr as *const c_void,
            ty: 0,
        }
    }

    /// Take back ownership of the boxed value, if the handle holds a `T`
    pub(crate) fn into_boxed<T: 'static>(self) -> Option<Box<T>> {
        if self.ptr.is_null() || self.ty != type_hash::<T>() {
            return None;
        }
        // SAFETY: the type hash matches the one recorded by `new::<T>`
        Some(unsafe { Box::from_raw(self.ptr as *mut T) })
    }
}

/// Types handed to C as opaque handles
pub(crate) trait CReturnType: Sized + 'static {
    fn from_opaque<'a>(opaque: &COpaqueStruct) -> Result<&'a mut Self, FfiError> {
        if opaque.ptr.is_null() || opaque.ty != type_hash::<Self>() {
            return Err(FfiError::TypeMismatch);
        }
        // SAFETY: the handle was produced by `COpaqueStruct::new::<Self>` and
        // stays alive until the matching free function is called
        Ok(unsafe { &mut *(opaque.ptr as *mut Self) })
    }
}

impl CReturnType for Wallet {}
impl CReturnType for Online {}

impl<T: 'static> From<Result<T, FfiError>> for CResult {
    fn from(other: Result<T, FfiError>) -> Self {
        match other {
            Ok(value) => CResult {
                result: CResultValue::Ok,
                inner: COpaqueStruct::new(value),
            },
            Err(e) => CResult {
                result: CResultValue::Err,
                inner: COpaqueStruct::raw(string_to_ptr(e.to_string())),
            },
        }
    }
}

impl From<Result<String, FfiError>> for CResultString {
    fn from(other: Result<String, FfiError>) -> Self {
        match other {
            Ok(value) => CResultString {
                result: CResultValue::Ok,
                inner: string_to_ptr(value),
            },
            Err(e) => CResultString {
                result: CResultValue::Err,
                inner: string_to_ptr(e.to_string()),
            },
        }
    }
}

impl From<Result<(), FfiError>> for CResultString {
    fn from(other: Result<(), FfiError>) -> Self {
        match other {
            Ok(()) => CResultString {
                result: CResultValue::Ok,
                inner: null_mut(),
            },
            Err(e) => CResultString {
                result: CResultValue::Err,
                inner: string_to_ptr(e.to_string()),
            },
        }
    }
}

pub(crate) fn string_to_ptr(other: String) -> *mut c_char {
    let cstr = CString::new(other).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    cstr.into_raw()
}

fn ptr_to_string(ptr: *const c_char, name: &'static str) -> Result<String, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::NullPointer(name));
    }
    // SAFETY: C callers pass NUL-terminated strings
    Ok(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn convert_optional_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: see `ptr_to_string`
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

fn convert_number<T: DeserializeOwned>(
    ptr: *const c_char,
    name: &'static str,
) -> Result<T, FfiError> {
    Ok(serde_json::from_str(&ptr_to_string(ptr, name)?)?)
}

fn convert_optional_number<T: DeserializeOwned>(ptr: *const c_char) -> Result<Option<T>, FfiError> {
    convert_optional_string(ptr)
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(FfiError::from)
}

fn convert_json<T: DeserializeOwned>(ptr: *const c_char, name: &'static str) -> Result<T, FfiError> {
    Ok(serde_json::from_str(&ptr_to_string(ptr, name)?)?)
}

/// JSON array of amounts, each either a number or a numeric string
fn convert_amounts(ptr: *const c_char) -> Result<Vec<u64>, FfiError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(u64),
        Text(String),
    }

    let raw: Vec<Amount> = convert_json(ptr, "amounts")?;
    raw.into_iter()
        .map(|a| match a {
            Amount::Number(n) => Ok(n),
            Amount::Text(s) => Ok(serde_json::from_str(s.trim())?),
        })
        .collect()
}

fn convert_optional_online(online: *const COpaqueStruct) -> Result<Option<Online>, FfiError> {
    if online.is_null() {
        return Ok(None);
    }
    // SAFETY: non-null pointers come from a `CResult` returned by go_online
    let opaque = unsafe { &*online };
    Ok(Some(Online::from_opaque(opaque)?.clone()))
}

fn online(online: &COpaqueStruct) -> Result<Online, FfiError> {
    Ok(Online::from_opaque(online)?.clone())
}

pub(crate) fn generate_keys(bitcoin_network: *const c_char) -> Result<String, FfiError> {
    let network = BitcoinNetwork::from_str(&ptr_to_string(bitcoin_network, "bitcoin_network")?)?;
    let res = keys::generate_keys(network)?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn restore_keys(
    bitcoin_network: *const c_char,
    mnemonic: *const c_char,
) -> Result<String, FfiError> {
    let network = BitcoinNetwork::from_str(&ptr_to_string(bitcoin_network, "bitcoin_network")?)?;
    let res = keys::restore_keys(network, &ptr_to_string(mnemonic, "mnemonic")?)?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn new_wallet(wallet_data: *const c_char) -> Result<Wallet, FfiError> {
    let wallet_data: WalletData = convert_json(wallet_data, "wallet_data")?;
    Ok(Wallet::new(wallet_data)?)
}

pub(crate) fn get_address(wallet: &COpaqueStruct) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    Ok(wallet.get_address()?)
}

pub(crate) fn get_btc_balance(
    wallet: &COpaqueStruct,
    online: *const COpaqueStruct,
    skip_sync: bool,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let online = convert_optional_online(online)?;
    let res = wallet.get_btc_balance(online, skip_sync)?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn go_online(
    wallet: &COpaqueStruct,
    skip_consistency_check: bool,
    indexer_url: *const c_char,
) -> Result<Online, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let indexer_url = ptr_to_string(indexer_url, "indexer_url")?;
    Ok(wallet.go_online(skip_consistency_check, indexer_url)?)
}

pub(crate) fn create_utxos(
    wallet: &COpaqueStruct,
    online_opaque: &COpaqueStruct,
    up_to: bool,
    num_opt: *const c_char,
    size_opt: *const c_char,
    fee_rate: *const c_char,
    skip_sync: bool,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let online = online(online_opaque)?;
    let num: Option<u8> = convert_optional_number(num_opt)?;
    let size: Option<u32> = convert_optional_number(size_opt)?;
    let fee_rate: u64 = convert_number(fee_rate, "fee_rate")?;
    let res = wallet.create_utxos(online, up_to, num, size, fee_rate, skip_sync)?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn issue_asset_nia(
    wallet: &COpaqueStruct,
    online_opaque: &COpaqueStruct,
    ticker: *const c_char,
    name: *const c_char,
    precision: *const c_char,
    amounts: *const c_char,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let online = online(online_opaque)?;
    let res = wallet.issue_asset_nia(
        online,
        ptr_to_string(ticker, "ticker")?,
        ptr_to_string(name, "name")?,
        convert_number(precision, "precision")?,
        convert_amounts(amounts)?,
    )?;
    Ok(serde_json::to_string(&res)?)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn issue_asset_cfa(
    wallet: &COpaqueStruct,
    online_opaque: &COpaqueStruct,
    name: *const c_char,
    details_opt: *const c_char,
    precision: *const c_char,
    amounts: *const c_char,
    file_path_opt: *const c_char,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let online = online(online_opaque)?;
    let res = wallet.issue_asset_cfa(
        online,
        ptr_to_string(name, "name")?,
        convert_optional_string(details_opt),
        convert_number(precision, "precision")?,
        convert_amounts(amounts)?,
        convert_optional_string(file_path_opt),
    )?;
    Ok(serde_json::to_string(&res)?)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn issue_asset_uda(
    wallet: &COpaqueStruct,
    online_opaque: &COpaqueStruct,
    ticker: *const c_char,
    name: *const c_char,
    details_opt: *const c_char,
    precision: *const c_char,
    media_file_path_opt: *const c_char,
    attachments_file_paths: *const c_char,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let online = online(online_opaque)?;
    let res = wallet.issue_asset_uda(
        online,
        ptr_to_string(ticker, "ticker")?,
        ptr_to_string(name, "name")?,
        convert_optional_string(details_opt),
        convert_number(precision, "precision")?,
        convert_optional_string(media_file_path_opt),
        convert_json(attachments_file_paths, "attachments_file_paths")?,
    )?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn list_assets(
    wallet: &COpaqueStruct,
    filter_asset_schemas: *const c_char,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let schemas: Vec<AssetSchema> = convert_json(filter_asset_schemas, "filter_asset_schemas")?;
    let res = wallet.list_assets(schemas)?;
    Ok(serde_json::to_string(&res)?)
}

#[derive(Clone, Copy)]
pub(crate) enum ReceiveKind {
    Blind,
    Witness,
}

pub(crate) fn receive(
    kind: ReceiveKind,
    wallet: &COpaqueStruct,
    asset_id_opt: *const c_char,
    amount_opt: *const c_char,
    duration_seconds_opt: *const c_char,
    transport_endpoints: *const c_char,
    min_confirmations: *const c_char,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let asset_id = convert_optional_string(asset_id_opt);
    let amount: Option<u64> = convert_optional_number(amount_opt)?;
    let duration_seconds: Option<u32> = convert_optional_number(duration_seconds_opt)?;
    let transport_endpoints: Vec<String> =
        convert_json(transport_endpoints, "transport_endpoints")?;
    let min_confirmations: u8 = convert_number(min_confirmations, "min_confirmations")?;
    let res = match kind {
        ReceiveKind::Blind => wallet.blind_receive(
            asset_id,
            amount,
            duration_seconds,
            transport_endpoints,
            min_confirmations,
        )?,
        ReceiveKind::Witness => wallet.witness_receive(
            asset_id,
            amount,
            duration_seconds,
            transport_endpoints,
            min_confirmations,
        )?,
    };
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn sync(wallet: &COpaqueStruct, online_opaque: &COpaqueStruct) -> Result<(), FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    wallet.sync(online(online_opaque)?)?;
    Ok(())
}

pub(crate) fn get_fee_estimation(
    wallet: &COpaqueStruct,
    online_opaque: &COpaqueStruct,
    blocks: *const c_char,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let blocks: u16 = convert_number(blocks, "blocks")?;
    let res = wallet.get_fee_estimation(online(online_opaque)?, blocks)?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn list_transfers(
    wallet: &COpaqueStruct,
    asset_id_opt: *const c_char,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let res = wallet.list_transfers(convert_optional_string(asset_id_opt))?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn list_unspents(
    wallet: &COpaqueStruct,
    online: *const COpaqueStruct,
    settled_only: bool,
    skip_sync: bool,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let online = convert_optional_online(online)?;
    let res = wallet.list_unspents(online, settled_only, skip_sync)?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn list_transactions(
    wallet: &COpaqueStruct,
    online: *const COpaqueStruct,
    skip_sync: bool,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let online = convert_optional_online(online)?;
    let res = wallet.list_transactions(online, skip_sync)?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn get_asset_balance(
    wallet: &COpaqueStruct,
    asset_id: *const c_char,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let res = wallet.get_asset_balance(ptr_to_string(asset_id, "asset_id")?)?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn send_btc(
    wallet: &COpaqueStruct,
    online_opaque: &COpaqueStruct,
    address: *const c_char,
    amount: *const c_char,
    fee_rate: *const c_char,
    skip_sync: bool,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let txid = wallet.send_btc(
        online(online_opaque)?,
        ptr_to_string(address, "address")?,
        convert_number(amount, "amount")?,
        convert_number(fee_rate, "fee_rate")?,
        skip_sync,
    )?;
    Ok(txid)
}

pub(crate) fn sign_psbt(wallet: &COpaqueStruct, psbt: *const c_char) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    Ok(wallet.sign_psbt(ptr_to_string(psbt, "psbt")?)?)
}

pub(crate) fn refresh(
    wallet: &COpaqueStruct,
    online_opaque: &COpaqueStruct,
    asset_id_opt: *const c_char,
    filter: *const c_char,
    skip_sync: bool,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let filter: Vec<RefreshFilter> = convert_json(filter, "filter")?;
    let res = wallet.refresh(
        online(online_opaque)?,
        convert_optional_string(asset_id_opt),
        filter,
        skip_sync,
    )?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn fail_transfers(
    wallet: &COpaqueStruct,
    online_opaque: &COpaqueStruct,
    batch_transfer_idx_opt: *const c_char,
    no_asset_only: bool,
    skip_sync: bool,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let batch_transfer_idx: Option<i32> = convert_optional_number(batch_transfer_idx_opt)?;
    let res = wallet.fail_transfers(
        online(online_opaque)?,
        batch_transfer_idx,
        no_asset_only,
        skip_sync,
    )?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn delete_transfers(
    wallet: &COpaqueStruct,
    batch_transfer_idx_opt: *const c_char,
    no_asset_only: bool,
) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    let batch_transfer_idx: Option<i32> = convert_optional_number(batch_transfer_idx_opt)?;
    let res = wallet.delete_transfers(batch_transfer_idx, no_asset_only)?;
    Ok(serde_json::to_string(&res)?)
}

pub(crate) fn backup(
    wallet: &COpaqueStruct,
    backup_path: *const c_char,
    password: *const c_char,
) -> Result<(), FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    wallet.backup(
        &ptr_to_string(backup_path, "backup_path")?,
        &ptr_to_string(password, "password")?,
    )?;
    Ok(())
}

pub(crate) fn backup_info(wallet: &COpaqueStruct) -> Result<String, FfiError> {
    let wallet = Wallet::from_opaque(wallet)?;
    Ok(serde_json::to_string(&wallet.backup_info()?)?)
}

pub(crate) fn restore_backup(
    backup_path: *const c_char,
    password: *const c_char,
    target_dir: *const c_char,
) -> Result<(), FfiError> {
    wallet::restore_backup(
        &ptr_to_string(backup_path, "backup_path")?,
        &ptr_to_string(password, "password")?,
        &ptr_to_string(target_dir, "target_dir")?,
    )?;
    Ok(())
}
