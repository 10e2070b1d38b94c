//! C ABI
//!
//! Every function returns a [`CResult`] (opaque handle) or a
//! [`CResultString`] (JSON or plain string). On error the string payload
//! holds the error message. Numeric parameters are C strings holding JSON
//! numbers, optional ones are nullable pointers.
//!
//! Strings returned to C must be released with [`rgblib_free_string`],
//! handles with [`free_wallet`] and [`free_online`].
//!
//! Unwinding across `extern "C"` aborts the host process, so every export
//! runs inside [`catch_panic`] and reports a panic as an error result.

mod utils;

use std::ffi::{c_char, c_void, CString};

use crate::wallet::{Online, Wallet};
use utils::ReceiveKind;

pub use utils::{catch_panic, FfiError};

/// A Rust value owned across the C boundary
#[repr(C)]
pub struct COpaqueStruct {
    pub ptr: *const c_void,
    /// Hash of the value's `TypeId`
    pub ty: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CResultValue {
    Ok,
    Err,
}

#[repr(C)]
pub struct CResult {
    pub result: CResultValue,
    pub inner: COpaqueStruct,
}

#[repr(C)]
pub struct CResultString {
    pub result: CResultValue,
    pub inner: *mut c_char,
}

#[no_mangle]
pub extern "C" fn free_wallet(obj: COpaqueStruct) {
    if obj.into_boxed::<Wallet>().is_none() {
        log::warn!("free_wallet called with a handle that is not a wallet");
    }
}

#[no_mangle]
pub extern "C" fn free_online(obj: COpaqueStruct) {
    if obj.into_boxed::<Online>().is_none() {
        log::warn!("free_online called with a handle that is not an online object");
    }
}

/// Release a string returned by this library
#[no_mangle]
pub extern "C" fn rgblib_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // SAFETY: the pointer was produced by `CString::into_raw`
        drop(unsafe { CString::from_raw(ptr) });
    }
}

#[no_mangle]
pub extern "C" fn rgblib_generate_keys(bitcoin_network: *const c_char) -> CResultString {
    utils::catch_panic(|| utils::generate_keys(bitcoin_network)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_restore_keys(
    bitcoin_network: *const c_char,
    mnemonic: *const c_char,
) -> CResultString {
    utils::catch_panic(|| utils::restore_keys(bitcoin_network, mnemonic)).into()
}

/// Create a wallet from a JSON-encoded `WalletData`
///
/// Logging is initialised here so C callers can enable it with `RUST_LOG`.
#[no_mangle]
pub extern "C" fn rgblib_new_wallet(wallet_data: *const c_char) -> CResult {
    let _ = env_logger::try_init();
    utils::catch_panic(|| utils::new_wallet(wallet_data)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_get_address(wallet: &COpaqueStruct) -> CResultString {
    utils::catch_panic(|| utils::get_address(wallet)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_get_btc_balance(
    wallet: &COpaqueStruct,
    online: *const COpaqueStruct,
    skip_sync: bool,
) -> CResultString {
    utils::catch_panic(|| utils::get_btc_balance(wallet, online, skip_sync)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_go_online(
    wallet: &COpaqueStruct,
    skip_consistency_check: bool,
    indexer_url: *const c_char,
) -> CResult {
    utils::catch_panic(|| utils::go_online(wallet, skip_consistency_check, indexer_url)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_create_utxos(
    wallet: &COpaqueStruct,
    online: &COpaqueStruct,
    up_to: bool,
    num_opt: *const c_char,
    size_opt: *const c_char,
    fee_rate: *const c_char,
    skip_sync: bool,
) -> CResultString {
    utils::catch_panic(|| {
        utils::create_utxos(wallet, online, up_to, num_opt, size_opt, fee_rate, skip_sync)
    })
    .into()
}

#[no_mangle]
pub extern "C" fn rgblib_issue_asset_nia(
    wallet: &COpaqueStruct,
    online: &COpaqueStruct,
    ticker: *const c_char,
    name: *const c_char,
    precision: *const c_char,
    amounts: *const c_char,
) -> CResultString {
    utils::catch_panic(|| {
        utils::issue_asset_nia(wallet, online, ticker, name, precision, amounts)
    })
    .into()
}

#[no_mangle]
pub extern "C" fn rgblib_issue_asset_cfa(
    wallet: &COpaqueStruct,
    online: &COpaqueStruct,
    name: *const c_char,
    details_opt: *const c_char,
    precision: *const c_char,
    amounts: *const c_char,
    file_path_opt: *const c_char,
) -> CResultString {
    utils::catch_panic(|| {
        utils::issue_asset_cfa(
            wallet,
            online,
            name,
            details_opt,
            precision,
            amounts,
            file_path_opt,
        )
    })
    .into()
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn rgblib_issue_asset_uda(
    wallet: &COpaqueStruct,
    online: &COpaqueStruct,
    ticker: *const c_char,
    name: *const c_char,
    details_opt: *const c_char,
    precision: *const c_char,
    media_file_path_opt: *const c_char,
    attachments_file_paths: *const c_char,
) -> CResultString {
    utils::catch_panic(|| {
        utils::issue_asset_uda(
            wallet,
            online,
            ticker,
            name,
            details_opt,
            precision,
            media_file_path_opt,
            attachments_file_paths,
        )
    })
    .into()
}

#[no_mangle]
pub extern "C" fn rgblib_list_assets(
    wallet: &COpaqueStruct,
    filter_asset_schemas: *const c_char,
) -> CResultString {
    utils::catch_panic(|| utils::list_assets(wallet, filter_asset_schemas)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_blind_receive(
    wallet: &COpaqueStruct,
    asset_id_opt: *const c_char,
    amount_opt: *const c_char,
    duration_seconds_opt: *const c_char,
    transport_endpoints: *const c_char,
    min_confirmations: *const c_char,
) -> CResultString {
    utils::catch_panic(|| {
        utils::receive(
            ReceiveKind::Blind,
            wallet,
            asset_id_opt,
            amount_opt,
            duration_seconds_opt,
            transport_endpoints,
            min_confirmations,
        )
    })
    .into()
}

#[no_mangle]
pub extern "C" fn rgblib_witness_receive(
    wallet: &COpaqueStruct,
    asset_id_opt: *const c_char,
    amount_opt: *const c_char,
    duration_seconds_opt: *const c_char,
    transport_endpoints: *const c_char,
    min_confirmations: *const c_char,
) -> CResultString {
    utils::catch_panic(|| {
        utils::receive(
            ReceiveKind::Witness,
            wallet,
            asset_id_opt,
            amount_opt,
            duration_seconds_opt,
            transport_endpoints,
            min_confirmations,
        )
    })
    .into()
}

#[no_mangle]
pub extern "C" fn rgblib_sync(wallet: &COpaqueStruct, online: &COpaqueStruct) -> CResultString {
    utils::catch_panic(|| utils::sync(wallet, online)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_get_fee_estimation(
    wallet: &COpaqueStruct,
    online: &COpaqueStruct,
    blocks: *const c_char,
) -> CResultString {
    utils::catch_panic(|| utils::get_fee_estimation(wallet, online, blocks)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_list_transfers(
    wallet: &COpaqueStruct,
    asset_id_opt: *const c_char,
) -> CResultString {
    utils::catch_panic(|| utils::list_transfers(wallet, asset_id_opt)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_list_unspents(
    wallet: &COpaqueStruct,
    online: *const COpaqueStruct,
    settled_only: bool,
    skip_sync: bool,
) -> CResultString {
    utils::catch_panic(|| utils::list_unspents(wallet, online, settled_only, skip_sync)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_list_transactions(
    wallet: &COpaqueStruct,
    online: *const COpaqueStruct,
    skip_sync: bool,
) -> CResultString {
    utils::catch_panic(|| utils::list_transactions(wallet, online, skip_sync)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_get_asset_balance(
    wallet: &COpaqueStruct,
    asset_id: *const c_char,
) -> CResultString {
    utils::catch_panic(|| utils::get_asset_balance(wallet, asset_id)).into()
}

/// Returns the bare txid
#[no_mangle]
pub extern "C" fn rgblib_send_btc(
    wallet: &COpaqueStruct,
    online: &COpaqueStruct,
    address: *const c_char,
    amount: *const c_char,
    fee_rate: *const c_char,
    skip_sync: bool,
) -> CResultString {
    utils::catch_panic(|| {
        utils::send_btc(wallet, online, address, amount, fee_rate, skip_sync)
    })
    .into()
}

#[no_mangle]
pub extern "C" fn rgblib_sign_psbt(wallet: &COpaqueStruct, psbt: *const c_char) -> CResultString {
    utils::catch_panic(|| utils::sign_psbt(wallet, psbt)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_refresh(
    wallet: &COpaqueStruct,
    online: &COpaqueStruct,
    asset_id_opt: *const c_char,
    filter: *const c_char,
    skip_sync: bool,
) -> CResultString {
    utils::catch_panic(|| utils::refresh(wallet, online, asset_id_opt, filter, skip_sync)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_fail_transfers(
    wallet: &COpaqueStruct,
    online: &COpaqueStruct,
    batch_transfer_idx_opt: *const c_char,
    no_asset_only: bool,
    skip_sync: bool,
) -> CResultString {
    utils::catch_panic(|| {
        utils::fail_transfers(wallet, online, batch_transfer_idx_opt, no_asset_only, skip_sync)
    })
    .into()
}

#[no_mangle]
pub extern "C" fn rgblib_delete_transfers(
    wallet: &COpaqueStruct,
    batch_transfer_idx_opt: *const c_char,
    no_asset_only: bool,
) -> CResultString {
    utils::catch_panic(|| {
        utils::delete_transfers(wallet, batch_transfer_idx_opt, no_asset_only)
    })
    .into()
}

#[no_mangle]
pub extern "C" fn rgblib_backup(
    wallet: &COpaqueStruct,
    backup_path: *const c_char,
    password: *const c_char,
) -> CResultString {
    utils::catch_panic(|| utils::backup(wallet, backup_path, password)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_backup_info(wallet: &COpaqueStruct) -> CResultString {
    utils::catch_panic(|| utils::backup_info(wallet)).into()
}

#[no_mangle]
pub extern "C" fn rgblib_restore_backup(
    backup_path: *const c_char,
    password: *const c_char,
    target_dir: *const c_char,
) -> CResultString {
    utils::catch_panic(|| utils::restore_backup(backup_path, password, target_dir)).into()
}
