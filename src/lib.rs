//! rgblib
//!
//! RGB wallet library on top of BDK. Keeps colored and vanilla bitcoin
//! keychains apart, tracks RGB allocations in a SQLite ledger and exposes
//! the wallet through a Rust API, a C ABI and a CLI.

pub mod bitcoin;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod ffi;
pub mod keys;
pub mod rgb;
pub mod storage;
pub mod wallet;

pub use crate::config::BitcoinNetwork;
pub use crate::database::{AssetSchema, TransferStatus};
pub use crate::error::Error;
pub use crate::keys::{generate_keys, restore_keys, Keys};
pub use crate::wallet::{restore_backup, Online, Wallet, WalletData};
