//! Storage layer for CLI wallet profiles
//!
//! Manages password encryption and profile persistence.

pub mod crypto;
pub mod file_system;
pub mod models;

pub use crypto::{decrypt_data, decrypt_stream, encrypt_data, encrypt_stream, CryptoError};
pub use file_system::FileSystemError;
pub use models::{NewProfile, WalletProfile};
