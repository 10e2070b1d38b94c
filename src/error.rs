//! Library error taxonomy
//!
//! Every public operation returns [`Error`]. Lower layers keep their own
//! error enums and are folded in through `#[from]`.

use crate::bitcoin::{BitcoinWalletError, NetworkError, SyncError, UtxoError};
use crate::config::ConfigError;
use crate::database::DatabaseError;
use crate::keys::KeyError;
use crate::storage::{CryptoError, FileSystemError};

/// The error variants returned by library functions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No need to create more UTXOs
    #[error("Allocation already available")]
    AllocationsAlreadyAvailable,

    #[error("Asset with id {asset_id} not found")]
    AssetNotFound { asset_id: String },

    #[error("Batch transfer with index {idx} not found")]
    BatchTransferNotFound { idx: i32 },

    /// A wallet cannot go online twice with different data
    #[error("Cannot change online object")]
    CannotChangeOnline,

    #[error("Batch transfer cannot be deleted")]
    CannotDeleteBatchTransfer,

    #[error("Cannot estimate fees")]
    CannotEstimateFees,

    #[error("Batch transfer cannot be set to failed status")]
    CannotFailBatchTransfer,

    #[error("File is empty")]
    EmptyFile { file_path: String },

    #[error("Failed broadcast: {details}")]
    FailedBroadcast { details: String },

    #[error("Failed bdk sync: {details}")]
    FailedBdkSync { details: String },

    #[error("The file already exists")]
    FileAlreadyExists { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal (database) and external (BDK, contracts, media) data disagree
    #[error("Data is inconsistent ({details}). Please check its integrity.")]
    Inconsistency { details: String },

    #[error("Inexistent data directory")]
    InexistentDataDir,

    #[error("Insufficient allocations")]
    InsufficientAllocationSlots,

    #[error("Insufficient bitcoin funds: needed '{needed}', available '{available}'")]
    InsufficientBitcoins { needed: u64, available: u64 },

    #[error("Internal error: {details}")]
    Internal { details: String },

    #[error("Address error: {details}")]
    InvalidAddress { details: String },

    #[error("Invalid amount zero")]
    InvalidAmountZero,

    #[error("Invalid asset ID: {asset_id}")]
    InvalidAssetID { asset_id: String },

    #[error("Invalid bitcoin keys")]
    InvalidBitcoinKeys,

    #[error("Invalid bitcoin network: {network}")]
    InvalidBitcoinNetwork { network: String },

    #[error("Invalid details: {details}")]
    InvalidDetails { details: String },

    #[error("Invalid number of blocks for fee estimation")]
    InvalidEstimationBlocks,

    #[error("Invalid fee rate: {details}")]
    InvalidFeeRate { details: String },

    #[error("Invalid file path: {file_path}")]
    InvalidFilePath { file_path: String },

    #[error("Invalid indexer: {details}")]
    InvalidIndexer { details: String },

    #[error("Invalid invoice: {details}")]
    InvalidInvoice { details: String },

    #[error("Invalid mnemonic error: {details}")]
    InvalidMnemonic { details: String },

    #[error("Invalid name: {details}")]
    InvalidName { details: String },

    #[error("Invalid precision: {details}")]
    InvalidPrecision { details: String },

    #[error("Invalid PSBT: {details}")]
    InvalidPsbt { details: String },

    #[error("Invalid pubkey: {details}")]
    InvalidPubkey { details: String },

    #[error("The provided recipient ID is invalid")]
    InvalidRecipientID,

    #[error("Invalid ticker: {details}")]
    InvalidTicker { details: String },

    #[error("Invalid transport endpoint: {details}")]
    InvalidTransportEndpoint { details: String },

    #[error("Invalid transport endpoints: {details}")]
    InvalidTransportEndpoints { details: String },

    #[error("The provided vanilla keychain is invalid")]
    InvalidVanillaKeychain,

    #[error("Max fee exceeded for transfer with TXID: {txid}")]
    MaxFeeExceeded { txid: String },

    #[error("Min fee not met for transfer with TXID: {txid}")]
    MinFeeNotMet { txid: String },

    #[error("Issuance request with no provided amounts")]
    NoIssuanceAmounts,

    #[error("Wallet is offline, call go_online first")]
    Offline,

    #[error("Online object is needed to perform this operation")]
    OnlineNeeded,

    #[error("Output below the dust limit")]
    OutputBelowDustLimit,

    #[error("Trying to issue too many assets")]
    TooHighIssuanceAmounts,

    #[error("Too many attachments (max {max})")]
    TooManyAttachments { max: usize },

    #[error("Unknown RGB interface: {interface}")]
    UnknownRgbInterface { interface: String },

    #[error("Unsupported backup version: {version}")]
    UnsupportedBackupVersion { version: String },

    #[error("Transport type is not supported")]
    UnsupportedTransportType,

    #[error("Operation not allowed on watch only wallet")]
    WatchOnly,

    #[error("The provided password is incorrect")]
    WrongPassword,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Bitcoin wallet error: {0}")]
    BitcoinWallet(#[from] BitcoinWalletError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Profile storage error: {0}")]
    FileSystem(#[from] FileSystemError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn internal(details: impl std::fmt::Display) -> Self {
        Error::Internal {
            details: details.to_string(),
        }
    }
}

impl From<KeyError> for Error {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::Bip39(details) => Error::InvalidMnemonic { details },
            KeyError::Bip32(details) => Error::InvalidPubkey { details },
        }
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::WrongPassword => Error::WrongPassword,
            CryptoError::Io(e) => Error::Io(e),
            other => Error::internal(other),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::internal(format!("zip: {e}"))
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        Error::internal(format!("walking wallet dir: {e}"))
    }
}

impl From<SyncError> for Error {
    fn from(e: SyncError) -> Self {
        Error::FailedBdkSync {
            details: e.to_string(),
        }
    }
}

impl From<UtxoError> for Error {
    fn from(e: UtxoError) -> Self {
        match e {
            UtxoError::InsufficientFunds { needed, available } => {
                Error::InsufficientBitcoins { needed, available }
            }
            UtxoError::OutputBelowDustLimit => Error::OutputBelowDustLimit,
            UtxoError::InvalidFeeRate(details) => Error::InvalidFeeRate { details },
            UtxoError::Wallet(e) => Error::BitcoinWallet(e),
            UtxoError::Network(e) => Error::Network(e),
            other => Error::internal(other),
        }
    }
}
