//! PSBT construction, signing and extraction
//!
//! Colored outputs are protected by passing them as unspendable, or by
//! selecting inputs manually, so plain bitcoin operations never move RGB
//! allocations.

use crate::bitcoin::{BitcoinWallet, BitcoinWalletError, NetworkError};
use bdk_wallet::bitcoin::{Amount, FeeRate, OutPoint, Psbt, ScriptBuf, Transaction};
use bdk_wallet::error::CreateTxError;
#[allow(deprecated)]
use bdk_wallet::SignOptions;

/// Errors that can occur while building or signing transactions
#[derive(Debug, thiserror::Error)]
pub enum UtxoError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] BitcoinWalletError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Insufficient funds: need {needed} sats, have {available} sats")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Output below the dust limit")]
    OutputBelowDustLimit,

    #[error("Invalid fee rate: {0}")]
    InvalidFeeRate(String),

    #[error("Transaction build failed: {0}")]
    BuildFailed(String),

    #[error("Transaction sign failed: {0}")]
    SignFailed(String),

    #[error("Transaction extraction failed: {0}")]
    ExtractFailed(String),
}

impl From<CreateTxError> for UtxoError {
    fn from(e: CreateTxError) -> Self {
        match e {
            CreateTxError::CoinSelection(insufficient) => UtxoError::InsufficientFunds {
                needed: insufficient.needed.to_sat(),
                available: insufficient.available.to_sat(),
            },
            CreateTxError::OutputBelowDustLimit(_) => UtxoError::OutputBelowDustLimit,
            other => UtxoError::BuildFailed(other.to_string()),
        }
    }
}

/// Fee rate configuration
#[derive(Debug, Clone, Copy)]
pub struct FeeRateConfig {
    /// Fee rate in satoshis per virtual byte (sat/vB)
    pub sat_per_vb: f64,
}

impl FeeRateConfig {
    /// Create a new fee rate configuration
    ///
    /// Rates below 1 sat/vB are rejected since they would not relay.
    pub fn new(sat_per_vb: f64) -> Result<Self, UtxoError> {
        if !sat_per_vb.is_finite() || sat_per_vb < 1.0 {
            return Err(UtxoError::InvalidFeeRate(format!(
                "{} sat/vB is below the minimum of 1",
                sat_per_vb
            )));
        }

        Ok(Self { sat_per_vb })
    }

    /// Convert to BDK FeeRate
    pub fn to_bdk_fee_rate(&self) -> FeeRate {
        // 1 vByte = 4 weight units, so 1 sat/vB = 250 sat/kwu
        let sat_per_kwu = (self.sat_per_vb * 250.0).ceil() as u64;
        FeeRate::from_sat_per_kwu(sat_per_kwu)
    }
}

/// Build a PSBT paying `size` sats to each of `script_pubkeys`
///
/// Only the given vanilla `inputs` fund it, so colored coins are never
/// touched.
pub fn build_split_psbt(
    wallet: &mut BitcoinWallet,
    inputs: &[OutPoint],
    script_pubkeys: &[ScriptBuf],
    size: u64,
    fee_rate: &FeeRateConfig,
) -> Result<Psbt, UtxoError> {
    let mut tx_builder = wallet.inner_mut().build_tx();
    tx_builder
        .add_utxos(inputs)
        .map_err(|e| UtxoError::BuildFailed(format!("Failed to add UTXOs: {}", e)))?;
    tx_builder.manually_selected_only();
    for script in script_pubkeys {
        tx_builder.add_recipient(script.clone(), Amount::from_sat(size));
    }
    tx_builder.fee_rate(fee_rate.to_bdk_fee_rate());

    Ok(tx_builder.finish()?)
}

/// Build a PSBT paying `amount` sats to `script_pubkey`
///
/// Colored outpoints must be passed in `unspendable`.
pub fn build_send_psbt(
    wallet: &mut BitcoinWallet,
    script_pubkey: ScriptBuf,
    amount: u64,
    fee_rate: &FeeRateConfig,
    unspendable: &[OutPoint],
) -> Result<Psbt, UtxoError> {
    let mut tx_builder = wallet.inner_mut().build_tx();
    tx_builder.add_recipient(script_pubkey, Amount::from_sat(amount));
    tx_builder.unspendable(unspendable.to_vec());
    tx_builder.fee_rate(fee_rate.to_bdk_fee_rate());

    Ok(tx_builder.finish()?)
}

/// Build a PSBT sending every spendable coin to `script_pubkey`
///
/// Outpoints in `unspendable` stay in the wallet.
pub fn build_drain_psbt(
    wallet: &mut BitcoinWallet,
    script_pubkey: ScriptBuf,
    fee_rate: &FeeRateConfig,
    unspendable: &[OutPoint],
) -> Result<Psbt, UtxoError> {
    let mut tx_builder = wallet.inner_mut().build_tx();
    tx_builder.drain_wallet();
    tx_builder.drain_to(script_pubkey);
    tx_builder.unspendable(unspendable.to_vec());
    tx_builder.fee_rate(fee_rate.to_bdk_fee_rate());

    Ok(tx_builder.finish()?)
}

/// Sign a PSBT with the wallet keys
///
/// Returns whether the PSBT is fully signed and finalized.
pub fn sign_psbt(wallet: &BitcoinWallet, psbt: &mut Psbt) -> Result<bool, UtxoError> {
    #[allow(deprecated)]
    wallet
        .inner()
        .sign(psbt, SignOptions::default())
        .map_err(|e| UtxoError::SignFailed(format!("Failed to sign transaction: {}", e)))
}

/// Extract the final transaction from a signed PSBT
pub fn extract_tx(psbt: Psbt) -> Result<Transaction, UtxoError> {
    psbt.extract_tx()
        .map_err(|e| UtxoError::ExtractFailed(e.to_string()))
}

/// Fee paid by a PSBT, in sats
pub fn psbt_fee(psbt: &Psbt) -> Result<u64, UtxoError> {
    psbt.fee()
        .map(|f| f.to_sat())
        .map_err(|e| UtxoError::BuildFailed(format!("Failed to calculate fee: {}", e)))
}
