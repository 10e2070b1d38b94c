//! Bitcoin balance and UTXO queries, split per keychain

use crate::bitcoin::BitcoinWallet;
use bdk_wallet::bitcoin::OutPoint;
use bdk_wallet::chain::ChainPosition;
use bdk_wallet::KeychainKind;

const COINBASE_MATURITY: u32 = 100;

/// Balance of a single keychain, in satoshis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeychainBalance {
    /// Confirmed and mature
    pub confirmed: u64,

    /// Unconfirmed outputs
    pub pending: u64,

    /// Confirmed coinbase outputs that cannot be spent yet
    pub immature: u64,
}

impl KeychainBalance {
    /// Everything the keychain owns, confirmed or not
    pub fn total(&self) -> u64 {
        self.confirmed + self.pending + self.immature
    }
}

/// UTXO information
#[derive(Debug, Clone)]
pub struct UtxoInfo {
    /// Output point (txid:vout)
    pub outpoint: OutPoint,

    /// Amount in satoshis
    pub amount: u64,

    /// Block height where this UTXO was confirmed (if confirmed)
    pub confirmation_height: Option<u32>,

    /// Keychain kind (External = colored, Internal = vanilla)
    pub keychain: KeychainKind,
}

/// Balance of one keychain
///
/// # Example
///
/// ```ignore
/// let colored = keychain_balance(&wallet, KeychainKind::External);
/// println!("Confirmed: {} sats", colored.confirmed);
/// ```
pub fn keychain_balance(wallet: &BitcoinWallet, keychain: KeychainKind) -> KeychainBalance {
    let tip = wallet.inner().latest_checkpoint().height();
    let mut balance = KeychainBalance::default();

    for utxo in wallet.unspents(keychain) {
        let value = utxo.txout.value.to_sat();
        match utxo.chain_position {
            ChainPosition::Confirmed { anchor, .. } => {
                let height = anchor.block_id.height;
                let coinbase = wallet
                    .inner()
                    .get_tx(utxo.outpoint.txid)
                    .map(|tx| tx.tx_node.tx.is_coinbase())
                    .unwrap_or(false);
                if coinbase && tip.saturating_sub(height) + 1 < COINBASE_MATURITY {
                    balance.immature += value;
                } else {
                    balance.confirmed += value;
                }
            }
            ChainPosition::Unconfirmed { .. } => balance.pending += value,
        }
    }

    balance
}

/// List unspent outputs of one keychain
pub fn list_utxos(wallet: &BitcoinWallet, keychain: KeychainKind) -> Vec<UtxoInfo> {
    wallet
        .unspents(keychain)
        .into_iter()
        .map(|utxo| {
            let confirmation_height = match utxo.chain_position {
                ChainPosition::Confirmed { anchor, .. } => Some(anchor.block_id.height),
                ChainPosition::Unconfirmed { .. } => None,
            };
            UtxoInfo {
                outpoint: utxo.outpoint,
                amount: utxo.txout.value.to_sat(),
                confirmation_height,
                keychain: utxo.keychain,
            }
        })
        .collect()
}
