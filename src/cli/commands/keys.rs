//! Key command implementations

use super::{print_json, CommandError};
use crate::config::BitcoinNetwork;
use crate::error::Error;

pub fn generate(network: BitcoinNetwork) -> Result<(), CommandError> {
    let keys = crate::keys::generate_keys(network).map_err(Error::from)?;
    print_json(&keys)
}

pub fn restore(network: BitcoinNetwork, mnemonic: &str) -> Result<(), CommandError> {
    let keys = crate::keys::restore_keys(network, mnemonic).map_err(Error::from)?;
    print_json(&keys)
}
