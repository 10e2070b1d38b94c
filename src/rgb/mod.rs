//! Local RGB contract model
//!
//! Asset IDs are RGB [`ContractId`]s committing to the genesis, which is
//! stored as JSON in the wallet's `contracts/` directory. Recipients are
//! RGB beneficiaries bound to a chain network: blinded UTXOs
//! (`<chain>:utxob:...`) or witness outputs (`<chain>:wvout:...`).

pub mod invoice;
pub mod media;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ::invoice::AddressPayload;
use bc::{ScriptPubkey, Txid as BpTxid};
use bdk_wallet::bitcoin::ScriptBuf;
use commit_verify::Conceal;
use rgbinvoice::{Beneficiary, XChainNet};
use rgbstd::invoice::Pay2Vout;
use rgbstd::{ChainNet, ContractId, GraphSeal, SecretSeal};
use seals::txout::BlindSeal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strict_encoding::{tn, TypeName};

use crate::config::BitcoinNetwork;
use crate::database::{AssetSchema, RecipientType};
use crate::error::Error;

pub use self::invoice::{Invoice, InvoiceData, TransportEndpoint};
pub use media::{Media, StoredMedia};

/// Contract directory inside the wallet directory
pub const CONTRACTS_DIR: &str = "contracts";

const GENESIS_TAG: &[u8] = b"urn:rgblib:genesis#2024-06-01";

const MAX_TICKER_LEN: usize = 8;
const MAX_NAME_LEN: usize = 40;
const MAX_PRECISION: u8 = 18;

/// RGB interface an asset schema is exposed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetIface {
    RGB20,
    RGB21,
    RGB25,
}

impl AssetIface {
    /// Interface type name used in invoices
    pub fn to_typename(&self) -> TypeName {
        let variant = match self {
            Self::RGB20 => "Fixed",
            Self::RGB21 => "Unique",
            Self::RGB25 => "Base",
        };
        tn!(format!("{self:?}{variant}"))
    }
}

impl From<AssetSchema> for AssetIface {
    fn from(schema: AssetSchema) -> Self {
        match schema {
            AssetSchema::Nia => AssetIface::RGB20,
            AssetSchema::Uda => AssetIface::RGB21,
            AssetSchema::Cfa => AssetIface::RGB25,
        }
    }
}

impl TryFrom<TypeName> for AssetIface {
    type Error = Error;

    fn try_from(value: TypeName) -> Result<Self, Self::Error> {
        match value.to_string().as_str() {
            "RGB20Fixed" => Ok(AssetIface::RGB20),
            "RGB21Unique" => Ok(AssetIface::RGB21),
            "RGB25Base" => Ok(AssetIface::RGB25),
            other => Err(Error::UnknownRgbInterface {
                interface: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AssetIface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for AssetIface {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RGB20" => Ok(AssetIface::RGB20),
            "RGB21" => Ok(AssetIface::RGB21),
            "RGB25" => Ok(AssetIface::RGB25),
            other => Err(Error::InvalidInvoice {
                details: format!("unknown interface '{}'", other),
            }),
        }
    }
}

impl From<BitcoinNetwork> for ChainNet {
    fn from(network: BitcoinNetwork) -> Self {
        match network {
            BitcoinNetwork::Mainnet => ChainNet::BitcoinMainnet,
            BitcoinNetwork::Testnet => ChainNet::BitcoinTestnet,
            BitcoinNetwork::Signet => ChainNet::BitcoinSignet,
            BitcoinNetwork::Regtest => ChainNet::BitcoinRegtest,
        }
    }
}

impl TryFrom<ChainNet> for BitcoinNetwork {
    type Error = Error;

    fn try_from(chain_net: ChainNet) -> Result<Self, Self::Error> {
        match chain_net {
            ChainNet::BitcoinMainnet => Ok(BitcoinNetwork::Mainnet),
            ChainNet::BitcoinTestnet => Ok(BitcoinNetwork::Testnet),
            ChainNet::BitcoinSignet => Ok(BitcoinNetwork::Signet),
            ChainNet::BitcoinRegtest => Ok(BitcoinNetwork::Regtest),
            other => Err(Error::InvalidBitcoinNetwork {
                network: format!("{:?}", other),
            }),
        }
    }
}

pub fn validate_ticker(ticker: &str) -> Result<(), Error> {
    if ticker.is_empty() {
        return Err(Error::InvalidTicker {
            details: "ticker cannot be empty".to_string(),
        });
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(Error::InvalidTicker {
            details: format!("ticker is longer than {} chars", MAX_TICKER_LEN),
        });
    }
    if !ticker.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidTicker {
            details: "ticker must be alphanumeric".to_string(),
        });
    }
    if ticker.to_ascii_uppercase() != ticker {
        return Err(Error::InvalidTicker {
            details: "ticker needs to be all uppercase".to_string(),
        });
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidName {
            details: format!("name must be 1 to {} chars long", MAX_NAME_LEN),
        });
    }
    if !name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err(Error::InvalidName {
            details: "name must contain printable ASCII only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_precision(precision: u8) -> Result<(), Error> {
    if precision > MAX_PRECISION {
        return Err(Error::InvalidPrecision {
            details: format!("precision is too high (max {})", MAX_PRECISION),
        });
    }
    Ok(())
}

pub fn validate_details(details: Option<&str>) -> Result<(), Error> {
    if details.is_some_and(|d| d.is_empty()) {
        return Err(Error::InvalidDetails {
            details: "ident must contain at least one character".to_string(),
        });
    }
    Ok(())
}

/// Blind `txid:vout` with a random blinding factor, returning the concealed seal
pub fn blind_seal(txid: &str, vout: u32) -> Result<SecretSeal, Error> {
    let txid = BpTxid::from_str(txid).map_err(Error::internal)?;
    let graph_seal = GraphSeal::from(BlindSeal::new_random(txid, vout));
    Ok(graph_seal.conceal())
}

/// Recipient ID of a blinded UTXO on `network`
pub fn blinded_recipient_id(seal: SecretSeal, network: BitcoinNetwork) -> String {
    XChainNet::with(network.into(), Beneficiary::BlindedSeal(seal)).to_string()
}

/// Recipient ID for a witness output paying to `script_pubkey` on `network`
pub fn witness_recipient_id(
    script_pubkey: &ScriptBuf,
    network: BitcoinNetwork,
) -> Result<String, Error> {
    let script_pubkey =
        ScriptPubkey::try_from(script_pubkey.to_bytes()).map_err(Error::internal)?;
    let payload = AddressPayload::from_script(&script_pubkey).map_err(|e| {
        Error::internal(format!("unsupported witness script: {}", e))
    })?;
    let beneficiary = Beneficiary::WitnessVout(Pay2Vout::new(payload));
    Ok(XChainNet::with(network.into(), beneficiary).to_string())
}

fn parse_beneficiary(recipient_id: &str) -> Result<XChainNet<Beneficiary>, Error> {
    XChainNet::<Beneficiary>::from_str(recipient_id).map_err(|_| Error::InvalidRecipientID)
}

/// Classify a recipient ID
pub fn recipient_type(recipient_id: &str) -> Result<RecipientType, Error> {
    Ok(match parse_beneficiary(recipient_id)?.into_inner() {
        Beneficiary::WitnessVout(_) => RecipientType::Witness,
        Beneficiary::BlindedSeal(_) => RecipientType::Blind,
    })
}

/// Network a recipient ID is bound to
pub fn recipient_network(recipient_id: &str) -> Result<BitcoinNetwork, Error> {
    parse_beneficiary(recipient_id)?.chain_network().try_into()
}

/// Media reference embedded in a genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisMedia {
    pub digest: String,
    pub mime: String,
}

impl From<&Media> for GenesisMedia {
    fn from(media: &Media) -> Self {
        Self {
            digest: media.digest.clone(),
            mime: media.mime.clone(),
        }
    }
}

/// The single token of a unique digital asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisToken {
    pub index: u32,
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub details: Option<String>,
    pub media: Option<GenesisMedia>,
    pub attachments: BTreeMap<u8, GenesisMedia>,
}

/// Initial allocation of a contract to a concealed seal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    /// Concealed seal, `utxob:...`
    pub seal: String,
    pub amount: u64,
}

impl GenesisAllocation {
    pub fn new(seal: SecretSeal, amount: u64) -> Self {
        Self {
            seal: seal.to_string(),
            amount,
        }
    }
}

/// Contract genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub schema: AssetSchema,
    pub ticker: Option<String>,
    pub name: String,
    pub details: Option<String>,
    pub precision: u8,
    pub issued_supply: u64,
    pub timestamp: i64,
    pub network: BitcoinNetwork,
    pub allocations: Vec<GenesisAllocation>,
    pub media: Option<GenesisMedia>,
    pub token: Option<GenesisToken>,
}

impl Genesis {
    /// Contract ID committing to the serialized genesis
    ///
    /// The commitment is a tagged SHA-256 of the JSON form.
    pub fn contract_id(&self) -> Result<ContractId, Error> {
        let tag = Sha256::digest(GENESIS_TAG);
        let mut engine = Sha256::new();
        engine.update(tag);
        engine.update(tag);
        engine.update(serde_json::to_vec(self)?);
        let commitment: [u8; 32] = engine.finalize().into();
        Ok(ContractId::from(commitment))
    }
}

fn contract_path(contracts_dir: &Path, contract_id: &str) -> PathBuf {
    contracts_dir.join(format!("{}.json", contract_id.replace(':', "_")))
}

/// Store a genesis, returning its contract ID
pub fn save_contract(contracts_dir: &Path, genesis: &Genesis) -> Result<String, Error> {
    let contract_id = genesis.contract_id()?.to_string();
    let json = serde_json::to_string_pretty(genesis)?;
    std::fs::create_dir_all(contracts_dir)?;
    std::fs::write(contract_path(contracts_dir, &contract_id), json)?;
    log::debug!("Stored contract {}", contract_id);
    Ok(contract_id)
}

pub fn load_contract(contracts_dir: &Path, contract_id: &str) -> Result<Genesis, Error> {
    let path = contract_path(contracts_dir, contract_id);
    if !path.exists() {
        return Err(Error::AssetNotFound {
            asset_id: contract_id.to_string(),
        });
    }
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

pub fn contract_exists(contracts_dir: &Path, contract_id: &str) -> bool {
    contract_path(contracts_dir, contract_id).exists()
}

/// Remove a stored contract, ignoring a missing file
pub fn remove_contract(contracts_dir: &Path, contract_id: &str) {
    let path = contract_path(contracts_dir, contract_id);
    if let Err(e) = std::fs::remove_file(&path) {
        log::warn!("Could not remove contract {}: {}", path.display(), e);
    }
}
