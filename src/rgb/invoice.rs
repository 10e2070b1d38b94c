//! RGB invoices and transport endpoints
//!
//! Invoices use the RGB URI form, for example:
//!
//! ```text
//! rgb:<contract>/RGB20Fixed/<amount>+bcrt:utxob:<seal>?expiry=<ts>&endpoints=rpc://host/json-rpc
//! ```

use std::fmt;
use std::str::FromStr;

use rgbinvoice::{Beneficiary, RgbInvoice, RgbInvoiceBuilder, RgbTransport, XChainNet};
use rgbstd::invoice::InvoiceState;
use rgbstd::{ChainNet, ContractId};
use serde::{Deserialize, Serialize};

use crate::config::BitcoinNetwork;
use crate::database::{RecipientType, TransportType};
use crate::error::Error;
use crate::rgb::{recipient_type, AssetIface};

/// Characters that would split the invoice query apart
const RESERVED_ENDPOINT_CHARS: [char; 5] = [',', '&', '?', '#', '='];

/// A parsed consignment transport endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportEndpoint {
    pub endpoint: String,
    pub transport_type: TransportType,
}

impl TransportEndpoint {
    /// Parse an endpoint like `rpc://host:port/json-rpc`
    ///
    /// `rpc://` and `rpcs://` map to JSON-RPC over HTTP and HTTPS.
    pub fn new(transport_endpoint: String) -> Result<Self, Error> {
        if let Some(c) = transport_endpoint
            .chars()
            .find(|c| RESERVED_ENDPOINT_CHARS.contains(c) || c.is_whitespace())
        {
            return Err(Error::InvalidTransportEndpoint {
                details: format!("'{}' is not allowed in '{}'", c, transport_endpoint),
            });
        }
        let rgb_transport = RgbTransport::from_str(&transport_endpoint).map_err(|e| {
            Error::InvalidTransportEndpoint {
                details: e.to_string(),
            }
        })?;
        TransportEndpoint::try_from(rgb_transport)
    }

    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }
}

impl TryFrom<RgbTransport> for TransportEndpoint {
    type Error = Error;

    fn try_from(transport: RgbTransport) -> Result<Self, Self::Error> {
        match transport {
            RgbTransport::JsonRpc { tls, host } => Ok(TransportEndpoint {
                endpoint: format!("http{}://{}", if tls { "s" } else { "" }, host),
                transport_type: TransportType::JsonRpc,
            }),
            _ => Err(Error::UnsupportedTransportType),
        }
    }
}

/// Fields of an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceData {
    pub recipient_id: String,
    pub asset_iface: Option<AssetIface>,
    pub asset_id: Option<String>,
    pub amount: Option<u64>,
    pub expiration_timestamp: Option<i64>,
    pub transport_endpoints: Vec<String>,
    pub network: BitcoinNetwork,
}

/// A validated RGB invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    invoice_string: String,
    invoice_data: InvoiceData,
}

impl Invoice {
    /// Parse and validate an invoice string
    pub fn new(invoice_string: String) -> Result<Self, Error> {
        let decoded = RgbInvoice::from_str(&invoice_string).map_err(|e| Error::InvalidInvoice {
            details: e.to_string(),
        })?;
        let amount = match decoded.owned_state {
            InvoiceState::Amount(v) => Some(v.value()),
            _ => None,
        };
        let asset_iface = decoded.iface.map(AssetIface::try_from).transpose()?;
        let transport_endpoints = decoded
            .transports
            .iter()
            .map(|t| t.to_string())
            .collect();
        let network = decoded.beneficiary.chain_network().try_into()?;

        let invoice_data = InvoiceData {
            recipient_id: decoded.beneficiary.to_string(),
            asset_iface,
            asset_id: decoded.contract.map(|cid| cid.to_string()),
            amount,
            expiration_timestamp: decoded.expiry,
            transport_endpoints,
            network,
        };
        Ok(Self {
            invoice_string,
            invoice_data,
        })
    }

    /// Build an invoice from its fields
    ///
    /// The recipient is re-bound to `invoice_data.network`.
    pub fn from_invoice_data(invoice_data: InvoiceData) -> Result<Self, Error> {
        let beneficiary = XChainNet::<Beneficiary>::from_str(&invoice_data.recipient_id)
            .map_err(|_| Error::InvalidRecipientID)?
            .into_inner();
        let network: ChainNet = invoice_data.network.into();
        let mut builder = RgbInvoiceBuilder::new(XChainNet::with(network, beneficiary));

        if let Some(asset_iface) = &invoice_data.asset_iface {
            builder = builder.set_interface(asset_iface.to_typename());
        }
        if let Some(asset_id) = &invoice_data.asset_id {
            let contract_id =
                ContractId::from_str(asset_id).map_err(|_| Error::InvalidAssetID {
                    asset_id: asset_id.clone(),
                })?;
            builder = builder.set_contract(contract_id);
        }
        for endpoint in &invoice_data.transport_endpoints {
            TransportEndpoint::new(endpoint.clone())?;
            builder = builder
                .add_transport(endpoint)
                .map_err(|(_, e)| Error::InvalidTransportEndpoint {
                    details: e.to_string(),
                })?;
        }
        if let Some(amount) = invoice_data.amount {
            builder = builder.set_amount_raw(amount);
        }
        if let Some(expiry) = invoice_data.expiration_timestamp {
            builder = builder.set_expiry_timestamp(expiry);
        }

        let invoice_string = builder.finish().to_string();
        Ok(Self {
            invoice_string,
            invoice_data,
        })
    }

    pub fn invoice_data(&self) -> InvoiceData {
        self.invoice_data.clone()
    }

    pub fn invoice_string(&self) -> String {
        self.invoice_string.clone()
    }

    pub fn recipient_type(&self) -> Result<RecipientType, Error> {
        recipient_type(&self.invoice_data.recipient_id)
    }
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.invoice_string)
    }
}

impl FromStr for Invoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Invoice::new(s.to_string())
    }
}
