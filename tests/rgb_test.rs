//! Integration tests for the RGB contract model
//!
//! Tests issuance field validation, recipient IDs, transport endpoints,
//! invoices and media storage.

mod common;

use std::str::FromStr;

use bdk_wallet::bitcoin::Address;
use common::{TestWalletEnv, ENDPOINT};
use rgblib::database::{RecipientType, TransportType};
use rgblib::rgb::{
    blind_seal, blinded_recipient_id, recipient_network, recipient_type, validate_details,
    validate_name, validate_precision, validate_ticker, witness_recipient_id, AssetIface,
    Invoice, InvoiceData, Media, TransportEndpoint,
};
use rgblib::{BitcoinNetwork, Error};

const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR\x00\x00\x00\x01\x00\x00\x00\x01";

fn blinded_id(network: BitcoinNetwork) -> String {
    let seal = blind_seal(&"d".repeat(64), 1).expect("Failed to blind seal");
    blinded_recipient_id(seal, network)
}

#[test]
fn test_ticker_rules() {
    validate_ticker("USDT").expect("Valid ticker");
    validate_ticker("BTC2").expect("Digits are allowed");
    for bad in ["", "usdt", "TOOLONGTK", "US-D"] {
        assert!(
            matches!(validate_ticker(bad), Err(Error::InvalidTicker { .. })),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn test_name_precision_and_details_rules() {
    validate_name("Tether USD").expect("Valid name");
    assert!(matches!(validate_name(""), Err(Error::InvalidName { .. })));
    assert!(matches!(
        validate_name(&"n".repeat(41)),
        Err(Error::InvalidName { .. })
    ));
    assert!(matches!(validate_name("tab\there"), Err(Error::InvalidName { .. })));

    validate_precision(18).expect("Max precision");
    assert!(matches!(
        validate_precision(19),
        Err(Error::InvalidPrecision { .. })
    ));

    validate_details(None).expect("No details");
    validate_details(Some("info")).expect("Some details");
    assert!(matches!(
        validate_details(Some("")),
        Err(Error::InvalidDetails { .. })
    ));
}

#[test]
fn test_blinded_recipient_is_bound_to_network() {
    let recipient_id = blinded_id(BitcoinNetwork::Regtest);
    assert_eq!(
        recipient_type(&recipient_id).expect("Valid recipient"),
        RecipientType::Blind
    );
    assert_eq!(
        recipient_network(&recipient_id).expect("Valid recipient"),
        BitcoinNetwork::Regtest
    );

    let other = blinded_id(BitcoinNetwork::Regtest);
    assert_ne!(recipient_id, other, "Each blinding is random");

    assert!(matches!(
        recipient_type("not-a-recipient"),
        Err(Error::InvalidRecipientID)
    ));
}

#[test]
fn test_witness_recipient_pays_to_wallet_script() {
    let env = TestWalletEnv::new();
    let (mut wallet, _) = env.new_wallet();
    let address = wallet.get_address().expect("Failed to get address");
    let script = Address::from_str(&address)
        .expect("Valid address")
        .assume_checked()
        .script_pubkey();

    let recipient_id =
        witness_recipient_id(&script, BitcoinNetwork::Regtest).expect("Failed to build recipient");
    assert_eq!(
        recipient_type(&recipient_id).expect("Valid recipient"),
        RecipientType::Witness
    );
    assert_eq!(
        recipient_network(&recipient_id).expect("Valid recipient"),
        BitcoinNetwork::Regtest
    );
    assert_eq!(
        witness_recipient_id(&script, BitcoinNetwork::Regtest).expect("Failed to build recipient"),
        recipient_id,
        "Witness recipients are deterministic"
    );
}

#[test]
fn test_transport_endpoints() {
    let endpoint = TransportEndpoint::new(ENDPOINT.to_string()).expect("Valid endpoint");
    assert_eq!(endpoint.endpoint, "http://127.0.0.1:3000/json-rpc");
    assert_eq!(endpoint.transport_type(), TransportType::JsonRpc);

    let tls = TransportEndpoint::new("rpcs://proxy.example/json-rpc".to_string())
        .expect("Valid TLS endpoint");
    assert_eq!(tls.endpoint, "https://proxy.example/json-rpc");

    for bad in [
        "rpc://host/json-rpc?a=b",
        "rpc://host/a,b",
        "rpc://host/ json",
        "not an endpoint",
    ] {
        assert!(
            TransportEndpoint::new(bad.to_string()).is_err(),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn test_invoice_from_data_parses_back() {
    let recipient_id = blinded_id(BitcoinNetwork::Regtest);
    let data = InvoiceData {
        recipient_id: recipient_id.clone(),
        asset_iface: Some(AssetIface::RGB20),
        asset_id: None,
        amount: Some(100),
        expiration_timestamp: Some(1_900_000_000),
        transport_endpoints: vec![ENDPOINT.to_string()],
        network: BitcoinNetwork::Regtest,
    };
    let invoice = Invoice::from_invoice_data(data).expect("Failed to build invoice");
    let invoice_string = invoice.invoice_string();
    assert!(invoice_string.starts_with("rgb:"), "{invoice_string}");

    let parsed = Invoice::from_str(&invoice_string).expect("Failed to parse invoice");
    let parsed_data = parsed.invoice_data();
    assert_eq!(parsed_data.amount, Some(100));
    assert_eq!(parsed_data.asset_iface, Some(AssetIface::RGB20));
    assert_eq!(parsed_data.expiration_timestamp, Some(1_900_000_000));
    assert_eq!(parsed_data.network, BitcoinNetwork::Regtest);
    assert_eq!(parsed_data.transport_endpoints, vec![ENDPOINT.to_string()]);
    assert_eq!(
        parsed.recipient_type().expect("Valid recipient"),
        RecipientType::Blind
    );

    assert!(matches!(
        Invoice::new("rgb:garbage".to_string()),
        Err(Error::InvalidInvoice { .. })
    ));
}

#[test]
fn test_invoice_rejects_bad_endpoint_and_asset() {
    let base = InvoiceData {
        recipient_id: blinded_id(BitcoinNetwork::Regtest),
        asset_iface: None,
        asset_id: None,
        amount: None,
        expiration_timestamp: None,
        transport_endpoints: vec!["rpc://host/json-rpc&x".to_string()],
        network: BitcoinNetwork::Regtest,
    };
    assert!(matches!(
        Invoice::from_invoice_data(base.clone()),
        Err(Error::InvalidTransportEndpoint { .. })
    ));

    let bad_asset = InvoiceData {
        asset_id: Some("rgb:not-a-contract".to_string()),
        transport_endpoints: vec![ENDPOINT.to_string()],
        ..base
    };
    assert!(matches!(
        Invoice::from_invoice_data(bad_asset),
        Err(Error::InvalidAssetID { .. })
    ));
}

#[test]
fn test_asset_iface_names() {
    assert_eq!(AssetIface::RGB20.to_typename().to_string(), "RGB20Fixed");
    assert_eq!(AssetIface::RGB21.to_typename().to_string(), "RGB21Unique");
    assert_eq!(AssetIface::RGB25.to_typename().to_string(), "RGB25Base");
    assert_eq!(
        AssetIface::try_from(AssetIface::RGB25.to_typename()).expect("Known interface"),
        AssetIface::RGB25
    );
    assert_eq!(
        AssetIface::from_str("rgb21").expect("Case-insensitive"),
        AssetIface::RGB21
    );
}

#[test]
fn test_media_is_content_addressed_and_sniffed() {
    let env = TestWalletEnv::new();
    let media_dir = env.path("media");
    std::fs::create_dir_all(&media_dir).expect("Failed to create media dir");

    let source = env.path("picture");
    std::fs::write(&source, PNG_HEADER).expect("Failed to write file");
    let source = source.to_str().expect("valid path");

    let stored = Media::store(source, &media_dir).expect("Failed to store media");
    assert_eq!(stored.media.mime, "image/png");
    assert_eq!(stored.media.digest.len(), 64);
    assert!(stored.created.is_some());
    assert!(media_dir.join(&stored.media.digest).is_file());

    let again = Media::store(source, &media_dir).expect("Failed to store media again");
    assert_eq!(again.media, stored.media);
    assert!(again.created.is_none(), "Existing copy is reused");

    let text = env.path("notes.png");
    std::fs::write(&text, b"plain words").expect("Failed to write file");
    let text = Media::store(text.to_str().expect("valid path"), &media_dir)
        .expect("Failed to store text");
    assert_ne!(text.media.mime, "image/png", "The extension is not trusted");

    let empty = env.path("empty");
    std::fs::write(&empty, b"").expect("Failed to write file");
    assert!(matches!(
        Media::store(empty.to_str().expect("valid path"), &media_dir),
        Err(Error::EmptyFile { .. })
    ));
    assert!(matches!(
        Media::store("/nonexistent/file", &media_dir),
        Err(Error::InvalidFilePath { .. })
    ));
}
