//! Tests for UTXO creation parameters

use rgblib::bitcoin::FeeRateConfig;

#[test]
fn test_fee_rate_below_one_is_rejected() {
    assert!(FeeRateConfig::new(0.5).is_err());
    assert!(FeeRateConfig::new(f64::NAN).is_err());
    assert!(FeeRateConfig::new(1.0).is_ok());
}

#[test]
fn test_fee_rate_converts_to_weight_units() {
    let rate = FeeRateConfig::new(2.0)
        .expect("Valid fee rate")
        .to_bdk_fee_rate();
    assert_eq!(rate.to_sat_per_kwu(), 500);
    assert_eq!(rate.to_sat_per_vb_ceil(), 2);
}
