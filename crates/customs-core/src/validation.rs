//! # Validation Module
//!
//! Turns the loosely typed boundary payload into a [`CalculationRequest`].
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form / transport                                             │
//! │  ├── JSON decoding into RawCalculationRequest                          │
//! │  └── Amounts may arrive as "1000.00" or 1000                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required fields, enum values, currency code shape                 │
//! │  ├── price > 0, freight >= 0, at most 4 decimal places                 │
//! │  └── Classification code structure                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Currency converter                                           │
//! │  └── Currency present in the loaded rate table                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use customs_core::validation::{validate_request, RawCalculationRequest};
//!
//! let raw: RawCalculationRequest = serde_json::from_str(r#"{
//!     "classification_code": "8703.23",
//!     "transaction_type": "commercial-cargo",
//!     "package_type": "general",
//!     "product_price": "1000.00",
//!     "product_currency": "USD",
//!     "freight_charges": 100,
//!     "freight_currency": "USD",
//!     "mode_of_transportation": "ocean"
//! }"#).unwrap();
//!
//! let request = validate_request(&raw).unwrap();
//! assert_eq!(request.product_price.to_string(), "1000.00");
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::currency::CurrencyCode;
use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    CalculationRequest, CifRequest, ClassificationCode, PackageType, TransactionType,
    TransportMode,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum decimal places accepted on input amounts.
pub const MAX_INPUT_DECIMAL_PLACES: u32 = 4;

/// Largest amount accepted for a price or freight, in the submitted currency.
///
/// Keeps every conversion, insurance and cascade step far inside the
/// `Decimal` range (about 7.9e28) for any realistic rate or percentage.
pub const MAX_INPUT_AMOUNT: i64 = 1_000_000_000_000;

// =============================================================================
// Raw Payload
// =============================================================================

/// An amount as it arrives on the wire: a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl AmountInput {
    fn as_text(&self) -> String {
        match self {
            AmountInput::Number(n) => n.to_string(),
            AmountInput::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<Decimal> for AmountInput {
    fn from(value: Decimal) -> Self {
        AmountInput::Text(value.to_string())
    }
}

/// The request exactly as submitted by the form layer.
///
/// Every field is optional here so that a missing field is reported as
/// `Required` with its name instead of a generic decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCalculationRequest {
    #[serde(alias = "hs_code")]
    pub classification_code: Option<String>,
    pub transaction_type: Option<String>,
    pub package_type: Option<String>,
    pub product_price: Option<AmountInput>,
    pub product_currency: Option<String>,
    pub freight_charges: Option<AmountInput>,
    pub freight_currency: Option<String>,
    pub mode_of_transportation: Option<String>,
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a full calculation request.
///
/// Fields are checked in wire order; the first failure is returned and
/// names the offending field.
pub fn validate_request(raw: &RawCalculationRequest) -> CoreResult<CalculationRequest> {
    let code_text = required_text(&raw.classification_code, "classification_code")?;
    let classification_code = ClassificationCode::parse(code_text)?;

    let transaction_type: TransactionType =
        required_text(&raw.transaction_type, "transaction_type")?.parse()?;
    let package_type: PackageType = required_text(&raw.package_type, "package_type")?.parse()?;

    let cif = validate_shipment(raw, package_type)?;

    Ok(CalculationRequest {
        classification_code,
        transaction_type,
        package_type,
        product_price: cif.product_price,
        product_currency: cif.product_currency,
        freight_charges: cif.freight_charges,
        freight_currency: cif.freight_currency,
        transport_mode: cif.transport_mode,
    })
}

/// Validates the fields the CIF-only operation needs.
///
/// `package_type` is optional here and defaults to `general`.
pub fn validate_cif_request(raw: &RawCalculationRequest) -> CoreResult<CifRequest> {
    let package_type = match raw.package_type.as_deref().map(str::trim) {
        None | Some("") => PackageType::General,
        Some(text) => text.parse()?,
    };
    Ok(validate_shipment(raw, package_type)?)
}

fn validate_shipment(
    raw: &RawCalculationRequest,
    package_type: PackageType,
) -> ValidationResult<CifRequest> {
    let product_price = parse_amount(&raw.product_price, "product_price")?;
    validate_positive_amount(product_price, "product_price")?;
    let product_currency = CurrencyCode::parse_field(
        required_text(&raw.product_currency, "product_currency")?,
        "product_currency",
    )?;

    let freight_charges = parse_amount(&raw.freight_charges, "freight_charges")?;
    validate_non_negative_amount(freight_charges, "freight_charges")?;
    let freight_currency = CurrencyCode::parse_field(
        required_text(&raw.freight_currency, "freight_currency")?,
        "freight_currency",
    )?;

    let transport_mode: TransportMode =
        required_text(&raw.mode_of_transportation, "mode_of_transportation")?.parse()?;

    Ok(CifRequest {
        product_price,
        product_currency,
        freight_charges,
        freight_currency,
        transport_mode,
        package_type,
    })
}

fn required_text<'a>(value: &'a Option<String>, field: &str) -> ValidationResult<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(ValidationError::Required {
            field: field.to_string(),
        }),
    }
}

// =============================================================================
// Amount Validators
// =============================================================================

/// Parses a wire amount into [`Money`].
///
/// ## Rules
/// - Must be present
/// - Plain decimal or scientific notation (`1e3`)
/// - At most [`MAX_INPUT_DECIMAL_PLACES`] significant decimal places
/// - No larger than [`MAX_INPUT_AMOUNT`]
///
/// ## Example
/// ```rust
/// use customs_core::validation::{parse_amount, AmountInput};
///
/// let price = parse_amount(&Some(AmountInput::Text("1000.50".into())), "product_price").unwrap();
/// assert_eq!(price.to_string(), "1000.50");
/// assert!(parse_amount(&Some(AmountInput::Text("ten".into())), "product_price").is_err());
/// assert!(parse_amount(&None, "product_price").is_err());
/// ```
pub fn parse_amount(input: &Option<AmountInput>, field: &str) -> ValidationResult<Money> {
    let input = input.as_ref().ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })?;
    let text = input.as_text();
    if text.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    let value = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ValidationError::invalid_format(field, format!("'{}' is not a number", text)))?;

    if value.normalize().scale() > MAX_INPUT_DECIMAL_PLACES {
        return Err(ValidationError::invalid_format(
            field,
            format!("at most {} decimal places are accepted", MAX_INPUT_DECIMAL_PLACES),
        ));
    }
    if value > Decimal::from(MAX_INPUT_AMOUNT) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: MAX_INPUT_AMOUNT.to_string(),
        });
    }

    Ok(Money::from_decimal(value))
}

/// Validates an amount that must be strictly positive (product price).
pub fn validate_positive_amount(amount: Money, field: &str) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an amount that may be zero (freight).
pub fn validate_non_negative_amount(amount: Money, field: &str) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a rate expressed as a fraction.
///
/// ## Rules
/// - Must be between 0 and 1 inclusive (0% to 100%)
///
/// ## Example
/// ```rust
/// use customs_core::validation::validate_rate_fraction;
/// use rust_decimal::Decimal;
///
/// assert!(validate_rate_fraction(Decimal::new(15, 2), "GCT").is_ok());
/// assert!(validate_rate_fraction(Decimal::new(15, 0), "GCT").is_err());
/// ```
pub fn validate_rate_fraction(rate: Decimal, field: &str) -> ValidationResult<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: "1".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use rust_decimal_macros::dec;

    fn valid_raw() -> RawCalculationRequest {
        RawCalculationRequest {
            classification_code: Some("8703.23.10".to_string()),
            transaction_type: Some("commercial-cargo".to_string()),
            package_type: Some("general".to_string()),
            product_price: Some(AmountInput::Text("1000.00".to_string())),
            product_currency: Some("usd".to_string()),
            freight_charges: Some(AmountInput::Text("100".to_string())),
            freight_currency: Some("USD".to_string()),
            mode_of_transportation: Some("ocean".to_string()),
        }
    }

    fn field_of(err: CoreError) -> String {
        err.field().unwrap_or_default().to_string()
    }

    #[test]
    fn test_valid_request() {
        let request = validate_request(&valid_raw()).unwrap();
        assert_eq!(request.classification_code.digits(), "87032310");
        assert_eq!(request.transaction_type, TransactionType::CommercialCargo);
        assert_eq!(request.product_price.amount(), dec!(1000.00));
        assert_eq!(request.product_currency.as_str(), "USD");
        assert_eq!(request.freight_charges.amount(), dec!(100));
        assert_eq!(request.transport_mode, TransportMode::Ocean);
    }

    #[test]
    fn test_amounts_accept_numbers_and_strings() {
        let raw: RawCalculationRequest = serde_json::from_value(serde_json::json!({
            "hs_code": "0101",
            "transaction_type": "IMS4",
            "package_type": "general",
            "product_price": 1250.5,
            "product_currency": "GBP",
            "freight_charges": "0",
            "freight_currency": "GBP",
            "mode_of_transportation": "air"
        }))
        .unwrap();
        let request = validate_request(&raw).unwrap();
        assert_eq!(request.product_price.amount(), dec!(1250.5));
        assert!(request.freight_charges.is_zero());
        assert_eq!(request.transaction_type, TransactionType::PersonalUse);
    }

    #[test]
    fn test_missing_fields_are_named() {
        let mut raw = valid_raw();
        raw.product_currency = None;
        assert_eq!(field_of(validate_request(&raw).unwrap_err()), "product_currency");

        let mut raw = valid_raw();
        raw.mode_of_transportation = Some("   ".to_string());
        assert_eq!(field_of(validate_request(&raw).unwrap_err()), "mode_of_transportation");

        let mut raw = valid_raw();
        raw.classification_code = None;
        assert_eq!(field_of(validate_request(&raw).unwrap_err()), "classification_code");
    }

    #[test]
    fn test_price_must_be_positive() {
        let mut raw = valid_raw();
        raw.product_price = Some(AmountInput::Text("0".to_string()));
        let err = validate_request(&raw).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MustBePositive { .. })
        ));
        assert_eq!(field_of(err), "product_price");
    }

    #[test]
    fn test_freight_must_not_be_negative() {
        let mut raw = valid_raw();
        raw.freight_charges = Some(AmountInput::Text("-5".to_string()));
        let err = validate_request(&raw).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MustNotBeNegative { .. })
        ));
    }

    #[test]
    fn test_too_many_decimal_places() {
        let mut raw = valid_raw();
        raw.product_price = Some(AmountInput::Text("10.12345".to_string()));
        assert_eq!(field_of(validate_request(&raw).unwrap_err()), "product_price");

        // Trailing zeros are not significant.
        raw.product_price = Some(AmountInput::Text("10.123400".to_string()));
        assert!(validate_request(&raw).is_ok());
    }

    #[test]
    fn test_amounts_above_cap_are_out_of_range() {
        let mut raw = valid_raw();
        raw.product_price = Some(AmountInput::Text("1000000000000".to_string()));
        raw.freight_charges = Some(AmountInput::Text("999999999999.9999".to_string()));
        assert!(validate_request(&raw).is_ok());

        raw.product_price = Some(AmountInput::Text("1000000000000000000000000000".to_string()));
        let err = validate_request(&raw).unwrap_err();
        assert_eq!(field_of(err.clone()), "product_price");
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { .. })
        ));

        let mut raw = valid_raw();
        raw.freight_charges = Some(AmountInput::Text("1000000000000.01".to_string()));
        assert_eq!(field_of(validate_request(&raw).unwrap_err()), "freight_charges");

        // Past the decimal range entirely is a format error, not a panic.
        let mut raw = valid_raw();
        raw.product_price = Some(AmountInput::Text("1e40".to_string()));
        assert_eq!(field_of(validate_request(&raw).unwrap_err()), "product_price");
    }

    #[test]
    fn test_malformed_classification_code() {
        let mut raw = valid_raw();
        raw.classification_code = Some("87-03".to_string());
        let err = validate_request(&raw).unwrap_err();
        assert!(matches!(err, CoreError::UnknownClassification { .. }));
    }

    #[test]
    fn test_bad_enum_and_currency() {
        let mut raw = valid_raw();
        raw.package_type = Some("boat".to_string());
        assert_eq!(field_of(validate_request(&raw).unwrap_err()), "package_type");

        let mut raw = valid_raw();
        raw.freight_currency = Some("DOLLARS".to_string());
        assert_eq!(field_of(validate_request(&raw).unwrap_err()), "freight_currency");
    }

    #[test]
    fn test_cif_request_defaults_package_type() {
        let mut raw = valid_raw();
        raw.classification_code = None;
        raw.package_type = None;
        let cif = validate_cif_request(&raw).unwrap();
        assert_eq!(cif.package_type, PackageType::General);
        assert_eq!(cif.freight_currency.as_str(), "USD");
    }

    #[test]
    fn test_validate_rate_fraction() {
        assert!(validate_rate_fraction(dec!(0), "rate").is_ok());
        assert!(validate_rate_fraction(dec!(0.2), "rate").is_ok());
        assert!(validate_rate_fraction(dec!(1), "rate").is_ok());
        assert!(validate_rate_fraction(dec!(1.01), "rate").is_err());
        assert!(validate_rate_fraction(dec!(-0.1), "rate").is_err());
    }
}
