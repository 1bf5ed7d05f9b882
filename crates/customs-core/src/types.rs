//! # Domain Types
//!
//! Request-side domain types used throughout the customs engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌─────────────────┐   ┌─────────────────┐  │
//! │  │ CalculationRequest   │   │ TransactionType │   │  PackageType    │  │
//! │  │  ──────────────────  │   │  ─────────────  │   │  ─────────────  │  │
//! │  │  classification_code │   │  PersonalUse    │   │  General        │  │
//! │  │  transaction_type    │   │  CommercialCargo│   │  MotorVehicle   │  │
//! │  │  package_type        │   └─────────────────┘   └─────────────────┘  │
//! │  │  product_price       │                                               │
//! │  │  product_currency    │   ┌─────────────────┐   ┌─────────────────┐  │
//! │  │  freight_charges     │   │ TransportMode   │   │ClassificationCode│ │
//! │  │  freight_currency    │   │  ─────────────  │   │  ─────────────  │  │
//! │  │  transport_mode      │   │  Air            │   │  "8703.23.10"   │  │
//! │  └──────────────────────┘   │  Ocean          │   │  digits+dots    │  │
//! │                             └─────────────────┘   └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `CalculationRequest` can only be built through
//! [`crate::validation::validate_request`], so the engine never sees an
//! unvalidated payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::currency::CurrencyCode;
use crate::error::{CoreError, ValidationError};
use crate::money::Money;

/// Minimum number of digits in a classification code (HS heading).
pub const MIN_CLASSIFICATION_DIGITS: usize = 4;

/// Maximum number of digits in a classification code (national subheading).
pub const MAX_CLASSIFICATION_DIGITS: usize = 12;

// =============================================================================
// Transaction Type
// =============================================================================

/// Customs transaction regime of the import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
    /// Household / personal-use import.
    PersonalUse,
    /// Commercial cargo import.
    CommercialCargo,
}

impl TransactionType {
    pub const ACCEPTED: &'static [&'static str] = &["personal-use", "commercial-cargo"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::PersonalUse => "personal-use",
            TransactionType::CommercialCargo => "commercial-cargo",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    /// Accepts the canonical names plus the customs entry codes
    /// (`IMS4` household entry, `IM4` commercial entry).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "personal-use" | "personal" | "ims4" => Ok(TransactionType::PersonalUse),
            "commercial-cargo" | "commercial" | "im4" => Ok(TransactionType::CommercialCargo),
            _ => Err(ValidationError::not_allowed("transaction_type", Self::ACCEPTED)),
        }
    }
}

// =============================================================================
// Package Type
// =============================================================================

/// Kind of goods being imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
    General,
    MotorVehicle,
}

impl PackageType {
    pub const ACCEPTED: &'static [&'static str] = &["general", "motor-vehicle"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::General => "general",
            PackageType::MotorVehicle => "motor-vehicle",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(&['_', ' '][..], "-");
        match normalized.as_str() {
            "general" => Ok(PackageType::General),
            "motor-vehicle" => Ok(PackageType::MotorVehicle),
            _ => Err(ValidationError::not_allowed("package_type", Self::ACCEPTED)),
        }
    }
}

// =============================================================================
// Transport Mode
// =============================================================================

/// How the goods are shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Air,
    Ocean,
}

impl TransportMode {
    pub const ACCEPTED: &'static [&'static str] = &["air", "ocean"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Air => "air",
            TransportMode::Ocean => "ocean",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "air" => Ok(TransportMode::Air),
            "ocean" | "sea" => Ok(TransportMode::Ocean),
            _ => Err(ValidationError::not_allowed(
                "mode_of_transportation",
                Self::ACCEPTED,
            )),
        }
    }
}

// =============================================================================
// Classification Code
// =============================================================================

/// HS-style tariff classification code.
///
/// ## Structural Rules
/// ```text
/// "8703.23.10"  ✓  digits with single dot separators
/// "870323"      ✓  plain digits
/// "87"          ✗  fewer than 4 digits
/// "8703..23"    ✗  empty group
/// ".8703"       ✗  leading separator
/// "87O3"        ✗  non-digit
/// ```
///
/// The original spelling is kept for display; matching uses the
/// digits-only form from [`ClassificationCode::digits`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassificationCode {
    raw: String,
    digits: String,
}

impl ClassificationCode {
    /// Parses and structurally validates a classification code.
    ///
    /// ## Example
    /// ```rust
    /// use customs_core::types::ClassificationCode;
    ///
    /// let code = ClassificationCode::parse("8703.23.10").unwrap();
    /// assert_eq!(code.digits(), "87032310");
    /// assert!(ClassificationCode::parse("87").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let raw = input.trim();
        let reject = |reason: &str| CoreError::UnknownClassification {
            code: input.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(reject("code is empty"));
        }

        let mut digits = String::with_capacity(raw.len());
        for group in raw.split('.') {
            if group.is_empty() {
                return Err(reject("separators must sit between digit groups"));
            }
            if !group.chars().all(|c| c.is_ascii_digit()) {
                return Err(reject("must contain only digits and '.' separators"));
            }
            digits.push_str(group);
        }

        if digits.len() < MIN_CLASSIFICATION_DIGITS || digits.len() > MAX_CLASSIFICATION_DIGITS {
            return Err(reject(&format!(
                "must have between {} and {} digits",
                MIN_CLASSIFICATION_DIGITS, MAX_CLASSIFICATION_DIGITS
            )));
        }

        Ok(ClassificationCode {
            raw: raw.to_string(),
            digits,
        })
    }

    /// The code as supplied (trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Digits-only form used for rule matching.
    pub fn digits(&self) -> &str {
        &self.digits
    }
}

impl fmt::Display for ClassificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for ClassificationCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ClassificationCode::parse(&value)
    }
}

impl From<ClassificationCode> for String {
    fn from(code: ClassificationCode) -> Self {
        code.raw
    }
}

// =============================================================================
// Requests
// =============================================================================

/// The shipment facts the CIF valuator needs.
///
/// Built by [`crate::validation::validate_cif_request`] for the CIF-only
/// operation, or taken from a full [`CalculationRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct CifRequest {
    pub product_price: Money,
    pub product_currency: CurrencyCode,
    pub freight_charges: Money,
    pub freight_currency: CurrencyCode,
    pub transport_mode: TransportMode,
    pub package_type: PackageType,
}

/// A validated customs calculation request.
///
/// ## Invariants
/// - `product_price > 0`
/// - `freight_charges >= 0`
/// - currency codes are well-formed (membership in the rate table is
///   checked by the converter)
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationRequest {
    pub classification_code: ClassificationCode,
    pub transaction_type: TransactionType,
    pub package_type: PackageType,
    pub product_price: Money,
    pub product_currency: CurrencyCode,
    pub freight_charges: Money,
    pub freight_currency: CurrencyCode,
    pub transport_mode: TransportMode,
}

impl CalculationRequest {
    /// The valuation part of the request.
    pub fn cif_request(&self) -> CifRequest {
        CifRequest {
            product_price: self.product_price,
            product_currency: self.product_currency.clone(),
            freight_charges: self.freight_charges,
            freight_currency: self.freight_currency.clone(),
            transport_mode: self.transport_mode,
            package_type: self.package_type,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!("personal-use".parse::<TransactionType>().unwrap(), TransactionType::PersonalUse);
        assert_eq!("IMS4".parse::<TransactionType>().unwrap(), TransactionType::PersonalUse);
        assert_eq!("commercial_cargo".parse::<TransactionType>().unwrap(), TransactionType::CommercialCargo);
        assert_eq!("IM4".parse::<TransactionType>().unwrap(), TransactionType::CommercialCargo);

        let err = "wholesale".parse::<TransactionType>().unwrap_err();
        assert_eq!(err.field(), "transaction_type");
    }

    #[test]
    fn test_package_type_parsing() {
        assert_eq!("general".parse::<PackageType>().unwrap(), PackageType::General);
        assert_eq!("Motor Vehicle".parse::<PackageType>().unwrap(), PackageType::MotorVehicle);
        assert_eq!("motor-vehicle".parse::<PackageType>().unwrap(), PackageType::MotorVehicle);
        assert!("boat".parse::<PackageType>().is_err());
    }

    #[test]
    fn test_transport_mode_parsing() {
        assert_eq!("AIR".parse::<TransportMode>().unwrap(), TransportMode::Air);
        assert_eq!("sea".parse::<TransportMode>().unwrap(), TransportMode::Ocean);
        let err = "land".parse::<TransportMode>().unwrap_err();
        assert_eq!(err.field(), "mode_of_transportation");
    }

    #[test]
    fn test_enum_serde_names() {
        assert_eq!(
            serde_json::to_string(&TransactionType::CommercialCargo).unwrap(),
            "\"commercial-cargo\""
        );
        assert_eq!(
            serde_json::to_string(&PackageType::MotorVehicle).unwrap(),
            "\"motor-vehicle\""
        );
        assert_eq!(serde_json::to_string(&TransportMode::Ocean).unwrap(), "\"ocean\"");
    }

    #[test]
    fn test_classification_code_valid() {
        let code = ClassificationCode::parse(" 8703.23.10 ").unwrap();
        assert_eq!(code.as_str(), "8703.23.10");
        assert_eq!(code.digits(), "87032310");

        assert!(ClassificationCode::parse("0101").is_ok());
        assert!(ClassificationCode::parse("010121000000").is_ok());
    }

    #[test]
    fn test_classification_code_invalid() {
        assert!(ClassificationCode::parse("").is_err());
        assert!(ClassificationCode::parse("87").is_err());
        assert!(ClassificationCode::parse("8703..23").is_err());
        assert!(ClassificationCode::parse(".8703").is_err());
        assert!(ClassificationCode::parse("8703.").is_err());
        assert!(ClassificationCode::parse("87O3").is_err());
        assert!(ClassificationCode::parse("1234567890123").is_err());

        let err = ClassificationCode::parse("abc").unwrap_err();
        assert!(matches!(err, CoreError::UnknownClassification { .. }));
    }
}
