//! # CIF Valuator
//!
//! Computes Cost + Insurance + Freight in the product's currency, the
//! reference currency and the local currency.
//!
//! ## Valuation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price 1000 USD ──convert──► (ref 1000,  local 156 250)                │
//! │  freight 100 USD ─convert──► (ref 100,   local  15 625)                │
//! │                                                                         │
//! │  insurance rate = package override │ mode rate │ default  (1% here)    │
//! │  insurance base = price + freight (or price only)                      │
//! │                                                                         │
//! │  Each column is summed on its own converted components:                │
//! │             original     reference     local                           │
//! │  price      1000.00      1000.00       156 250.00                      │
//! │  freight     100.00       100.00        15 625.00                      │
//! │  insurance    11.00        11.00         1 718.75                      │
//! │  CIF        1111.00      1111.00       173 593.75                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both amounts are converted before any field is built, so an unsupported
//! currency never produces a partial breakdown.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::currency::{CurrencyCode, CurrencyRate, ExchangeRateTable};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CifRequest, PackageType, TransportMode};
use crate::validation::validate_rate_fraction;

// =============================================================================
// Insurance Policy
// =============================================================================

/// What the insurance percentage is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceBase {
    #[default]
    PricePlusFreight,
    PriceOnly,
}

/// Derived-insurance configuration.
///
/// ## Lookup Precedence
/// 1. `by_package` (e.g. motor vehicles)
/// 2. `by_mode` (air / ocean)
/// 3. `default_rate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub default_rate: Decimal,
    #[serde(default)]
    pub by_mode: BTreeMap<TransportMode, Decimal>,
    #[serde(default)]
    pub by_package: BTreeMap<PackageType, Decimal>,
    #[serde(default)]
    pub base: InsuranceBase,
}

impl Default for InsurancePolicy {
    /// Air 1%, ocean 1.5% of price + freight.
    fn default() -> Self {
        let mut by_mode = BTreeMap::new();
        by_mode.insert(TransportMode::Air, Decimal::new(1, 2));
        by_mode.insert(TransportMode::Ocean, Decimal::new(15, 3));
        InsurancePolicy {
            default_rate: Decimal::new(1, 2),
            by_mode,
            by_package: BTreeMap::new(),
            base: InsuranceBase::PricePlusFreight,
        }
    }
}

impl InsurancePolicy {
    /// A flat rate for every shipment.
    pub fn flat(rate: Decimal, base: InsuranceBase) -> Self {
        InsurancePolicy {
            default_rate: rate,
            by_mode: BTreeMap::new(),
            by_package: BTreeMap::new(),
            base,
        }
    }

    pub fn rate_for(&self, mode: TransportMode, package: PackageType) -> Decimal {
        self.by_package
            .get(&package)
            .or_else(|| self.by_mode.get(&mode))
            .copied()
            .unwrap_or(self.default_rate)
    }

    /// Every configured rate must be a fraction between 0 and 1.
    pub fn validate(&self) -> CoreResult<()> {
        let all = std::iter::once(&self.default_rate)
            .chain(self.by_mode.values())
            .chain(self.by_package.values());
        for rate in all {
            validate_rate_fraction(*rate, "insurance_rate")
                .map_err(|e| CoreError::InvalidConfiguration(e.to_string()))?;
        }
        Ok(())
    }
}

// =============================================================================
// Breakdown
// =============================================================================

/// One CIF component in all three currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValuedAmount {
    /// In the breakdown's original (product) currency.
    pub original: Money,
    pub reference: Money,
    pub local: Money,
}

impl ValuedAmount {
    /// Column-wise addition; `None` past the decimal range.
    pub fn checked_add(&self, other: &ValuedAmount) -> Option<ValuedAmount> {
        Some(ValuedAmount {
            original: self.original.checked_add(other.original)?,
            reference: self.reference.checked_add(other.reference)?,
            local: self.local.checked_add(other.local)?,
        })
    }

    /// Scales every column by `rate`; `None` past the decimal range.
    pub fn checked_mul(&self, rate: Decimal) -> Option<ValuedAmount> {
        Some(ValuedAmount {
            original: self.original.checked_mul(rate)?,
            reference: self.reference.checked_mul(rate)?,
            local: self.local.checked_mul(rate)?,
        })
    }

    fn rounded(&self) -> ValuedAmount {
        ValuedAmount {
            original: self.original.round_for_output(),
            reference: self.reference.round_for_output(),
            local: self.local.round_for_output(),
        }
    }
}

impl std::ops::Add for ValuedAmount {
    type Output = ValuedAmount;

    fn add(self, other: ValuedAmount) -> ValuedAmount {
        ValuedAmount {
            original: self.original + other.original,
            reference: self.reference + other.reference,
            local: self.local + other.local,
        }
    }
}

impl std::ops::Sub for ValuedAmount {
    type Output = ValuedAmount;

    fn sub(self, other: ValuedAmount) -> ValuedAmount {
        ValuedAmount {
            original: self.original - other.original,
            reference: self.reference - other.reference,
            local: self.local - other.local,
        }
    }
}

/// The CIF valuation of one shipment.
///
/// ## Invariant
/// `cif == product_price + freight + insurance` in every column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CifBreakdown {
    /// Currency of the `original` column (the product currency).
    pub original_currency: CurrencyCode,
    pub product_currency: CurrencyCode,
    pub freight_currency: CurrencyCode,
    /// Freight was quoted in a different currency than the product.
    pub mixed_currency: bool,
    pub local_currency: CurrencyCode,
    pub reference_currency: CurrencyCode,
    pub transport_mode: TransportMode,
    pub insurance_rate: Decimal,
    pub insurance_base: InsuranceBase,
    /// Freight exactly as submitted, in `freight_currency`.
    pub freight_submitted: Money,
    pub product_price: ValuedAmount,
    pub freight: ValuedAmount,
    pub insurance: ValuedAmount,
    pub cif: ValuedAmount,
    /// Rates used, keyed by currency.
    pub exchange_rates: BTreeMap<CurrencyCode, CurrencyRate>,
}

impl CifBreakdown {
    /// Presentation copy at settlement precision.
    ///
    /// Price, freight and CIF are rounded half-up; insurance is presented as
    /// the remainder so each column still sums exactly.
    pub fn rounded(&self) -> CifBreakdown {
        let product_price = self.product_price.rounded();
        let freight = self.freight.rounded();
        let cif = self.cif.rounded();
        CifBreakdown {
            product_price,
            freight,
            insurance: cif - product_price - freight,
            cif,
            freight_submitted: self.freight_submitted.round_for_output(),
            ..self.clone()
        }
    }
}

// =============================================================================
// Valuation
// =============================================================================

/// Values a shipment against one rate table and insurance policy.
///
/// ## Errors
/// - `UnsupportedCurrency` for a product or freight currency absent from the
///   table, naming the request field
/// - `Validation` for a negative amount
/// - `AmountOverflow` when a column leaves the decimal range
pub fn valuate(
    request: &CifRequest,
    table: &ExchangeRateTable,
    policy: &InsurancePolicy,
) -> CoreResult<CifBreakdown> {
    let price = table
        .convert(request.product_price, &request.product_currency)
        .map_err(|e| e.in_field("product_currency"))?;
    let freight = table
        .convert(request.freight_charges, &request.freight_currency)
        .map_err(|e| e.in_field("freight_currency"))?;

    let mixed_currency = request.product_currency != request.freight_currency;
    let freight_original = if mixed_currency {
        let cross = table.cross_rate(&request.freight_currency, &request.product_currency)?;
        request
            .freight_charges
            .checked_mul(cross)
            .ok_or_else(|| CoreError::overflow("freight in product currency"))?
    } else {
        request.freight_charges
    };

    let product_price = ValuedAmount {
        original: request.product_price,
        reference: price.reference,
        local: price.local,
    };
    let freight = ValuedAmount {
        original: freight_original,
        reference: freight.reference,
        local: freight.local,
    };

    let insurance_rate = policy.rate_for(request.transport_mode, request.package_type);
    let insured = match policy.base {
        InsuranceBase::PricePlusFreight => product_price.checked_add(&freight),
        InsuranceBase::PriceOnly => Some(product_price),
    };
    let insurance = insured
        .and_then(|base| base.checked_mul(insurance_rate))
        .ok_or_else(|| CoreError::overflow("insurance"))?;
    let cif = product_price
        .checked_add(&freight)
        .and_then(|sum| sum.checked_add(&insurance))
        .ok_or_else(|| CoreError::overflow("CIF value"))?;

    let mut exchange_rates = BTreeMap::new();
    for code in [
        &request.product_currency,
        &request.freight_currency,
        table.local_currency(),
        table.reference_currency(),
    ] {
        exchange_rates.insert(code.clone(), *table.rate(code)?);
    }

    Ok(CifBreakdown {
        original_currency: request.product_currency.clone(),
        product_currency: request.product_currency.clone(),
        freight_currency: request.freight_currency.clone(),
        mixed_currency,
        local_currency: table.local_currency().clone(),
        reference_currency: table.reference_currency().clone(),
        transport_mode: request.transport_mode,
        insurance_rate,
        insurance_base: policy.base,
        freight_submitted: request.freight_charges,
        product_price,
        freight,
        insurance,
        cif,
        exchange_rates,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    fn table() -> ExchangeRateTable {
        ExchangeRateTable::from_local_quotes(
            1,
            Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap(),
            code("JMD"),
            code("USD"),
            vec![(code("USD"), dec!(156.25)), (code("GBP"), dec!(198.4375))],
        )
        .unwrap()
    }

    fn request(price: Decimal, freight: Decimal, mode: TransportMode) -> CifRequest {
        CifRequest {
            product_price: Money::from_decimal(price),
            product_currency: code("USD"),
            freight_charges: Money::from_decimal(freight),
            freight_currency: code("USD"),
            transport_mode: mode,
            package_type: PackageType::General,
        }
    }

    #[test]
    fn test_reference_scenario() {
        let policy = InsurancePolicy::flat(dec!(0.01), InsuranceBase::PricePlusFreight);
        let cif = valuate(&request(dec!(1000.00), dec!(100.00), TransportMode::Ocean), &table(), &policy)
            .unwrap();

        assert_eq!(cif.insurance.original.amount(), dec!(11.00));
        assert_eq!(cif.cif.original.amount(), dec!(1111.00));
        assert_eq!(cif.cif.reference.amount(), dec!(1111.00));
        assert_eq!(cif.cif.local.amount(), dec!(173593.75));
        assert!(!cif.mixed_currency);
    }

    #[test]
    fn test_default_policy_by_mode() {
        let policy = InsurancePolicy::default();
        let air = valuate(&request(dec!(1000), dec!(100), TransportMode::Air), &table(), &policy).unwrap();
        let ocean = valuate(&request(dec!(1000), dec!(100), TransportMode::Ocean), &table(), &policy).unwrap();
        assert_eq!(air.insurance.original.amount(), dec!(11.00));
        assert_eq!(ocean.insurance.original.amount(), dec!(16.500));
    }

    #[test]
    fn test_package_override_wins() {
        let mut policy = InsurancePolicy::default();
        policy.by_package.insert(PackageType::MotorVehicle, dec!(0.02));
        assert_eq!(policy.rate_for(TransportMode::Ocean, PackageType::MotorVehicle), dec!(0.02));
        assert_eq!(policy.rate_for(TransportMode::Ocean, PackageType::General), dec!(0.015));
    }

    #[test]
    fn test_zero_freight_price_only_insurance() {
        let policy = InsurancePolicy::flat(dec!(0.01), InsuranceBase::PricePlusFreight);
        let cif = valuate(&request(dec!(500), dec!(0), TransportMode::Air), &table(), &policy).unwrap();
        assert_eq!(cif.insurance.original.amount(), dec!(5.00));
        assert!(cif.freight.local.is_zero());
        assert_eq!(cif.cif.original.amount(), dec!(505.00));

        let policy = InsurancePolicy::flat(dec!(0.01), InsuranceBase::PriceOnly);
        let cif = valuate(&request(dec!(500), dec!(50), TransportMode::Air), &table(), &policy).unwrap();
        assert_eq!(cif.insurance.original.amount(), dec!(5.00));
    }

    #[test]
    fn test_cif_sums_in_each_column() {
        let policy = InsurancePolicy::default();
        let cif = valuate(&request(dec!(333.33), dec!(17.17), TransportMode::Ocean), &table(), &policy).unwrap();
        for c in [cif.clone(), cif.rounded()] {
            let sum = c.product_price + c.freight + c.insurance;
            assert_eq!(sum, c.cif);
        }
    }

    #[test]
    fn test_mixed_currency_freight() {
        let policy = InsurancePolicy::flat(dec!(0.01), InsuranceBase::PricePlusFreight);
        let mut req = request(dec!(1000), dec!(100), TransportMode::Air);
        req.freight_currency = code("GBP");

        let cif = valuate(&req, &table(), &policy).unwrap();
        assert!(cif.mixed_currency);
        assert_eq!(cif.freight.original.amount(), dec!(127.00));
        assert_eq!(cif.freight.reference.amount(), dec!(127.00));
        assert_eq!(cif.freight_submitted.amount(), dec!(100));
        assert_eq!(cif.exchange_rates.len(), 3);
    }

    #[test]
    fn test_unknown_currency_has_no_breakdown() {
        let mut req = request(dec!(1000), dec!(100), TransportMode::Air);
        req.product_currency = code("XYZ");
        let err = valuate(&req, &table(), &InsurancePolicy::default()).unwrap_err();
        assert_eq!(
            err,
            CoreError::unsupported_currency("XYZ").in_field("product_currency")
        );

        let mut req = request(dec!(1000), dec!(100), TransportMode::Air);
        req.freight_currency = code("XYZ");
        let err = valuate(&req, &table(), &InsurancePolicy::default()).unwrap_err();
        assert_eq!(err.field(), Some("freight_currency"));
    }

    #[test]
    fn test_overflowing_columns_are_an_error() {
        let policy = InsurancePolicy::flat(dec!(0.01), InsuranceBase::PricePlusFreight);
        let req = request(Decimal::MAX / dec!(100), dec!(0), TransportMode::Air);
        let err = valuate(&req, &table(), &policy).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));
    }

    #[test]
    fn test_policy_validation() {
        assert!(InsurancePolicy::default().validate().is_ok());
        let bad = InsurancePolicy::flat(dec!(1.5), InsuranceBase::PriceOnly);
        assert!(matches!(bad.validate(), Err(CoreError::InvalidConfiguration(_))));
    }
}
