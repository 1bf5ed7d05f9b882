//! # Currency Converter
//!
//! Converts a source-currency amount into the local settlement currency
//! and the reference currency using an immutable rate snapshot.
//!
//! ## Rate Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   ExchangeRateTable (one snapshot)                      │
//! │                                                                         │
//! │   local = JMD            reference = USD         as_of = 2024-06-03     │
//! │                                                                         │
//! │   code   to_reference   to_local                                        │
//! │   ────   ────────────   ────────                                        │
//! │   JMD    0.00640        1          ◄── local currency: to_local == 1    │
//! │   USD    1              156.25     ◄── reference: to_reference == 1     │
//! │   GBP    1.27           198.44                                          │
//! │                                                                         │
//! │   convert(100 GBP) = (100 × 1.27 USD, 100 × 198.44 JMD)                 │
//! │   Pure multiplication, no rounding.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two columns are stored independently. A table built with
//! [`ExchangeRateTable::from_local_quotes`] derives the reference column from
//! the local one, so the two paths agree; [`ExchangeRateTable::is_cross_consistent`]
//! checks that property for tables assembled any other way.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Currency Code
// =============================================================================

/// Three-letter ISO-style currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses a currency code, reporting failures against `field`.
    ///
    /// ## Example
    /// ```rust
    /// use customs_core::currency::CurrencyCode;
    ///
    /// let usd = CurrencyCode::parse_field(" usd ", "product_currency").unwrap();
    /// assert_eq!(usd.as_str(), "USD");
    /// assert!(CurrencyCode::parse_field("US", "product_currency").is_err());
    /// ```
    pub fn parse_field(input: &str, field: &str) -> Result<Self, ValidationError> {
        let code = input.trim().to_uppercase();
        if code.is_empty() {
            return Err(ValidationError::Required {
                field: field.to_string(),
            });
        }
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::invalid_format(
                field,
                format!("'{}' is not a three-letter currency code", input.trim()),
            ));
        }
        Ok(CurrencyCode(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurrencyCode::parse_field(s, "currency")
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

// =============================================================================
// Rates
// =============================================================================

/// Conversion factors for one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRate {
    /// Reference-currency units per one unit of this currency.
    pub to_reference: Decimal,
    /// Local-currency units per one unit of this currency.
    pub to_local: Decimal,
}

/// An amount expressed in both target currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConvertedAmount {
    pub reference: Money,
    pub local: Money,
}

/// Immutable, versioned exchange-rate snapshot.
///
/// ## Invariants (checked by the constructors)
/// - every rate is strictly positive
/// - the local and reference currencies are present
/// - `rates[local].to_local == 1` and `rates[reference].to_reference == 1`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRateTable {
    version: u64,
    as_of: DateTime<Utc>,
    local_currency: CurrencyCode,
    reference_currency: CurrencyCode,
    rates: BTreeMap<CurrencyCode, CurrencyRate>,
}

impl ExchangeRateTable {
    /// Builds a table from explicit per-currency rates.
    pub fn new(
        version: u64,
        as_of: DateTime<Utc>,
        local_currency: CurrencyCode,
        reference_currency: CurrencyCode,
        rates: BTreeMap<CurrencyCode, CurrencyRate>,
    ) -> CoreResult<Self> {
        for (code, rate) in &rates {
            if rate.to_reference <= Decimal::ZERO || rate.to_local <= Decimal::ZERO {
                return Err(CoreError::InvalidConfiguration(format!(
                    "exchange rates for {} must be positive",
                    code
                )));
            }
        }

        let local = rates
            .get(&local_currency)
            .ok_or_else(|| CoreError::unsupported_currency(local_currency.as_str()))?;
        if local.to_local != Decimal::ONE {
            return Err(CoreError::InvalidConfiguration(format!(
                "local currency {} must convert to itself at 1",
                local_currency
            )));
        }

        let reference = rates
            .get(&reference_currency)
            .ok_or_else(|| CoreError::unsupported_currency(reference_currency.as_str()))?;
        if reference.to_reference != Decimal::ONE {
            return Err(CoreError::InvalidConfiguration(format!(
                "reference currency {} must convert to itself at 1",
                reference_currency
            )));
        }

        Ok(ExchangeRateTable {
            version,
            as_of,
            local_currency,
            reference_currency,
            rates,
        })
    }

    /// Builds a cross-consistent table from local-currency quotes.
    ///
    /// Each quote is "local units per one unit of X", the form in which
    /// central banks publish indicative selling rates. The local currency
    /// is implicitly quoted at 1.
    ///
    /// ```text
    /// to_local(X)     = quote(X)
    /// to_reference(X) = quote(X) / quote(reference)
    /// ```
    pub fn from_local_quotes<I>(
        version: u64,
        as_of: DateTime<Utc>,
        local_currency: CurrencyCode,
        reference_currency: CurrencyCode,
        quotes: I,
    ) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (CurrencyCode, Decimal)>,
    {
        let mut local_quotes: BTreeMap<CurrencyCode, Decimal> = quotes.into_iter().collect();
        local_quotes.insert(local_currency.clone(), Decimal::ONE);

        let reference_quote = *local_quotes
            .get(&reference_currency)
            .ok_or_else(|| CoreError::unsupported_currency(reference_currency.as_str()))?;
        if reference_quote <= Decimal::ZERO {
            return Err(CoreError::InvalidConfiguration(format!(
                "quote for reference currency {} must be positive",
                reference_currency
            )));
        }

        let rates = local_quotes
            .into_iter()
            .map(|(code, quote)| {
                let to_reference = if code == reference_currency {
                    Decimal::ONE
                } else {
                    quote / reference_quote
                };
                (
                    code,
                    CurrencyRate {
                        to_reference,
                        to_local: quote,
                    },
                )
            })
            .collect();

        ExchangeRateTable::new(version, as_of, local_currency, reference_currency, rates)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn local_currency(&self) -> &CurrencyCode {
        &self.local_currency
    }

    pub fn reference_currency(&self) -> &CurrencyCode {
        &self.reference_currency
    }

    /// Iterates rates in currency-code order.
    pub fn rates(&self) -> impl Iterator<Item = (&CurrencyCode, &CurrencyRate)> {
        self.rates.iter()
    }

    /// Looks up the rate for a currency.
    pub fn rate(&self, code: &CurrencyCode) -> CoreResult<&CurrencyRate> {
        self.rates
            .get(code)
            .ok_or_else(|| CoreError::unsupported_currency(code.as_str()))
    }

    pub fn supports(&self, code: &CurrencyCode) -> bool {
        self.rates.contains_key(code)
    }

    /// Converts `amount` of `source` into reference and local currency.
    ///
    /// ## Errors
    /// - `Validation(MustNotBeNegative)` for a negative amount
    /// - `UnsupportedCurrency` when `source` is absent from the table
    /// - `AmountOverflow` when the converted value leaves the decimal range
    pub fn convert(&self, amount: Money, source: &CurrencyCode) -> CoreResult<ConvertedAmount> {
        if amount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "amount".to_string(),
            }
            .into());
        }
        let rate = self.rate(source)?;
        let overflow = || CoreError::overflow(format!("{source} conversion"));
        Ok(ConvertedAmount {
            reference: amount.checked_mul(rate.to_reference).ok_or_else(overflow)?,
            local: amount.checked_mul(rate.to_local).ok_or_else(overflow)?,
        })
    }

    /// Units of `to` per one unit of `from`, routed through local currency.
    pub fn cross_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> CoreResult<Decimal> {
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        if from == to {
            return Ok(Decimal::ONE);
        }
        from_rate
            .to_local
            .checked_div(to_rate.to_local)
            .ok_or_else(|| CoreError::overflow(format!("{from}/{to} cross rate")))
    }

    /// Fails with `StaleOrMissingRateTable` when the table is older than `max_age`.
    pub fn ensure_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> CoreResult<()> {
        let age = now.signed_duration_since(self.as_of);
        if age > max_age {
            return Err(CoreError::rate_table_unavailable(format!(
                "rate table v{} from {} is {} hours old (limit {} hours)",
                self.version,
                self.as_of.format("%Y-%m-%d %H:%M UTC"),
                age.num_hours(),
                max_age.num_hours()
            )));
        }
        Ok(())
    }

    /// Checks `to_local(X) ≈ to_reference(X) × to_local(reference)` for every X.
    ///
    /// `tolerance` is relative to `to_local(X)`.
    pub fn is_cross_consistent(&self, tolerance: Decimal) -> bool {
        let Some(reference) = self.rates.get(&self.reference_currency) else {
            return false;
        };
        self.rates.values().all(|rate| {
            let via_reference = rate.to_reference * reference.to_local;
            (via_reference - rate.to_local).abs() <= tolerance * rate.to_local
        })
    }
}

/// Converts against an optional snapshot.
///
/// A service that has not loaded any rates yet passes `None`, which is
/// reported as `StaleOrMissingRateTable`, never as a silent 1:1 rate.
pub fn convert(
    amount: Money,
    source: &CurrencyCode,
    table: Option<&ExchangeRateTable>,
) -> CoreResult<ConvertedAmount> {
    let table =
        table.ok_or_else(|| CoreError::rate_table_unavailable("no exchange rate table loaded"))?;
    table.convert(amount, source)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    fn quoted_table() -> ExchangeRateTable {
        ExchangeRateTable::from_local_quotes(
            1,
            as_of(),
            code("JMD"),
            code("USD"),
            vec![
                (code("USD"), dec!(156.25)),
                (code("GBP"), dec!(198.4375)),
                (code("CAD"), dec!(114.0625)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_currency_code_parsing() {
        assert_eq!(code(" gbp ").as_str(), "GBP");
        assert!("US".parse::<CurrencyCode>().is_err());
        assert!("US1".parse::<CurrencyCode>().is_err());
        assert!("DOLLAR".parse::<CurrencyCode>().is_err());

        let err = CurrencyCode::parse_field("", "freight_currency").unwrap_err();
        assert_eq!(err.field(), "freight_currency");
    }

    #[test]
    fn test_convert_is_pure_multiplication() {
        let table = quoted_table();
        let converted = table
            .convert(Money::from_decimal(dec!(1111.00)), &code("USD"))
            .unwrap();
        assert_eq!(converted.reference.amount(), dec!(1111.00));
        assert_eq!(converted.local.amount(), dec!(173593.7500));

        let gbp = table
            .convert(Money::from_decimal(dec!(10)), &code("GBP"))
            .unwrap();
        assert_eq!(gbp.reference.amount(), dec!(12.70));
        assert_eq!(gbp.local.amount(), dec!(1984.375));
    }

    #[test]
    fn test_convert_unknown_currency() {
        let err = quoted_table()
            .convert(Money::from_decimal(dec!(1)), &code("XYZ"))
            .unwrap_err();
        assert_eq!(err, CoreError::unsupported_currency("XYZ"));
    }

    #[test]
    fn test_convert_rejects_negative_amount() {
        let err = quoted_table()
            .convert(Money::from_decimal(dec!(-1)), &code("USD"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::MustNotBeNegative { .. })));
    }

    #[test]
    fn test_convert_overflow_is_an_error() {
        let err = quoted_table()
            .convert(Money::from_decimal(Decimal::MAX), &code("USD"))
            .unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));
        assert!(err.to_string().contains("USD conversion"));
    }

    #[test]
    fn test_convert_without_table() {
        let err = convert(Money::from_decimal(dec!(1)), &code("USD"), None).unwrap_err();
        assert!(matches!(err, CoreError::StaleOrMissingRateTable { .. }));
    }

    #[test]
    fn test_local_and_reference_self_rates() {
        let table = quoted_table();
        assert_eq!(table.rate(&code("JMD")).unwrap().to_local, Decimal::ONE);
        assert_eq!(table.rate(&code("USD")).unwrap().to_reference, Decimal::ONE);
    }

    #[test]
    fn test_quoted_table_is_cross_consistent() {
        let table = quoted_table();
        assert!(table.is_cross_consistent(dec!(0.000001)));
        assert_eq!(table.cross_rate(&code("GBP"), &code("USD")).unwrap(), dec!(1.27));
        assert_eq!(table.cross_rate(&code("CAD"), &code("CAD")).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_independent_columns_can_disagree() {
        let mut rates = BTreeMap::new();
        rates.insert(code("JMD"), CurrencyRate { to_reference: dec!(0.0064), to_local: dec!(1) });
        rates.insert(code("USD"), CurrencyRate { to_reference: dec!(1), to_local: dec!(156.25) });
        rates.insert(code("GBP"), CurrencyRate { to_reference: dec!(1.30), to_local: dec!(198.4375) });
        let table = ExchangeRateTable::new(2, as_of(), code("JMD"), code("USD"), rates).unwrap();
        assert!(!table.is_cross_consistent(dec!(0.001)));
    }

    #[test]
    fn test_new_rejects_bad_tables() {
        let mut rates = BTreeMap::new();
        rates.insert(code("USD"), CurrencyRate { to_reference: dec!(1), to_local: dec!(156.25) });
        let missing_local =
            ExchangeRateTable::new(1, as_of(), code("JMD"), code("USD"), rates.clone()).unwrap_err();
        assert_eq!(missing_local, CoreError::unsupported_currency("JMD"));

        rates.insert(code("JMD"), CurrencyRate { to_reference: dec!(0.0064), to_local: dec!(1) });
        rates.insert(code("EUR"), CurrencyRate { to_reference: dec!(0), to_local: dec!(170) });
        let non_positive =
            ExchangeRateTable::new(1, as_of(), code("JMD"), code("USD"), rates).unwrap_err();
        assert!(matches!(non_positive, CoreError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_from_local_quotes_requires_reference() {
        let err = ExchangeRateTable::from_local_quotes(
            1,
            as_of(),
            code("JMD"),
            code("USD"),
            vec![(code("GBP"), dec!(198))],
        )
        .unwrap_err();
        assert_eq!(err, CoreError::unsupported_currency("USD"));
    }

    #[test]
    fn test_ensure_fresh() {
        let table = quoted_table();
        let max_age = Duration::hours(72);
        assert!(table.ensure_fresh(as_of() + Duration::hours(24), max_age).is_ok());

        let err = table
            .ensure_fresh(as_of() + Duration::hours(73), max_age)
            .unwrap_err();
        assert!(matches!(err, CoreError::StaleOrMissingRateTable { .. }));
    }
}
