//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE EARLY ROUNDING PROBLEM                                             │
//! │                                                                         │
//! │  Cascading duties tax earlier duties:                                   │
//! │    ID-01 = CIF × 20%          → 100.005                                 │
//! │    GCT   = (CIF + ID-01) × 15%                                          │
//! │                                                                         │
//! │  Rounding ID-01 to 100.01 BEFORE it feeds GCT's base shifts GCT and     │
//! │  the total by a cent on some inputs.                                    │
//! │                                                                         │
//! │  OUR SOLUTION: exact base-10 Decimal, full precision internally,        │
//! │  rounded ONCE at output with round_for_output()                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use customs_core::money::Money;
//! use rust_decimal::Decimal;
//!
//! let cif = Money::from_decimal(Decimal::new(111_100, 2)); // 1111.00
//! let duty = cif * Decimal::new(20, 2);                     // × 0.20
//! assert_eq!(duty.round_for_output().to_string(), "222.20");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Minor-unit precision of the settlement currency.
pub const SETTLEMENT_DECIMAL_PLACES: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value at full decimal precision.
///
/// ## Design Decisions
/// - **Decimal, not float**: 0.1 + 0.2 is exactly 0.3
/// - **No implicit rounding**: arithmetic never rounds; only
///   [`Money::round_for_output`] does
/// - **No currency tag**: the owning structure (`ValuedAmount`,
///   `ConvertedAmount`) says which currency a value is in
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  request.product_price ──► convert() ──► CIF (reference, local)         │
/// │                                            │                            │
/// │                                            ▼                            │
/// │                         cascade accumulator (full precision)            │
/// │                                            │                            │
/// │                                            ▼                            │
/// │                         round_for_output() ──► response                 │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a Money value from a decimal amount.
    #[inline]
    pub const fn from_decimal(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a Money value from minor units (cents).
    ///
    /// ## Example
    /// ```rust
    /// use customs_core::money::Money;
    ///
    /// let fee = Money::from_minor_units(250_000); // 2500.00
    /// assert_eq!(fee.to_string(), "2500.00");
    /// ```
    #[inline]
    pub fn from_minor_units(minor: i64) -> Self {
        Money(Decimal::new(minor, SETTLEMENT_DECIMAL_PLACES))
    }

    /// Returns the underlying decimal amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Addition that returns `None` instead of panicking past the
    /// decimal range.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplication that returns `None` instead of panicking past the
    /// decimal range.
    #[inline]
    pub fn checked_mul(self, factor: Decimal) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// Rounds to settlement precision using round-half-up.
    ///
    /// ## Round Half Up
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  222.195  → 222.20                                                  │
    /// │  222.1949 → 222.19                                                  │
    /// │  -0.005   → -0.01   (away from zero, amounts here are never < 0)    │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// Call this exactly once, when a value leaves the engine. A rounded
    /// value must never be fed back as a base for another charge.
    pub fn round_for_output(&self) -> Money {
        let mut rounded = self
            .0
            .round_dp_with_strategy(SETTLEMENT_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
        // Always carry two places so "1000" serializes as "1000.00".
        rounded.rescale(SETTLEMENT_DECIMAL_PLACES);
        Money(rounded)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display renders two decimals, no currency symbol.
///
/// ## Note
/// Display rounds for presentation only; it does not change the value.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.round_for_output().0;
        write!(f, "{:.2}", rounded)
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Multiplication by a rate or conversion factor.
impl Mul<Decimal> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Decimal) -> Self {
        Money(self.0 * factor)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_minor_units() {
        let money = Money::from_minor_units(1099);
        assert_eq!(money.amount(), dec!(10.99));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_decimal(dec!(10.99)).to_string(), "10.99");
        assert_eq!(Money::from_decimal(dec!(5)).to_string(), "5.00");
        assert_eq!(Money::from_decimal(dec!(0)).to_string(), "0.00");
        assert_eq!(Money::from_decimal(dec!(1.005)).to_string(), "1.01");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_decimal(dec!(10.00));
        let b = Money::from_decimal(dec!(5.00));

        assert_eq!((a + b).amount(), dec!(15.00));
        assert_eq!((a - b).amount(), dec!(5.00));
        assert_eq!((a * dec!(0.15)).amount(), dec!(1.5000));
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Money::from_decimal(dec!(10.00));
        assert_eq!(a.checked_add(a), Some(Money::from_decimal(dec!(20.00))));
        assert_eq!(a.checked_mul(dec!(0.5)), Some(Money::from_decimal(dec!(5.000))));

        let huge = Money::from_decimal(Decimal::MAX);
        assert_eq!(huge.checked_add(a), None);
        assert_eq!(huge.checked_mul(dec!(2)), None);
    }

    #[test]
    fn test_multiplication_keeps_full_precision() {
        let base = Money::from_decimal(dec!(1000.03));
        let duty = base * dec!(0.125);
        assert_eq!(duty.amount(), dec!(125.00375));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(Money::from_decimal(dec!(222.195)).round_for_output().amount(), dec!(222.20));
        assert_eq!(Money::from_decimal(dec!(222.1949)).round_for_output().amount(), dec!(222.19));
        assert_eq!(Money::from_decimal(dec!(0.125)).round_for_output().amount(), dec!(0.13));
        assert_eq!(Money::from_decimal(dec!(0.135)).round_for_output().amount(), dec!(0.14));
    }

    #[test]
    fn test_sum() {
        let items = [
            Money::from_decimal(dec!(1.10)),
            Money::from_decimal(dec!(2.20)),
            Money::from_decimal(dec!(3.30)),
        ];
        let total: Money = items.iter().sum();
        assert_eq!(total.amount(), dec!(6.60));
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_decimal(dec!(-1));
        assert!(negative.is_negative());
    }

    #[test]
    fn test_round_for_output_pads_scale() {
        let rounded = Money::from_decimal(dec!(1000)).round_for_output();
        assert_eq!(serde_json::to_string(&rounded).unwrap(), "\"1000.00\"");
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_decimal(dec!(222.20))).unwrap();
        assert_eq!(json, "\"222.20\"");
    }
}
