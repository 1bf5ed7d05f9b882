//! # Cascading Charge Calculator
//!
//! Applies resolved charge rules in order, where a rule's base may include
//! charges computed before it.
//!
//! ## The Accumulator
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  seed        CIF    = 173 593.75                                        │
//! │                                                                         │
//! │  ID-01  base CIF                 × 20%   → 34 718.75                    │
//! │  SCF90  base CIF                 × 0.3%  →    520.78125                 │
//! │  CAF    fixed                            → 10 000                       │
//! │  GCT    base CIF + ID-01 + SCF90 + CAF                                  │
//! │              = 218 833.28125     × 15%   → 32 824.9921875               │
//! │                                                                         │
//! │  Every entry stays at full precision. Rounding happens once, when       │
//! │  line items are produced for output.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A base that names a charge not yet in the accumulator is a schedule
//! defect (`CircularOrForwardBaseReference`), never a retry condition.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::cif::CifBreakdown;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::schedule::{ChargeRule, CIF_KEY};

// =============================================================================
// Output Types
// =============================================================================

/// A charge as computed, at full precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputedCharge {
    pub name: String,
    /// `None` for fixed and tiered fees.
    pub rate: Option<Decimal>,
    /// Sum of the accumulator entries the rule's base selects.
    pub base: Money,
    /// Line amount in local currency.
    pub amount: Money,
}

/// A charge as presented: amounts at settlement precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeLineItem {
    pub name: String,
    pub rate: Option<Decimal>,
    pub base: Money,
    pub amount: Money,
}

impl From<&ComputedCharge> for ChargeLineItem {
    fn from(charge: &ComputedCharge) -> Self {
        ChargeLineItem {
            name: charge.name.clone(),
            rate: charge.rate,
            base: charge.base.round_for_output(),
            amount: charge.amount.round_for_output(),
        }
    }
}

/// Result of running the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeComputation {
    pub charges: Vec<ComputedCharge>,
    /// Sum of full-precision line amounts, kept for diagnostics.
    pub unrounded_total: Money,
}

impl ChargeComputation {
    /// Line items in cascade order.
    pub fn line_items(&self) -> Vec<ChargeLineItem> {
        self.charges.iter().map(ChargeLineItem::from).collect()
    }

    /// Presented total: the sum of the rounded line amounts.
    pub fn total(&self) -> Money {
        self.charges.iter().map(|c| c.amount.round_for_output()).sum()
    }
}

// =============================================================================
// Accumulator
// =============================================================================

/// Insertion-ordered map of charge name to full-precision amount.
#[derive(Debug)]
struct Accumulator {
    entries: Vec<(String, Money)>,
}

impl Accumulator {
    fn seeded(cif: Money) -> Self {
        Accumulator {
            entries: vec![(CIF_KEY.to_string(), cif)],
        }
    }

    fn get(&self, key: &str) -> Option<Money> {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, amount)| *amount)
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(name, _)| name.eq_ignore_ascii_case(key))
    }

    fn record(&mut self, key: &str, amount: Money) {
        self.entries.push((key.to_string(), amount));
    }
}

// =============================================================================
// Compute
// =============================================================================

/// Runs the cascade over `rules` in the given order.
///
/// The accumulator is seeded with the local-currency CIF. Tiered fees are
/// selected by the reference-currency CIF.
///
/// ## Errors
/// `CircularOrForwardBaseReference` when a rule:
/// - reads a charge that has not been computed yet
/// - reads itself
/// - reuses a name already in the accumulator (including `CIF`)
///
/// `AmountOverflow` when a base, charge or the total leaves the decimal range.
pub fn compute(cif: &CifBreakdown, rules: &[ChargeRule]) -> CoreResult<ChargeComputation> {
    let mut accumulator = Accumulator::seeded(cif.cif.local);
    let mut charges = Vec::with_capacity(rules.len());

    for rule in rules {
        if accumulator.contains(&rule.name) {
            return Err(CoreError::base_reference(
                &rule.name,
                &rule.name,
                "name already present in the accumulator",
            ));
        }

        let mut base = Money::zero();
        for component in rule.base.components() {
            let key = component.key();
            if key.eq_ignore_ascii_case(&rule.name) {
                return Err(CoreError::base_reference(
                    &rule.name,
                    key,
                    "a charge cannot be part of its own base",
                ));
            }
            let term = accumulator.get(key).ok_or_else(|| {
                CoreError::base_reference(&rule.name, key, "not computed before this rule")
            })?;
            base = base
                .checked_add(term)
                .ok_or_else(|| CoreError::overflow(format!("base of '{}'", rule.name)))?;
        }

        let rate = rule.amount.applied_rate();
        let amount = match rule.amount.fixed_fee(cif.cif.reference) {
            Some(fee) => fee,
            None => base
                .checked_mul(rate.unwrap_or(Decimal::ZERO))
                .ok_or_else(|| CoreError::overflow(format!("charge '{}'", rule.name)))?,
        };

        accumulator.record(&rule.name, amount);
        charges.push(ComputedCharge {
            name: rule.name.clone(),
            rate,
            base,
            amount,
        });
    }

    let unrounded_total = charges
        .iter()
        .try_fold(Money::zero(), |total, c| total.checked_add(c.amount))
        .ok_or_else(|| CoreError::overflow("total"))?;
    Ok(ChargeComputation {
        charges,
        unrounded_total,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cif::{valuate, InsuranceBase, InsurancePolicy};
    use crate::currency::{CurrencyCode, ExchangeRateTable};
    use crate::schedule::{BaseSelector, ChargeAmount, FeeTier};
    use crate::types::{CifRequest, PackageType, TransportMode};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    /// CIF valued in JMD at 1:1 with USD so local amounts are easy to read.
    fn cif_of(price: Decimal) -> CifBreakdown {
        let table = ExchangeRateTable::from_local_quotes(
            1,
            Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap(),
            code("JMD"),
            code("USD"),
            vec![(code("USD"), dec!(1))],
        )
        .unwrap();
        let request = CifRequest {
            product_price: Money::from_decimal(price),
            product_currency: code("USD"),
            freight_charges: Money::zero(),
            freight_currency: code("USD"),
            transport_mode: TransportMode::Air,
            package_type: PackageType::General,
        };
        valuate(&request, &table, &InsurancePolicy::flat(dec!(0), InsuranceBase::PriceOnly)).unwrap()
    }

    fn rate_rule(name: &str, rate: Decimal, base: BaseSelector) -> ChargeRule {
        ChargeRule::new(name, ChargeAmount::Rate(rate), base)
    }

    #[test]
    fn test_single_ad_valorem() {
        let result = compute(
            &cif_of(dec!(1111.00)),
            &[rate_rule("ID-01", dec!(0.20), BaseSelector::cif())],
        )
        .unwrap();
        assert_eq!(result.charges[0].amount.amount(), dec!(222.20));
        assert_eq!(result.total().amount(), dec!(222.20));
    }

    #[test]
    fn test_cascade_reads_earlier_charges() {
        let rules = vec![
            rate_rule("ID-01", dec!(0.20), BaseSelector::cif()),
            ChargeRule::new(
                "CAF",
                ChargeAmount::Fixed(Money::from_decimal(dec!(100))),
                BaseSelector::cif(),
            ),
            rate_rule("GCT", dec!(0.15), BaseSelector::cif_plus(["ID-01", "CAF"])),
        ];
        let result = compute(&cif_of(dec!(1000)), &rules).unwrap();

        let gct = &result.charges[2];
        assert_eq!(gct.base.amount(), dec!(1300));
        assert_eq!(gct.amount.amount(), dec!(195));
        assert_eq!(result.charges[1].rate, None);
        assert_eq!(result.total().amount(), dec!(495));
    }

    #[test]
    fn test_out_of_range_amounts_are_errors() {
        let huge = cif_of(dec!(1_000_000_000_000_000_000_000_000_000));
        let err = compute(&huge, &[rate_rule("ID-01", dec!(100), BaseSelector::cif())]).unwrap_err();
        assert_eq!(err, CoreError::overflow("charge 'ID-01'"));

        let near_max = cif_of(dec!(30_000_000_000_000_000_000_000_000_000));
        let rules = vec![
            rate_rule("ID-01", dec!(1.5), BaseSelector::cif()),
            rate_rule("SCF", dec!(1.5), BaseSelector::cif()),
        ];
        assert_eq!(compute(&near_max, &rules).unwrap_err(), CoreError::overflow("total"));
    }

    #[test]
    fn test_forward_reference_fails() {
        let rules = vec![
            rate_rule("GCT", dec!(0.15), BaseSelector::cif_plus(["ID-01"])),
            rate_rule("ID-01", dec!(0.20), BaseSelector::cif()),
        ];
        let err = compute(&cif_of(dec!(1000)), &rules).unwrap_err();
        assert_eq!(
            err,
            CoreError::base_reference("GCT", "ID-01", "not computed before this rule")
        );
    }

    #[test]
    fn test_self_reference_and_collisions_fail() {
        let self_ref = vec![rate_rule("GCT", dec!(0.15), BaseSelector::cif_plus(["GCT"]))];
        assert!(matches!(
            compute(&cif_of(dec!(1000)), &self_ref).unwrap_err(),
            CoreError::CircularOrForwardBaseReference { .. }
        ));

        let duplicate = vec![
            rate_rule("ID-01", dec!(0.20), BaseSelector::cif()),
            rate_rule("ID-01", dec!(0.10), BaseSelector::cif()),
        ];
        assert!(matches!(
            compute(&cif_of(dec!(1000)), &duplicate).unwrap_err(),
            CoreError::CircularOrForwardBaseReference { .. }
        ));

        let shadows_cif = vec![rate_rule("CIF", dec!(0.20), BaseSelector::cif())];
        assert!(compute(&cif_of(dec!(1000)), &shadows_cif).is_err());
    }

    #[test]
    fn test_bases_keep_full_precision() {
        // ID-01 = 0.025 exactly; rounded early it would be 0.03 and push
        // GCT's base from 10.025 to 10.03.
        let rules = vec![
            rate_rule("ID-01", dec!(0.0025), BaseSelector::cif()),
            rate_rule("GCT", dec!(0.5), BaseSelector::cif_plus(["ID-01"])),
        ];
        let result = compute(&cif_of(dec!(10)), &rules).unwrap();
        assert_eq!(result.charges[1].base.amount(), dec!(10.025));
        assert_eq!(result.charges[1].amount.amount(), dec!(5.0125));

        let items = result.line_items();
        assert_eq!(items[0].amount.amount(), dec!(0.03));
        assert_eq!(items[1].amount.amount(), dec!(5.01));
        assert_eq!(items[1].base.amount(), dec!(10.03));
        assert_eq!(result.total().amount(), dec!(5.04));
        assert_eq!(result.unrounded_total.amount(), dec!(5.0375));
    }

    #[test]
    fn test_tiered_fee_uses_reference_cif() {
        let caf = ChargeRule::new(
            "CAF",
            ChargeAmount::Tiered {
                thresholds: vec![FeeTier {
                    below_reference: Money::from_decimal(dec!(5000)),
                    amount: Money::from_decimal(dec!(2500)),
                }],
                otherwise: Money::from_decimal(dec!(10000)),
            },
            BaseSelector::cif(),
        );
        let small = compute(&cif_of(dec!(4000)), std::slice::from_ref(&caf)).unwrap();
        let large = compute(&cif_of(dec!(6000)), std::slice::from_ref(&caf)).unwrap();
        assert_eq!(small.total().amount(), dec!(2500));
        assert_eq!(large.total().amount(), dec!(10000));
    }

    #[test]
    fn test_no_rules_no_charges() {
        let result = compute(&cif_of(dec!(1000)), &[]).unwrap();
        assert!(result.charges.is_empty());
        assert!(result.total().is_zero());
    }
}
