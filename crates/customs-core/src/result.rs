//! # Result Assembler
//!
//! Packages the valuation and the cascade into the response contract.
//! No computation happens here beyond choosing the presented (rounded) view.
//!
//! ## Response Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CustomsResponse                                                        │
//! │  ├── cif_details            CifResponse (original / local / reference)  │
//! │  ├── charges                { "ID-01": "222.20", ...,                   │
//! │  │                            "total_custom_charges": "222.20" }        │
//! │  ├── tax_rates              { "ID-01": "0.20", "CAF": null }            │
//! │  ├── total_custom_charges   "222.20"                                    │
//! │  └── line_items             [ {name, rate, base, amount}, ... ]         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts are decimal strings with two places; rates are decimal strings.
//! `charges` and `tax_rates` list only charges that came to a non-zero
//! amount; `line_items` keeps every charge the cascade ran.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use uuid::Uuid;

use crate::charges::{ChargeComputation, ChargeLineItem};
use crate::cif::{CifBreakdown, ValuedAmount};
use crate::money::Money;

/// Synthetic key carrying the grand total in the `charges` map.
pub const TOTAL_KEY: &str = "total_custom_charges";

// =============================================================================
// Calculation Result
// =============================================================================

/// Everything one calculation produced.
///
/// ## Invariant
/// `total == Σ line_items[i].amount` exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResult {
    /// Snapshot the result was computed on.
    pub snapshot_id: Uuid,
    /// Full-precision valuation.
    pub cif: CifBreakdown,
    /// Rounded line items in cascade order.
    pub line_items: Vec<ChargeLineItem>,
    /// Charge name → applied rate (`None` for fixed fees).
    pub rates: BTreeMap<String, Option<Decimal>>,
    /// Presented grand total in local currency.
    pub total: Money,
    /// Sum of full-precision line amounts.
    pub unrounded_total: Money,
}

impl CalculationResult {
    pub fn assemble(snapshot_id: Uuid, cif: CifBreakdown, computation: ChargeComputation) -> Self {
        let rates = computation
            .charges
            .iter()
            .map(|c| (c.name.clone(), c.rate))
            .collect();
        CalculationResult {
            snapshot_id,
            cif,
            line_items: computation.line_items(),
            rates,
            total: computation.total(),
            unrounded_total: computation.unrounded_total,
        }
    }

    /// Shapes the result into the wire contract.
    ///
    /// Zero charges are left out of `charges` and `tax_rates`; the total is
    /// unaffected since they add nothing.
    pub fn to_response(&self) -> CustomsResponse {
        let payable: Vec<&ChargeLineItem> = self
            .line_items
            .iter()
            .filter(|item| !item.amount.is_zero())
            .collect();

        let mut charges: BTreeMap<String, String> = payable
            .iter()
            .map(|item| (item.name.clone(), item.amount.to_string()))
            .collect();
        charges.insert(TOTAL_KEY.to_string(), self.total.to_string());

        CustomsResponse {
            snapshot_id: self.snapshot_id.to_string(),
            cif_details: CifResponse::from_breakdown(&self.cif),
            charges,
            tax_rates: payable
                .iter()
                .map(|item| (item.name.clone(), item.rate.map(|r| r.normalize().to_string())))
                .collect(),
            total_custom_charges: self.total.to_string(),
            line_items: self.line_items.iter().map(LineItemResponse::from).collect(),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Response of the full calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomsResponse {
    pub snapshot_id: String,
    pub cif_details: CifResponse,
    /// Charge name → amount, plus the `total_custom_charges` entry.
    pub charges: BTreeMap<String, String>,
    /// Charge name → applied rate; null for fixed fees.
    pub tax_rates: BTreeMap<String, Option<String>>,
    pub total_custom_charges: String,
    pub line_items: Vec<LineItemResponse>,
}

/// One charge line as sent to the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItemResponse {
    pub name: String,
    pub rate: Option<String>,
    pub base: String,
    pub amount: String,
}

impl From<&ChargeLineItem> for LineItemResponse {
    fn from(item: &ChargeLineItem) -> Self {
        LineItemResponse {
            name: item.name.clone(),
            rate: item.rate.map(|r| r.normalize().to_string()),
            base: item.base.to_string(),
            amount: item.amount.to_string(),
        }
    }
}

/// A CIF component in its three currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AmountResponse {
    pub original: String,
    pub local: String,
    pub reference: String,
}

impl From<&ValuedAmount> for AmountResponse {
    fn from(value: &ValuedAmount) -> Self {
        AmountResponse {
            original: value.original.to_string(),
            local: value.local.to_string(),
            reference: value.reference.to_string(),
        }
    }
}

/// Exchange rates reported with a valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RateResponse {
    pub to_reference: String,
    pub to_local: String,
}

/// Response of the CIF-only operation, also embedded as `cif_details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CifResponse {
    /// Product currency, or `"Mixed"` when freight was in another currency.
    pub cif_original_currency: String,
    pub product_currency: String,
    pub freight_currency: String,
    pub local_currency: String,
    pub reference_currency: String,
    pub mode_of_transportation: String,
    pub insurance_rate: String,
    pub freight_charges_submitted: String,
    pub product_price: AmountResponse,
    pub freight_charges: AmountResponse,
    pub insurance: AmountResponse,
    pub cif: AmountResponse,
    pub exchange_rates: BTreeMap<String, RateResponse>,
}

impl CifResponse {
    /// Presents a full-precision breakdown at settlement precision.
    pub fn from_breakdown(breakdown: &CifBreakdown) -> Self {
        let rounded = breakdown.rounded();
        CifResponse {
            cif_original_currency: if rounded.mixed_currency {
                "Mixed".to_string()
            } else {
                rounded.original_currency.to_string()
            },
            product_currency: rounded.product_currency.to_string(),
            freight_currency: rounded.freight_currency.to_string(),
            local_currency: rounded.local_currency.to_string(),
            reference_currency: rounded.reference_currency.to_string(),
            mode_of_transportation: rounded.transport_mode.to_string(),
            insurance_rate: rounded.insurance_rate.normalize().to_string(),
            freight_charges_submitted: rounded.freight_submitted.to_string(),
            product_price: AmountResponse::from(&rounded.product_price),
            freight_charges: AmountResponse::from(&rounded.freight),
            insurance: AmountResponse::from(&rounded.insurance),
            cif: AmountResponse::from(&rounded.cif),
            exchange_rates: rounded
                .exchange_rates
                .iter()
                .map(|(code, rate)| {
                    (
                        code.to_string(),
                        RateResponse {
                            to_reference: rate.to_reference.normalize().to_string(),
                            to_local: rate.to_local.normalize().to_string(),
                        },
                    )
                })
                .collect(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
