//! # Repository Module
//!
//! Database repository implementations for the customs store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SnapshotLoader / seed                                                  │
//! │       │                                                                 │
//! │       │  db.fx_rates().latest_date()                                   │
//! │       ▼                                                                 │
//! │  FxRateRepository                                                       │
//! │  ├── upsert_batch(&self, date, quotes)                                 │
//! │  ├── latest_date(&self)                                                │
//! │  └── rates_for_date(&self, date)                                       │
//! │       │                                                                 │
//! │       │  SQL Query (decimals as TEXT)                                   │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CurrencyRepository`](currency::CurrencyRepository) - Currency catalogue
//! - [`FxRateRepository`](fx_rate::FxRateRepository) - Daily exchange rates
//! - [`ChargeRuleRepository`](charge_rule::ChargeRuleRepository) - Versioned charge schedules
//! - [`InsuranceRepository`](insurance::InsuranceRepository) - Insurance rates

pub mod charge_rule;
pub mod currency;
pub mod fx_rate;
pub mod insurance;

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{DbError, DbResult};

/// Stored decimal (TEXT) → `Decimal`.
pub(crate) fn parse_decimal(column: &str, text: &str) -> DbResult<Decimal> {
    Decimal::from_str(text.trim()).map_err(|e| DbError::invalid_data(column, format!("'{}': {}", text, e)))
}

/// Fraction → percentage text understood by `parse_rate_text` ("0.015" → "1.5%").
pub(crate) fn percent_text(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}
