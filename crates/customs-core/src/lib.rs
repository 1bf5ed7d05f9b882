//! # customs-core: Pure Valuation Logic for the Customs Engine
//!
//! This crate is the **heart** of the customs engine. It turns product and
//! shipping facts into a CIF valuation and a cascading breakdown of duties
//! and taxes, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Customs Engine Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Form / transport (external)                    │   │
//! │  │         posts a RawCalculationRequest, renders the response     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             customs-service (snapshot store, CLI)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ customs-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐  │   │
//! │  │   │ currency │  │   cif    │  │ schedule │  │   charges    │  │   │
//! │  │   │ convert  │─►│ valuate  │  │ resolve  │─►│   compute    │  │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────┬───────┘  │   │
//! │  │                                                    ▼          │   │
//! │  │                                             ┌──────────────┐  │   │
//! │  │                                             │    result    │  │   │
//! │  │                                             └──────────────┘  │   │
//! │  │   NO I/O • NO DATABASE • NO LOGGING • PURE FUNCTIONS          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                ▲                                        │
//! │  ┌─────────────────────────────┴───────────────────────────────────┐   │
//! │  │        customs-db: rates, schedule, insurance → RateSnapshot     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Decimal `Money`, rounded once at output
//! - [`currency`] - Currency codes, rate tables, conversion
//! - [`types`] - Request enums, classification codes, validated requests
//! - [`validation`] - Raw payload → validated request
//! - [`schedule`] - Charge rules and the schedule resolver
//! - [`cif`] - CIF valuator and insurance policy
//! - [`charges`] - Cascading charge calculator
//! - [`result`] - Result assembler and response contract
//! - [`engine`] - Snapshot type and the end-to-end operations
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same request + same snapshot = same result
//! 2. **No I/O**: the snapshot is passed in, never fetched
//! 3. **Decimal Money**: full precision internally, rounded half-up at output
//! 4. **Explicit Errors**: every failure names its field or its rule
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use customs_core::prelude::*;
//! use rust_decimal::Decimal;
//!
//! let as_of = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
//! let rates = ExchangeRateTable::from_local_quotes(
//!     1,
//!     as_of,
//!     "JMD".parse().unwrap(),
//!     "USD".parse().unwrap(),
//!     vec![("USD".parse().unwrap(), Decimal::new(15625, 2))],
//! ).unwrap();
//! let schedule = ChargeSchedule::new(1, vec![
//!     ChargeRule::new("ID-01", ChargeAmount::Rate(Decimal::new(20, 2)), BaseSelector::cif()),
//! ]).unwrap();
//! let snapshot = RateSnapshot::new(
//!     rates, schedule, InsurancePolicy::default(), Duration::hours(96), as_of,
//! ).unwrap();
//!
//! let raw: RawCalculationRequest = serde_json::from_str(r#"{
//!     "classification_code": "8703.23", "transaction_type": "commercial-cargo",
//!     "package_type": "general", "product_price": "1000", "product_currency": "USD",
//!     "freight_charges": "100", "freight_currency": "USD", "mode_of_transportation": "air"
//! }"#).unwrap();
//!
//! let request = validate_request(&raw).unwrap();
//! let result = calculate(&request, &snapshot, as_of).unwrap();
//! assert_eq!(result.to_response().total_custom_charges, "34718.75");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod charges;
pub mod cif;
pub mod currency;
pub mod engine;
pub mod error;
pub mod money;
pub mod result;
pub mod schedule;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

/// Everything needed to build a snapshot and run a calculation.
pub mod prelude {
    pub use crate::charges::{compute, ChargeComputation, ChargeLineItem, ComputedCharge};
    pub use crate::cif::{valuate, CifBreakdown, InsuranceBase, InsurancePolicy, ValuedAmount};
    pub use crate::currency::{convert, ConvertedAmount, CurrencyCode, CurrencyRate, ExchangeRateTable};
    pub use crate::engine::{calculate, valuate_only, RateSnapshot, SnapshotSummary};
    pub use crate::error::{CoreError, CoreResult, ValidationError};
    pub use crate::money::Money;
    pub use crate::result::{CalculationResult, CifResponse, CustomsResponse};
    pub use crate::schedule::{
        parse_rate_text, AppliesWhen, BaseSelector, ChargeAmount, ChargeRule, ChargeSchedule,
        CodePattern, FeeTier,
    };
    pub use crate::types::*;
    pub use crate::validation::{
        validate_cif_request, validate_request, RawCalculationRequest, MAX_INPUT_AMOUNT,
    };
}
