//! # Engine
//!
//! Runs one calculation against one immutable snapshot.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CalculationRequest ─┐                                                  │
//! │                      │   RateSnapshot (read-only, shared via Arc)       │
//! │                      ▼                                                  │
//! │  1. rate table fresh?        ExchangeRateTable::ensure_fresh            │
//! │  2. CIF                      cif::valuate                               │
//! │  3. applicable rules         ChargeSchedule::resolve                    │
//! │  4. cascade                  charges::compute                           │
//! │  5. package                  CalculationResult::assemble                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The snapshot is a parameter, never global state. The service swaps
//! whole snapshots, so a calculation sees old rates with old rules or new
//! rates with new rules, never a mix.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::charges::compute;
use crate::cif::{valuate, CifBreakdown, InsurancePolicy};
use crate::currency::{CurrencyRate, ExchangeRateTable};
use crate::error::CoreResult;
use crate::result::CalculationResult;
use crate::schedule::ChargeSchedule;
use crate::types::{CalculationRequest, CifRequest};

/// Default maximum age of a rate table.
pub const DEFAULT_MAX_RATE_AGE_HOURS: i64 = 96;

// =============================================================================
// Rate Snapshot
// =============================================================================

/// Rates, schedule and insurance policy published together.
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub exchange_rates: ExchangeRateTable,
    pub schedule: ChargeSchedule,
    pub insurance: InsurancePolicy,
    pub max_rate_age: Duration,
}

impl RateSnapshot {
    /// Assembles a snapshot with a fresh id.
    pub fn new(
        exchange_rates: ExchangeRateTable,
        schedule: ChargeSchedule,
        insurance: InsurancePolicy,
        max_rate_age: Duration,
        loaded_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        insurance.validate()?;
        Ok(RateSnapshot {
            id: Uuid::new_v4(),
            loaded_at,
            exchange_rates,
            schedule,
            insurance,
            max_rate_age,
        })
    }

    /// Human-readable description for the CLI and logs.
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            id: self.id,
            loaded_at: self.loaded_at,
            rate_table_version: self.exchange_rates.version(),
            rates_as_of: self.exchange_rates.as_of(),
            local_currency: self.exchange_rates.local_currency().to_string(),
            reference_currency: self.exchange_rates.reference_currency().to_string(),
            rates: self
                .exchange_rates
                .rates()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
            schedule_version: self.schedule.version(),
            charges: self.schedule.charge_names().to_vec(),
            insurance: self.insurance.clone(),
            max_rate_age_hours: self.max_rate_age.num_hours(),
        }
    }
}

/// Serializable view of a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub rate_table_version: u64,
    pub rates_as_of: DateTime<Utc>,
    pub local_currency: String,
    pub reference_currency: String,
    pub rates: BTreeMap<String, CurrencyRate>,
    pub schedule_version: u64,
    pub charges: Vec<String>,
    pub insurance: InsurancePolicy,
    pub max_rate_age_hours: i64,
}

// =============================================================================
// Operations
// =============================================================================

/// Computes CIF, charges and total for one request.
///
/// ## Errors
/// - `StaleOrMissingRateTable` if the rate table is older than `max_rate_age`
/// - `UnsupportedCurrency` for a currency absent from the table
/// - `CircularOrForwardBaseReference` for schedule defects
pub fn calculate(
    request: &CalculationRequest,
    snapshot: &RateSnapshot,
    now: DateTime<Utc>,
) -> CoreResult<CalculationResult> {
    let cif = valuate_only(&request.cif_request(), snapshot, now)?;
    let rules = snapshot.schedule.resolve(
        &request.classification_code,
        request.transaction_type,
        request.package_type,
    )?;
    let computation = compute(&cif, &rules)?;
    Ok(CalculationResult::assemble(snapshot.id, cif, computation))
}

/// Computes the CIF valuation only.
pub fn valuate_only(
    request: &CifRequest,
    snapshot: &RateSnapshot,
    now: DateTime<Utc>,
) -> CoreResult<CifBreakdown> {
    snapshot
        .exchange_rates
        .ensure_fresh(now, snapshot.max_rate_age)?;
    valuate(request, &snapshot.exchange_rates, &snapshot.insurance)
}

// =============================================================================
// Unit Tests
// =============================================================================
