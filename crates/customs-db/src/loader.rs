//! # Snapshot Loader
//!
//! Reads the latest rates, the latest schedule version and the insurance
//! policy, and assembles them into one immutable `RateSnapshot`.
//!
//! ```text
//! fx_rates (latest rate_date) ──► ExchangeRateTable::from_local_quotes
//! charge_rules (max version)  ──► ChargeSchedule::new          ──► RateSnapshot
//! insurance_rates             ──► InsurancePolicy (or default)
//! ```
//!
//! Everything is validated here, so a snapshot that loads is one the
//! engine can use.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use customs_core::cif::InsurancePolicy;
use customs_core::currency::{CurrencyCode, ExchangeRateTable};
use customs_core::engine::RateSnapshot;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;

/// Builds rate snapshots from the store.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    db: Database,
}

impl SnapshotLoader {
    pub fn new(db: Database) -> Self {
        SnapshotLoader { db }
    }

    /// Loads the current snapshot.
    ///
    /// ## Errors
    /// - `NoRates` when no FX rates are stored
    /// - `NoSchedule` when no charge schedule is stored
    /// - `Core(UnsupportedCurrency)` when the reference currency has no rate
    /// - `InvalidData` / `Core(..)` for stored data that fails validation
    pub async fn load(
        &self,
        local: &CurrencyCode,
        reference: &CurrencyCode,
        max_rate_age: Duration,
    ) -> DbResult<RateSnapshot> {
        let (rate_date, rows) = self.db.fx_rates().latest().await?;
        debug!(date = %rate_date, currencies = rows.len(), "Loaded FX rates");

        let quotes = rows
            .into_iter()
            .filter(|row| &row.currency != local)
            .map(|row| (row.currency, row.selling_rate));
        let rates = ExchangeRateTable::from_local_quotes(
            table_version(rate_date),
            start_of_day(rate_date),
            local.clone(),
            reference.clone(),
            quotes,
        )?;

        let charges = self.db.charge_rules();
        let version = charges.latest_version().await?.ok_or(DbError::NoSchedule)?;
        let schedule = charges.load_schedule(version).await?;

        let insurance = match self.db.insurance().load().await? {
            Some(policy) => policy,
            None => {
                warn!("No insurance policy stored, using defaults");
                InsurancePolicy::default()
            }
        };

        let snapshot = RateSnapshot::new(rates, schedule, insurance, max_rate_age, Utc::now())?;
        info!(
            snapshot_id = %snapshot.id,
            rate_date = %rate_date,
            schedule_version = version,
            local = %local,
            reference = %reference,
            "Rate snapshot loaded"
        );
        Ok(snapshot)
    }
}

/// `2024-06-03` → `20240603`.
fn table_version(date: NaiveDate) -> u64 {
    u64::try_from(date.year()).unwrap_or(0) * 10_000 + u64::from(date.month()) * 100 + u64::from(date.day())
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
