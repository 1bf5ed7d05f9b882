//! # Insurance Repository
//!
//! Insurance percentages by selector, plus the single base setting.
//!
//! ```text
//! selector                rate_text
//! ──────────────────────  ─────────
//! default                 1%
//! mode:air                1%
//! mode:ocean              1.5%
//! package:motor-vehicle   2%
//! ```

use customs_core::cif::{InsuranceBase, InsurancePolicy};
use customs_core::schedule::{parse_rate_text, ChargeAmount};
use customs_core::types::{PackageType, TransportMode};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::info;

use super::percent_text;
use crate::error::{DbError, DbResult};

const DEFAULT_SELECTOR: &str = "default";
const MODE_PREFIX: &str = "mode:";
const PACKAGE_PREFIX: &str = "package:";

fn base_text(base: InsuranceBase) -> &'static str {
    match base {
        InsuranceBase::PricePlusFreight => "price_plus_freight",
        InsuranceBase::PriceOnly => "price_only",
    }
}

fn parse_base(text: &str) -> DbResult<InsuranceBase> {
    match text.trim() {
        "price_plus_freight" => Ok(InsuranceBase::PricePlusFreight),
        "price_only" => Ok(InsuranceBase::PriceOnly),
        other => Err(DbError::invalid_data("insurance_settings.base", format!("'{}'", other))),
    }
}

fn parse_rate(selector: &str, text: &str) -> DbResult<Decimal> {
    match parse_rate_text(text) {
        Ok(ChargeAmount::Rate(rate)) => Ok(rate),
        Ok(_) => Err(DbError::invalid_data(
            "insurance_rates.rate_text",
            format!("{}: insurance must be a percentage, got '{}'", selector, text),
        )),
        Err(e) => Err(DbError::invalid_data("insurance_rates.rate_text", format!("{}: {}", selector, e))),
    }
}

/// Repository for the insurance policy.
#[derive(Debug, Clone)]
pub struct InsuranceRepository {
    pool: SqlitePool,
}

impl InsuranceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InsuranceRepository { pool }
    }

    /// Replaces the stored policy.
    pub async fn save(&self, policy: &InsurancePolicy) -> DbResult<()> {
        policy.validate()?;

        let mut rows = vec![(DEFAULT_SELECTOR.to_string(), percent_text(policy.default_rate))];
        rows.extend(
            policy
                .by_mode
                .iter()
                .map(|(mode, rate)| (format!("{}{}", MODE_PREFIX, mode.as_str()), percent_text(*rate))),
        );
        rows.extend(
            policy
                .by_package
                .iter()
                .map(|(pkg, rate)| (format!("{}{}", PACKAGE_PREFIX, pkg.as_str()), percent_text(*rate))),
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM insurance_rates").execute(&mut *tx).await?;
        for (selector, rate_text) in &rows {
            sqlx::query("INSERT INTO insurance_rates (selector, rate_text) VALUES (?1, ?2)")
                .bind(selector)
                .bind(rate_text)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            r#"
            INSERT INTO insurance_settings (id, base) VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET base = excluded.base
            "#,
        )
        .bind(base_text(policy.base))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(selectors = rows.len(), base = base_text(policy.base), "Insurance policy stored");
        Ok(())
    }

    /// The stored policy, or `None` if none was ever saved.
    ///
    /// ## Errors
    /// - `InvalidData` for unknown selectors, non-percentage rates, or rows
    ///   without a `default` selector
    pub async fn load(&self) -> DbResult<Option<InsurancePolicy>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT selector, rate_text FROM insurance_rates ORDER BY selector")
                .fetch_all(&self.pool)
                .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut default_rate = None;
        let mut by_mode = BTreeMap::new();
        let mut by_package = BTreeMap::new();
        for (selector, rate_text) in &rows {
            let rate = parse_rate(selector, rate_text)?;
            if selector == DEFAULT_SELECTOR {
                default_rate = Some(rate);
            } else if let Some(mode) = selector.strip_prefix(MODE_PREFIX) {
                let mode: TransportMode = mode.parse().map_err(|e| DbError::invalid_data("insurance_rates.selector", e))?;
                by_mode.insert(mode, rate);
            } else if let Some(pkg) = selector.strip_prefix(PACKAGE_PREFIX) {
                let pkg: PackageType = pkg.parse().map_err(|e| DbError::invalid_data("insurance_rates.selector", e))?;
                by_package.insert(pkg, rate);
            } else {
                return Err(DbError::invalid_data(
                    "insurance_rates.selector",
                    format!("unknown selector '{}'", selector),
                ));
            }
        }

        let base: Option<String> = sqlx::query_scalar("SELECT base FROM insurance_settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let policy = InsurancePolicy {
            default_rate: default_rate.ok_or_else(|| {
                DbError::invalid_data("insurance_rates.selector", "missing 'default' selector")
            })?,
            by_mode,
            by_package,
            base: base.as_deref().map(parse_base).transpose()?.unwrap_or_default(),
        };
        policy.validate()?;
        Ok(Some(policy))
    }
}
