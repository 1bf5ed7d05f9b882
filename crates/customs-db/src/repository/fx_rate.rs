//! # FX Rate Repository
//!
//! Daily exchange rates, quoted in local currency per one foreign unit
//! (a central bank's buying/selling table). Conversion uses the selling rate.
//!
//! ## Storage
//! ```text
//! rate_date    currency_code  buying_rate  selling_rate  captured_at
//! ───────────  ─────────────  ───────────  ────────────  ─────────────────────
//! 2024-06-03   USD            154.10       156.25        2024-06-03T13:02:11Z
//! 2024-06-03   GBP            195.72       198.4375      2024-06-03T13:02:11Z
//! ```
//! One row per (date, currency); publishing the same day again overwrites.

use chrono::{DateTime, NaiveDate, Utc};
use customs_core::currency::CurrencyCode;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::parse_decimal;
use crate::error::{DbError, DbResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One currency's rates for a day, as published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxQuote {
    pub currency: CurrencyCode,
    pub buying_rate: Option<Decimal>,
    pub selling_rate: Decimal,
}

impl FxQuote {
    pub fn selling(currency: CurrencyCode, selling_rate: Decimal) -> Self {
        FxQuote {
            currency,
            buying_rate: None,
            selling_rate,
        }
    }
}

/// A stored rate row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxRateRecord {
    pub rate_date: NaiveDate,
    pub currency: CurrencyCode,
    pub buying_rate: Option<Decimal>,
    pub selling_rate: Decimal,
    pub captured_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct FxRateRow {
    rate_date: String,
    currency_code: String,
    buying_rate: Option<String>,
    selling_rate: String,
    captured_at: String,
}

impl TryFrom<FxRateRow> for FxRateRecord {
    type Error = DbError;

    fn try_from(row: FxRateRow) -> DbResult<Self> {
        Ok(FxRateRecord {
            rate_date: parse_date(&row.rate_date)?,
            currency: row
                .currency_code
                .parse()
                .map_err(|e| DbError::invalid_data("currency_code", e))?,
            buying_rate: row
                .buying_rate
                .as_deref()
                .map(|text| parse_decimal("buying_rate", text))
                .transpose()?,
            selling_rate: parse_decimal("selling_rate", &row.selling_rate)?,
            captured_at: DateTime::parse_from_rfc3339(&row.captured_at)
                .map_err(|e| DbError::invalid_data("captured_at", e))?
                .with_timezone(&Utc),
        })
    }
}

fn parse_date(text: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e| DbError::invalid_data("rate_date", e))
}

/// Repository for daily FX rates.
#[derive(Debug, Clone)]
pub struct FxRateRepository {
    pool: SqlitePool,
}

impl FxRateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        FxRateRepository { pool }
    }

    /// Stores one day's quotes atomically, replacing any earlier capture of
    /// the same day.
    ///
    /// ## Errors
    /// - `InvalidData` for a non-positive rate (nothing is written)
    /// - `ForeignKeyViolation` for a currency missing from `currencies`
    pub async fn upsert_batch(&self, rate_date: NaiveDate, quotes: &[FxQuote]) -> DbResult<usize> {
        for quote in quotes {
            if quote.selling_rate <= Decimal::ZERO {
                return Err(DbError::invalid_data(
                    "selling_rate",
                    format!("{} rate must be positive, got {}", quote.currency, quote.selling_rate),
                ));
            }
            if matches!(quote.buying_rate, Some(rate) if rate <= Decimal::ZERO) {
                return Err(DbError::invalid_data(
                    "buying_rate",
                    format!("{} rate must be positive", quote.currency),
                ));
            }
        }

        let date = rate_date.format(DATE_FORMAT).to_string();
        let captured_at = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        for quote in quotes {
            debug!(date = %date, currency = %quote.currency, rate = %quote.selling_rate, "Storing FX rate");

            sqlx::query(
                r#"
                INSERT INTO fx_rates (
                    id, rate_date, currency_code, buying_rate, selling_rate, captured_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(rate_date, currency_code) DO UPDATE SET
                    buying_rate = excluded.buying_rate,
                    selling_rate = excluded.selling_rate,
                    captured_at = excluded.captured_at
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&date)
            .bind(quote.currency.as_str())
            .bind(quote.buying_rate.map(|r| r.to_string()))
            .bind(quote.selling_rate.to_string())
            .bind(&captured_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(date = %date, count = quotes.len(), "FX rates stored");
        Ok(quotes.len())
    }

    /// Most recent day with any rates.
    pub async fn latest_date(&self) -> DbResult<Option<NaiveDate>> {
        let latest: Option<String> = sqlx::query_scalar("SELECT MAX(rate_date) FROM fx_rates")
            .fetch_one(&self.pool)
            .await?;

        latest.as_deref().map(parse_date).transpose()
    }

    /// All rates of one day, ordered by currency.
    pub async fn rates_for_date(&self, rate_date: NaiveDate) -> DbResult<Vec<FxRateRecord>> {
        let rows = sqlx::query_as::<_, FxRateRow>(
            r#"
            SELECT rate_date, currency_code, buying_rate, selling_rate, captured_at
            FROM fx_rates
            WHERE rate_date = ?1
            ORDER BY currency_code
            "#,
        )
        .bind(rate_date.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FxRateRecord::try_from).collect()
    }

    /// The most recent day's rates.
    ///
    /// ## Errors
    /// - `NoRates` when nothing has been stored
    pub async fn latest(&self) -> DbResult<(NaiveDate, Vec<FxRateRecord>)> {
        let date = self.latest_date().await?.ok_or(DbError::NoRates { date: None })?;
        let rates = self.rates_for_date(date).await?;
        if rates.is_empty() {
            return Err(DbError::NoRates {
                date: Some(date.to_string()),
            });
        }
        Ok((date, rates))
    }
}
