//! # Currency Repository
//!
//! The catalogue of currencies rates may be published for. `fx_rates`
//! references it, so a currency must exist before its first rate.

use customs_core::currency::CurrencyCode;
use customs_core::CoreError;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// A stored currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CurrencyRecord {
    pub code: String,
    pub name: String,
}

/// Repository for currency operations.
#[derive(Debug, Clone)]
pub struct CurrencyRepository {
    pool: SqlitePool,
}

impl CurrencyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CurrencyRepository { pool }
    }

    /// Inserts a currency or renames an existing one.
    ///
    /// The code is validated and normalized to uppercase first.
    pub async fn upsert(&self, code: &str, name: &str) -> DbResult<CurrencyRecord> {
        let code = CurrencyCode::parse_field(code, "code").map_err(CoreError::from)?;

        debug!(code = %code, name = %name, "Upserting currency");

        sqlx::query(
            r#"
            INSERT INTO currencies (code, name) VALUES (?1, ?2)
            ON CONFLICT(code) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(code.as_str())
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(CurrencyRecord {
            code: code.to_string(),
            name: name.to_string(),
        })
    }

    /// All currencies, ordered by code.
    pub async fn list(&self) -> DbResult<Vec<CurrencyRecord>> {
        let currencies = sqlx::query_as::<_, CurrencyRecord>(
            "SELECT code, name FROM currencies ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(currencies)
    }

    pub async fn get(&self, code: &str) -> DbResult<Option<CurrencyRecord>> {
        let currency = sqlx::query_as::<_, CurrencyRecord>(
            "SELECT code, name FROM currencies WHERE code = ?1",
        )
        .bind(code.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(currency)
    }
}
