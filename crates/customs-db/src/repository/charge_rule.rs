//! # Charge Rule Repository
//!
//! Versioned charge schedules. Each version is written once, as a whole,
//! and never edited; a new tariff is a new version.
//!
//! ## Row Encoding
//! ```text
//! name     code_pattern  rate_text  tier_json          base_selector        tx / pkg
//! ───────  ────────────  ─────────  ─────────────────  ───────────────────  ─────────────────
//! ID-01    8703*         30%        NULL               CIF                  '' / ''
//! CAF      *             tiered     {"kind":"tiered"…}  CIF                  personal-use / ''
//! CAF      *             $57500     NULL               CIF                  personal-use,… / motor-vehicle
//! GCT      *             15%        NULL               CIF + ID-01 + CAF    '' / ''
//! ```
//! `rate_text` is read back through `parse_rate_text`, so hand-entered
//! schedules may use any form it accepts ("20%", "0.2", "J$2,500", "-").

use customs_core::schedule::{
    parse_rate_text, AppliesWhen, BaseSelector, ChargeAmount, ChargeRule, ChargeSchedule, CodePattern,
};
use customs_core::types::{PackageType, TransactionType};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use super::percent_text;
use crate::error::{DbError, DbResult};

const TIERED_TEXT: &str = "tiered";

#[derive(sqlx::FromRow)]
struct ChargeRuleRow {
    name: String,
    code_pattern: String,
    rate_text: String,
    tier_json: Option<String>,
    base_selector: String,
    transaction_types: String,
    package_types: String,
    precedence: i64,
}

impl TryFrom<ChargeRuleRow> for ChargeRule {
    type Error = DbError;

    fn try_from(row: ChargeRuleRow) -> DbResult<Self> {
        let amount = match row.tier_json.as_deref() {
            Some(json) => serde_json::from_str::<ChargeAmount>(json)
                .map_err(|e| DbError::invalid_data("tier_json", format!("{}: {}", row.name, e)))?,
            None => parse_rate_text(&row.rate_text)
                .map_err(|e| DbError::invalid_data("rate_text", format!("{}: {}", row.name, e)))?,
        };

        Ok(ChargeRule {
            amount,
            base: BaseSelector::parse(&row.base_selector)
                .map_err(|e| DbError::invalid_data("base_selector", e))?,
            applies_when: AppliesWhen {
                code: CodePattern::from_str(&row.code_pattern)
                    .map_err(|e| DbError::invalid_data("code_pattern", e))?,
                transaction_types: parse_list("transaction_types", &row.transaction_types)?,
                package_types: parse_list("package_types", &row.package_types)?,
            },
            precedence: u32::try_from(row.precedence)
                .map_err(|e| DbError::invalid_data("precedence", e))?,
            name: row.name,
        })
    }
}

fn parse_list<T>(column: &str, text: &str) -> DbResult<Vec<T>>
where
    T: FromStr,
    T::Err: ToString,
{
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<T>().map_err(|e| DbError::invalid_data(column, e)))
        .collect()
}

fn join_list<T: ToString>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

/// `(rate_text, tier_json)` for a charge amount.
fn encode_amount(amount: &ChargeAmount) -> DbResult<(String, Option<String>)> {
    Ok(match amount {
        ChargeAmount::Rate(rate) => (percent_text(*rate), None),
        ChargeAmount::Fixed(fee) => (format!("${}", fee.amount().normalize()), None),
        ChargeAmount::Tiered { .. } => (
            TIERED_TEXT.to_string(),
            Some(serde_json::to_string(amount).map_err(|e| DbError::invalid_data("tier_json", e))?),
        ),
    })
}

/// Repository for charge schedules.
#[derive(Debug, Clone)]
pub struct ChargeRuleRepository {
    pool: SqlitePool,
}

impl ChargeRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ChargeRuleRepository { pool }
    }

    /// Stores a complete schedule under `version`.
    ///
    /// The rules are validated as a schedule first, so a defective schedule
    /// is never written.
    ///
    /// ## Errors
    /// - `Core` for a schedule `ChargeSchedule::new` rejects
    /// - `UniqueViolation` if `version` already exists
    pub async fn insert_schedule(&self, version: u64, rules: &[ChargeRule]) -> DbResult<ChargeSchedule> {
        let schedule = ChargeSchedule::new(version, rules.to_vec())?;
        let version_db = version_to_db(version)?;

        let mut tx = self.pool.begin().await?;
        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM charge_rules WHERE schedule_version = ?1")
                .bind(version_db)
                .fetch_one(&mut *tx)
                .await?;
        if existing > 0 {
            return Err(DbError::UniqueViolation {
                field: "charge_rules.schedule_version".to_string(),
                value: version.to_string(),
            });
        }

        for (position, rule) in schedule.rules().iter().enumerate() {
            Self::insert_row(&mut tx, version_db, position as i64, rule).await?;
        }
        tx.commit().await?;

        info!(
            version,
            rules = schedule.rules().len(),
            charges = schedule.charge_names().len(),
            "Charge schedule stored"
        );
        Ok(schedule)
    }

    /// Appends one rule variant to `version`.
    ///
    /// Not validated against the rest of the version; the loader validates
    /// the assembled schedule.
    pub async fn insert(&self, version: u64, rule: &ChargeRule) -> DbResult<()> {
        let version_db = version_to_db(version)?;
        let mut tx = self.pool.begin().await?;
        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM charge_rules WHERE schedule_version = ?1",
        )
        .bind(version_db)
        .fetch_one(&mut *tx)
        .await?;
        Self::insert_row(&mut tx, version_db, position, rule).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_row(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i64,
        position: i64,
        rule: &ChargeRule,
    ) -> DbResult<()> {
        let (rate_text, tier_json) = encode_amount(&rule.amount)?;

        debug!(version, position, name = %rule.name, rate = %rate_text, "Storing charge rule");

        sqlx::query(
            r#"
            INSERT INTO charge_rules (
                id, schedule_version, position, name, code_pattern, rate_text, tier_json,
                base_selector, transaction_types, package_types, precedence
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(version)
        .bind(position)
        .bind(&rule.name)
        .bind(rule.applies_when.code.to_string())
        .bind(rate_text)
        .bind(tier_json)
        .bind(rule.base.to_string())
        .bind(join_list(&rule.applies_when.transaction_types))
        .bind(join_list(&rule.applies_when.package_types))
        .bind(i64::from(rule.precedence))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Rules of one version in declaration order.
    pub async fn list_for_version(&self, version: u64) -> DbResult<Vec<ChargeRule>> {
        let rows = sqlx::query_as::<_, ChargeRuleRow>(
            r#"
            SELECT name, code_pattern, rate_text, tier_json, base_selector,
                   transaction_types, package_types, precedence
            FROM charge_rules
            WHERE schedule_version = ?1
            ORDER BY position
            "#,
        )
        .bind(version_to_db(version)?)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChargeRule::try_from).collect()
    }

    pub async fn latest_version(&self) -> DbResult<Option<u64>> {
        let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(schedule_version) FROM charge_rules")
            .fetch_one(&self.pool)
            .await?;

        latest
            .map(|v| u64::try_from(v).map_err(|e| DbError::invalid_data("schedule_version", e)))
            .transpose()
    }

    /// Loads and validates one version.
    pub async fn load_schedule(&self, version: u64) -> DbResult<ChargeSchedule> {
        let rules = self.list_for_version(version).await?;
        if rules.is_empty() {
            return Err(DbError::NotFound {
                entity: "Charge schedule".to_string(),
                id: version.to_string(),
            });
        }
        Ok(ChargeSchedule::new(version, rules)?)
    }
}

fn version_to_db(version: u64) -> DbResult<i64> {
    i64::try_from(version).map_err(|e| DbError::invalid_data("schedule_version", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use customs_core::schedule::FeeTier;
    use customs_core::{CoreError, Money};
    use rust_decimal_macros::dec;

    fn rules() -> Vec<ChargeRule> {
        vec![
            ChargeRule::new("ID-01", ChargeAmount::Rate(dec!(0.20)), BaseSelector::cif())
                .with_precedence(10),
            ChargeRule::new("ID-01", ChargeAmount::Rate(dec!(0.30)), BaseSelector::cif())
                .with_precedence(10)
                .when(AppliesWhen::code("8703*".parse().unwrap())),
            ChargeRule::new(
                "CAF",
                ChargeAmount::Tiered {
                    thresholds: vec![FeeTier {
                        below_reference: Money::from_decimal(dec!(5000)),
                        amount: Money::from_decimal(dec!(2500)),
                    }],
                    otherwise: Money::from_decimal(dec!(10000)),
                },
                BaseSelector::cif(),
            )
            .with_precedence(20)
            .when(AppliesWhen {
                code: CodePattern::Any,
                transaction_types: vec![TransactionType::PersonalUse],
                package_types: vec![],
            }),
            ChargeRule::new(
                "CAF",
                ChargeAmount::Fixed(Money::from_decimal(dec!(57500))),
                BaseSelector::cif(),
            )
            .with_precedence(20)
            .when(AppliesWhen {
                code: CodePattern::Any,
                transaction_types: vec![TransactionType::PersonalUse, TransactionType::CommercialCargo],
                package_types: vec![PackageType::MotorVehicle],
            }),
            ChargeRule::new(
                "GCT",
                ChargeAmount::Rate(dec!(0.165)),
                BaseSelector::cif_plus(["ID-01", "CAF"]),
            )
            .with_precedence(30),
        ]
    }

    #[tokio::test]
    async fn test_schedule_round_trips() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.charge_rules();

        assert_eq!(repo.latest_version().await.unwrap(), None);
        repo.insert_schedule(1, &rules()).await.unwrap();

        assert_eq!(repo.latest_version().await.unwrap(), Some(1));
        assert_eq!(repo.list_for_version(1).await.unwrap(), rules());

        let schedule = repo.load_schedule(1).await.unwrap();
        assert_eq!(schedule.charge_names(), ["ID-01", "CAF", "GCT"]);
    }

    #[tokio::test]
    async fn test_defective_schedule_is_not_written() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let forward = vec![
            ChargeRule::new("GCT", ChargeAmount::Rate(dec!(0.15)), BaseSelector::cif_plus(["ID-01"]))
                .with_precedence(1),
            ChargeRule::new("ID-01", ChargeAmount::Rate(dec!(0.2)), BaseSelector::cif())
                .with_precedence(2),
        ];

        let err = db.charge_rules().insert_schedule(1, &forward).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::CircularOrForwardBaseReference { .. })
        ));
        assert_eq!(db.charge_rules().latest_version().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_version_is_written_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.charge_rules().insert_schedule(1, &rules()).await.unwrap();
        let err = db.charge_rules().insert_schedule(1, &rules()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_hand_entered_rate_text() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            r#"
            INSERT INTO charge_rules (id, schedule_version, position, name, code_pattern, rate_text)
            VALUES ('a', 2, 0, 'ID-01', '0101*', 'no data'),
                   ('b', 2, 1, 'SCF90', '*', '0.3%'),
                   ('c', 2, 2, 'CAF', '*', 'J$2,500')
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let rules = db.charge_rules().list_for_version(2).await.unwrap();
        assert_eq!(rules[0].amount, ChargeAmount::Rate(dec!(0)));
        assert_eq!(rules[0].applies_when.code, CodePattern::Prefix("0101".into()));
        assert_eq!(rules[1].amount, ChargeAmount::Rate(dec!(0.003)));
        assert_eq!(rules[2].amount, ChargeAmount::Fixed(Money::from_decimal(dec!(2500))));
        assert_eq!(rules[2].base, BaseSelector::cif());
    }

    #[tokio::test]
    async fn test_per_unit_rate_text_is_invalid_data() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.charge_rules()
            .insert(
                3,
                &ChargeRule::new("ID-01", ChargeAmount::Rate(dec!(0.2)), BaseSelector::cif()),
            )
            .await
            .unwrap();
        sqlx::query("UPDATE charge_rules SET rate_text = '$0.75 per litre' WHERE schedule_version = 3")
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.charge_rules().load_schedule(3).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidData { ref column, .. } if column == "rate_text"));
    }

    #[tokio::test]
    async fn test_missing_version_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(matches!(
            db.charge_rules().load_schedule(9).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }
}
