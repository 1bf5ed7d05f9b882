//! # Demo Regime
//!
//! A Jamaican-style import regime used by the `seed` binary and tests:
//! local currency JMD, reference currency USD, and the cascade
//!
//! ```text
//! ID-01                          on CIF
//! ASD05 SCTA08 SCTS18 SCTF028    on CIF + ID-01
//! SCF90 ENVL20                   on CIF
//! CAF                            fixed / tiered by CIF in USD
//! GCT EXC                        on CIF + every charge above
//! ```
//!
//! The rates are illustrative, not a published tariff.

use chrono::NaiveDate;
use customs_core::cif::InsurancePolicy;
use customs_core::currency::CurrencyCode;
use customs_core::schedule::{
    parse_rate_text, AppliesWhen, BaseSelector, ChargeAmount, ChargeRule, CodePattern, FeeTier,
};
use customs_core::{CoreResult, Money, PackageType, TransactionType};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::fx_rate::FxQuote;
use crate::repository::parse_decimal;

pub const DEMO_LOCAL_CURRENCY: &str = "JMD";
pub const DEMO_REFERENCE_CURRENCY: &str = "USD";
pub const DEMO_SCHEDULE_VERSION: u64 = 1;

const CURRENCIES: &[(&str, &str)] = &[
    ("CAD", "Canadian Dollar"),
    ("EUR", "Euro"),
    ("GBP", "Pound Sterling"),
    ("JMD", "Jamaican Dollar"),
    ("USD", "US Dollar"),
];

/// (currency, buying, selling) in JMD per unit.
const RATES: &[(&str, &str, &str)] = &[
    ("CAD", "111.90", "114.0625"),
    ("EUR", "166.30", "169.50"),
    ("GBP", "195.72", "198.4375"),
    ("USD", "154.10", "156.25"),
];

const GCT_BASE: &str = "CIF + ID-01 + ASD05 + SCTA08 + SCTS18 + SCTF028 + SCF90 + ENVL20 + CAF";

/// (name, precedence, code pattern, rate text, base)
const RATE_RULES: &[(&str, u32, &str, &str, &str)] = &[
    ("ID-01", 10, "*", "20%", "CIF"),
    ("ID-01", 10, "8471*", "0%", "CIF"),
    ("ID-01", 10, "8703*", "30%", "CIF"),
    ("ASD05", 20, "8703*", "35%", "CIF + ID-01"),
    ("SCTA08", 30, "2208*", "39%", "CIF + ID-01"),
    ("SCTS18", 40, "2402*", "40%", "CIF + ID-01"),
    ("SCTF028", 50, "2710*", "10%", "CIF + ID-01"),
    ("SCF90", 60, "*", "0.3%", "CIF"),
    ("ENVL20", 70, "*", "0.5%", "CIF"),
    ("GCT", 90, "*", "15%", GCT_BASE),
    ("GCT", 90, "3004*", "-", GCT_BASE),
    ("EXC", 100, "8703*", "10%", GCT_BASE),
];

const CAF_PRECEDENCE: u32 = 80;

fn money(units: i64) -> Money {
    Money::from_decimal(Decimal::from(units))
}

/// The demo charge schedule, in declaration order.
pub fn demo_schedule() -> CoreResult<Vec<ChargeRule>> {
    let mut rules = Vec::new();
    for (name, precedence, pattern, rate, base) in RATE_RULES {
        rules.push(
            ChargeRule::new(*name, parse_rate_text(rate)?, BaseSelector::parse(base)?)
                .with_precedence(*precedence)
                .when(AppliesWhen::code(pattern.parse()?)),
        );
    }

    // Household imports: J$2,500 below US$5,000 CIF, J$10,000 otherwise.
    rules.push(
        ChargeRule::new(
            "CAF",
            ChargeAmount::Tiered {
                thresholds: vec![FeeTier {
                    below_reference: money(5_000),
                    amount: money(2_500),
                }],
                otherwise: money(10_000),
            },
            BaseSelector::cif(),
        )
        .with_precedence(CAF_PRECEDENCE)
        .when(AppliesWhen {
            code: CodePattern::Any,
            transaction_types: vec![TransactionType::PersonalUse],
            package_types: vec![],
        }),
    );
    rules.push(
        ChargeRule::new("CAF", ChargeAmount::Fixed(money(10_000)), BaseSelector::cif())
            .with_precedence(CAF_PRECEDENCE)
            .when(AppliesWhen {
                code: CodePattern::Any,
                transaction_types: vec![TransactionType::CommercialCargo],
                package_types: vec![],
            }),
    );
    rules.push(
        ChargeRule::new("CAF", ChargeAmount::Fixed(money(57_500)), BaseSelector::cif())
            .with_precedence(CAF_PRECEDENCE)
            .when(AppliesWhen {
                code: CodePattern::Any,
                transaction_types: vec![TransactionType::PersonalUse, TransactionType::CommercialCargo],
                package_types: vec![PackageType::MotorVehicle],
            }),
    );

    Ok(rules)
}

/// The demo day's selling and buying rates.
pub fn demo_quotes() -> DbResult<Vec<FxQuote>> {
    RATES
        .iter()
        .map(|(code, buying, selling)| {
            Ok(FxQuote {
                currency: code.parse().map_err(|e| DbError::invalid_data("currency_code", e))?,
                buying_rate: Some(parse_decimal("buying_rate", buying)?),
                selling_rate: parse_decimal("selling_rate", selling)?,
            })
        })
        .collect()
}

/// What `seed_demo` wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub currencies: usize,
    pub rates: usize,
    pub rate_date: NaiveDate,
    /// `None` if a schedule already existed.
    pub schedule_version: Option<u64>,
    pub insurance_saved: bool,
}

/// Writes the demo regime.
///
/// Rates for `rate_date` are always (re)written. The schedule and the
/// insurance policy are only written into an empty store.
pub async fn seed_demo(db: &Database, rate_date: NaiveDate) -> DbResult<SeedReport> {
    for (code, name) in CURRENCIES {
        db.currencies().upsert(code, name).await?;
    }

    let rates = db.fx_rates().upsert_batch(rate_date, &demo_quotes()?).await?;

    let schedule_version = match db.charge_rules().latest_version().await? {
        Some(existing) => {
            info!(version = existing, "Charge schedule already present, not seeding");
            None
        }
        None => {
            db.charge_rules()
                .insert_schedule(DEMO_SCHEDULE_VERSION, &demo_schedule()?)
                .await?;
            Some(DEMO_SCHEDULE_VERSION)
        }
    };

    let insurance_saved = if db.insurance().load().await?.is_none() {
        db.insurance().save(&InsurancePolicy::default()).await?;
        true
    } else {
        false
    };

    Ok(SeedReport {
        currencies: CURRENCIES.len(),
        rates,
        rate_date,
        schedule_version,
        insurance_saved,
    })
}

/// The demo `(local, reference)` currencies.
pub fn demo_currencies() -> CoreResult<(CurrencyCode, CurrencyCode)> {
    Ok((DEMO_LOCAL_CURRENCY.parse()?, DEMO_REFERENCE_CURRENCY.parse()?))
}
