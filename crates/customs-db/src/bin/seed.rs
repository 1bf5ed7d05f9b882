//! # Seed Data Generator
//!
//! Populates a database with the demo regime for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./customs_dev.db with today's demo rates
//! cargo run -p customs-db --bin seed
//!
//! # Specify database path and rate date
//! cargo run -p customs-db --bin seed -- --db ./data/customs.db --date 2024-06-03
//! ```
//!
//! ## Seeded Data
//! - Currencies: CAD, EUR, GBP, JMD, USD
//! - One day of selling/buying rates in JMD
//! - Charge schedule version 1 (ID-01 … EXC), if the store has none
//! - Default insurance policy (air 1%, ocean 1.5%), if the store has none

use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use customs_db::demo::{demo_currencies, seed_demo};
use customs_db::{Database, DbConfig, SnapshotLoader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Seed the customs database with the demo regime")]
struct Args {
    /// Database file path
    #[arg(short, long, default_value = "./customs_dev.db")]
    db: String,

    /// Rate date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let rate_date = args.date.unwrap_or_else(|| Utc::now().date_naive());

    println!("🌱 Customs Engine Seed Data Generator");
    println!("=====================================");
    println!("Database:  {}", args.db);
    println!("Rate date: {}", rate_date);
    println!();

    let db = Database::new(DbConfig::new(&args.db)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let report = seed_demo(&db, rate_date).await?;
    println!("✓ {} currencies", report.currencies);
    println!("✓ {} FX rates for {}", report.rates, report.rate_date);
    match report.schedule_version {
        Some(version) => println!("✓ Charge schedule version {}", version),
        None => println!("⚠ Charge schedule already present, left unchanged"),
    }
    if report.insurance_saved {
        println!("✓ Default insurance policy");
    } else {
        println!("⚠ Insurance policy already present, left unchanged");
    }

    // Verify the store assembles into a usable snapshot
    println!();
    println!("Verifying snapshot...");
    let (local, reference) = demo_currencies()?;
    let snapshot = SnapshotLoader::new(db.clone())
        .load(&local, &reference, Duration::hours(96))
        .await?;
    println!("  Snapshot {}", snapshot.id);
    println!("  Charges: {}", snapshot.schedule.charge_names().join(" → "));

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
