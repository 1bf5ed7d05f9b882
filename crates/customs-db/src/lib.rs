//! # customs-db: Rate and Schedule Storage
//!
//! SQLite storage for exchange rates, charge schedules and insurance
//! rates, and the loader that turns them into a `RateSnapshot`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Customs Engine Data Flow                         │
//! │                                                                         │
//! │  customs-service RateRefresher (every N seconds)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   customs-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Currency      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ FxRate        │    │ 001_init.sql │  │   │
//! │  │   │               │    │ ChargeRule    │    │              │  │   │
//! │  │   │               │    │ Insurance     │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                ▼                               │   │
//! │  │                        SnapshotLoader ──► RateSnapshot         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (customs.db)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Currency, FX rate, charge rule and insurance repositories
//! - [`loader`] - Snapshot assembly
//! - [`demo`] - Demo regime for the `seed` binary
//!
//! ## Usage
//!
//! ```rust,ignore
//! use customs_db::{Database, DbConfig, SnapshotLoader};
//!
//! let db = Database::new(DbConfig::new("customs.db")).await?;
//! let snapshot = SnapshotLoader::new(db)
//!     .load(&"JMD".parse()?, &"USD".parse()?, chrono::Duration::hours(96))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod demo;
pub mod error;
pub mod loader;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use loader::SnapshotLoader;
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

pub use repository::charge_rule::ChargeRuleRepository;
pub use repository::currency::{CurrencyRecord, CurrencyRepository};
pub use repository::fx_rate::{FxQuote, FxRateRecord, FxRateRepository};
pub use repository::insurance::InsuranceRepository;
