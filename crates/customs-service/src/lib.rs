//! # customs-service: Snapshot Management for the Customs Engine
//!
//! Runs calculations against a rate snapshot that is reloaded in the
//! background and swapped atomically.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Customs Service Architecture                      │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                CustomsService (orchestrator)                     │  │
//! │  │   opens the store, loads the first snapshot, spawns refresher    │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ RateRefresher  │  │ SnapshotStore  │  │  CustomsCalculator     │    │
//! │  │                │  │                │  │                        │    │
//! │  │ interval task  │─►│ Arc swap of    │◄─│ validate, take one     │    │
//! │  │ SnapshotSource │  │ RateSnapshot   │  │ snapshot, run engine,  │    │
//! │  │ keeps old on   │  │                │  │ classify ApiError      │    │
//! │  │ failure        │  │                │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  customs-calc (bin): calculate | cif | rates | batch                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - `ServiceConfig` (defaults → TOML → env)
//! - [`error`] - Service and config error types
//! - [`snapshot`] - `SnapshotStore`
//! - [`refresh`] - `RateRefresher` and `SnapshotSource`
//! - [`calculator`] - `CustomsCalculator` and `ApiError`
//! - [`service`] - `CustomsService` orchestrator
//! - [`logging`] - tracing subscriber setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use customs_service::{CustomsCalculator, CustomsService, ServiceConfig};
//!
//! let config = ServiceConfig::load(None)?;
//! let mut service = CustomsService::open(&config).await?;
//! service.start_refresh();
//!
//! let raw = CustomsCalculator::parse_request(body)?;
//! let response = service.calculator().calculate(&raw).await?;
//! println!("{}", response.total_custom_charges);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calculator;
pub mod config;
pub mod error;
pub mod logging;
pub mod refresh;
pub mod service;
pub mod snapshot;

// =============================================================================
// Re-exports
// =============================================================================

pub use calculator::{ApiError, CustomsCalculator, ErrorCategory};
pub use config::ServiceConfig;
pub use error::{ConfigError, ConfigResult, ServiceError, ServiceResult};
pub use refresh::{DbSnapshotSource, RateRefresher, RefresherHandle, SnapshotSource};
pub use service::CustomsService;
pub use snapshot::SnapshotStore;
