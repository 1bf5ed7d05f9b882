//! # Rate Refresher
//!
//! Background task that reloads the rate snapshot on an interval.
//!
//! ## Refresh Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Refresh Cycle                                   │
//! │                                                                         │
//! │  interval.tick()                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SnapshotSource::load()  ── Err ──►  warn!, keep the current snapshot   │
//! │       │ Ok                                                              │
//! │       ▼                                                                 │
//! │  SnapshotStore::publish()   (whole-snapshot swap)                       │
//! │                                                                         │
//! │  shutdown_rx.recv()  ──►  break                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use customs_core::currency::CurrencyCode;
use customs_core::engine::RateSnapshot;
use customs_db::{Database, SnapshotLoader};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::{ConfigResult, ServiceError, ServiceResult};
use crate::snapshot::SnapshotStore;

// =============================================================================
// Snapshot Source
// =============================================================================

/// Something that can produce a fresh snapshot.
pub trait SnapshotSource: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = ServiceResult<RateSnapshot>> + Send;
}

/// Loads snapshots from the SQLite rate store.
#[derive(Debug, Clone)]
pub struct DbSnapshotSource {
    loader: SnapshotLoader,
    local: CurrencyCode,
    reference: CurrencyCode,
    max_rate_age: chrono::Duration,
}

impl DbSnapshotSource {
    pub fn new(
        db: Database,
        local: CurrencyCode,
        reference: CurrencyCode,
        max_rate_age: chrono::Duration,
    ) -> Self {
        DbSnapshotSource {
            loader: SnapshotLoader::new(db),
            local,
            reference,
            max_rate_age,
        }
    }

    /// Builds a source using the configured currencies and rate age.
    pub fn from_config(db: Database, config: &ServiceConfig) -> ConfigResult<Self> {
        let (local, reference) = config.currencies()?;
        Ok(Self::new(db, local, reference, config.max_rate_age()))
    }
}

impl SnapshotSource for DbSnapshotSource {
    async fn load(&self) -> ServiceResult<RateSnapshot> {
        let snapshot = self
            .loader
            .load(&self.local, &self.reference, self.max_rate_age)
            .await?;
        Ok(snapshot)
    }
}

// =============================================================================
// Rate Refresher
// =============================================================================

/// Periodically reloads and publishes the snapshot.
pub struct RateRefresher<S> {
    source: S,
    store: SnapshotStore,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the refresher.
#[derive(Clone)]
pub struct RefresherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl RefresherHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> ServiceResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| ServiceError::ChannelError("Shutdown channel closed".into()))
    }
}

impl<S: SnapshotSource> RateRefresher<S> {
    /// Creates a new refresher and returns a handle.
    pub fn new(source: S, store: SnapshotStore, interval: Duration) -> (Self, RefresherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let refresher = RateRefresher {
            source,
            store,
            interval,
            shutdown_rx,
        };

        (refresher, RefresherHandle { shutdown_tx })
    }

    /// Loads once and publishes on success. The store is untouched on failure.
    pub async fn refresh_once(&self) -> ServiceResult<()> {
        let snapshot = self.source.load().await?;
        self.store.publish(snapshot).await;
        Ok(())
    }

    /// Runs the refresher until shutdown. The first tick fires immediately.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Rate refresher starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.refresh_once().await {
                        Ok(()) => debug!("Rate snapshot refreshed"),
                        Err(e) => {
                            let kept_snapshot = self.store.is_loaded().await;
                            warn!(error = %e, kept_snapshot, "Rate refresh failed");
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Rate refresher shutting down");
                    break;
                }
            }
        }

        info!("Rate refresher stopped");
    }
}
