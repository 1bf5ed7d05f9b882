//! # Customs Service
//!
//! Wires the store, the refresher and the calculator together.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CustomsService::open(config)                                           │
//! │    1. Database::new(config.database.path)   (migrations applied)        │
//! │    2. DbSnapshotSource::from_config                                     │
//! │    3. refresh_once()   → first snapshot, or warn and start empty        │
//! │                                                                         │
//! │  start_refresh()   → RateRefresher::run spawned on Tokio                │
//! │  calculator()      → CustomsCalculator over the shared store            │
//! │  shutdown()        → stop the refresher, close the pool                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use customs_core::engine::SnapshotSummary;
use customs_db::{Database, DbConfig};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::calculator::CustomsCalculator;
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::refresh::{DbSnapshotSource, RateRefresher, RefresherHandle};
use crate::snapshot::SnapshotStore;

pub struct CustomsService {
    db: Database,
    store: SnapshotStore,
    refresher: Option<RateRefresher<DbSnapshotSource>>,
    refresher_handle: RefresherHandle,
    refresher_task: Option<JoinHandle<()>>,
}

impl CustomsService {
    /// Opens the rate store and loads the first snapshot.
    ///
    /// A failed first load is not fatal: the service starts empty and
    /// calculations report `SERVICE_UNAVAILABLE` until a refresh succeeds.
    pub async fn open(config: &ServiceConfig) -> ServiceResult<Self> {
        config.validate()?;

        let db = Database::new(DbConfig::new(config.database.path.clone())).await?;
        let source = DbSnapshotSource::from_config(db.clone(), config)?;
        let store = SnapshotStore::new();
        let (refresher, refresher_handle) =
            RateRefresher::new(source, store.clone(), config.refresh_interval());

        match refresher.refresh_once().await {
            Ok(()) => {}
            Err(ServiceError::Database(e)) if e.is_unseeded() => {
                warn!(error = %e, "Rate store is not seeded yet, starting without a snapshot")
            }
            Err(e) => warn!(error = %e, "Initial rate snapshot load failed"),
        }

        info!(
            db_path = %config.database.path.display(),
            loaded = store.is_loaded().await,
            "Customs service opened"
        );

        Ok(CustomsService {
            db,
            store,
            refresher: Some(refresher),
            refresher_handle,
            refresher_task: None,
        })
    }

    /// Spawns the periodic refresher. Only the first call has an effect.
    pub fn start_refresh(&mut self) {
        if let Some(refresher) = self.refresher.take() {
            self.refresher_task = Some(tokio::spawn(refresher.run()));
        }
    }

    pub fn calculator(&self) -> CustomsCalculator {
        CustomsCalculator::new(self.store.clone())
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Summary of the snapshot currently in use.
    pub async fn summary(&self) -> ServiceResult<SnapshotSummary> {
        Ok(self.store.current().await?.summary())
    }

    /// Stops the refresher and closes the database.
    pub async fn shutdown(mut self) -> ServiceResult<()> {
        info!("Shutting down customs service");

        if let Some(task) = self.refresher_task.take() {
            self.refresher_handle.shutdown().await?;
            task.await
                .map_err(|e| ServiceError::ChannelError(format!("Refresher task failed: {}", e)))?;
        }

        self.db.close().await;
        info!("Customs service stopped");
        Ok(())
    }
}
