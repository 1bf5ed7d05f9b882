//! # Snapshot Store
//!
//! Process-wide holder of the current [`RateSnapshot`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   RateRefresher ──publish(new)──►  RwLock<Option<Arc<RateSnapshot>>>   │
//! │                                          │                              │
//! │   calculation A ──current()──► Arc (v1) ─┤  A keeps v1 to the end      │
//! │   calculation B ──current()──► Arc (v2) ─┘  B starts after the swap    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock guards only the pointer swap. Calculations clone the `Arc` and
//! drop the guard before doing any work.

use customs_core::engine::RateSnapshot;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};

/// Shared handle to the current snapshot. Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    current: Arc<RwLock<Option<Arc<RateSnapshot>>>>,
}

impl SnapshotStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `snapshot`.
    pub fn with_snapshot(snapshot: RateSnapshot) -> Self {
        SnapshotStore {
            current: Arc::new(RwLock::new(Some(Arc::new(snapshot)))),
        }
    }

    /// Replaces the current snapshot, returning the one it replaced.
    pub async fn publish(&self, snapshot: RateSnapshot) -> Option<Arc<RateSnapshot>> {
        let snapshot = Arc::new(snapshot);
        let summary = snapshot.summary();

        let previous = {
            let mut slot = self.current.write().await;
            slot.replace(snapshot)
        };

        info!(
            snapshot_id = %summary.id,
            rate_table_version = summary.rate_table_version,
            schedule_version = summary.schedule_version,
            replaced = ?previous.as_ref().map(|p| p.id),
            "Rate snapshot published"
        );
        previous
    }

    /// The snapshot to run one calculation against.
    pub async fn current(&self) -> ServiceResult<Arc<RateSnapshot>> {
        self.try_current().await.ok_or(ServiceError::NoSnapshot)
    }

    pub async fn try_current(&self) -> Option<Arc<RateSnapshot>> {
        self.current.read().await.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.current.read().await.is_some()
    }
}
