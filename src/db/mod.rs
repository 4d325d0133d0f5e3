//! Snapshot persistence.
//!
//! This module provides:
//! - The `SnapshotStore` seam the runtime saves through
//! - SQLite initialization and the sqlite-backed `Repository`
//! - `MemorySnapshotStore` for tests and database-less runs

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;

use crate::engine::SimError;
use crate::lifecycle::SessionSnapshot;
use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("stored snapshot is corrupt: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<PersistenceError> for SimError {
    fn from(err: PersistenceError) -> Self {
        SimError::PersistenceUnavailable(err.to_string())
    }
}

/// Where session snapshots live between runs.
///
/// Callers treat load failures as "start from defaults" and save failures
/// as best-effort.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load_snapshot(&self) -> Result<Option<SessionSnapshot>, PersistenceError>;

    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError>;
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<SessionSnapshot>>,
    fail_saves: bool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
            fail_saves: false,
        }
    }

    /// A store whose saves always fail, for exercising degraded mode.
    pub fn failing() -> Self {
        Self {
            slot: Mutex::new(None),
            fail_saves: true,
        }
    }

    pub fn current(&self) -> Option<SessionSnapshot> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load_snapshot(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        self.slot
            .lock()
            .map(|slot| slot.clone())
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))
    }

    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        if self.fail_saves {
            return Err(PersistenceError::Unavailable(
                "memory store configured to fail".to_string(),
            ));
        }
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }
}

/// Load a snapshot, degrading to `None` on any failure.
pub async fn load_or_default(store: &dyn SnapshotStore) -> Option<SessionSnapshot> {
    match store.load_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("Snapshot load failed, using defaults: {}", SimError::from(e));
            None
        }
    }
}

/// Save a snapshot, logging instead of propagating failures.
pub async fn save_best_effort(store: &dyn SnapshotStore, snapshot: &SessionSnapshot) -> bool {
    match store.save_snapshot(snapshot).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Snapshot save failed, continuing in memory: {}", SimError::from(e));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SeededRandom;
    use crate::lifecycle::{Session, SimParams};

    fn snapshot() -> SessionSnapshot {
        Session::new(SimParams::default(), Box::new(SeededRandom::from_seed(1))).snapshot()
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySnapshotStore::new();
        assert!(store.load_snapshot().await.unwrap().is_none());
        store.save_snapshot(&snapshot()).await.unwrap();
        assert_eq!(store.current(), Some(snapshot()));
    }

    #[tokio::test]
    async fn test_failing_store_degrades_quietly() {
        let store = MemorySnapshotStore::failing();
        assert!(!save_best_effort(&store, &snapshot()).await);
        assert!(load_or_default(&store).await.is_none());
    }

    #[test]
    fn test_persistence_error_maps_to_sim_error() {
        let err: SimError = PersistenceError::Corrupt("bad".to_string()).into();
        assert!(matches!(err, SimError::PersistenceUnavailable(_)));
    }
}
