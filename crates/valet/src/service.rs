//! LotService: transport-agnostic command interface over the engine.
//!
//! This service owns:
//! - The engine, behind a single mutex (one mutator at a time)
//! - Shutdown coordination
//! - Version info for health responses
//!
//! Every request takes the lock for its whole duration, so the slot table,
//! reservation list, and queue are never observed half-updated. Transports
//! (HTTP, CLI, tests) call these methods and render the results.

use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::engine::{AllocationEngine, DeleteOutcome, EngineError, InsertOutcome, SortKey};
use crate::health::Health;
use crate::record::{RecordId, Reservation};
use crate::version::VersionInfo;
use crate::view::{Counts, LotView};

/// Snapshot of service health for transports to query.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub state: Health,
    pub capacity: usize,
    pub counts: Counts,
    pub version: VersionInfo,
}

/// Outcome of a mutation plus the counts right after it, read under the same lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt<T> {
    #[serde(flatten)]
    pub outcome: T,
    pub counts: Counts,
}

pub struct LotService {
    engine: Mutex<AllocationEngine>,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    version: VersionInfo,
}

impl LotService {
    /// Wrap an already-opened engine.
    pub fn new(engine: AllocationEngine) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            engine: Mutex::new(engine),
            shutdown_tx,
            shutdown_rx,
            version: VersionInfo::new(),
        }
    }

    pub fn with_version(mut self, version: VersionInfo) -> Self {
        self.version = version;
        self
    }

    pub async fn health(&self) -> HealthSnapshot {
        let (capacity, counts) = {
            let engine = self.engine.lock().await;
            (engine.capacity(), engine.counts())
        };
        let state = if *self.shutdown_rx.borrow() {
            Health::ShuttingDown
        } else {
            Health::from_counts(&counts)
        };
        HealthSnapshot {
            state,
            capacity,
            counts,
            version: self.version.clone(),
        }
    }

    pub async fn view(&self) -> LotView {
        self.engine.lock().await.view()
    }

    pub async fn counts(&self) -> Counts {
        self.engine.lock().await.counts()
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        self.engine.lock().await.reservations().to_vec()
    }

    pub async fn request_insert(
        &self,
        plate: &str,
        slot_choice: &str,
    ) -> Result<Receipt<InsertOutcome>, EngineError> {
        let mut engine = self.engine.lock().await;
        let outcome = engine.insert(plate, slot_choice)?;
        Ok(Receipt {
            outcome,
            counts: engine.counts(),
        })
    }

    pub async fn request_delete(&self, id: RecordId) -> Receipt<DeleteOutcome> {
        let mut engine = self.engine.lock().await;
        let outcome = engine.delete(id);
        Receipt {
            outcome,
            counts: engine.counts(),
        }
    }

    pub async fn request_search(&self, term: &str) -> Vec<Reservation> {
        self.engine.lock().await.search(term)
    }

    /// Sort and return the resulting view under the same lock.
    pub async fn request_sort(&self, by: SortKey) -> LotView {
        let mut engine = self.engine.lock().await;
        engine.sort(by);
        engine.view()
    }

    pub async fn request_reverse(&self) -> LotView {
        let mut engine = self.engine.lock().await;
        engine.reverse();
        engine.view()
    }

    pub async fn request_reset(&self) -> LotView {
        let mut engine = self.engine.lock().await;
        engine.reset();
        engine.view()
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }
}
