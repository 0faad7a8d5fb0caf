//! AllocationEngine: slot assignment, reclamation, and queue promotion.
//!
//! The engine owns the slot table, the reservation list, and the wait queue,
//! and is the only thing that mutates them. Every public method moves the lot
//! from one consistent state to the next:
//! - an occupied slot-table cell exists exactly when a reservation names that slot
//! - no plate appears twice across reservations and queue (ignoring case)
//! - the queue is strictly first-in first-out
//!
//! A snapshot is handed to the persistence gateway after every successful
//! mutation. Save failures are logged and otherwise ignored.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::input_validation::{Plate, SlotChoice, ValidationError};
use crate::lot::{ReservationList, SlotTable, WaitQueue};
use crate::persistence::{PersistenceError, PersistenceGateway, Snapshot};
use crate::record::{Occupant, PendingRequest, RecordId, Reservation, SlotNumber};
use crate::view::{Counts, LotView};

/// Errors returned to callers. None of them leave a trace in the lot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("plate '{0}' is already parked or waiting")]
    Duplicate(Plate),
    #[error("slot {slot} does not exist (slots are numbered 1 to {capacity})")]
    InvalidSlot { slot: i64, capacity: usize },
    #[error("slot {0} is already occupied")]
    SlotOccupied(SlotNumber),
}

impl EngineError {
    /// Stable machine-readable name for transports.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Duplicate(_) => "duplicate",
            EngineError::InvalidSlot { .. } => "invalid_slot",
            EngineError::SlotOccupied(_) => "slot_occupied",
        }
    }
}

/// A violated lot invariant.
///
/// Live operations cannot produce these; they surface when a loaded snapshot
/// does not describe a consistent lot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyFault {
    #[error("slot table has {found} cells but the lot has {expected} slots")]
    CapacityMismatch { expected: usize, found: usize },
    #[error("reservation {id} names slot {slot}, which is outside the lot")]
    SlotOutOfRange { id: RecordId, slot: SlotNumber },
    #[error("slot {slot} does not mirror reservation {id}")]
    Unmirrored { id: RecordId, slot: SlotNumber },
    #[error("slot {0} is occupied but no reservation names it")]
    Orphaned(SlotNumber),
    #[error("plate '{0}' appears more than once")]
    DuplicatePlate(Plate),
    #[error("id {0} appears more than once")]
    DuplicateId(RecordId),
    #[error("{queued} requests are waiting while slot {free} is free")]
    QueuedWhileFree { queued: usize, free: SlotNumber },
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("failed to load snapshot: {0}")]
    Load(#[from] PersistenceError),
    #[error("snapshot is inconsistent: {0}")]
    Inconsistent(#[from] ConsistencyFault),
}

/// Result of a successful insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsertOutcome {
    Reserved { reservation: Reservation },
    /// Lot was full; `position` is 1-based.
    Queued {
        request: PendingRequest,
        position: usize,
    },
}

/// Result of a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No reservation had that id. Nothing changed.
    NotFound,
    /// Slot freed and the queue was empty.
    Freed { removed: Reservation },
    /// Slot handed straight to the head of the queue.
    Promoted {
        removed: Reservation,
        promoted: Reservation,
    },
}

impl DeleteOutcome {
    pub fn removed(&self) -> Option<&Reservation> {
        match self {
            DeleteOutcome::NotFound => None,
            DeleteOutcome::Freed { removed } | DeleteOutcome::Promoted { removed, .. } => {
                Some(removed)
            }
        }
    }

    pub fn promoted(&self) -> Option<&Reservation> {
        match self {
            DeleteOutcome::Promoted { promoted, .. } => Some(promoted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Slot,
    Time,
}

pub struct AllocationEngine {
    slots: SlotTable,
    reservations: ReservationList,
    queue: WaitQueue,
    store: Box<dyn PersistenceGateway>,
    clock: Arc<dyn Clock>,
}

impl AllocationEngine {
    /// Open a lot of `capacity` slots, restoring whatever `store` holds.
    ///
    /// This is the only constructor, so the one load always happens before any
    /// other operation. Absent snapshot fields leave their collection empty; a
    /// snapshot that fails the invariant check is rejected.
    pub fn open(
        capacity: NonZeroUsize,
        store: Box<dyn PersistenceGateway>,
    ) -> Result<Self, OpenError> {
        let snapshot = store.load()?;
        let mut engine = Self {
            slots: SlotTable::new(capacity),
            reservations: ReservationList::default(),
            queue: WaitQueue::default(),
            store,
            clock: Arc::new(SystemClock),
        };
        engine.restore(snapshot, capacity)?;
        Ok(engine)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn restore(
        &mut self,
        snapshot: Snapshot,
        capacity: NonZeroUsize,
    ) -> Result<(), ConsistencyFault> {
        if snapshot.is_empty() {
            return Ok(());
        }
        if let Some(cells) = snapshot.slots {
            if cells.len() != capacity.get() {
                return Err(ConsistencyFault::CapacityMismatch {
                    expected: capacity.get(),
                    found: cells.len(),
                });
            }
            self.slots = SlotTable::from_cells(cells);
        }
        if let Some(reservations) = snapshot.reservations {
            self.reservations = reservations.into();
        }
        if let Some(queue) = snapshot.queue {
            self.queue = queue.into();
        }
        self.check_invariants()?;

        let counts = self.counts();
        tracing::info!(
            reserved = counts.reserved,
            queued = counts.queued,
            "Restored lot snapshot"
        );
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn counts(&self) -> Counts {
        let reserved = self.reservations.len();
        Counts {
            available: self.capacity().saturating_sub(reserved),
            reserved,
            queued: self.queue.len(),
        }
    }

    pub fn reservations(&self) -> &[Reservation] {
        self.reservations.as_slice()
    }

    pub fn queue(&self) -> Vec<PendingRequest> {
        self.queue.to_vec()
    }

    pub fn slots(&self) -> &[Option<Occupant>] {
        self.slots.cells()
    }

    pub fn view(&self) -> LotView {
        LotView {
            capacity: self.capacity(),
            counts: self.counts(),
            reservations: self.reservations.as_slice().to_vec(),
            queue: self.queue.to_vec(),
            slots: self.slots.cells().to_vec(),
        }
    }

    /// Parse raw caller input and insert.
    ///
    /// `slot` is `"auto"` (or blank) for the lowest free slot, or a 1-based
    /// slot number.
    pub fn insert(&mut self, plate: &str, slot: &str) -> Result<InsertOutcome, EngineError> {
        let plate = Plate::parse(plate)?;
        let choice = slot.parse::<SlotChoice>()?;
        self.reserve(plate, choice)
    }

    /// Reserve a slot for `plate`, or queue it if the lot is full.
    ///
    /// A full lot queues the request whatever `choice` says.
    pub fn reserve(
        &mut self,
        plate: Plate,
        choice: SlotChoice,
    ) -> Result<InsertOutcome, EngineError> {
        if self.reservations.contains_plate(&plate) || self.queue.contains_plate(&plate) {
            tracing::debug!(%plate, "Rejected duplicate plate");
            return Err(EngineError::Duplicate(plate));
        }

        // Fullness comes from the same scan that finds the free cell, so
        // "not full but no free cell" cannot happen.
        let Some(first_free) = self.slots.first_free() else {
            let request = PendingRequest {
                plate,
                timestamp: self.clock.now(),
                id: RecordId::new(),
            };
            let position = self.queue.enqueue(request.clone());
            tracing::info!(plate = %request.plate, id = %request.id, position, "Lot full, request queued");
            self.persist();
            return Ok(InsertOutcome::Queued { request, position });
        };

        let slot = match choice {
            SlotChoice::Auto => first_free,
            SlotChoice::Explicit(n) => self.resolve_explicit(n)?,
        };

        let reservation = self.place(plate, slot);
        tracing::info!(plate = %reservation.plate, %slot, id = %reservation.id, "Slot reserved");
        self.persist();
        Ok(InsertOutcome::Reserved { reservation })
    }

    fn resolve_explicit(&self, n: i64) -> Result<SlotNumber, EngineError> {
        let slot = usize::try_from(n)
            .ok()
            .and_then(SlotNumber::new)
            .filter(|s| self.slots.contains(*s))
            .ok_or(EngineError::InvalidSlot {
                slot: n,
                capacity: self.capacity(),
            })?;
        if !self.slots.is_free(slot) {
            return Err(EngineError::SlotOccupied(slot));
        }
        Ok(slot)
    }

    /// Mint a reservation at a known-free slot and record it in both
    /// the slot table and the list.
    fn place(&mut self, plate: Plate, slot: SlotNumber) -> Reservation {
        let reservation = Reservation {
            plate,
            slot,
            timestamp: self.clock.now(),
            id: RecordId::new(),
        };
        let previous = self.slots.occupy(slot, reservation.occupant());
        debug_assert!(previous.is_none(), "placed into occupied slot {slot}");
        self.reservations.push(reservation.clone());
        reservation
    }

    /// Remove a reservation and backfill its slot from the queue.
    ///
    /// Unknown ids are a no-op. When the queue is non-empty its head is given
    /// the vacated slot with a fresh id and timestamp in the same call, so the
    /// slot is never observably empty while someone is waiting.
    pub fn delete(&mut self, id: RecordId) -> DeleteOutcome {
        let Some(removed) = self.reservations.remove(id) else {
            tracing::debug!(%id, "Delete of unknown reservation ignored");
            return DeleteOutcome::NotFound;
        };
        self.slots.vacate(removed.slot);
        tracing::info!(plate = %removed.plate, slot = %removed.slot, %id, "Reservation removed");

        let outcome = match self.queue.dequeue() {
            Some(next) => {
                let promoted = self.place(next.plate, removed.slot);
                tracing::info!(
                    plate = %promoted.plate,
                    slot = %promoted.slot,
                    id = %promoted.id,
                    waited_as = %next.id,
                    "Promoted from queue"
                );
                DeleteOutcome::Promoted { removed, promoted }
            }
            None => DeleteOutcome::Freed { removed },
        };
        self.persist();
        outcome
    }

    /// Reservations matching `term`, in current list order.
    ///
    /// Matches a case-insensitive plate substring, or an exact slot number.
    /// A blank term returns nothing.
    pub fn search(&self, term: &str) -> Vec<Reservation> {
        let hits = self.reservations.search(term);
        tracing::debug!(term = term.trim(), hits = hits.len(), "Search");
        hits
    }

    pub fn sort(&mut self, key: SortKey) {
        match key {
            SortKey::Slot => self.reservations.sort_by_slot(),
            SortKey::Time => self.reservations.sort_by_time(),
        }
        tracing::debug!(?key, "Reservations sorted");
        self.persist();
    }

    pub fn sort_by_slot(&mut self) {
        self.sort(SortKey::Slot);
    }

    pub fn sort_by_time(&mut self) {
        self.sort(SortKey::Time);
    }

    pub fn reverse(&mut self) {
        self.reservations.reverse();
        tracing::debug!("Reservations reversed");
        self.persist();
    }

    /// Drop every reservation and pending request. Capacity is unchanged.
    pub fn reset(&mut self) {
        let counts = self.counts();
        self.slots.clear();
        self.reservations.clear();
        self.queue.clear();
        tracing::info!(
            dropped_reservations = counts.reserved,
            dropped_requests = counts.queued,
            "Lot reset"
        );
        self.persist();
    }

    /// Check the slot table, list, and queue against each other.
    pub fn check_invariants(&self) -> Result<(), ConsistencyFault> {
        for r in self.reservations.iter() {
            match self.slots.get(r.slot) {
                None => {
                    return Err(ConsistencyFault::SlotOutOfRange {
                        id: r.id,
                        slot: r.slot,
                    });
                }
                Some(Some(occupant)) if r.is_mirrored_by(occupant) => {}
                Some(_) => {
                    return Err(ConsistencyFault::Unmirrored {
                        id: r.id,
                        slot: r.slot,
                    });
                }
            }
        }

        for (index, cell) in self.slots.cells().iter().enumerate() {
            let slot = SlotNumber::from_index(index);
            if cell.is_some() && !self.reservations.iter().any(|r| r.slot == slot) {
                return Err(ConsistencyFault::Orphaned(slot));
            }
        }

        let mut plates = HashSet::new();
        let mut ids = HashSet::new();
        let records = self
            .reservations
            .iter()
            .map(|r| (&r.plate, r.id))
            .chain(self.queue.iter().map(|p| (&p.plate, p.id)));
        for (plate, id) in records {
            if !plates.insert(plate.folded()) {
                return Err(ConsistencyFault::DuplicatePlate(plate.clone()));
            }
            if !ids.insert(id) {
                return Err(ConsistencyFault::DuplicateId(id));
            }
        }

        if !self.queue.is_empty()
            && let Some(free) = self.slots.first_free()
        {
            return Err(ConsistencyFault::QueuedWhileFree {
                queued: self.queue.len(),
                free,
            });
        }

        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            slots: Some(self.slots.cells().to_vec()),
            reservations: Some(self.reservations.as_slice().to_vec()),
            queue: Some(self.queue.to_vec()),
        }
    }

    fn persist(&self) {
        debug_assert_eq!(self.check_invariants(), Ok(()));
        if let Err(e) = self.store.save(&self.snapshot()) {
            tracing::warn!(error = %e, "Failed to persist lot snapshot, continuing in memory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::persistence::MemoryStore;
    use chrono::{DateTime, Utc};

    struct FailingStore;

    impl PersistenceGateway for FailingStore {
        fn load(&self) -> Result<Snapshot, PersistenceError> {
            Ok(Snapshot::default())
        }

        fn save(&self, _snapshot: &Snapshot) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io {
                path: "/dev/full".into(),
                source: std::io::Error::other("disk full"),
            })
        }
    }

    fn open(capacity: usize) -> (AllocationEngine, MemoryStore) {
        let store = MemoryStore::new();
        let engine = AllocationEngine::open(
            NonZeroUsize::new(capacity).unwrap(),
            Box::new(store.clone()),
        )
        .unwrap()
        .with_clock(Arc::new(ManualClock::ticking()));
        (engine, store)
    }

    fn reserved(outcome: InsertOutcome) -> Reservation {
        match outcome {
            InsertOutcome::Reserved { reservation } => reservation,
            other => panic!("expected reservation, got {other:?}"),
        }
    }

    fn plates(engine: &AllocationEngine) -> Vec<&str> {
        engine.reservations().iter().map(|r| r.plate.as_str()).collect()
    }

    fn queued_plates(engine: &AllocationEngine) -> Vec<String> {
        engine
            .queue()
            .into_iter()
            .map(|p| p.plate.as_str().to_string())
            .collect()
    }

    fn slot_numbers(engine: &AllocationEngine) -> Vec<usize> {
        engine.reservations().iter().map(|r| r.slot.get()).collect()
    }

    #[test]
    fn two_slot_lot_walkthrough() {
        let (mut lot, _) = open(2);

        let p1 = reserved(lot.insert("P1", "auto").unwrap());
        assert_eq!(p1.slot.get(), 1);
        let p2 = reserved(lot.insert("P2", "auto").unwrap());
        assert_eq!(p2.slot.get(), 2);

        let InsertOutcome::Queued { request: p3, position } = lot.insert("P3", "auto").unwrap()
        else {
            panic!("lot should be full");
        };
        assert_eq!(position, 1);

        let outcome = lot.delete(p1.id);
        let promoted = outcome.promoted().expect("P3 should be promoted").clone();
        assert_eq!(promoted.plate.as_str(), "P3");
        assert_eq!(promoted.slot.get(), 1);
        assert_ne!(promoted.id, p3.id);
        assert_ne!(promoted.id, p1.id);
        assert!(promoted.timestamp > p3.timestamp);

        assert!(lot.queue().is_empty());
        assert_eq!(plates(&lot), ["P2", "P3"]);
        assert_eq!(slot_numbers(&lot), [2, 1]);
        assert_eq!(
            lot.slots()[0].as_ref().map(|o| o.id),
            Some(promoted.id)
        );

        let by_slot = lot.search("1");
        assert_eq!(by_slot.len(), 1);
        assert_eq!(by_slot[0].slot.get(), 1);

        let by_plate: Vec<_> = lot.search("p").into_iter().map(|r| r.plate).collect();
        assert_eq!(
            by_plate.iter().map(Plate::as_str).collect::<Vec<_>>(),
            ["P2", "P3"]
        );
    }

    #[test]
    fn duplicate_plate_is_rejected_without_change() {
        let (mut lot, store) = open(1);
        lot.insert("abc-1", "auto").unwrap();
        lot.insert("xyz-9", "auto").unwrap();
        let before = lot.view();
        let saves = store.save_count();

        let err = lot.insert(" ABC-1 ", "auto").unwrap_err();
        assert!(matches!(err, EngineError::Duplicate(_)));
        assert_eq!(err.kind(), "duplicate");

        // Queued plates count too.
        let err = lot.insert("XYZ-9", "auto").unwrap_err();
        assert!(matches!(err, EngineError::Duplicate(_)));

        assert_eq!(lot.view(), before);
        assert_eq!(store.save_count(), saves);
    }

    #[test]
    fn blank_plate_is_a_validation_error() {
        let (mut lot, store) = open(2);
        let err = lot.insert("   ", "auto").unwrap_err();
        assert_eq!(err, EngineError::Validation(ValidationError::EmptyPlate));
        assert_eq!(lot.counts().reserved, 0);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn long_plate_is_reserved() {
        let (mut lot, _) = open(2);
        let r = reserved(lot.insert("ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456", "auto").unwrap());
        assert_eq!(r.plate.as_str(), "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456");
        assert_eq!(r.slot.get(), 1);
    }

    #[test]
    fn explicit_slot_is_honoured() {
        let (mut lot, _) = open(3);
        let r = reserved(lot.insert("A", "3").unwrap());
        assert_eq!(r.slot.get(), 3);
        assert!(lot.slots()[2].is_some());

        // Auto still picks the lowest free slot.
        let r = reserved(lot.insert("B", "auto").unwrap());
        assert_eq!(r.slot.get(), 1);
    }

    #[test]
    fn explicit_slot_out_of_range_is_rejected() {
        let (mut lot, _) = open(2);
        for raw in ["0", "3", "-1"] {
            let err = lot.insert("A", raw).unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidSlot { capacity: 2, .. }),
                "{raw}: {err:?}"
            );
        }
        let err = lot.insert("A", "two").unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(lot.counts().reserved, 0);
    }

    #[test]
    fn explicit_slot_already_taken_is_rejected() {
        let (mut lot, _) = open(2);
        lot.insert("A", "2").unwrap();
        let before = lot.view();

        let err = lot.insert("B", "2").unwrap_err();
        assert_eq!(err, EngineError::SlotOccupied(SlotNumber::new(2).unwrap()));
        assert_eq!(lot.view(), before);
    }

    #[test]
    fn full_lot_queues_even_with_explicit_slot() {
        let (mut lot, _) = open(1);
        lot.insert("A", "auto").unwrap();
        let outcome = lot.insert("B", "99").unwrap();
        assert!(matches!(outcome, InsertOutcome::Queued { position: 1, .. }));
        assert_eq!(lot.counts().queued, 1);
        assert_eq!(lot.counts().reserved, 1);
    }

    #[test]
    fn delete_unknown_id_is_noop() {
        let (mut lot, store) = open(2);
        lot.insert("A", "auto").unwrap();
        let before = lot.view();
        let saves = store.save_count();

        assert_eq!(lot.delete(RecordId::new()), DeleteOutcome::NotFound);
        assert_eq!(lot.view(), before);
        assert_eq!(store.save_count(), saves);
    }

    #[test]
    fn delete_is_idempotent() {
        let (mut lot, _) = open(2);
        let a = reserved(lot.insert("A", "auto").unwrap());

        let first = lot.delete(a.id);
        assert_eq!(first.removed().map(|r| r.id), Some(a.id));
        assert!(first.promoted().is_none());
        assert_eq!(lot.delete(a.id), DeleteOutcome::NotFound);
        assert!(lot.slots().iter().all(Option::is_none));
    }

    #[test]
    fn promotion_is_fifo() {
        let (mut lot, _) = open(1);
        let x = reserved(lot.insert("X", "auto").unwrap());
        for plate in ["A", "B", "C"] {
            lot.insert(plate, "auto").unwrap();
        }
        assert_eq!(queued_plates(&lot), ["A", "B", "C"]);

        let outcome = lot.delete(x.id);
        assert_eq!(outcome.promoted().unwrap().plate.as_str(), "A");
        assert_eq!(queued_plates(&lot), ["B", "C"]);

        let a = lot.reservations()[0].id;
        lot.delete(a);
        assert_eq!(plates(&lot), ["B"]);
        assert_eq!(queued_plates(&lot), ["C"]);
    }

    #[test]
    fn promotion_reuses_vacated_slot() {
        let (mut lot, _) = open(3);
        lot.insert("A", "auto").unwrap();
        let b = reserved(lot.insert("B", "auto").unwrap());
        lot.insert("C", "auto").unwrap();
        lot.insert("D", "auto").unwrap();

        let promoted = lot.delete(b.id).promoted().unwrap().clone();
        assert_eq!(promoted.slot, b.slot);
        assert_eq!(lot.check_invariants(), Ok(()));
    }

    #[test]
    fn sort_by_slot_is_ordered_and_idempotent() {
        let (mut lot, _) = open(4);
        lot.insert("A", "3").unwrap();
        lot.insert("B", "1").unwrap();
        lot.insert("C", "4").unwrap();
        lot.insert("D", "2").unwrap();

        lot.sort_by_slot();
        assert_eq!(slot_numbers(&lot), [1, 2, 3, 4]);
        let once = lot.reservations().to_vec();
        lot.sort_by_slot();
        assert_eq!(lot.reservations(), once.as_slice());
    }

    #[test]
    fn sort_by_time_restores_arrival_order() {
        let (mut lot, _) = open(3);
        lot.insert("A", "auto").unwrap();
        lot.insert("B", "3").unwrap();
        lot.insert("C", "2").unwrap();

        lot.sort_by_slot();
        assert_eq!(plates(&lot), ["A", "C", "B"]);
        lot.sort_by_time();
        assert_eq!(plates(&lot), ["A", "B", "C"]);
    }

    #[test]
    fn sort_by_time_keeps_ties_in_place() {
        let store = MemoryStore::new();
        let mut lot = AllocationEngine::open(NonZeroUsize::new(3).unwrap(), Box::new(store))
            .unwrap()
            .with_clock(Arc::new(ManualClock::frozen(DateTime::<Utc>::UNIX_EPOCH)));
        lot.insert("A", "auto").unwrap();
        lot.insert("B", "auto").unwrap();
        lot.insert("C", "auto").unwrap();
        lot.reverse();

        lot.sort_by_time();
        assert_eq!(plates(&lot), ["C", "B", "A"]);
    }

    #[test]
    fn reverse_twice_restores_order() {
        let (mut lot, _) = open(3);
        for plate in ["A", "B", "C"] {
            lot.insert(plate, "auto").unwrap();
        }
        let original = lot.reservations().to_vec();

        lot.reverse();
        assert_eq!(plates(&lot), ["C", "B", "A"]);
        lot.reverse();
        assert_eq!(lot.reservations(), original.as_slice());
    }

    #[test]
    fn ordering_leaves_slots_and_queue_alone() {
        let (mut lot, _) = open(2);
        lot.insert("A", "2").unwrap();
        lot.insert("B", "1").unwrap();
        lot.insert("C", "auto").unwrap();
        let slots = lot.slots().to_vec();
        let queue = lot.queue();

        lot.sort(SortKey::Slot);
        lot.sort(SortKey::Time);
        lot.reverse();

        assert_eq!(lot.slots(), slots.as_slice());
        assert_eq!(lot.queue(), queue);
    }

    #[test]
    fn counts_track_collections() {
        let (mut lot, _) = open(2);
        assert_eq!(
            lot.counts(),
            Counts {
                available: 2,
                reserved: 0,
                queued: 0
            }
        );
        lot.insert("A", "auto").unwrap();
        lot.insert("B", "auto").unwrap();
        lot.insert("C", "auto").unwrap();
        assert_eq!(
            lot.counts(),
            Counts {
                available: 0,
                reserved: 2,
                queued: 1
            }
        );
    }

    #[test]
    fn reset_empties_everything() {
        let (mut lot, store) = open(1);
        lot.insert("A", "auto").unwrap();
        lot.insert("B", "auto").unwrap();

        lot.reset();
        assert_eq!(lot.capacity(), 1);
        assert_eq!(lot.counts().reserved, 0);
        assert_eq!(lot.counts().queued, 0);
        assert!(lot.slots().iter().all(Option::is_none));
        assert_eq!(store.snapshot().queue, Some(vec![]));

        // Plates are free to use again.
        assert!(lot.insert("a", "auto").is_ok());
    }

    #[test]
    fn every_mutation_is_persisted() {
        let (mut lot, store) = open(1);
        let a = reserved(lot.insert("A", "auto").unwrap());
        assert_eq!(store.save_count(), 1);
        lot.insert("B", "auto").unwrap();
        assert_eq!(store.save_count(), 2);
        lot.delete(a.id);
        assert_eq!(store.save_count(), 3);
        lot.sort_by_slot();
        lot.sort_by_time();
        lot.reverse();
        assert_eq!(store.save_count(), 6);
        lot.search("B");
        assert_eq!(store.save_count(), 6);

        let saved = store.snapshot();
        assert_eq!(saved.reservations.as_deref(), Some(lot.reservations()));
        assert_eq!(saved.slots.as_deref(), Some(lot.slots()));
    }

    #[test]
    fn save_failure_does_not_affect_result() {
        let mut lot =
            AllocationEngine::open(NonZeroUsize::new(1).unwrap(), Box::new(FailingStore)).unwrap();
        let a = reserved(lot.insert("A", "auto").unwrap());
        lot.insert("B", "auto").unwrap();
        let outcome = lot.delete(a.id);
        assert_eq!(outcome.promoted().unwrap().plate.as_str(), "B");
        assert_eq!(lot.counts().reserved, 1);
    }

    #[test]
    fn reopen_restores_saved_state() {
        let (mut lot, store) = open(2);
        lot.insert("A", "2").unwrap();
        lot.insert("B", "auto").unwrap();
        lot.insert("C", "auto").unwrap();
        lot.reverse();
        let before = lot.view();
        drop(lot);

        let reopened =
            AllocationEngine::open(NonZeroUsize::new(2).unwrap(), Box::new(store)).unwrap();
        assert_eq!(reopened.view(), before);
    }

    #[test]
    fn partial_snapshot_fills_defaults() {
        let r = reservation_at("P", 1);
        let store = MemoryStore::with_snapshot(Snapshot {
            slots: Some(vec![Some(r.occupant()), None]),
            reservations: Some(vec![r.clone()]),
            queue: None,
        });
        let lot = AllocationEngine::open(NonZeroUsize::new(2).unwrap(), Box::new(store)).unwrap();
        assert_eq!(lot.reservations(), [r]);
        assert!(lot.queue().is_empty());
        assert_eq!(lot.counts().available, 1);
    }

    #[test]
    fn restore_rejects_queue_beside_free_slot() {
        let snapshot = Snapshot {
            queue: Some(vec![PendingRequest {
                plate: Plate::parse("Q").unwrap(),
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                id: RecordId::new(),
            }]),
            ..Snapshot::default()
        };
        assert_eq!(
            fault(open_with(2, snapshot)),
            ConsistencyFault::QueuedWhileFree {
                queued: 1,
                free: SlotNumber::new(1).unwrap(),
            }
        );
    }

    fn open_with(capacity: usize, snapshot: Snapshot) -> Result<AllocationEngine, OpenError> {
        AllocationEngine::open(
            NonZeroUsize::new(capacity).unwrap(),
            Box::new(MemoryStore::with_snapshot(snapshot)),
        )
    }

    fn fault(result: Result<AllocationEngine, OpenError>) -> ConsistencyFault {
        match result {
            Err(OpenError::Inconsistent(fault)) => fault,
            Err(other) => panic!("expected inconsistency, got {other}"),
            Ok(_) => panic!("expected inconsistency, snapshot was accepted"),
        }
    }

    fn reservation_at(plate: &str, slot: usize) -> Reservation {
        Reservation {
            plate: Plate::parse(plate).unwrap(),
            slot: SlotNumber::new(slot).unwrap(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            id: RecordId::new(),
        }
    }

    #[test]
    fn restore_rejects_capacity_mismatch() {
        let snapshot = Snapshot {
            slots: Some(vec![None; 3]),
            ..Snapshot::default()
        };
        assert_eq!(
            fault(open_with(2, snapshot)),
            ConsistencyFault::CapacityMismatch {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn restore_rejects_reservation_without_cell() {
        let r = reservation_at("A", 1);
        let snapshot = Snapshot {
            slots: Some(vec![None, None]),
            reservations: Some(vec![r.clone()]),
            queue: None,
        };
        assert!(matches!(
            fault(open_with(2, snapshot)),
            ConsistencyFault::Unmirrored { id, .. } if id == r.id
        ));
    }

    #[test]
    fn restore_rejects_reservation_outside_lot() {
        let snapshot = Snapshot {
            slots: Some(vec![None]),
            reservations: Some(vec![reservation_at("A", 5)]),
            queue: None,
        };
        assert!(matches!(
            fault(open_with(1, snapshot)),
            ConsistencyFault::SlotOutOfRange { .. }
        ));
    }

    #[test]
    fn restore_rejects_orphaned_cell() {
        let occupant = Occupant {
            plate: Plate::parse("ghost").unwrap(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            id: RecordId::new(),
        };
        let snapshot = Snapshot {
            slots: Some(vec![None, Some(occupant)]),
            reservations: Some(vec![]),
            queue: None,
        };
        assert_eq!(
            fault(open_with(2, snapshot)),
            ConsistencyFault::Orphaned(SlotNumber::new(2).unwrap())
        );
    }

    #[test]
    fn restore_rejects_plate_both_parked_and_waiting() {
        let r = reservation_at("Dup", 1);
        let snapshot = Snapshot {
            slots: Some(vec![Some(r.occupant())]),
            reservations: Some(vec![r]),
            queue: Some(vec![PendingRequest {
                plate: Plate::parse("DUP").unwrap(),
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                id: RecordId::new(),
            }]),
        };
        assert!(matches!(
            fault(open_with(1, snapshot)),
            ConsistencyFault::DuplicatePlate(_)
        ));
    }

    #[test]
    fn load_failure_is_reported() {
        struct BrokenStore;
        impl PersistenceGateway for BrokenStore {
            fn load(&self) -> Result<Snapshot, PersistenceError> {
                Err(PersistenceError::Io {
                    path: "lot.json".into(),
                    source: std::io::Error::other("unreadable"),
                })
            }
            fn save(&self, _: &Snapshot) -> Result<(), PersistenceError> {
                Ok(())
            }
        }

        let result = AllocationEngine::open(NonZeroUsize::new(1).unwrap(), Box::new(BrokenStore));
        assert!(matches!(result, Err(OpenError::Load(_))));
    }

    #[test]
    fn insert_outcome_serializes_with_status_tag() {
        let (mut lot, _) = open(1);
        let reserved = serde_json::to_value(lot.insert("A", "auto").unwrap()).unwrap();
        assert_eq!(reserved["status"], "reserved");
        assert_eq!(reserved["reservation"]["slot"], 1);

        let queued = serde_json::to_value(lot.insert("B", "auto").unwrap()).unwrap();
        assert_eq!(queued["status"], "queued");
        assert_eq!(queued["position"], 1);
        assert_eq!(queued["request"]["plate"], "B");
    }
}
