//! Records held by the lot: reservations, pending requests, and slot occupants.

use std::fmt;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::input_validation::Plate;

/// Unique identifier for a reservation or pending request.
///
/// UUID v4 so ids stay unique across restarts without persisting a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(uuid::Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let uuid = uuid::Uuid::parse_str(s.trim())?;
        Ok(Self(uuid))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-based slot number. Zero is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotNumber(NonZeroUsize);

impl SlotNumber {
    pub fn new(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(Self)
    }

    /// Slot number for a 0-based table index.
    pub fn from_index(index: usize) -> Self {
        Self(NonZeroUsize::MIN.saturating_add(index))
    }

    /// 0-based table index for this slot.
    pub fn index(self) -> usize {
        self.0.get() - 1
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contents of an occupied slot-table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub plate: Plate,
    pub timestamp: DateTime<Utc>,
    pub id: RecordId,
}

/// An active reservation binding a plate to a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub plate: Plate,
    pub slot: SlotNumber,
    pub timestamp: DateTime<Utc>,
    pub id: RecordId,
}

impl Reservation {
    /// The slot-table cell that mirrors this reservation.
    pub fn occupant(&self) -> Occupant {
        Occupant {
            plate: self.plate.clone(),
            timestamp: self.timestamp,
            id: self.id,
        }
    }

    pub fn is_mirrored_by(&self, occupant: &Occupant) -> bool {
        self.id == occupant.id
            && self.timestamp == occupant.timestamp
            && self.plate == occupant.plate
    }
}

/// A request waiting for a slot to free up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub plate: Plate,
    pub timestamp: DateTime<Utc>,
    pub id: RecordId,
}
