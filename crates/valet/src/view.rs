//! Read-only views of the lot handed to presentation layers.

use serde::{Deserialize, Serialize};

use crate::record::{Occupant, PendingRequest, Reservation};

/// Headline numbers shown after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// Free slots: capacity minus active reservations.
    pub available: usize,
    pub reserved: usize,
    pub queued: usize,
}

/// Full copy of the lot state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotView {
    pub capacity: usize,
    pub counts: Counts,
    /// Active reservations in current list order.
    pub reservations: Vec<Reservation>,
    /// Waiting requests, earliest arrival first.
    pub queue: Vec<PendingRequest>,
    /// One entry per slot, `null` when empty.
    pub slots: Vec<Option<Occupant>>,
}
