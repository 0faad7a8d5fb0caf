//! Health status for the lot service.

use serde::Serialize;

use crate::view::Counts;

/// Whether a new request would be reserved immediately or queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    /// At least one slot is free
    #[default]
    Ready,
    /// Every slot is taken; new requests join the queue
    Full,
    /// Shutdown requested, draining in-flight requests
    ShuttingDown,
}

impl Health {
    pub fn from_counts(counts: &Counts) -> Self {
        if counts.available == 0 {
            Health::Full
        } else {
            Health::Ready
        }
    }
}
