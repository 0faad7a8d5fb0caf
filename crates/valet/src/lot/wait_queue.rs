//! FIFO of requests waiting for a free slot.

use std::collections::VecDeque;

use crate::input_validation::Plate;
use crate::record::PendingRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitQueue {
    entries: VecDeque<PendingRequest>,
}

impl WaitQueue {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, PendingRequest> {
        self.entries.iter()
    }

    /// Append to the back. Returns the 1-based position in line.
    pub fn enqueue(&mut self, request: PendingRequest) -> usize {
        self.entries.push_back(request);
        self.entries.len()
    }

    /// Remove the earliest arrival.
    pub fn dequeue(&mut self) -> Option<PendingRequest> {
        self.entries.pop_front()
    }

    pub fn contains_plate(&self, plate: &Plate) -> bool {
        self.entries.iter().any(|p| p.plate.same_as(plate))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_vec(&self) -> Vec<PendingRequest> {
        self.entries.iter().cloned().collect()
    }
}

impl From<Vec<PendingRequest>> for WaitQueue {
    fn from(entries: Vec<PendingRequest>) -> Self {
        Self {
            entries: entries.into(),
        }
    }
}
