//! Fixed-capacity slot occupancy table.

use std::num::NonZeroUsize;

use crate::record::{Occupant, SlotNumber};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
    cells: Vec<Option<Occupant>>,
}

impl SlotTable {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cells: vec![None; capacity.get()],
        }
    }

    /// Rebuild a table from persisted cells. The cell count is the capacity.
    pub fn from_cells(cells: Vec<Option<Occupant>>) -> Self {
        Self { cells }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[Option<Occupant>] {
        &self.cells
    }

    /// `None` when `slot` is past the end of the table.
    pub fn get(&self, slot: SlotNumber) -> Option<&Option<Occupant>> {
        self.cells.get(slot.index())
    }

    pub fn contains(&self, slot: SlotNumber) -> bool {
        slot.index() < self.cells.len()
    }

    pub fn is_free(&self, slot: SlotNumber) -> bool {
        matches!(self.get(slot), Some(None))
    }

    /// Lowest-numbered empty slot, or `None` when every cell is occupied.
    pub fn first_free(&self) -> Option<SlotNumber> {
        self.cells
            .iter()
            .position(Option::is_none)
            .map(SlotNumber::from_index)
    }

    /// Write an occupant into `slot`, returning whatever was there before.
    pub fn occupy(&mut self, slot: SlotNumber, occupant: Occupant) -> Option<Occupant> {
        self.cells.get_mut(slot.index())?.replace(occupant)
    }

    pub fn vacate(&mut self, slot: SlotNumber) -> Option<Occupant> {
        self.cells.get_mut(slot.index())?.take()
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = None);
    }
}
