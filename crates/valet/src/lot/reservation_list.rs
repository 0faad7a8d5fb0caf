//! Active reservations in caller-visible order.

use crate::input_validation::Plate;
use crate::record::{RecordId, Reservation};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationList {
    entries: Vec<Reservation>,
}

impl ReservationList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Reservation] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reservation> {
        self.entries.iter()
    }

    pub fn push(&mut self, reservation: Reservation) {
        self.entries.push(reservation);
    }

    pub fn contains_plate(&self, plate: &Plate) -> bool {
        self.entries.iter().any(|r| r.plate.same_as(plate))
    }

    /// Remove the reservation with `id`, preserving the order of the rest.
    pub fn remove(&mut self, id: RecordId) -> Option<Reservation> {
        let pos = self.entries.iter().position(|r| r.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// Reservations whose plate contains `term` (ignoring case) or whose slot
    /// number is exactly `term`, in list order. A blank term matches nothing.
    pub fn search(&self, term: &str) -> Vec<Reservation> {
        let term = term.trim();
        if term.is_empty() || self.is_empty() {
            return Vec::new();
        }
        let needle = term.to_lowercase();
        self.entries
            .iter()
            .filter(|r| r.plate.contains_folded(&needle) || r.slot.to_string() == term)
            .cloned()
            .collect()
    }

    // `sort_by_key` is stable, so equal keys keep their relative order.

    pub fn sort_by_slot(&mut self) {
        self.entries.sort_by_key(|r| r.slot);
    }

    pub fn sort_by_time(&mut self) {
        self.entries.sort_by_key(|r| r.timestamp);
    }

    pub fn reverse(&mut self) {
        self.entries.reverse();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl From<Vec<Reservation>> for ReservationList {
    fn from(entries: Vec<Reservation>) -> Self {
        Self { entries }
    }
}
