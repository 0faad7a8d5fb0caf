//! The three collections that make up a lot.
//!
//! - `SlotTable`: fixed-capacity occupancy vector, indexed by slot.
//! - `ReservationList`: active reservations in display order.
//! - `WaitQueue`: FIFO of requests that arrived while the lot was full.
//!
//! None of these enforce cross-collection invariants on their own; the
//! engine mutates them together.

mod reservation_list;
mod slot_table;
mod wait_queue;

pub use reservation_list::ReservationList;
pub use slot_table::SlotTable;
pub use wait_queue::WaitQueue;
