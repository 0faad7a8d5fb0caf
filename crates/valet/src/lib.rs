//! valet: slot allocation engine for a fixed-capacity parking lot.

mod health;
mod version;

pub mod clock;
pub mod config;
pub mod engine;
pub mod input_validation;
pub mod lot;
pub mod persistence;
pub mod record;
pub mod service;
pub mod transport;
pub mod view;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LotConfig};
pub use engine::{
    AllocationEngine, ConsistencyFault, DeleteOutcome, EngineError, InsertOutcome, OpenError,
    SortKey,
};
pub use health::Health;
pub use input_validation::{Plate, SlotChoice, ValidationError};
pub use persistence::{JsonFileStore, MemoryStore, PersistenceError, PersistenceGateway, Snapshot};
pub use record::{Occupant, PendingRequest, RecordId, Reservation, SlotNumber};
pub use service::{HealthSnapshot, LotService, Receipt};
pub use version::{VALET_VERSION, VersionInfo};
pub use view::{Counts, LotView};
