pub mod catalog;
pub mod compactor;
pub mod engine;
pub mod facade;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod roster;
pub mod wal;

pub use catalog::{AVAILABLE_TIME_SLOTS, SlotCatalog};
pub use engine::{Engine, EngineError};
pub use facade::{BookingFacade, BookingResult, RejectReason, SessionRequest};
pub use model::{Booking, BookingId, BookingStatus, SlotKey, TherapistId, TimeSlot};
pub use roster::{Roster, Therapist};
