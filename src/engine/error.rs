use crate::limits::MAX_ACTIVE_BOOKINGS_PER_USER;
use crate::model::{BookingId, SlotKey, UserId};

/// Every expected outcome is a value — "rejected" is a common result here,
/// not an exceptional one. Only `StorageUnavailable` warrants a caller retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Requested date is in the past, on a weekend, or unparseable.
    InvalidDate(String),
    /// Requested time is not one of the catalog values.
    InvalidSlot(String),
    /// User already holds the maximum number of Active bookings.
    QuotaExceeded { user_id: UserId, active: u32 },
    /// SlotKey already held by an Active booking — whether pre-empted by the
    /// guard or detected at the atomic insert under a race.
    SlotConflict(SlotKey),
    UnknownBooking(BookingId),
    AlreadyCancelled(BookingId),
    LimitExceeded(&'static str),
    /// Transient infrastructure failure; safe to retry with backoff.
    StorageUnavailable(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidDate(date) => {
                write!(f, "date not bookable: {date}")
            }
            EngineError::InvalidSlot(label) => {
                write!(f, "not an available time slot: {label}")
            }
            EngineError::QuotaExceeded { user_id, active } => {
                write!(
                    f,
                    "user {user_id} holds {active} of {MAX_ACTIVE_BOOKINGS_PER_USER} active bookings"
                )
            }
            EngineError::SlotConflict(key) => write!(f, "slot already booked: {key}"),
            EngineError::UnknownBooking(id) => write!(f, "unknown booking: {id}"),
            EngineError::AlreadyCancelled(id) => write!(f, "booking already cancelled: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::StorageUnavailable(e) => write!(f, "storage unavailable: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
