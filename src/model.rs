use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only instant type.
pub type Ms = i64;

/// Opaque verified identifier supplied by the identity collaborator.
pub type UserId = String;

pub type TherapistId = u32;

pub type BookingId = Ulid;

/// A time-of-day value on the 24-hour clock, drawn from the fixed catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeSlot {
    pub hour: u8,
    pub minute: u8,
}

impl TimeSlot {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    /// Parse a strict `HH:MM` label. Anything else is `None`.
    pub fn parse(label: &str) -> Option<Self> {
        let bytes = label.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return None;
        }
        if !bytes[0].is_ascii_digit()
            || !bytes[1].is_ascii_digit()
            || !bytes[3].is_ascii_digit()
            || !bytes[4].is_ascii_digit()
        {
            return None;
        }
        let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
        let minute = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Composite key identifying a single bookable appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub therapist_id: TherapistId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.therapist_id, self.date, self.slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Active,
    Cancelled,
}

/// A confirmed session reservation. Created only through a successful
/// facade call; the only permitted mutation afterwards is Active → Cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub user_email: String,
    pub therapist_id: TherapistId,
    pub therapist_name: String,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    /// Recorded verbatim; never validated against the roster.
    pub session_medium: String,
    pub status: BookingStatus,
    pub created_at: Ms,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            therapist_id: self.therapist_id,
            date: self.date,
            slot: self.slot,
        }
    }
}

/// Key of one therapist calendar day — the unit of slot-conflict arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayKey {
    pub therapist_id: TherapistId,
    pub date: NaiveDate,
}

/// All bookings for one therapist-day, creation order. Writes to a day go
/// through its write lock, so at most one Active booking can ever exist per
/// slot here.
#[derive(Debug, Clone)]
pub struct DayState {
    pub key: DayKey,
    pub bookings: Vec<Booking>,
}

impl DayState {
    pub fn new(key: DayKey) -> Self {
        Self {
            key,
            bookings: Vec::new(),
        }
    }

    /// The Active booking holding `slot`, if any.
    pub fn active_for_slot(&self, slot: TimeSlot) -> Option<&Booking> {
        self.bookings
            .iter()
            .find(|b| b.slot == slot && b.is_active())
    }

    /// Slots of Active bookings, chronological (display) order.
    pub fn booked_slots(&self) -> Vec<TimeSlot> {
        let mut slots: Vec<TimeSlot> = self
            .bookings
            .iter()
            .filter(|b| b.is_active())
            .map(|b| b.slot)
            .collect();
        slots.sort();
        slots
    }

    pub fn find(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn find_mut(&mut self, id: BookingId) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }
}

/// Per-user booking index. `active` is the quota input and is kept in
/// lockstep with status transitions under the user's write lock.
#[derive(Debug, Clone, Default)]
pub struct UserState {
    /// All booking ids ever created for this user, creation order.
    pub booking_ids: Vec<BookingId>,
    /// Count of Active bookings.
    pub active: u32,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Carries the full record so compaction can inline the current status.
    BookingCreated { record: Booking },
    BookingCancelled { id: BookingId },
}
