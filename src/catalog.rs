use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::TimeSlot;

/// The fixed catalog labels, display order. First two are morning sessions,
/// last two afternoon.
pub const AVAILABLE_TIME_SLOTS: [&str; 4] = ["09:00", "10:00", "14:00", "15:00"];

/// The universe of bookable time-of-day slots plus the date-acceptance
/// predicate. An explicit immutable value passed into the engine, not a
/// module-level global. Pure functions over inputs, no failure modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCatalog {
    slots: Vec<TimeSlot>,
}

impl Default for SlotCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl SlotCatalog {
    /// The four-slot catalog every deployment currently runs.
    pub fn standard() -> Self {
        let slots = AVAILABLE_TIME_SLOTS
            .iter()
            .map(|label| TimeSlot::parse(label).expect("catalog labels are valid HH:MM"))
            .collect();
        Self { slots }
    }

    /// Ordered slots; order is display order and is stable.
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn contains(&self, slot: TimeSlot) -> bool {
        self.slots.contains(&slot)
    }

    /// First half of the catalog.
    pub fn morning(&self) -> &[TimeSlot] {
        &self.slots[..self.slots.len() / 2]
    }

    /// Second half of the catalog.
    pub fn afternoon(&self) -> &[TimeSlot] {
        &self.slots[self.slots.len() / 2..]
    }

    /// A date is bookable iff it is `today` or later and falls Monday–Friday.
    /// `today` is the caller's local date normalized to midnight; it is an
    /// argument so the predicate stays pure.
    pub fn is_bookable_date(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date >= today && !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
