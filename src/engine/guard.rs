use crate::limits::MAX_ACTIVE_BOOKINGS_PER_USER;
use crate::model::{Ms, SlotKey, TimeSlot, UserId};

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as Ms
}

/// Already-fetched facts about a booking request. The guard does not fetch
/// or write; the facade controls when and in what order reads happen.
#[derive(Debug)]
pub struct GuardFacts<'a> {
    pub key: SlotKey,
    pub user_id: &'a str,
    /// `SlotCatalog::is_bookable_date` evaluated against the caller's today.
    pub date_ok: bool,
    /// Catalog membership of `key.slot`.
    pub in_catalog: bool,
    /// The user's Active booking count at read time.
    pub active_count: u32,
    /// Already-booked slots for (therapist, date) at read time.
    pub booked: &'a [TimeSlot],
}

/// Accept/reject decision, evaluated in fixed order so error messages are
/// deterministic: date, catalog, quota, conflict. First failing check wins.
///
/// This pre-check is a latency optimization and UX aid. Two callers can both
/// pass it for the same SlotKey; `Engine::try_insert` is the enforcement
/// point under concurrency.
pub fn validate(facts: &GuardFacts) -> Result<(), EngineError> {
    if !facts.date_ok {
        return Err(EngineError::InvalidDate(facts.key.date.to_string()));
    }
    if !facts.in_catalog {
        return Err(EngineError::InvalidSlot(facts.key.slot.to_string()));
    }
    if facts.active_count >= MAX_ACTIVE_BOOKINGS_PER_USER {
        return Err(EngineError::QuotaExceeded {
            user_id: UserId::from(facts.user_id),
            active: facts.active_count,
        });
    }
    if facts.booked.contains(&facts.key.slot) {
        return Err(EngineError::SlotConflict(facts.key));
    }
    Ok(())
}
