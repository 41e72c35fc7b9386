use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::catalog::SlotCatalog;
use crate::engine::{self, Engine, EngineError, GuardFacts, now_ms};
use crate::limits::*;
use crate::model::{Booking, BookingId, BookingStatus, SlotKey, TherapistId, TimeSlot};
use crate::observability;
use crate::roster::{Roster, Therapist};

/// A booking request as it arrives from the boundary: identity fields come
/// verified from the identity collaborator, date and time are still strings.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub user_id: String,
    pub user_email: String,
    pub therapist_id: TherapistId,
    pub therapist_name: String,
    /// ISO `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM`, expected to be one of `AVAILABLE_TIME_SLOTS`.
    pub time: String,
    pub session_medium: String,
}

/// Machine-readable outcome classification. `StorageUnavailable` is the only
/// value worth retrying; every other rejection is a final business answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidDate,
    InvalidSlot,
    QuotaExceeded,
    SlotConflict,
    UnknownBooking,
    AlreadyCancelled,
    InvalidInput,
    StorageUnavailable,
}

impl From<&EngineError> for RejectReason {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::InvalidDate(_) => RejectReason::InvalidDate,
            EngineError::InvalidSlot(_) => RejectReason::InvalidSlot,
            EngineError::QuotaExceeded { .. } => RejectReason::QuotaExceeded,
            EngineError::SlotConflict(_) => RejectReason::SlotConflict,
            EngineError::UnknownBooking(_) => RejectReason::UnknownBooking,
            EngineError::AlreadyCancelled(_) => RejectReason::AlreadyCancelled,
            EngineError::LimitExceeded(_) => RejectReason::InvalidInput,
            EngineError::StorageUnavailable(_) => RejectReason::StorageUnavailable,
        }
    }
}

/// Uniform result for every attempt. `message` is rendered verbatim by the
/// booking UI on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingResult {
    pub success: bool,
    pub message: String,
    pub booking_id: Option<BookingId>,
    pub reason: Option<RejectReason>,
}

impl BookingResult {
    fn booked(id: BookingId, message: String) -> Self {
        Self {
            success: true,
            message,
            booking_id: Some(id),
            reason: None,
        }
    }

    fn rejected(err: &EngineError) -> Self {
        Self {
            success: false,
            message: user_message(err),
            booking_id: None,
            reason: Some(RejectReason::from(err)),
        }
    }

    /// True for transient infrastructure failures the caller should retry
    /// with backoff — retrying a business rejection is pointless.
    pub fn is_transient(&self) -> bool {
        self.reason == Some(RejectReason::StorageUnavailable)
    }
}

/// What the booking UI shows. Both conflict sources — pre-empted by the
/// availability read or detected at the atomic insert under a race — get the
/// same message; the distinction is invisible to the caller by design.
fn user_message(err: &EngineError) -> String {
    match err {
        EngineError::InvalidDate(date) => {
            format!("{date} is not bookable: choose a weekday no earlier than today")
        }
        EngineError::InvalidSlot(label) => {
            format!("{label} is not an available session time")
        }
        EngineError::QuotaExceeded { active, .. } => format!(
            "booking limit reached: you hold {active} of {MAX_ACTIVE_BOOKINGS_PER_USER} \
             active sessions; cancel one to book another"
        ),
        EngineError::SlotConflict(_) => "slot taken".into(),
        EngineError::UnknownBooking(id) => format!("no booking found with id {id}"),
        EngineError::AlreadyCancelled(_) => "booking is already cancelled".into(),
        EngineError::LimitExceeded(msg) => format!("invalid request: {msg}"),
        EngineError::StorageUnavailable(_) => {
            "your booking could not be saved just now; please try again".into()
        }
    }
}

/// The single entry point other components call. Orchestrates
/// facts → guard → store and maps every outcome to a `BookingResult`.
pub struct BookingFacade {
    engine: Arc<Engine>,
    catalog: SlotCatalog,
    roster: Roster,
}

impl BookingFacade {
    pub fn new(engine: Arc<Engine>, catalog: SlotCatalog, roster: Roster) -> Self {
        Self {
            engine,
            catalog,
            roster,
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    /// Therapist reference data for display collaborators.
    pub fn therapists(&self) -> &[Therapist] {
        self.roster.therapists()
    }

    /// Book a session against the caller's local today.
    pub async fn book_session(&self, req: SessionRequest) -> BookingResult {
        self.book_session_on(req, Local::now().date_naive()).await
    }

    /// Deterministic variant with `today` injected; `book_session` delegates
    /// here, tests drive this directly.
    pub async fn book_session_on(&self, req: SessionRequest, today: NaiveDate) -> BookingResult {
        if let Err(e) = check_input(&req) {
            return self.guard_reject(e);
        }
        let Ok(date) = NaiveDate::parse_from_str(&req.date, "%Y-%m-%d") else {
            return self.guard_reject(EngineError::InvalidDate(req.date.clone()));
        };
        let Some(slot) = TimeSlot::parse(&req.time) else {
            return self.guard_reject(EngineError::InvalidSlot(req.time.clone()));
        };
        let key = SlotKey {
            therapist_id: req.therapist_id,
            date,
            slot,
        };

        // Fetch facts, then decide. No lock is held across the decision, so
        // this is inherently check-then-act; the store re-validates under its
        // own locks and stays authoritative.
        let booked = self
            .engine
            .booked_slots_for_date(req.therapist_id, date)
            .await;
        let active_count = self.engine.user_booking_count(&req.user_id).await;
        let facts = GuardFacts {
            key,
            user_id: &req.user_id,
            date_ok: self.catalog.is_bookable_date(date, today),
            in_catalog: self.catalog.contains(slot),
            active_count,
            booked: &booked,
        };
        if let Err(e) = engine::validate(&facts) {
            return self.guard_reject(e);
        }

        let candidate = Booking {
            id: BookingId::new(),
            user_id: req.user_id,
            user_email: req.user_email,
            therapist_id: req.therapist_id,
            therapist_name: req.therapist_name.clone(),
            date,
            slot,
            session_medium: req.session_medium,
            status: BookingStatus::Active,
            created_at: now_ms(),
        };

        match self.engine.try_insert(candidate).await {
            Ok(id) => {
                metrics::counter!(observability::BOOKINGS_TOTAL).increment(1);
                BookingResult::booked(
                    id,
                    format!(
                        "session booked with {} on {date} at {slot}",
                        req.therapist_name
                    ),
                )
            }
            Err(e) => {
                // The race-recovery path: the guard said yes but another
                // caller committed first, or the quota filled meanwhile.
                if matches!(e, EngineError::SlotConflict(_)) {
                    metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
                }
                tracing::debug!(error = %e, "insert rejected");
                BookingResult::rejected(&e)
            }
        }
    }

    fn guard_reject(&self, err: EngineError) -> BookingResult {
        metrics::counter!(
            observability::GUARD_REJECTIONS_TOTAL,
            "reason" => observability::reject_label(&err)
        )
        .increment(1);
        BookingResult::rejected(&err)
    }

    /// Cancel an Active booking: frees its slot and quota, keeps the record
    /// in history.
    pub async fn cancel_session(&self, id: BookingId) -> BookingResult {
        match self.engine.cancel_booking(id).await {
            Ok(_) => {
                metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
                BookingResult {
                    success: true,
                    message: "booking cancelled".into(),
                    booking_id: Some(id),
                    reason: None,
                }
            }
            Err(e) => BookingResult::rejected(&e),
        }
    }

    // ── Read-throughs for display collaborators ──────────

    pub async fn user_bookings(&self, user_id: &str) -> Vec<Booking> {
        self.engine.user_bookings(user_id).await
    }

    pub async fn user_booking_count(&self, user_id: &str) -> u32 {
        self.engine.user_booking_count(user_id).await
    }

    pub async fn booked_slots_for_date(
        &self,
        therapist_id: TherapistId,
        date: NaiveDate,
    ) -> Vec<TimeSlot> {
        self.engine.booked_slots_for_date(therapist_id, date).await
    }
}

fn check_input(req: &SessionRequest) -> Result<(), EngineError> {
    if req.user_id.is_empty() {
        return Err(EngineError::LimitExceeded("empty user id"));
    }
    if req.user_id.len() > MAX_USER_ID_LEN {
        return Err(EngineError::LimitExceeded("user id too long"));
    }
    if req.user_email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("email too long"));
    }
    if req.therapist_name.len() > MAX_THERAPIST_NAME_LEN {
        return Err(EngineError::LimitExceeded("therapist name too long"));
    }
    if req.session_medium.len() > MAX_MEDIUM_LEN {
        return Err(EngineError::LimitExceeded("session medium too long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyHub;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("bookwell_test_facade");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn test_facade(name: &str) -> BookingFacade {
        let engine = Arc::new(Engine::new(test_wal_path(name), Arc::new(NotifyHub::new())).unwrap());
        let roster = Roster::new(vec![
            Therapist {
                id: 1,
                name: "Dr. Ellis".into(),
                mediums: vec!["video".into(), "phone".into()],
            },
            Therapist {
                id: 2,
                name: "Dr. Okafor".into(),
                mediums: vec!["video".into(), "chat".into()],
            },
        ]);
        BookingFacade::new(engine, SlotCatalog::standard(), roster)
    }

    fn request(user: &str, therapist_id: TherapistId, date: &str, time: &str) -> SessionRequest {
        SessionRequest {
            user_id: user.into(),
            user_email: format!("{user}@example.com"),
            therapist_id,
            therapist_name: format!("Therapist {therapist_id}"),
            date: date.into(),
            time: time.into(),
            session_medium: "video".into(),
        }
    }

    /// 2025-03-10 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[tokio::test]
    async fn booking_scenario_two_users_one_morning() {
        let facade = test_facade("scenario.wal");
        let today = monday();

        let a = facade
            .book_session_on(request("userA", 1, "2025-03-10", "09:00"), today)
            .await;
        assert!(a.success);
        assert!(a.booking_id.is_some());

        let b = facade
            .book_session_on(request("userB", 1, "2025-03-10", "09:00"), today)
            .await;
        assert!(!b.success);
        assert_eq!(b.message, "slot taken");
        assert_eq!(b.reason, Some(RejectReason::SlotConflict));

        let b2 = facade
            .book_session_on(request("userB", 1, "2025-03-10", "10:00"), today)
            .await;
        assert!(b2.success);

        let labels: Vec<String> = facade
            .booked_slots_for_date(1, monday())
            .await
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(labels, vec!["09:00", "10:00"]);
    }

    #[tokio::test]
    async fn quota_scenario_sixth_attempt_rejected() {
        let facade = test_facade("quota_scenario.wal");
        let today = monday();

        // Five distinct slots across different dates and therapists
        let slots = [
            (1, "2025-03-10", "09:00"),
            (1, "2025-03-11", "10:00"),
            (2, "2025-03-12", "14:00"),
            (2, "2025-03-13", "15:00"),
            (1, "2025-03-14", "09:00"),
        ];
        for (i, (tid, date, time)) in slots.into_iter().enumerate() {
            let r = facade
                .book_session_on(request("userC", tid, date, time), today)
                .await;
            assert!(r.success, "booking {i} failed: {}", r.message);
            assert!(facade.user_booking_count("userC").await <= 5);
        }
        assert_eq!(facade.user_booking_count("userC").await, 5);

        let sixth = facade
            .book_session_on(request("userC", 2, "2025-03-10", "10:00"), today)
            .await;
        assert!(!sixth.success);
        assert_eq!(sixth.reason, Some(RejectReason::QuotaExceeded));
        assert!(sixth.message.contains("limit reached"));
        assert_eq!(facade.user_booking_count("userC").await, 5);
    }

    #[tokio::test]
    async fn precedence_invalid_date_reported_first() {
        let facade = test_facade("precedence.wal");
        let today = monday();

        // Fill the quota and take a slot
        for date in ["2025-03-10", "2025-03-11", "2025-03-12", "2025-03-13", "2025-03-14"] {
            assert!(
                facade
                    .book_session_on(request("userD", 1, date, "09:00"), today)
                    .await
                    .success
            );
        }

        // Invalid date (a Saturday) AND full quota AND conflicting slot
        let r = facade
            .book_session_on(request("userD", 1, "2025-03-15", "09:00"), today)
            .await;
        assert_eq!(r.reason, Some(RejectReason::InvalidDate));
    }

    #[tokio::test]
    async fn past_and_weekend_dates_rejected() {
        let facade = test_facade("dates.wal");
        let today = monday();

        let past = facade
            .book_session_on(request("u", 1, "2025-03-07", "09:00"), today)
            .await;
        assert_eq!(past.reason, Some(RejectReason::InvalidDate));

        let saturday = facade
            .book_session_on(request("u", 1, "2025-03-15", "09:00"), today)
            .await;
        assert_eq!(saturday.reason, Some(RejectReason::InvalidDate));

        let next_monday = facade
            .book_session_on(request("u", 1, "2025-03-17", "09:00"), today)
            .await;
        assert!(next_monday.success);
    }

    #[tokio::test]
    async fn unparseable_inputs_rejected() {
        let facade = test_facade("parse.wal");
        let today = monday();

        let bad_date = facade
            .book_session_on(request("u", 1, "10/03/2025", "09:00"), today)
            .await;
        assert_eq!(bad_date.reason, Some(RejectReason::InvalidDate));

        let bad_time = facade
            .book_session_on(request("u", 1, "2025-03-10", "9am"), today)
            .await;
        assert_eq!(bad_time.reason, Some(RejectReason::InvalidSlot));

        let off_catalog = facade
            .book_session_on(request("u", 1, "2025-03-10", "11:00"), today)
            .await;
        assert_eq!(off_catalog.reason, Some(RejectReason::InvalidSlot));
        assert!(off_catalog.message.contains("11:00"));
    }

    #[tokio::test]
    async fn oversized_input_rejected_before_store() {
        let facade = test_facade("input_limits.wal");
        let mut req = request("u", 1, "2025-03-10", "09:00");
        req.user_id = "x".repeat(MAX_USER_ID_LEN + 1);

        let r = facade.book_session_on(req, monday()).await;
        assert_eq!(r.reason, Some(RejectReason::InvalidInput));
        assert!(!r.success);
    }

    #[tokio::test]
    async fn medium_recorded_verbatim() {
        let facade = test_facade("medium.wal");
        let mut req = request("u", 1, "2025-03-10", "09:00");
        req.session_medium = "carrier-pigeon".into();

        assert!(facade.book_session_on(req, monday()).await.success);
        let bookings = facade.user_bookings("u").await;
        assert_eq!(bookings[0].session_medium, "carrier-pigeon");
    }

    #[tokio::test]
    async fn cancel_roundtrip() {
        let facade = test_facade("cancel.wal");
        let today = monday();

        let booked = facade
            .book_session_on(request("u", 1, "2025-03-10", "09:00"), today)
            .await;
        let id = booked.booking_id.unwrap();

        let cancelled = facade.cancel_session(id).await;
        assert!(cancelled.success);

        let again = facade.cancel_session(id).await;
        assert!(!again.success);
        assert_eq!(again.reason, Some(RejectReason::AlreadyCancelled));

        // Slot is free once more
        let rebook = facade
            .book_session_on(request("v", 1, "2025-03-10", "09:00"), today)
            .await;
        assert!(rebook.success, "{}", rebook.message);
    }

    #[tokio::test]
    async fn transient_results_are_distinguishable() {
        let storage = EngineError::StorageUnavailable("disk full".into());
        let transient = BookingResult::rejected(&storage);
        assert!(transient.is_transient());
        assert!(!transient.success);

        let business = EngineError::SlotConflict(SlotKey {
            therapist_id: 1,
            date: monday(),
            slot: TimeSlot::new(9, 0),
        });
        assert!(!BookingResult::rejected(&business).is_transient());
    }

    #[tokio::test]
    async fn roster_exposed_for_display() {
        let facade = test_facade("roster.wal");
        let names: Vec<&str> = facade.therapists().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Dr. Ellis", "Dr. Okafor"]);
    }
}
