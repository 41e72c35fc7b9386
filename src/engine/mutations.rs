use tokio::sync::oneshot;

use crate::limits::MAX_ACTIVE_BOOKINGS_PER_USER;
use crate::model::*;

use super::{Engine, EngineError, LogCommand, apply_cancelled, apply_created};

impl Engine {
    /// The conflict-safe conditional write, and the true enforcement point
    /// for slot uniqueness and the user quota. The guard's pre-check is
    /// advisory; two racing callers can both reach this method for the same
    /// SlotKey, and exactly one commits.
    ///
    /// Both invariants are re-validated under write locks, acquired in
    /// user → day order everywhere so lock acquisition cannot cycle. The
    /// WAL append happens before any in-memory mutation: a storage failure
    /// leaves nothing to roll back.
    pub async fn try_insert(&self, candidate: Booking) -> Result<BookingId, EngineError> {
        let id = candidate.id;
        let key = DayKey {
            therapist_id: candidate.therapist_id,
            date: candidate.date,
        };

        let user = self.user_state(&candidate.user_id);
        let mut user_guard = user.write_owned().await;
        if user_guard.active >= MAX_ACTIVE_BOOKINGS_PER_USER {
            return Err(EngineError::QuotaExceeded {
                user_id: candidate.user_id.clone(),
                active: user_guard.active,
            });
        }

        let day = self.day_state(key);
        let mut day_guard = day.write_owned().await;
        if day_guard.active_for_slot(candidate.slot).is_some() {
            return Err(EngineError::SlotConflict(candidate.slot_key()));
        }

        let event = Event::BookingCreated {
            record: candidate.clone(),
        };
        self.wal_append(&event).await?;
        apply_created(&mut day_guard, &mut user_guard, candidate, &self.booking_to_day);
        self.notify.send(key.therapist_id, &event);
        tracing::debug!(booking = %id, date = %key.date, "booking committed");
        Ok(id)
    }

    /// Active → Cancelled. Frees the SlotKey and the quota slot it held;
    /// the record stays in the user's history.
    pub async fn cancel_booking(&self, id: BookingId) -> Result<DayKey, EngineError> {
        let key = self
            .day_for_booking(&id)
            .ok_or(EngineError::UnknownBooking(id))?;
        let day = self.get_day(&key).ok_or(EngineError::UnknownBooking(id))?;

        // Peek the owner without a write lock, then take locks in the same
        // user → day order as try_insert.
        let user_id = {
            let guard = day.read().await;
            guard
                .find(id)
                .map(|b| b.user_id.clone())
                .ok_or(EngineError::UnknownBooking(id))?
        };
        let user = self.user_state(&user_id);
        let mut user_guard = user.write_owned().await;
        let mut day_guard = day.write_owned().await;
        match day_guard.find(id) {
            None => return Err(EngineError::UnknownBooking(id)),
            Some(b) if !b.is_active() => return Err(EngineError::AlreadyCancelled(id)),
            Some(_) => {}
        }

        let event = Event::BookingCancelled { id };
        self.wal_append(&event).await?;
        apply_cancelled(&mut day_guard, &mut user_guard, id);
        self.notify.send(key.therapist_id, &event);
        tracing::debug!(booking = %id, "booking cancelled");
        Ok(key)
    }

    /// Compact the WAL by rewriting it with one `BookingCreated` per record,
    /// current status inlined — create+cancel pairs collapse to a single
    /// entry.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // Clone the Arcs first so no DashMap shard lock is held across await.
        let days: Vec<_> = self.days.iter().map(|e| e.value().clone()).collect();

        let mut records = Vec::new();
        for day in days {
            let guard = day.read().await;
            records.extend(guard.bookings.iter().cloned());
        }
        // Replay rebuilds user histories in log order, so the rewritten log
        // must stay in creation order.
        records.sort_by_key(|r| (r.created_at, r.id));
        let events = records
            .into_iter()
            .map(|record| Event::BookingCreated { record })
            .collect();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(LogCommand::Compact { events, done: tx })
            .await
            .map_err(|_| EngineError::StorageUnavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::StorageUnavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::StorageUnavailable(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(LogCommand::PendingAppends { done: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
