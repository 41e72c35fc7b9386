use chrono::NaiveDate;

use crate::model::*;

use super::Engine;

impl Engine {
    /// Slots of Active bookings for (therapist, date), display order. Latest
    /// committed state at call time — a read path, advisory for conflict
    /// prevention (the atomic insert is authoritative).
    pub async fn booked_slots_for_date(
        &self,
        therapist_id: TherapistId,
        date: NaiveDate,
    ) -> Vec<TimeSlot> {
        let key = DayKey { therapist_id, date };
        match self.get_day(&key) {
            Some(day) => day.read().await.booked_slots(),
            None => Vec::new(),
        }
    }

    /// Count of the user's Active bookings — the quota input.
    pub async fn user_booking_count(&self, user_id: &str) -> u32 {
        match self.get_user(user_id) {
            Some(user) => user.read().await.active,
            None => 0,
        }
    }

    /// All of a user's bookings, Active and Cancelled, createdAt ascending.
    /// Display path only; never consulted for conflict logic.
    pub async fn user_bookings(&self, user_id: &str) -> Vec<Booking> {
        let ids = match self.get_user(user_id) {
            Some(user) => user.read().await.booking_ids.clone(),
            None => return Vec::new(),
        };

        let mut bookings = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(key) = self.day_for_booking(&id)
                && let Some(day) = self.get_day(&key)
            {
                let guard = day.read().await;
                if let Some(b) = guard.find(id) {
                    bookings.push(b.clone());
                }
            }
        }
        bookings.sort_by_key(|b| b.created_at);
        bookings
    }

    /// Every booking for a therapist-day, any status.
    pub async fn bookings_for_therapist_and_date(
        &self,
        therapist_id: TherapistId,
        date: NaiveDate,
    ) -> Vec<Booking> {
        let key = DayKey { therapist_id, date };
        match self.get_day(&key) {
            Some(day) => day.read().await.bookings.clone(),
            None => Vec::new(),
        }
    }
}
