use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Event, TherapistId};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for committed booking events, one channel per therapist.
/// The calendar collaborator subscribes to grey out slots as they are taken;
/// this is a UX aid, never a correctness dependency.
pub struct NotifyHub {
    channels: DashMap<TherapistId, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to booking events for a therapist. Creates the channel if needed.
    pub fn subscribe(&self, therapist_id: TherapistId) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(therapist_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, therapist_id: TherapistId, event: &Event) {
        if let Some(sender) = self.channels.get(&therapist_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel.
    pub fn remove(&self, therapist_id: TherapistId) {
        self.channels.remove(&therapist_id);
    }
}
