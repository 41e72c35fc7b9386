mod error;
mod guard;
mod mutations;
mod queries;

pub use error::EngineError;
pub use guard::{GuardFacts, validate};
pub(crate) use guard::now_ms;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedDayState = Arc<RwLock<DayState>>;
pub type SharedUserState = Arc<RwLock<UserState>>;

// ── Journal writer channel ───────────────────────────────

pub(super) enum LogCommand {
    Append {
        event: Event,
        done: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        done: oneshot::Sender<io::Result<()>>,
    },
    PendingAppends {
        done: oneshot::Sender<u64>,
    },
}

/// Background task owning the journal. Appends that queue up behind one
/// fsync are staged together and share the next commit, so concurrent
/// bookings pay for one disk sync between them, not one each.
async fn log_writer(mut wal: Wal, mut rx: mpsc::Receiver<LogCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, done) = match cmd {
            LogCommand::Append { event, done } => (event, done),
            control => {
                run_control(&mut wal, control);
                continue;
            }
        };

        // Stage the first append plus everything already queued behind it.
        // Each waiter keeps its own stage result: a frame that failed to
        // serialize fails only its caller, not the whole batch.
        let mut waiters = vec![(done, wal.stage(&event).err())];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                LogCommand::Append { event, done } => {
                    waiters.push((done, wal.stage(&event).err()));
                }
                control => {
                    deferred = Some(control);
                    break;
                }
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
            .record(waiters.len() as f64);
        let started = std::time::Instant::now();
        let committed = wal.commit();
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        for (done, staged) in waiters {
            let result = match (&committed, staged) {
                // Nothing reached the disk; that verdict overrides all
                (Err(e), _) => Err(io::Error::new(e.kind(), e.to_string())),
                (Ok(()), Some(stage_err)) => Err(stage_err),
                (Ok(()), None) => Ok(()),
            };
            let _ = done.send(result);
        }

        // A control command found mid-drain waits until its predecessors
        // are on disk
        if let Some(control) = deferred {
            run_control(&mut wal, control);
        }
    }
}

fn run_control(wal: &mut Wal, cmd: LogCommand) {
    match cmd {
        LogCommand::Compact { events, done } => {
            let _ = done.send(wal.compact(&events));
        }
        LogCommand::PendingAppends { done } => {
            let _ = done.send(wal.appends_since_compact());
        }
        LogCommand::Append { .. } => unreachable!("appends are batched by log_writer"),
    }
}

/// The reservation store: sole mutator of booking records, durable through
/// the WAL. `try_insert` (mutations) is the atomic check-and-insert that
/// enforces slot uniqueness and the user quota; everything else is read-only
/// with respect to booking state.
pub struct Engine {
    /// Per-(therapist, date) booking state — the unit of conflict arbitration.
    days: DashMap<DayKey, SharedDayState>,
    /// Per-user booking index — the quota authority.
    users: DashMap<UserId, SharedUserState>,
    /// Reverse lookup: booking id → day key.
    booking_to_day: DashMap<BookingId, DayKey>,
    wal_tx: mpsc::Sender<LogCommand>,
    pub notify: Arc<NotifyHub>,
}

/// Record a created booking into already-locked day and user state.
/// Caller holds both write locks.
fn apply_created(
    day: &mut DayState,
    user: &mut UserState,
    record: Booking,
    index: &DashMap<BookingId, DayKey>,
) {
    index.insert(record.id, day.key);
    user.booking_ids.push(record.id);
    if record.is_active() {
        user.active += 1;
    }
    day.bookings.push(record);
}

/// Flip an Active record to Cancelled under the same locks. The record stays
/// in history; only the slot and the quota slot it held are freed.
fn apply_cancelled(day: &mut DayState, user: &mut UserState, id: BookingId) {
    if let Some(b) = day.find_mut(id)
        && b.is_active()
    {
        b.status = BookingStatus::Cancelled;
        user.active = user.active.saturating_sub(1);
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(log_writer(wal, wal_rx));

        let engine = Self {
            days: DashMap::new(),
            users: DashMap::new(),
            booking_to_day: DashMap::new(),
            wal_tx,
            notify,
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in &events {
            match event {
                Event::BookingCreated { record } => {
                    let day = engine.day_state(DayKey {
                        therapist_id: record.therapist_id,
                        date: record.date,
                    });
                    let user = engine.user_state(&record.user_id);
                    let mut day_guard = day.try_write().expect("replay: uncontended write");
                    let mut user_guard = user.try_write().expect("replay: uncontended write");
                    apply_created(
                        &mut day_guard,
                        &mut user_guard,
                        record.clone(),
                        &engine.booking_to_day,
                    );
                }
                Event::BookingCancelled { id } => {
                    let Some(key) = engine.day_for_booking(id) else {
                        continue; // cancel for a record the log no longer carries
                    };
                    let Some(day) = engine.get_day(&key) else {
                        continue;
                    };
                    let mut day_guard = day.try_write().expect("replay: uncontended write");
                    let Some(user_id) = day_guard.find(*id).map(|b| b.user_id.clone()) else {
                        continue;
                    };
                    let user = engine.user_state(&user_id);
                    let mut user_guard = user.try_write().expect("replay: uncontended write");
                    apply_cancelled(&mut day_guard, &mut user_guard, *id);
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer. Any
    /// failure here is a transient storage fault; state has not been touched.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(LogCommand::Append {
                event: event.clone(),
                done: tx,
            })
            .await
            .map_err(|_| EngineError::StorageUnavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::StorageUnavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::StorageUnavailable(e.to_string()))
    }

    /// Get or lazily create the shared state for a therapist-day.
    pub(super) fn day_state(&self, key: DayKey) -> SharedDayState {
        self.days
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(DayState::new(key))))
            .value()
            .clone()
    }

    /// Read-only lookup; never creates an entry.
    pub(super) fn get_day(&self, key: &DayKey) -> Option<SharedDayState> {
        self.days.get(key).map(|e| e.value().clone())
    }

    pub(super) fn user_state(&self, user_id: &str) -> SharedUserState {
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(UserState::default())))
            .value()
            .clone()
    }

    pub(super) fn get_user(&self, user_id: &str) -> Option<SharedUserState> {
        self.users.get(user_id).map(|e| e.value().clone())
    }

    pub(super) fn day_for_booking(&self, id: &BookingId) -> Option<DayKey> {
        self.booking_to_day.get(id).map(|e| *e.value())
    }
}
