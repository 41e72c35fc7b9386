use std::net::SocketAddr;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings committed to the store.
pub const BOOKINGS_TOTAL: &str = "bookwell_bookings_total";

/// Counter: booking attempts rejected by the guard, before any write.
/// Labels: reason.
pub const GUARD_REJECTIONS_TOTAL: &str = "bookwell_guard_rejections_total";

/// Counter: conflicts detected at the atomic insert — the post-guard race path.
pub const BOOKING_CONFLICTS_TOTAL: &str = "bookwell_booking_conflicts_total";

/// Counter: bookings cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "bookwell_bookings_cancelled_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "bookwell_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "bookwell_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map an engine rejection to a short label for metrics.
pub fn reject_label(err: &EngineError) -> &'static str {
    match err {
        EngineError::InvalidDate(_) => "invalid_date",
        EngineError::InvalidSlot(_) => "invalid_slot",
        EngineError::QuotaExceeded { .. } => "quota_exceeded",
        EngineError::SlotConflict(_) => "slot_conflict",
        EngineError::UnknownBooking(_) => "unknown_booking",
        EngineError::AlreadyCancelled(_) => "already_cancelled",
        EngineError::LimitExceeded(_) => "limit_exceeded",
        EngineError::StorageUnavailable(_) => "storage_unavailable",
    }
}
