use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

/// Background task that rewrites the WAL once `threshold` appends accumulate
/// (`limits::DEFAULT_COMPACT_THRESHOLD` unless the host tunes it).
/// Create+cancel churn collapses to one entry per booking, so a long-lived
/// engine's log stays proportional to its booking history, not its traffic.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!(appends, "compacted booking WAL"),
            Err(e) => tracing::warn!("WAL compaction failed: {e}"),
        }
    }
}
