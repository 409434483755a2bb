//! Background tasks for the gateway.
//!
//! Includes:
//! - Reaping registry entries for long-terminated calls.

use crate::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Starts the call registry reaping task.
///
/// Runs indefinitely, periodically removing sessions that reached a
/// terminal status longer than `ttl_seconds` ago. The TTL tolerates status
/// webhooks that arrive after a media stream has already closed.
pub async fn start_reaping_task(state: Arc<AppState>, ttl_seconds: u64) {
    if ttl_seconds == 0 {
        tracing::warn!("registry reaping task disabled (ttl=0)");
        return;
    }

    // Check every 60 seconds or ttl/2, whichever is smaller (but min 1s).
    let interval_seconds = (ttl_seconds / 2).clamp(1, 60);
    let interval = Duration::from_secs(interval_seconds);
    let ttl = Duration::from_secs(ttl_seconds);

    tracing::info!(ttl_seconds, interval_seconds, "starting registry reaping task");

    loop {
        sleep(interval).await;

        let removed = state.registry.reap_terminal(ttl);
        if removed > 0 {
            tracing::info!(
                removed,
                remaining = state.registry.len(),
                "reaped terminated call sessions"
            );
        }
    }
}
