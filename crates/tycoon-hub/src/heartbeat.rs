//! Periodic liveness sweep.
//!
//! Every `ping_interval` the registry drops connections that never answered
//! the previous ping and pings the rest, so a dead client is gone within
//! two intervals.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::registry::Registry;

/// Sweep `registry` every `period`, forever. The first sweep happens one
/// period after the call.
pub async fn run_heartbeat(registry: Arc<Registry>, period: Duration) {
    let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut interval = tokio::time::interval_at(first, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let sweep = registry.sweep().await;
        if sweep.pruned > 0 {
            info!(pruned = sweep.pruned, remaining = sweep.pinged, "Pruned dead connections");
        } else {
            debug!(pinged = sweep.pinged, "Heartbeat sweep");
        }
    }
}
