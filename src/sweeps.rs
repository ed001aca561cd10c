//! Liveness supervision
//!
//! Two periodic sweeps run for the process lifetime. The heartbeat sweep
//! catches stations that lost connectivity without a clean TCP close; the
//! ghost sweep catches sessions whose station stopped charging but never
//! sent StopTransaction. Both funnel into the idempotent finalize path, so
//! their interleaving with protocol actions needs no further coordination.
//!
//! The tick bodies take `now` explicitly so tests can drive them with a
//! skewed clock instead of sleeping.

use crate::hub::Hub;
use crate::logging::ScopedLog;
use crate::session::FinalizeReason;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;

/// Launch both sweeps; called once from main
pub fn spawn(hub: Arc<Hub>) {
    let heartbeat_hub = hub.clone();
    tokio::spawn(async move {
        let period = Duration::from_secs(heartbeat_hub.config.liveness.heartbeat_sweep_secs);
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            heartbeat_sweep_tick(&heartbeat_hub, Instant::now()).await;
        }
    });

    tokio::spawn(async move {
        let period = Duration::from_secs(hub.config.liveness.ghost_sweep_secs);
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            ghost_sweep_tick(&hub, Instant::now()).await;
        }
    });
}

/// Mark silent stations offline and finalize their sessions.
/// Returns how many stations timed out this tick.
pub async fn heartbeat_sweep_tick(hub: &Arc<Hub>, now: Instant) -> usize {
    let timeout = Duration::from_secs(hub.config.liveness.heartbeat_timeout_secs);
    let stale = {
        let mut registry = hub.registry.lock().await;
        let stale = registry.stale_online(now, timeout);
        for station_id in &stale {
            registry.mark_offline(station_id);
        }
        stale
    };

    let logger = ScopedLog::new("sweeps");
    for station_id in &stale {
        logger.warn(&format!(
            "Station {} heartbeat timed out, marking offline",
            station_id
        ));
        hub.log_activity(format!("Station {} lost (heartbeat timeout)", station_id))
            .await;
        hub.finalize_station_sessions(station_id, FinalizeReason::HeartbeatTimeout)
            .await;
        hub.notify_bridge(
            "updateStation",
            serde_json::json!({"station_id": station_id, "state": "offline"}),
        );
    }
    stale.len()
}

/// Finalize sessions that sat at zero power past the threshold.
/// Returns how many sessions were reaped this tick.
pub async fn ghost_sweep_tick(hub: &Arc<Hub>, now: Instant) -> usize {
    let threshold = Duration::from_secs(hub.config.liveness.ghost_zero_power_secs);
    let candidates = {
        let sessions = hub.sessions.lock().await;
        sessions.ghost_candidates(now, threshold)
    };

    let mut reaped = 0;
    for transaction_id in &candidates {
        // Re-checked under the store lock; a concurrent StopTransaction wins
        if hub
            .finalize_session(transaction_id, FinalizeReason::GhostZeroPower, None)
            .await
            .is_some()
        {
            reaped += 1;
        }
    }
    reaped
}
