//! Process-wide state composition
//!
//! The `Hub` owns the station registry, the session store, the activity log
//! and the optional bridge client, each behind its own lock. Connection
//! handlers, the liveness sweeps and the web layer all share one `Arc<Hub>`
//! and mutate state only through the typed operations on the parts.
//!
//! Locking discipline: a lock is held for one operation and never across a
//! bridge await; bridge notifications are spawned fire-and-forget.

use crate::activity::ActivityLog;
use crate::bridge::BridgeClient;
use crate::config::Config;
use crate::logging::ScopedLog;
use crate::registry::StationRegistry;
use crate::session::{CompletedSession, FinalizeReason, SessionStore};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared state for the whole process
pub struct Hub {
    pub config: Config,
    pub registry: Mutex<StationRegistry>,
    pub sessions: Mutex<SessionStore>,
    pub activity: Mutex<ActivityLog>,
    pub bridge: Option<BridgeClient>,
    logger: ScopedLog,
}

impl Hub {
    pub fn new(config: Config) -> Arc<Self> {
        let bridge = BridgeClient::from_config(&config.bridge);
        let sessions = SessionStore::new(config.history.completed_cap);
        let activity = ActivityLog::new(config.history.activity_cap);
        Arc::new(Self {
            config,
            registry: Mutex::new(StationRegistry::new()),
            sessions: Mutex::new(sessions),
            activity: Mutex::new(activity),
            bridge,
            logger: ScopedLog::new("hub"),
        })
    }

    /// Record a human-readable event in the activity ring
    pub async fn log_activity(&self, message: impl Into<String>) {
        self.activity.lock().await.push(message);
    }

    /// Fire-and-forget a lifecycle action to the bridge, if configured
    pub fn notify_bridge(&self, action: &'static str, data: Value) {
        if let Some(bridge) = self.bridge.clone() {
            tokio::spawn(async move {
                bridge.send_action(action, data).await;
            });
        }
    }

    /// Fire-and-forget a telemetry frame to the bridge, if configured
    pub fn notify_bridge_telemetry(
        &self,
        station_id: &str,
        connector_id: u32,
        energy_kwh: f64,
        power_w: f64,
    ) {
        if let Some(bridge) = self.bridge.clone() {
            let station_id = station_id.to_string();
            tokio::spawn(async move {
                bridge
                    .send_telemetry(&station_id, connector_id, energy_kwh, power_w)
                    .await;
            });
        }
    }

    /// Finalize one transaction through whichever completion path reached it
    /// first. Returns None when another path already finalized it.
    pub async fn finalize_session(
        &self,
        transaction_id: &str,
        reason: FinalizeReason,
        final_energy: Option<f64>,
    ) -> Option<CompletedSession> {
        let completed = {
            let mut sessions = self.sessions.lock().await;
            sessions.finalize(transaction_id, reason, Utc::now(), final_energy)
        }?;

        self.logger.info(&format!(
            "Session {} on {} connector {} finalized ({}): {:.3} kWh over {} min",
            completed.transaction_id,
            completed.station_id,
            completed.connector_id,
            reason.as_str(),
            completed.energy_kwh,
            completed.duration_minutes,
        ));
        self.log_activity(format!(
            "Session {} finished on {} port {} ({}, {:.3} kWh)",
            completed.transaction_id,
            completed.station_id,
            completed.connector_id,
            reason.as_str(),
            completed.energy_kwh,
        ))
        .await;
        self.notify_bridge(
            "updateSession",
            json!({
                "transaction_id": completed.transaction_id,
                "station_id": completed.station_id,
                "connector_id": completed.connector_id,
                "energy_kwh": completed.energy_kwh,
                "duration_minutes": completed.duration_minutes,
                "reason": reason.as_str(),
            }),
        );

        Some(completed)
    }

    /// Finalize every active transaction on a station; returns how many.
    pub async fn finalize_station_sessions(
        &self,
        station_id: &str,
        reason: FinalizeReason,
    ) -> usize {
        let transaction_ids = {
            let sessions = self.sessions.lock().await;
            sessions.active_for_station(station_id)
        };

        let mut finalized = 0;
        for transaction_id in &transaction_ids {
            if self
                .finalize_session(transaction_id, reason, None)
                .await
                .is_some()
            {
                finalized += 1;
            }
        }
        finalized
    }
}
