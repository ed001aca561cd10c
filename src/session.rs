//! Charging session tracking
//!
//! This module owns both session maps: the active transactions keyed by
//! transaction id and the bounded newest-first ring of completed sessions.
//! Finalization is the single act of moving a transaction from one to the
//! other; it happens under one store lock acquisition and is idempotent, so
//! the four completion paths (stop, disconnect, heartbeat timeout, ghost
//! cleanup) can race freely and exactly one wins.

use crate::ocpp::meter::MeterReading;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

/// Why a transaction was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    /// Clean StopTransaction from the station
    Stop,
    /// Connection closed while the transaction was active
    Disconnect,
    /// Station went silent past the heartbeat timeout
    HeartbeatTimeout,
    /// Power stayed at zero past the ghost threshold
    GhostZeroPower,
}

impl FinalizeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeReason::Stop => "stop",
            FinalizeReason::Disconnect => "disconnect",
            FinalizeReason::HeartbeatTimeout => "heartbeat_timeout",
            FinalizeReason::GhostZeroPower => "ghost_zero_power",
        }
    }
}

/// An in-progress charging transaction
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    /// Millisecond-derived decimal id, or `auto-` prefixed when recovered
    pub transaction_id: String,
    pub station_id: String,
    /// Connector the vehicle is plugged into, 1-based
    pub connector_id: u32,
    pub start_time: DateTime<Utc>,

    /// Latest observed readings; all default to 0 until samples arrive
    pub power_w: f64,
    pub energy_kwh: f64,
    pub voltage_v: f64,
    pub current_a: f64,
    pub temperature_c: f64,

    /// Peak power seen over the session, for the history view
    pub peak_power_w: f64,
    #[serde(skip)]
    voltage_sum: f64,
    #[serde(skip)]
    voltage_samples: u64,
    #[serde(skip)]
    current_sum: f64,
    #[serde(skip)]
    current_samples: u64,

    /// Instant of the last sample with power > 0, primed at open
    #[serde(skip)]
    pub last_nonzero_power: Instant,
}

impl ActiveSession {
    fn apply(&mut self, reading: &MeterReading, now: Instant) {
        self.power_w = reading.power_w;
        self.energy_kwh = reading.energy_kwh;
        self.voltage_v = reading.voltage_v;
        self.current_a = reading.current_a;
        self.temperature_c = reading.temperature_c;

        if reading.power_w > self.peak_power_w {
            self.peak_power_w = reading.power_w;
        }
        if reading.power_w > 0.0 {
            self.last_nonzero_power = now;
        }
        if reading.voltage_v > 0.0 {
            self.voltage_sum += reading.voltage_v;
            self.voltage_samples += 1;
        }
        if reading.current_a > 0.0 {
            self.current_sum += reading.current_a;
            self.current_samples += 1;
        }
    }

    fn avg_voltage(&self) -> f64 {
        if self.voltage_samples == 0 {
            0.0
        } else {
            self.voltage_sum / self.voltage_samples as f64
        }
    }

    fn avg_current(&self) -> f64 {
        if self.current_samples == 0 {
            0.0
        } else {
            self.current_sum / self.current_samples as f64
        }
    }
}

/// Immutable record of a finished charging session
#[derive(Debug, Clone, Serialize)]
pub struct CompletedSession {
    pub transaction_id: String,
    pub station_id: String,
    pub connector_id: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Whole minutes between start and end
    pub duration_minutes: i64,
    pub energy_kwh: f64,
    pub peak_power_w: f64,
    pub avg_voltage_v: f64,
    pub avg_current_a: f64,
    pub reason: FinalizeReason,
    pub status: &'static str,
}

/// Both session maps behind one lock
pub struct SessionStore {
    active: HashMap<String, ActiveSession>,
    completed: VecDeque<CompletedSession>,
    completed_cap: usize,
}

impl SessionStore {
    pub fn new(completed_cap: usize) -> Self {
        Self {
            active: HashMap::new(),
            completed: VecDeque::with_capacity(completed_cap.min(64)),
            completed_cap,
        }
    }

    /// Create an active transaction
    pub fn open(
        &mut self,
        transaction_id: impl Into<String>,
        station_id: &str,
        connector_id: u32,
        start_time: DateTime<Utc>,
        now: Instant,
    ) {
        let transaction_id = transaction_id.into();
        self.active.insert(
            transaction_id.clone(),
            ActiveSession {
                transaction_id,
                station_id: station_id.to_string(),
                connector_id,
                start_time,
                power_w: 0.0,
                energy_kwh: 0.0,
                voltage_v: 0.0,
                current_a: 0.0,
                temperature_c: 0.0,
                peak_power_w: 0.0,
                voltage_sum: 0.0,
                voltage_samples: 0,
                current_sum: 0.0,
                current_samples: 0,
                last_nonzero_power: now,
            },
        );
    }

    pub fn find_by_tx(&self, transaction_id: &str) -> Option<&ActiveSession> {
        self.active.get(transaction_id)
    }

    /// The single active transaction for a (station, connector) pair, if any
    pub fn find_by_connector(&self, station_id: &str, connector_id: u32) -> Option<&ActiveSession> {
        self.active
            .values()
            .find(|s| s.station_id == station_id && s.connector_id == connector_id)
    }

    /// Apply a meter reading; returns false for an unknown transaction
    pub fn update_meter(&mut self, transaction_id: &str, reading: &MeterReading, now: Instant) -> bool {
        match self.active.get_mut(transaction_id) {
            Some(session) => {
                session.apply(reading, now);
                true
            }
            None => false,
        }
    }

    /// Move a transaction from the active map to the completed ring.
    ///
    /// Returns None when the transaction was already finalized by another
    /// path; the first caller wins. `final_energy` overrides the last
    /// observed register (StopTransaction's meterStop).
    pub fn finalize(
        &mut self,
        transaction_id: &str,
        reason: FinalizeReason,
        end_time: DateTime<Utc>,
        final_energy: Option<f64>,
    ) -> Option<CompletedSession> {
        let session = self.active.remove(transaction_id)?;

        let duration_minutes = (end_time - session.start_time).num_seconds().max(0) / 60;
        let completed = CompletedSession {
            transaction_id: session.transaction_id.clone(),
            station_id: session.station_id.clone(),
            connector_id: session.connector_id,
            start_time: session.start_time,
            end_time,
            duration_minutes,
            energy_kwh: final_energy.unwrap_or(session.energy_kwh),
            peak_power_w: session.peak_power_w,
            avg_voltage_v: session.avg_voltage(),
            avg_current_a: session.avg_current(),
            reason,
            status: "completed",
        };

        self.completed.push_front(completed.clone());
        while self.completed.len() > self.completed_cap {
            self.completed.pop_back();
        }

        Some(completed)
    }

    /// Transaction ids of every active session on a station
    pub fn active_for_station(&self, station_id: &str) -> Vec<String> {
        self.active
            .values()
            .filter(|s| s.station_id == station_id)
            .map(|s| s.transaction_id.clone())
            .collect()
    }

    /// Active sessions whose power has been zero past `threshold`
    pub fn ghost_candidates(&self, now: Instant, threshold: Duration) -> Vec<String> {
        self.active
            .values()
            .filter(|s| {
                s.power_w == 0.0
                    && now.saturating_duration_since(s.last_nonzero_power) > threshold
            })
            .map(|s| s.transaction_id.clone())
            .collect()
    }

    /// Active sessions, optionally filtered by station, newest first
    pub fn active_snapshot(&self, station_id: Option<&str>) -> Vec<ActiveSession> {
        let mut sessions: Vec<ActiveSession> = self
            .active
            .values()
            .filter(|s| station_id.is_none_or(|id| s.station_id == id))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        sessions
    }

    /// Completed sessions, newest first
    pub fn completed_snapshot(&self) -> Vec<CompletedSession> {
        self.completed.iter().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

static TX_COUNTER: AtomicI64 = AtomicI64::new(0);

/// Next transaction id: the current millisecond timestamp, bumped past the
/// previous id so same-millisecond starts stay unique for the process
/// lifetime.
pub fn next_transaction_id() -> i64 {
    let now_ms = Utc::now().timestamp_millis();
    let mut previous = TX_COUNTER.load(Ordering::SeqCst);
    loop {
        let next = now_ms.max(previous + 1);
        match TX_COUNTER.compare_exchange(previous, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next,
            Err(actual) => previous = actual,
        }
    }
}
