//! Station registry
//!
//! Process-wide mapping from station id to its live record: identity fields
//! from BootNotification, the outbound send handle for the current
//! connection, and the heartbeat instant the liveness sweep checks. Callers
//! hold the registry behind a `tokio::sync::Mutex`, making each operation
//! atomic.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Online/offline state of a station record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    Online,
    Offline,
}

/// One charge point known to this process
#[derive(Debug)]
pub struct Station {
    /// Opaque identifier from the connect URL
    pub id: String,
    /// Outbound send handle for the current connection; dropped on close
    sender: Option<mpsc::UnboundedSender<String>>,
    /// Connection generation, used to ignore teardown of replaced connections
    pub generation: u64,
    pub connected_at: DateTime<Utc>,
    pub status: StationStatus,
    pub vendor: String,
    pub model: String,
    pub firmware_version: String,
    /// Monotonic instant of the last liveness-bearing frame
    pub last_heartbeat: Instant,
}

/// Read-only view of a station record for the query APIs
#[derive(Debug, Clone, Serialize)]
pub struct StationSnapshot {
    pub id: String,
    pub connected_at: DateTime<Utc>,
    pub status: StationStatus,
    pub vendor: String,
    pub model: String,
    pub firmware_version: String,
    /// Seconds since the last heartbeat-bearing frame
    pub last_heartbeat_secs_ago: u64,
}

/// Registry of all stations seen by this process
pub struct StationRegistry {
    stations: HashMap<String, Station>,
    next_generation: u64,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self {
            stations: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Insert or replace the record for a freshly connected station.
    ///
    /// Returns the connection generation the caller must present when
    /// tearing down, so a replaced connection cannot clobber its successor.
    pub fn register(
        &mut self,
        id: &str,
        sender: mpsc::UnboundedSender<String>,
        now: Instant,
    ) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.stations.insert(
            id.to_string(),
            Station {
                id: id.to_string(),
                sender: Some(sender),
                generation,
                connected_at: Utc::now(),
                status: StationStatus::Online,
                vendor: "Unknown".to_string(),
                model: "Unknown".to_string(),
                firmware_version: "Unknown".to_string(),
                last_heartbeat: now,
            },
        );
        generation
    }

    /// Fill device identity from BootNotification; marks the station online.
    pub fn update_boot(&mut self, id: &str, vendor: &str, model: &str, firmware: &str) {
        if let Some(station) = self.stations.get_mut(id) {
            station.vendor = vendor.to_string();
            station.model = model.to_string();
            station.firmware_version = firmware.to_string();
            station.status = StationStatus::Online;
        }
    }

    /// Record liveness: refresh the heartbeat instant and mark online.
    pub fn touch(&mut self, id: &str, now: Instant) {
        if let Some(station) = self.stations.get_mut(id) {
            station.last_heartbeat = now;
            station.status = StationStatus::Online;
        }
    }

    /// Mark a station offline without removing the record.
    ///
    /// The send handle stays in place: a station the heartbeat sweep timed
    /// out may still be connected, and its next frame flips it back online.
    /// Returns true if the station was online.
    pub fn mark_offline(&mut self, id: &str) -> bool {
        match self.stations.get_mut(id) {
            Some(station) if station.status == StationStatus::Online => {
                station.status = StationStatus::Offline;
                true
            }
            _ => false,
        }
    }

    /// Connection teardown: mark offline and drop the send handle, but only
    /// if the record still belongs to the closing connection.
    pub fn close_connection(&mut self, id: &str, generation: u64) -> bool {
        match self.stations.get_mut(id) {
            Some(station) if station.generation == generation => {
                station.status = StationStatus::Offline;
                station.sender = None;
                true
            }
            _ => false,
        }
    }

    /// Whether a live connection is currently registered for this id
    pub fn is_online(&self, id: &str) -> bool {
        self.stations
            .get(id)
            .is_some_and(|s| s.status == StationStatus::Online && s.sender.is_some())
    }

    /// Outbound send handle, available only while the station is online
    pub fn sender_for(&self, id: &str) -> Option<mpsc::UnboundedSender<String>> {
        self.stations
            .get(id)
            .filter(|s| s.status == StationStatus::Online)
            .and_then(|s| s.sender.clone())
    }

    /// Read snapshot of one station
    pub fn snapshot(&self, id: &str) -> Option<StationSnapshot> {
        self.stations.get(id).map(snapshot_of)
    }

    /// Read-only listing for dashboards and APIs
    pub fn snapshot_all(&self) -> Vec<StationSnapshot> {
        let mut all: Vec<StationSnapshot> = self.stations.values().map(snapshot_of).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Online stations whose last heartbeat is older than `timeout`
    pub fn stale_online(&self, now: Instant, timeout: Duration) -> Vec<String> {
        self.stations
            .values()
            .filter(|s| {
                s.status == StationStatus::Online
                    && now.saturating_duration_since(s.last_heartbeat) > timeout
            })
            .map(|s| s.id.clone())
            .collect()
    }

    /// (total, online) record counts
    pub fn counts(&self) -> (usize, usize) {
        let online = self
            .stations
            .values()
            .filter(|s| s.status == StationStatus::Online)
            .count();
        (self.stations.len(), online)
    }
}

impl Default for StationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_of(station: &Station) -> StationSnapshot {
    StationSnapshot {
        id: station.id.clone(),
        connected_at: station.connected_at,
        status: station.status,
        vendor: station.vendor.clone(),
        model: station.model.clone(),
        firmware_version: station.firmware_version.clone(),
        last_heartbeat_secs_ago: station.last_heartbeat.elapsed().as_secs(),
    }
}
