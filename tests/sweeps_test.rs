use ampere::ocpp::dispatch::dispatch_call;
use ampere::registry::StationStatus;
use ampere::session::FinalizeReason;
use ampere::sweeps::{ghost_sweep_tick, heartbeat_sweep_tick};
use ampere::{Config, Hub};
use chrono::Utc;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

async fn connect(hub: &std::sync::Arc<Hub>, station_id: &str) {
    let (tx, _rx) = mpsc::unbounded_channel();
    hub.registry
        .lock()
        .await
        .register(station_id, tx, Instant::now());
}

#[tokio::test]
async fn heartbeat_timeout_marks_offline_and_finalizes() {
    let hub = Hub::new(Config::default());
    let now = Instant::now();
    connect(&hub, "CP03").await;

    // One heartbeat, then silence past the 60 s threshold
    dispatch_call(&hub, "CP03", "Heartbeat", &json!({})).await;
    let silent_since = now.checked_sub(Duration::from_secs(61)).unwrap();
    hub.registry.lock().await.touch("CP03", silent_since);

    hub.sessions
        .lock()
        .await
        .open("500", "CP03", 1, Utc::now(), now);

    let timed_out = heartbeat_sweep_tick(&hub, now).await;
    assert_eq!(timed_out, 1);

    let device = hub.registry.lock().await.snapshot("CP03").unwrap();
    assert_eq!(device.status, StationStatus::Offline);

    let completed = hub.sessions.lock().await.completed_snapshot();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].reason, FinalizeReason::HeartbeatTimeout);
    assert_eq!(hub.sessions.lock().await.active_count(), 0);
}

#[tokio::test]
async fn fresh_heartbeat_survives_the_sweep() {
    let hub = Hub::new(Config::default());
    let now = Instant::now();
    connect(&hub, "CP03").await;
    dispatch_call(&hub, "CP03", "Heartbeat", &json!({})).await;

    let timed_out = heartbeat_sweep_tick(&hub, now).await;
    assert_eq!(timed_out, 0);
    assert!(hub.registry.lock().await.is_online("CP03"));
}

#[tokio::test]
async fn zero_power_session_is_reaped_after_threshold() {
    let hub = Hub::new(Config::default());
    let now = Instant::now();
    connect(&hub, "CP04").await;

    // Opened 31 s ago, never drew power
    let opened = now.checked_sub(Duration::from_secs(31)).unwrap();
    hub.sessions
        .lock()
        .await
        .open("600", "CP04", 1, Utc::now(), opened);

    let reaped = ghost_sweep_tick(&hub, now).await;
    assert_eq!(reaped, 1);

    let completed = hub.sessions.lock().await.completed_snapshot();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].reason, FinalizeReason::GhostZeroPower);

    // A late StopTransaction still gets Accepted and changes nothing
    let stop = dispatch_call(
        &hub,
        "CP04",
        "StopTransaction",
        &json!({"transactionId": "600", "meterStop": 1000, "timestamp": "2025-01-01T00:00:00Z"}),
    )
    .await;
    assert_eq!(stop["idTagInfo"]["status"], "Accepted");
    assert_eq!(hub.sessions.lock().await.completed_snapshot().len(), 1);
    assert_eq!(hub.sessions.lock().await.active_count(), 0);
}

#[tokio::test]
async fn drawing_power_protects_a_session_from_the_ghost_sweep() {
    let hub = Hub::new(Config::default());
    let now = Instant::now();
    connect(&hub, "CP04").await;

    let opened = now.checked_sub(Duration::from_secs(120)).unwrap();
    hub.sessions
        .lock()
        .await
        .open("601", "CP04", 1, Utc::now(), opened);

    // A recent non-zero sample resets the zero-power clock
    dispatch_call(
        &hub,
        "CP04",
        "MeterValues",
        &json!({"connectorId": 1, "transactionId": "601", "meterValue": [
            {"sampledValue": [{"measurand": "Power.Active.Import", "value": "1500"}]}
        ]}),
    )
    .await;

    let reaped = ghost_sweep_tick(&hub, Instant::now()).await;
    assert_eq!(reaped, 0);
    assert_eq!(hub.sessions.lock().await.active_count(), 1);
}

#[tokio::test]
async fn disconnect_style_finalization_covers_every_connector() {
    let hub = Hub::new(Config::default());
    let now = Instant::now();
    connect(&hub, "CP04").await;

    hub.sessions
        .lock()
        .await
        .open("700", "CP04", 1, Utc::now(), now);
    hub.sessions
        .lock()
        .await
        .open("701", "CP04", 2, Utc::now(), now);

    let finalized = hub
        .finalize_station_sessions("CP04", FinalizeReason::Disconnect)
        .await;
    assert_eq!(finalized, 2);

    let completed = hub.sessions.lock().await.completed_snapshot();
    assert_eq!(completed.len(), 2);
    assert!(completed.iter().all(|c| c.reason == FinalizeReason::Disconnect));
    assert_eq!(hub.sessions.lock().await.active_count(), 0);
}
