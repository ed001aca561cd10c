//! OCPP action dispatch
//!
//! Maps each inbound CALL to its CALLRESULT payload and the state changes it
//! implies. Every action gets exactly one affirmative reply; protocol
//! tolerance is the rule here. A StopTransaction for a transaction some
//! sweep already finalized still answers Accepted, and an unrecognized
//! action answers `{}` rather than a CALLERROR.

use crate::hub::Hub;
use crate::logging::ScopedLog;
use crate::ocpp::meter::parse_meter_values;
use crate::session::{FinalizeReason, next_transaction_id};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

/// BootNotification reply asks the station to heartbeat on this interval.
const HEARTBEAT_INTERVAL_SECS: u32 = 300;

/// Produce the CALLRESULT payload for one inbound CALL
pub async fn dispatch_call(
    hub: &Arc<Hub>,
    station_id: &str,
    action: &str,
    payload: &Value,
) -> Value {
    match action {
        "BootNotification" => boot_notification(hub, station_id, payload).await,
        "Heartbeat" => heartbeat(hub, station_id).await,
        "StatusNotification" => status_notification(hub, station_id, payload).await,
        "StartTransaction" => start_transaction(hub, station_id, payload).await,
        "StopTransaction" => stop_transaction(hub, station_id, payload).await,
        "MeterValues" => meter_values(hub, station_id, payload).await,
        other => {
            ScopedLog::new("dispatch").debug(&format!(
                "Unhandled action {} from {}, answering empty result",
                other, station_id
            ));
            json!({})
        }
    }
}

fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn boot_notification(hub: &Arc<Hub>, station_id: &str, payload: &Value) -> Value {
    let vendor = payload
        .get("chargePointVendor")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown");
    let model = payload
        .get("chargePointModel")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown");
    let firmware = payload
        .get("firmwareVersion")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown");

    {
        let mut registry = hub.registry.lock().await;
        registry.update_boot(station_id, vendor, model, firmware);
        registry.touch(station_id, Instant::now());
    }

    hub.log_activity(format!("Station {} booted ({} {})", station_id, vendor, model))
        .await;
    hub.notify_bridge(
        "registerStation",
        json!({
            "station_id": station_id,
            "vendor": vendor,
            "model": model,
            "firmware_version": firmware,
        }),
    );

    json!({
        "status": "Accepted",
        "currentTime": iso_now(),
        "interval": HEARTBEAT_INTERVAL_SECS,
    })
}

async fn heartbeat(hub: &Arc<Hub>, station_id: &str) -> Value {
    hub.registry.lock().await.touch(station_id, Instant::now());
    hub.notify_bridge(
        "updateStation",
        json!({
            "station_id": station_id,
            "last_heartbeat": iso_now(),
        }),
    );
    json!({"currentTime": iso_now()})
}

/// Bridge-facing connector state for an OCPP status string
pub fn map_connector_state(status: &str) -> &'static str {
    match status {
        "Available" => "available",
        "Charging" => "charging",
        "Faulted" => "error",
        _ => "offline",
    }
}

async fn status_notification(hub: &Arc<Hub>, station_id: &str, payload: &Value) -> Value {
    let connector_id = payload
        .get("connectorId")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    let status = payload.get("status").and_then(|v| v.as_str()).unwrap_or("");

    // No local connector table; the station remains the source of truth.
    hub.notify_bridge(
        "updateStation",
        json!({
            "station_id": station_id,
            "connector_id": connector_id,
            "state": map_connector_state(status),
        }),
    );
    json!({})
}

async fn start_transaction(hub: &Arc<Hub>, station_id: &str, payload: &Value) -> Value {
    let connector_id = payload
        .get("connectorId")
        .and_then(|v| v.as_u64())
        .unwrap_or(1)
        .max(1) as u32;

    let transaction_id = next_transaction_id();
    let displaced = {
        let mut sessions = hub.sessions.lock().await;
        // One active transaction per connector; a dangling predecessor is
        // closed out before the new one opens.
        let dangling = sessions
            .find_by_connector(station_id, connector_id)
            .map(|s| s.transaction_id.clone());
        let displaced =
            dangling.and_then(|tx| sessions.finalize(&tx, FinalizeReason::Stop, Utc::now(), None));
        sessions.open(
            transaction_id.to_string(),
            station_id,
            connector_id,
            Utc::now(),
            Instant::now(),
        );
        displaced
    };
    if let Some(displaced) = displaced {
        hub.log_activity(format!(
            "Session {} on {} port {} displaced by a new start",
            displaced.transaction_id, station_id, connector_id
        ))
        .await;
    }

    hub.log_activity(format!(
        "Session {} started on {} port {}",
        transaction_id, station_id, connector_id
    ))
    .await;
    hub.notify_bridge(
        "createSession",
        json!({
            "transaction_id": transaction_id.to_string(),
            "station_id": station_id,
            "connector_id": connector_id,
        }),
    );

    json!({
        "transactionId": transaction_id,
        "idTagInfo": {"status": "Accepted"},
    })
}

async fn stop_transaction(hub: &Arc<Hub>, station_id: &str, payload: &Value) -> Value {
    let transaction_id = match payload.get("transactionId") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    // meterStop is a Wh register; completed sessions carry kWh
    let final_energy = payload
        .get("meterStop")
        .and_then(|v| v.as_f64())
        .map(|wh| wh / 1000.0);

    if !transaction_id.is_empty() {
        // None means a sweep or disconnect already finalized this one; the
        // station still gets Accepted, it cannot avoid the race.
        hub.finalize_session(&transaction_id, FinalizeReason::Stop, final_energy)
            .await;
    } else {
        ScopedLog::new("dispatch").warn(&format!(
            "StopTransaction from {} without transactionId",
            station_id
        ));
    }

    json!({"idTagInfo": {"status": "Accepted"}})
}

async fn meter_values(hub: &Arc<Hub>, station_id: &str, payload: &Value) -> Value {
    let connector_id = payload
        .get("connectorId")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    let meter_value = payload
        .get("meterValue")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let tx_hint = match payload.get("transactionId") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    let reading = parse_meter_values(&meter_value);
    let now = Instant::now();

    // Streaming telemetry counts as liveness
    hub.registry.lock().await.touch(station_id, now);

    let mut recovered: Option<String> = None;
    let resolved = {
        let mut sessions = hub.sessions.lock().await;
        let mut resolved = tx_hint.filter(|tx| sessions.find_by_tx(tx).is_some());
        if resolved.is_none() {
            resolved = sessions
                .find_by_connector(station_id, connector_id)
                .map(|s| s.transaction_id.clone());
        }
        if resolved.is_none() && !meter_value.is_empty() && connector_id >= 1 {
            // The station was charging before we knew about it; synthesize
            // a session so its telemetry is not dropped.
            let transaction_id = format!("auto-{}", next_transaction_id());
            sessions.open(
                transaction_id.clone(),
                station_id,
                connector_id,
                Utc::now(),
                now,
            );
            recovered = Some(transaction_id.clone());
            resolved = Some(transaction_id);
        }
        if let Some(transaction_id) = &resolved {
            sessions.update_meter(transaction_id, &reading, now);
        }
        resolved
    };

    if let Some(transaction_id) = recovered {
        ScopedLog::new("dispatch").info(&format!(
            "Recovered orphan session {} on {} connector {}",
            transaction_id, station_id, connector_id
        ));
        hub.log_activity(format!(
            "Recovered session {} on {} port {}",
            transaction_id, station_id, connector_id
        ))
        .await;
    }

    if resolved.is_some() {
        hub.notify_bridge_telemetry(station_id, connector_id, reading.energy_kwh, reading.power_w);
    }

    json!({})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_state_mapping() {
        assert_eq!(map_connector_state("Available"), "available");
        assert_eq!(map_connector_state("Charging"), "charging");
        assert_eq!(map_connector_state("Faulted"), "error");
        assert_eq!(map_connector_state("Unavailable"), "offline");
        assert_eq!(map_connector_state("SuspendedEV"), "offline");
        assert_eq!(map_connector_state(""), "offline");
    }
}
