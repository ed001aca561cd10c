//! Outbound bridge webhook client
//!
//! Mirrors lifecycle and telemetry events to an external record-keeping
//! service. Everything here is fire-and-forget: the local state is
//! authoritative, so transport failures, non-2xx statuses and junk response
//! bodies are logged and swallowed.

use crate::config::BridgeConfig;
use crate::logging::ScopedLog;
use serde_json::{Value, json};
use std::time::Duration;

/// HTTP client for the configured bridge endpoint
#[derive(Clone)]
pub struct BridgeClient {
    url: String,
    secret: String,
    http: reqwest::Client,
    logger: ScopedLog,
}

impl BridgeClient {
    /// Build a client from configuration; None when no URL is configured
    pub fn from_config(config: &BridgeConfig) -> Option<Self> {
        if config.url.trim().is_empty() {
            return None;
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .ok()?;
        Some(Self {
            url: config.url.trim().to_string(),
            secret: config.secret.clone(),
            http,
            logger: ScopedLog::new("bridge"),
        })
    }

    /// Send a lifecycle action envelope `{action, data}`
    pub async fn send_action(&self, action: &str, data: Value) {
        self.post(json!({"action": action, "data": data})).await;
    }

    /// Send a compact telemetry frame for a MeterValues sample
    pub async fn send_telemetry(
        &self,
        station_id: &str,
        connector_id: u32,
        energy_kwh: f64,
        power_w: f64,
    ) {
        self.post(json!({
            "station_id": station_id,
            "connector_id": connector_id,
            "energy": energy_kwh,
            "power": power_w,
        }))
        .await;
    }

    async fn post(&self, body: Value) {
        let request = self
            .http
            .post(&self.url)
            .header("x-bridge-secret", &self.secret)
            .json(&body);

        match request.send().await {
            Ok(response) if !response.status().is_success() => {
                self.logger
                    .debug(&format!("Bridge returned {}", response.status()));
            }
            Ok(_) => {}
            Err(e) => {
                self.logger.debug(&format!("Bridge unreachable: {}", e));
            }
        }
    }
}
