//! Per-station WebSocket connection handling
//!
//! Each charge point holds one long-lived connection to
//! `/ocpp16/{station_id}`. The receive loop processes frames strictly in
//! arrival order; outbound text goes through a single writer task fed by an
//! unbounded channel, so CALLRESULT frames and operator-initiated CALLs
//! never interleave mid-write and message-id/response correspondence holds.

use crate::hub::Hub;
use crate::logging::ScopedLog;
use crate::ocpp::dispatch::dispatch_call;
use crate::ocpp::frame::Frame;
use crate::session::FinalizeReason;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Upgrade handler for `/ocpp16/{station_id}`
pub async fn ocpp_upgrade(
    Path(station_id): Path<String>,
    State(hub): State<Arc<Hub>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    // A station connecting to the bare mount point has a mis-constructed URL
    if station_id.is_empty() || station_id == "ocpp16" {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"success": false, "error": "Invalid station id"})),
        )
            .into_response();
    }

    let Ok(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "WebSocket upgrade required").into_response();
    };

    ws.protocols(["ocpp1.6"])
        .on_upgrade(move |socket| handle_station(hub, station_id, socket))
}

/// Own a station's connection from upgrade to teardown
async fn handle_station(hub: Arc<Hub>, station_id: String, socket: WebSocket) {
    let logger = ScopedLog::for_station("connection", station_id.clone());

    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    // Single-writer discipline: everything outbound funnels through here
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let (generation, replaced) = {
        let mut registry = hub.registry.lock().await;
        let replaced = registry.is_online(&station_id);
        let generation = registry.register(&station_id, out_tx.clone(), Instant::now());
        (generation, replaced)
    };
    if replaced {
        logger.warn("Replacing an existing connection for this station id");
        hub.finalize_station_sessions(&station_id, FinalizeReason::Disconnect)
            .await;
    }
    logger.info("Station connected");
    hub.log_activity(format!("Station {} connected", station_id))
        .await;

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match Frame::decode(text.as_str()) {
                Ok(Frame::Call {
                    message_id,
                    action,
                    payload,
                }) => {
                    let result = dispatch_call(&hub, &station_id, &action, &payload).await;
                    let reply = Frame::result(message_id, result).encode();
                    if out_tx.send(reply).is_err() {
                        // Writer is gone, the transport is dead
                        break;
                    }
                }
                Ok(other) => {
                    // Response to an operator-initiated CALL; no pending-call
                    // table is kept, correlation happens via /command's
                    // returned messageId.
                    logger.debug(&format!(
                        "Ignoring peer response frame with id {}",
                        other.message_id()
                    ));
                }
                Err(e) => {
                    logger.warn(&format!("Malformed frame, connection kept: {}", e));
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                logger.warn(&format!("Transport error, closing: {}", e));
                break;
            }
        }
    }

    // Teardown is a no-op when a newer connection has replaced this one
    let closed = {
        let mut registry = hub.registry.lock().await;
        registry.close_connection(&station_id, generation)
    };
    if closed {
        let finalized = hub
            .finalize_station_sessions(&station_id, FinalizeReason::Disconnect)
            .await;
        logger.info(&format!(
            "Station disconnected, {} session(s) finalized",
            finalized
        ));
        hub.log_activity(format!("Station {} disconnected", station_id))
            .await;
        hub.notify_bridge(
            "updateStation",
            json!({"station_id": station_id, "state": "offline"}),
        );
    }
    writer.abort();
}
