//! Axum-based HTTP server with OpenAPI (utoipa) and Swagger UI
//!
//! Hosts the OCPP WebSocket mount, the read-only query APIs, the operator
//! command endpoint and the history surfaces.

use crate::hub::Hub;
use crate::ocpp::connection::ocpp_upgrade;
use crate::ocpp::frame::Frame;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

mod history;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommandBody {
    /// Target station id
    pub station_id: String,
    /// OCPP action name, e.g. RemoteStopTransaction
    pub action: String,
    /// CALL payload, defaults to an empty object
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[utoipa::path(get, path = "/api/health", responses(
    (status = 200, description = "Service is healthy")
))]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[utoipa::path(get, path = "/api/status", responses(
    (status = 200, description = "Station and session counts")
))]
async fn api_status(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    let (devices, devices_online) = hub.registry.lock().await.counts();
    let sessions = hub.sessions.lock().await.active_count();
    Json(json!({
        "success": true,
        "devices": devices,
        "sessions": sessions,
        "devices_online": devices_online,
    }))
}

#[utoipa::path(get, path = "/api/devices", responses(
    (status = 200, description = "All known stations")
))]
async fn api_devices(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    let devices = hub.registry.lock().await.snapshot_all();
    Json(json!({"success": true, "devices": devices}))
}

#[utoipa::path(get, path = "/api/sessions", responses(
    (status = 200, description = "All active charging sessions")
))]
async fn api_sessions(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    let sessions = hub.sessions.lock().await.active_snapshot(None);
    Json(json!({"success": true, "sessions": sessions}))
}

#[utoipa::path(get, path = "/api/sessions/{station_id}", responses(
    (status = 200, description = "Active charging sessions for one station")
))]
async fn api_sessions_for_station(
    State(hub): State<Arc<Hub>>,
    Path(station_id): Path<String>,
) -> impl IntoResponse {
    let sessions = hub
        .sessions
        .lock()
        .await
        .active_snapshot(Some(&station_id));
    Json(json!({"success": true, "sessions": sessions}))
}

#[utoipa::path(get, path = "/api/activity", responses(
    (status = 200, description = "Recent activity log entries, newest first")
))]
async fn api_activity(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    let entries = hub.activity.lock().await.entries();
    Json(json!({"success": true, "activity": entries}))
}

#[utoipa::path(post, path = "/command", request_body = CommandBody, responses(
    (status = 200, description = "Command queued to the station"),
    (status = 404, description = "Station not connected")
))]
async fn command(State(hub): State<Arc<Hub>>, Json(body): Json<CommandBody>) -> impl IntoResponse {
    let sender = hub.registry.lock().await.sender_for(&body.station_id);

    if let Some(sender) = sender {
        let payload = if body.payload.is_null() {
            json!({})
        } else {
            body.payload
        };
        let frame = Frame::call(body.action, payload);
        let message_id = frame.message_id().to_string();
        if sender.send(frame.encode()).is_ok() {
            return (
                StatusCode::OK,
                Json(json!({"success": true, "messageId": message_id})),
            );
        }
    }

    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "error": "Station not connected"})),
    )
}

#[derive(OpenApi)]
#[openapi(
    paths(health, api_status, api_devices, api_sessions, api_sessions_for_station, api_activity, command),
    components(schemas(CommandBody)),
    tags((name = "ampere", description = "Ampere OCPP Central System API"))
)]
pub struct ApiDoc;

/// Build the full application router; exposed separately for tests
pub fn router(hub: Arc<Hub>) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(api_status))
        .route("/api/devices", get(api_devices))
        .route("/api/sessions", get(api_sessions))
        .route("/api/sessions/{station_id}", get(api_sessions_for_station))
        .route("/api/activity", get(api_activity))
        .route("/command", post(command))
        .route("/ocpp16/{station_id}", get(ocpp_upgrade))
        .merge(history::routes())
        .merge(SwaggerUi::new("/ui/openapi").url("/openapi.json", openapi))
        .with_state(hub)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process exits
pub async fn serve(hub: Arc<Hub>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(hub);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .unwrap_or(([0, 0, 0, 0], port).into());
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
