//! Operator history surfaces
//!
//! The dashboard page, the filterable history view with CSV export and the
//! per-connector view. All of it reads the completed-session ring; nothing
//! here mutates state.

use crate::hub::Hub;
use crate::session::CompletedSession;
use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Filter by start date, `YYYY-MM-DD`
    pub date: Option<String>,
    /// Filter by station id
    pub station: Option<String>,
    /// Filter by connector number
    pub port: Option<u32>,
    /// `csv` for an export, anything else renders HTML
    pub format: Option<String>,
}

pub fn routes() -> Router<Arc<Hub>> {
    Router::new()
        .route("/", get(dashboard))
        .route("/logs", get(history_view))
        .route("/port/{connector}", get(port_history))
}

async fn dashboard(State(hub): State<Arc<Hub>>) -> Html<String> {
    let (devices, devices_online) = hub.registry.lock().await.counts();
    let (sessions, completed) = {
        let store = hub.sessions.lock().await;
        (store.active_count(), store.completed_snapshot().len())
    };

    Html(format!(
        "<!doctype html><html><head><title>Ampere</title></head><body>\
         <h1>Ampere OCPP Central System</h1>\
         <p>{devices} station(s) known, {devices_online} online, \
         {sessions} active session(s), {completed} completed.</p>\
         <ul>\
         <li><a href=\"/logs\">Charging history</a> \
         (<a href=\"/logs?format=csv\">CSV</a>)</li>\
         <li><a href=\"/api/status\">Status API</a></li>\
         <li><a href=\"/ui/openapi\">API documentation</a></li>\
         </ul></body></html>"
    ))
}

async fn history_view(State(hub): State<Arc<Hub>>, Query(query): Query<HistoryQuery>) -> Response {
    let completed = hub.sessions.lock().await.completed_snapshot();
    let rows = filter_sessions(&completed, &query);

    if query.format.as_deref() == Some("csv") {
        let body = render_csv(&rows);
        (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"charging-history.csv\"",
                ),
            ],
            body,
        )
            .into_response()
    } else {
        Html(render_table("Charging history", &rows)).into_response()
    }
}

async fn port_history(State(hub): State<Arc<Hub>>, Path(connector): Path<u32>) -> Html<String> {
    let completed = hub.sessions.lock().await.completed_snapshot();
    let query = HistoryQuery {
        port: Some(connector),
        ..HistoryQuery::default()
    };
    let rows = filter_sessions(&completed, &query);
    Html(render_table(&format!("Port {} history", connector), &rows))
}

fn filter_sessions(completed: &[CompletedSession], query: &HistoryQuery) -> Vec<CompletedSession> {
    completed
        .iter()
        .filter(|session| {
            query
                .date
                .as_deref()
                .is_none_or(|d| session.start_time.format("%Y-%m-%d").to_string() == d)
                && query
                    .station
                    .as_deref()
                    .is_none_or(|s| session.station_id == s)
                && query.port.is_none_or(|p| session.connector_id == p)
        })
        .cloned()
        .collect()
}

const CSV_HEADER: &str = "Date,Station,Port,Start Time,End Time,Duration (min),\
Energy (kWh),Max Power (W),Avg Voltage (V),Avg Current (A)";

fn render_csv(rows: &[CompletedSession]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for session in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{:.3},{:.0},{:.1},{:.1}\n",
            session.start_time.format("%Y-%m-%d"),
            session.station_id,
            session.connector_id,
            session.start_time.format("%H:%M:%S"),
            session.end_time.format("%H:%M:%S"),
            session.duration_minutes,
            session.energy_kwh,
            session.peak_power_w,
            session.avg_voltage_v,
            session.avg_current_a,
        ));
    }
    out
}

fn render_table(title: &str, rows: &[CompletedSession]) -> String {
    let mut body = String::new();
    for session in rows {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td>{:.3}</td><td>{:.0}</td><td>{:.1}</td><td>{:.1}</td><td>{}</td></tr>",
            session.start_time.format("%Y-%m-%d"),
            session.station_id,
            session.connector_id,
            session.start_time.format("%H:%M:%S"),
            session.end_time.format("%H:%M:%S"),
            session.duration_minutes,
            session.energy_kwh,
            session.peak_power_w,
            session.avg_voltage_v,
            session.avg_current_a,
            session.reason.as_str(),
        ));
    }
    format!(
        "<!doctype html><html><head><title>{title}</title></head><body>\
         <h1>{title}</h1><table border=\"1\"><tr>\
         <th>Date</th><th>Station</th><th>Port</th><th>Start Time</th><th>End Time</th>\
         <th>Duration (min)</th><th>Energy (kWh)</th><th>Max Power (W)</th>\
         <th>Avg Voltage (V)</th><th>Avg Current (A)</th><th>Reason</th>\
         </tr>{body}</table></body></html>"
    )
}
