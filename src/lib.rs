//! # Ampere - OCPP 1.6J Central System
//!
//! A central-system endpoint for EV charge points speaking OCPP 1.6J over
//! WebSocket. Stations connect to `/ocpp16/<stationId>`, announce themselves
//! with BootNotification, heartbeat periodically and stream meter samples
//! while a vehicle charges. Ampere answers the protocol, tracks live
//! per-station and per-connector state, detects stations that silently
//! disappear and retains a bounded history of completed charging sessions.
//!
//! ## Features
//!
//! - **Async-first**: one Tokio task per station connection plus two
//!   independent liveness sweeps
//! - **Protocol tolerant**: malformed frames, unknown actions and racy
//!   StopTransactions never tear a connection down
//! - **Auto-recovery**: orphan MeterValues synthesize a session so stations
//!   that were charging before a restart keep reporting
//! - **Web Interface**: REST read APIs, operator command endpoint, history
//!   view with CSV export
//! - **Bridge**: optional fire-and-forget webhook mirroring lifecycle and
//!   telemetry events
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of
//! concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `ocpp`: Wire framing, meter parsing, connection handling and dispatch
//! - `registry`: Station records and connection handles
//! - `session`: Active transactions and the completed-session ring
//! - `sweeps`: Heartbeat-timeout and ghost-power supervision
//! - `activity`: Operator-facing activity ring
//! - `bridge`: Outbound webhook client
//! - `web`: HTTP server, query APIs and history surfaces

pub mod activity;
pub mod bridge;
pub mod config;
pub mod error;
pub mod hub;
pub mod logging;
pub mod ocpp;
pub mod registry;
pub mod session;
pub mod sweeps;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{AmpereError, Result};
pub use hub::Hub;
