//! OCPP 1.6J protocol implementation
//!
//! Framing, meter-sample parsing, the per-station connection handler and the
//! action dispatcher. The wire format is JSON arrays over WebSocket text
//! frames as defined by the OCPP-J transport specification.

pub mod connection;
pub mod dispatch;
pub mod frame;
pub mod meter;

pub use frame::Frame;
pub use meter::MeterReading;
