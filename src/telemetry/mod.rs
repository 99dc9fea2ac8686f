//! # Telemetry Module
//!
//! Flight-controller telemetry over MAVLink.
//!
//! This module handles:
//! - Connecting to a flight controller (serial) or SITL simulator (TCP)
//! - Waiting for the initial heartbeat before a session may start
//! - Decoding HEARTBEAT and GLOBAL_POSITION_INT into telemetry snapshots
//! - Exposing the latest flight mode and position as non-blocking polled state
//!
//! MAVLink frame decoding itself is delegated to the `mavlink` crate; this
//! module only interprets the decoded messages.

pub mod snapshot;
pub mod watcher;

pub use snapshot::{FlightMode, Position, TelemetrySnapshot};
pub use watcher::{ConnectionDescriptor, TelemetrySource, TelemetryWatcher};
