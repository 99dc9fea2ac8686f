//! # Aeromap Library
//!
//! Mission-triggered aerial image capture and orthophoto mapping for
//! MAVLink drones.
//!
//! This library watches flight-controller telemetry during an autonomous
//! mission, fires a camera each time the aircraft enters AUTO mode, stores
//! the resulting images locally, pushes them to a ground-station file
//! service, and hands the image set to a containerized orthophoto
//! reconstruction tool.

pub mod camera;
pub mod config;
pub mod error;
pub mod gcs;
pub mod mapping;
pub mod session;
pub mod telemetry;
pub mod trigger;
