//! # Camera Module
//!
//! Capture-capable camera adapters behind one driver contract.
//!
//! This module handles:
//! - The [`CameraDriver`] seam the session orchestrator captures through
//! - Wired GoPro control via the Open GoPro HTTP API
//! - A simulator with the identical contract for SITL runs and tests
//! - Deterministic image naming in the local capture directory

pub mod driver;
pub mod gopro;
pub mod sim;

pub use driver::{image_file_name, CameraDriver, CaptureHandle, CapturedImage};
pub use gopro::GoProCamera;
pub use sim::SimulatedCamera;
