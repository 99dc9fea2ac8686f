//! # Error Types
//!
//! Custom error types for Aeromap using `thiserror`.
//!
//! The taxonomy separates fatal link errors (connect timeout, sustained link
//! loss) from per-capture errors (shutter timeout, interrupted download),
//! which the session loop always recovers from locally.

use thiserror::Error;

/// Main error type for Aeromap
#[derive(Debug, Error)]
pub enum AeromapError {
    /// No heartbeat observed while establishing the flight-controller link.
    /// Fatal to session start.
    #[error("no heartbeat from flight controller within {0:?}")]
    LinkTimeout(std::time::Duration),

    /// Flight-controller link dropped mid-run. Recoverable once; the session
    /// ends when it repeats on consecutive polls.
    #[error("flight-controller link lost")]
    LinkLost,

    /// Malformed flight-link connection descriptor in configuration
    #[error("invalid connection descriptor: {0}")]
    Descriptor(String),

    /// Camera did not acknowledge the shutter within the bounded wait.
    /// Always recovered by the session loop.
    #[error("capture timed out: {0}")]
    CaptureTimeout(String),

    /// Image transfer from the camera was interrupted. Always recovered by
    /// the session loop; `download` may be retried for the same handle.
    #[error("image download failed: {0}")]
    Download(String),

    /// Camera returned an unexpected response
    #[error("camera error: {0}")]
    Camera(String),

    /// Ground-station file upload failures
    #[error("file upload failed: {0}")]
    Upload(String),

    /// Orthophoto mapping job failures
    #[error("mapping job failed: {0}")]
    Mapping(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// HTTP errors from the camera or ground-station APIs
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Aeromap
pub type Result<T> = std::result::Result<T, AeromapError>;
