//! Camera driver contract shared by hardware and simulated cameras.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Reference to one image held on the camera after a successful capture.
///
/// A handle identifies media on the device, not local bytes: downloading it
/// is safe to repeat and never re-fires the shutter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHandle {
    /// Media directory on the camera (e.g. `100GOPRO`)
    pub directory: String,
    /// File name on the camera (e.g. `GOPR0042.JPG`)
    pub filename: String,
}

impl CaptureHandle {
    /// File extension of the camera-side media, lowercased; `jpg` when the
    /// name carries none.
    #[must_use]
    pub fn extension(&self) -> String {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string())
    }
}

/// One image retrieved into the local capture directory.
///
/// Owned by that directory until an external uploader or archiver takes it;
/// capture files are only ever added, never overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    /// Where the image landed locally
    pub path: PathBuf,
    /// When the download completed
    pub captured_at: DateTime<Utc>,
    /// Capture-event sequence number this image belongs to
    pub sequence_number: u64,
}

/// Capture-capable camera, wired or simulated.
///
/// Hides the transport (USB/network HTTP vs. filesystem copy) so the session
/// orchestrator stays transport-agnostic: every `capture` + `download` pair
/// produces exactly one new file in the capture directory.
#[async_trait]
pub trait CameraDriver: Send {
    /// Issues the shutter command and waits for the device to acknowledge a
    /// new media item.
    ///
    /// # Errors
    ///
    /// Returns [`AeromapError::CaptureTimeout`](crate::error::AeromapError::CaptureTimeout)
    /// if no acknowledgement arrives within the bounded wait.
    async fn capture(&mut self) -> Result<CaptureHandle>;

    /// Retrieves the image referenced by `handle` into `output_dir`.
    ///
    /// Idempotent per handle: repeating the call fetches the same content
    /// again without touching the shutter.
    ///
    /// # Errors
    ///
    /// Returns [`AeromapError::Download`](crate::error::AeromapError::Download)
    /// if the transfer is interrupted.
    async fn download(
        &mut self,
        handle: &CaptureHandle,
        output_dir: &Path,
        sequence_number: u64,
    ) -> Result<CapturedImage>;
}

/// Deterministic local file name for a captured image.
///
/// Sequence number plus timestamp keeps names collision-free across a
/// session while staying sortable in capture order.
///
/// # Examples
///
/// ```
/// use aeromap::camera::image_file_name;
/// use chrono::{TimeZone, Utc};
///
/// let captured_at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 45).unwrap();
/// assert_eq!(
///     image_file_name(7, &captured_at, "jpg"),
///     "image_0007_20250601_123045.jpg"
/// );
/// ```
#[must_use]
pub fn image_file_name(
    sequence_number: u64,
    captured_at: &DateTime<Utc>,
    extension: &str,
) -> String {
    format!(
        "image_{:04}_{}.{}",
        sequence_number,
        captured_at.format("%Y%m%d_%H%M%S"),
        extension
    )
}
