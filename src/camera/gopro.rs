//! # Wired GoPro Driver
//!
//! Controls a USB-connected GoPro through the Open GoPro wired HTTP API.
//!
//! Capture follows the wired flow: snapshot the media list, fire the
//! shutter, then poll the media list until the new item shows up. The
//! difference between the two lists identifies the photo that was just
//! taken, which `download` then pulls from the camera's DCIM tree.

use crate::camera::driver::{image_file_name, CameraDriver, CaptureHandle, CapturedImage};
use crate::error::{AeromapError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Media list response from `/gopro/media/list`
#[derive(Debug, Deserialize)]
struct MediaList {
    #[serde(default)]
    media: Vec<MediaDirectory>,
}

/// One DCIM directory on the camera
#[derive(Debug, Deserialize)]
struct MediaDirectory {
    /// Directory name (e.g. `100GOPRO`)
    d: String,
    /// Files in the directory
    #[serde(default)]
    fs: Vec<MediaItem>,
}

/// One media file entry
#[derive(Debug, Deserialize)]
struct MediaItem {
    /// File name (e.g. `GOPR0042.JPG`)
    n: String,
}

/// Wired GoPro camera driver.
pub struct GoProCamera {
    client: reqwest::Client,
    base_url: String,
    media_poll_attempts: u32,
    media_poll_interval: Duration,
}

impl std::fmt::Debug for GoProCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoProCamera")
            .field("base_url", &self.base_url)
            .field("media_poll_attempts", &self.media_poll_attempts)
            .finish_non_exhaustive()
    }
}

impl GoProCamera {
    /// Creates a driver for the camera reachable at `base_url`
    /// (e.g. `http://172.24.106.51:8080` for the wired interface).
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root of the wired Open GoPro API
    /// * `request_timeout` - Per-request HTTP timeout
    /// * `media_poll_attempts` - How many media-list polls to make after the
    ///   shutter before giving up
    /// * `media_poll_interval` - Delay between media-list polls
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        media_poll_attempts: u32,
        media_poll_interval: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            media_poll_attempts,
            media_poll_interval,
        })
    }

    fn media_list_url(&self) -> String {
        format!("{}/gopro/media/list", self.base_url)
    }

    fn shutter_url(&self) -> String {
        format!("{}/gopro/camera/shutter/start", self.base_url)
    }

    fn download_url(&self, handle: &CaptureHandle) -> String {
        format!(
            "{}/videos/DCIM/{}/{}",
            self.base_url, handle.directory, handle.filename
        )
    }

    /// Fetches the camera media list as a set of (directory, file) pairs.
    async fn media_set(&self) -> Result<HashSet<(String, String)>> {
        let list: MediaList = self
            .client
            .get(self.media_list_url())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut set = HashSet::new();
        for directory in list.media {
            for item in directory.fs {
                set.insert((directory.d.clone(), item.n));
            }
        }
        Ok(set)
    }
}

#[async_trait]
impl CameraDriver for GoProCamera {
    async fn capture(&mut self) -> Result<CaptureHandle> {
        let before = self.media_set().await?;

        debug!("Firing GoPro shutter");
        self.client
            .get(self.shutter_url())
            .send()
            .await
            .map_err(|e| AeromapError::CaptureTimeout(format!("shutter command: {}", e)))?
            .error_for_status()
            .map_err(|e| AeromapError::Camera(format!("shutter rejected: {}", e)))?;

        // The new photo appears in the media list once the camera has
        // finished writing it; poll until it does.
        for attempt in 1..=self.media_poll_attempts {
            tokio::time::sleep(self.media_poll_interval).await;
            let after = self.media_set().await?;
            if let Some((directory, filename)) = after.difference(&before).next().cloned() {
                info!("Camera acknowledged new media {}/{}", directory, filename);
                return Ok(CaptureHandle {
                    directory,
                    filename,
                });
            }
            debug!(
                "No new media yet (poll {}/{})",
                attempt, self.media_poll_attempts
            );
        }

        Err(AeromapError::CaptureTimeout(format!(
            "no new media item after {} polls",
            self.media_poll_attempts
        )))
    }

    async fn download(
        &mut self,
        handle: &CaptureHandle,
        output_dir: &Path,
        sequence_number: u64,
    ) -> Result<CapturedImage> {
        let url = self.download_url(handle);
        debug!("Downloading {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AeromapError::Download(format!("{}: {}", handle.filename, e)))?
            .error_for_status()
            .map_err(|e| AeromapError::Download(format!("{}: {}", handle.filename, e)))?;

        let bytes: Bytes = response
            .bytes()
            .await
            .map_err(|e| AeromapError::Download(format!("{}: transfer interrupted: {}", handle.filename, e)))?;

        let captured_at = Utc::now();
        let path = output_dir.join(image_file_name(
            sequence_number,
            &captured_at,
            &handle.extension(),
        ));
        tokio::fs::write(&path, &bytes).await?;

        info!(
            "Saved {} ({} bytes) to {}",
            handle.filename,
            bytes.len(),
            path.display()
        );
        Ok(CapturedImage {
            path,
            captured_at,
            sequence_number,
        })
    }
}
