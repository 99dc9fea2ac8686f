//! # Simulated Camera
//!
//! Stand-in camera for SITL runs and tests.
//!
//! Preserves the external driver contract exactly: each `capture` hands out
//! one new media handle, each `download` materializes one file in the
//! capture directory, and downloads never touch the shutter. When a sample
//! image is supplied it is copied verbatim; otherwise a small placeholder is
//! written so runs work without any asset on disk.

use crate::camera::driver::{image_file_name, CameraDriver, CaptureHandle, CapturedImage};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Simulated camera driver.
#[derive(Debug)]
pub struct SimulatedCamera {
    /// Sample image copied for every capture, when it exists
    sample_image: Option<PathBuf>,
    /// Shutter actuations so far; also names the simulated media files
    shutter_count: u64,
}

impl SimulatedCamera {
    /// Creates a simulated camera.
    ///
    /// # Arguments
    ///
    /// * `sample_image` - Image to copy on download; `None` (or a missing
    ///   file) falls back to placeholder content
    #[must_use]
    pub fn new(sample_image: Option<PathBuf>) -> Self {
        Self {
            sample_image,
            shutter_count: 0,
        }
    }

    /// Number of shutter actuations so far.
    #[must_use]
    pub fn shutter_count(&self) -> u64 {
        self.shutter_count
    }
}

#[async_trait]
impl CameraDriver for SimulatedCamera {
    async fn capture(&mut self) -> Result<CaptureHandle> {
        self.shutter_count += 1;
        let handle = CaptureHandle {
            directory: "100GOPRO".to_string(),
            filename: format!("GOPR{:04}.JPG", self.shutter_count),
        };
        debug!("(Simulated) shutter fired, media {}", handle.filename);
        Ok(handle)
    }

    async fn download(
        &mut self,
        handle: &CaptureHandle,
        output_dir: &Path,
        sequence_number: u64,
    ) -> Result<CapturedImage> {
        let captured_at = Utc::now();
        let path = output_dir.join(image_file_name(
            sequence_number,
            &captured_at,
            &handle.extension(),
        ));

        match &self.sample_image {
            Some(sample) if sample.exists() => {
                tokio::fs::copy(sample, &path).await?;
            }
            _ => {
                let contents = format!("simulated image of {}\n", handle.filename);
                tokio::fs::write(&path, contents).await?;
            }
        }

        info!("(Simulated) saved {} to {}", handle.filename, path.display());
        Ok(CapturedImage {
            path,
            captured_at,
            sequence_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_capture_then_download_produces_one_file() {
        let dir = tempdir().unwrap();
        let mut camera = SimulatedCamera::new(None);

        let handle = camera.capture().await.unwrap();
        let image = camera.download(&handle, dir.path(), 1).await.unwrap();

        assert!(image.path.exists());
        assert_eq!(image.sequence_number, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_download_is_idempotent_and_does_not_refire_shutter() {
        let dir = tempdir().unwrap();
        let mut camera = SimulatedCamera::new(None);

        let handle = camera.capture().await.unwrap();
        assert_eq!(camera.shutter_count(), 1);

        let first = camera.download(&handle, dir.path(), 1).await.unwrap();
        let second = camera.download(&handle, dir.path(), 1).await.unwrap();

        // Same handle, same content, shutter untouched.
        let first_bytes = std::fs::read(&first.path).unwrap();
        let second_bytes = std::fs::read(&second.path).unwrap();
        assert_eq!(first_bytes, second_bytes);
        assert_eq!(camera.shutter_count(), 1);
    }

    #[tokio::test]
    async fn test_download_copies_sample_image_when_present() {
        let dir = tempdir().unwrap();
        let sample = dir.path().join("sample.jpg");
        std::fs::write(&sample, b"not really a jpeg").unwrap();

        let mut camera = SimulatedCamera::new(Some(sample.clone()));
        let handle = camera.capture().await.unwrap();
        let image = camera.download(&handle, dir.path(), 3).await.unwrap();

        assert_eq!(std::fs::read(&image.path).unwrap(), b"not really a jpeg");
    }

    #[tokio::test]
    async fn test_missing_sample_image_falls_back_to_placeholder() {
        let dir = tempdir().unwrap();
        let mut camera = SimulatedCamera::new(Some(PathBuf::from("/nonexistent/sample.jpg")));

        let handle = camera.capture().await.unwrap();
        let image = camera.download(&handle, dir.path(), 1).await.unwrap();

        let contents = std::fs::read_to_string(&image.path).unwrap();
        assert!(contents.contains(&handle.filename));
    }

    #[tokio::test]
    async fn test_each_capture_yields_a_distinct_handle() {
        let mut camera = SimulatedCamera::new(None);
        let first = camera.capture().await.unwrap();
        let second = camera.capture().await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_file_names_are_sequence_prefixed() {
        let dir = tempdir().unwrap();
        let mut camera = SimulatedCamera::new(None);

        let handle = camera.capture().await.unwrap();
        let image = camera.download(&handle, dir.path(), 42).await.unwrap();

        let name = image.path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("image_0042_"), "unexpected name {}", name);
        assert!(name.ends_with(".jpg"));
    }
}
