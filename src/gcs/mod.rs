//! # Ground Control Station Client
//!
//! HTTP client for the ground-station file service.
//!
//! This module handles:
//! - Uploading captured images as multipart form data (`POST /upload`)
//! - Listing files held by the service (`GET /files`)
//! - Fetching a file by name (`GET /files/{name}`), e.g. a finished
//!   orthophoto
//!
//! The service itself is an external collaborator; only the client side
//! lives here. Directory uploads are best-effort per file so one bad image
//! never blocks the rest of a mission's captures.

use crate::error::{AeromapError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Response body of `GET /files`
#[derive(Debug, Deserialize)]
struct FileListing {
    files: Vec<String>,
}

/// Client for the ground-station file service.
pub struct GcsClient {
    client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for GcsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GcsClient {
    /// Creates a client for the service at `base_url`
    /// (e.g. `http://127.0.0.1:5000`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/upload", self.base_url)
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.base_url)
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/files/{}", self.base_url, name)
    }

    /// Uploads one file as the multipart form field `file`.
    ///
    /// # Errors
    ///
    /// Returns [`AeromapError::Upload`] when the server rejects the file and
    /// [`AeromapError::Http`] on transport failures.
    pub async fn upload(&self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AeromapError::Upload(format!("invalid file name: {}", path.display()))
            })?
            .to_string();

        let bytes = tokio::fs::read(path).await?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AeromapError::Upload(format!(
                "server returned {} for {}",
                response.status(),
                name
            )));
        }

        info!("Uploaded {}", name);
        Ok(())
    }

    /// Uploads every regular file in `dir`, best-effort.
    ///
    /// Failures are logged per file and skipped; returns how many files were
    /// uploaded successfully.
    pub async fn upload_directory(&self, dir: &Path) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut uploaded = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match self.upload(&path).await {
                Ok(()) => uploaded += 1,
                Err(err) => warn!("Skipping {}: {}", path.display(), err),
            }
        }

        info!("Uploaded {} file(s) from {}", uploaded, dir.display());
        Ok(uploaded)
    }

    /// Lists the files currently held by the service.
    pub async fn list_files(&self) -> Result<Vec<String>> {
        let listing: FileListing = self
            .client
            .get(self.files_url())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(listing.files)
    }

    /// Fetches `name` from the service into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`AeromapError::Download`] when the server does not hold the
    /// file.
    pub async fn fetch(&self, name: &str, output_dir: &Path) -> Result<PathBuf> {
        let response = self.client.get(self.file_url(name)).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AeromapError::Download(format!(
                "{} not found on server",
                name
            )));
        }
        let bytes = response.error_for_status()?.bytes().await?;

        let path = output_dir.join(name);
        tokio::fs::write(&path, &bytes).await?;
        info!("Fetched {} ({} bytes)", name, bytes.len());
        Ok(path)
    }
}
