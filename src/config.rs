//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::telemetry::ConnectionDescriptor;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub gcs: GcsConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
}

/// Flight-controller link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Connection descriptor: `tcp:HOST:PORT` (SITL) or `serial:PATH:BAUD`
    #[serde(default = "default_connection")]
    pub connection: String,

    /// Bounded wait for the first heartbeat on connect
    #[serde(default = "default_heartbeat_timeout_s")]
    pub heartbeat_timeout_s: u64,

    /// Fixed tick interval of the session poll loop
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Camera configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// Use the simulated camera instead of wired hardware
    #[serde(default = "default_simulate")]
    pub simulate: bool,

    /// Root of the wired Open GoPro HTTP API
    #[serde(default = "default_camera_base_url")]
    pub base_url: String,

    /// Per-request HTTP timeout towards the camera
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,

    /// Media-list polls after the shutter before giving up
    #[serde(default = "default_media_poll_attempts")]
    pub media_poll_attempts: u32,

    /// Delay between media-list polls
    #[serde(default = "default_media_poll_interval_ms")]
    pub media_poll_interval_ms: u64,

    /// Sample image the simulator copies (empty = placeholder content)
    #[serde(default)]
    pub sample_image: String,
}

/// Local capture storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Directory captured images are downloaded into
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

/// Ground-station file service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GcsConfig {
    /// Upload captures to the file service after the session
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the file service
    #[serde(default = "default_gcs_base_url")]
    pub base_url: String,

    /// Per-request HTTP timeout towards the service
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Orthophoto mapping job configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MappingConfig {
    /// Run the mapping job after the session
    #[serde(default)]
    pub enabled: bool,

    /// Container image of the reconstruction tool
    #[serde(default = "default_docker_image")]
    pub docker_image: String,

    /// Host directory bind-mounted as the dataset root
    #[serde(default = "default_dataset_root")]
    pub dataset_root: String,

    /// Project directory name under the dataset root
    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Target orthophoto resolution in cm/pixel
    #[serde(default = "default_orthophoto_resolution")]
    pub orthophoto_resolution: f64,

    /// Minimum feature count for reconstruction
    #[serde(default = "default_min_num_features")]
    pub min_num_features: u32,

    /// Select fast-orthophoto mode (skip the full 3D pipeline)
    #[serde(default = "default_true")]
    pub fast_orthophoto: bool,

    /// Skip report generation
    #[serde(default = "default_true")]
    pub skip_report: bool,
}

// Default value functions
fn default_connection() -> String { "tcp:127.0.0.1:5762".to_string() }
fn default_heartbeat_timeout_s() -> u64 { 30 }
fn default_poll_interval_ms() -> u64 { 1000 }

fn default_simulate() -> bool { true }
fn default_camera_base_url() -> String { "http://172.24.106.51:8080".to_string() }
fn default_capture_timeout_ms() -> u64 { 5000 }
fn default_media_poll_attempts() -> u32 { 5 }
fn default_media_poll_interval_ms() -> u64 { 500 }

fn default_output_dir() -> String { "gopro_captures".to_string() }

fn default_gcs_base_url() -> String { "http://127.0.0.1:5000".to_string() }
fn default_request_timeout_ms() -> u64 { 10000 }

fn default_docker_image() -> String { "opendronemap/odm".to_string() }
fn default_dataset_root() -> String { "datasets".to_string() }
fn default_project_name() -> String { "project".to_string() }
fn default_orthophoto_resolution() -> f64 { 5.0 }
fn default_min_num_features() -> u32 { 10000 }
fn default_true() -> bool { true }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            heartbeat_timeout_s: default_heartbeat_timeout_s(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            simulate: default_simulate(),
            base_url: default_camera_base_url(),
            capture_timeout_ms: default_capture_timeout_ms(),
            media_poll_attempts: default_media_poll_attempts(),
            media_poll_interval_ms: default_media_poll_interval_ms(),
            sample_image: String::new(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_gcs_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            docker_image: default_docker_image(),
            dataset_root: default_dataset_root(),
            project_name: default_project_name(),
            orthophoto_resolution: default_orthophoto_resolution(),
            min_num_features: default_min_num_features(),
            fast_orthophoto: true,
            skip_report: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            camera: CameraConfig::default(),
            capture: CaptureConfig::default(),
            gcs: GcsConfig::default(),
            mapping: MappingConfig::default(),
        }
    }
}

impl LinkConfig {
    /// The parsed flight-link connection descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured string is malformed.
    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        ConnectionDescriptor::parse(&self.connection)
    }

    /// Heartbeat wait window as a [`Duration`].
    #[must_use]
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_s)
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use aeromap::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // The descriptor must be parseable before a session can start.
        self.link.descriptor()?;

        if self.link.heartbeat_timeout_s == 0 || self.link.heartbeat_timeout_s > 300 {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("heartbeat_timeout_s must be between 1 and 300"),
            ));
        }

        if self.link.poll_interval_ms == 0 || self.link.poll_interval_ms > 60000 {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("poll_interval_ms must be between 1 and 60000"),
            ));
        }

        if self.camera.capture_timeout_ms == 0 || self.camera.capture_timeout_ms > 60000 {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("capture_timeout_ms must be between 1 and 60000"),
            ));
        }

        if self.camera.media_poll_attempts == 0 {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("media_poll_attempts must be greater than 0"),
            ));
        }

        if self.camera.media_poll_interval_ms == 0 || self.camera.media_poll_interval_ms > 60000 {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("media_poll_interval_ms must be between 1 and 60000"),
            ));
        }

        if !self.camera.simulate && self.camera.base_url.is_empty() {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("camera base_url cannot be empty in hardware mode"),
            ));
        }

        if self.capture.output_dir.is_empty() {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("capture output_dir cannot be empty"),
            ));
        }

        if self.gcs.enabled && self.gcs.base_url.is_empty() {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("gcs base_url cannot be empty when enabled"),
            ));
        }

        if self.gcs.request_timeout_ms == 0 || self.gcs.request_timeout_ms > 60000 {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("request_timeout_ms must be between 1 and 60000"),
            ));
        }

        if self.mapping.enabled {
            if self.mapping.docker_image.is_empty() {
                return Err(crate::error::AeromapError::Config(
                    toml::de::Error::custom("mapping docker_image cannot be empty when enabled"),
                ));
            }
            if self.mapping.dataset_root.is_empty() || self.mapping.project_name.is_empty() {
                return Err(crate::error::AeromapError::Config(
                    toml::de::Error::custom(
                        "mapping dataset_root and project_name cannot be empty when enabled",
                    ),
                ));
            }
        }

        if self.mapping.orthophoto_resolution <= 0.0 {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("orthophoto_resolution must be greater than 0"),
            ));
        }

        if self.mapping.min_num_features == 0 {
            return Err(crate::error::AeromapError::Config(
                toml::de::Error::custom("min_num_features must be greater than 0"),
            ));
        }

        Ok(())
    }
}
