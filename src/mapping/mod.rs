//! # Mapping Module
//!
//! Invokes the containerized orthophoto reconstruction tool (ODM) against a
//! directory of captured images.
//!
//! The tool is a black-box batch job: given the project's `images/`
//! directory under the dataset root, it produces an orthophoto artifact in
//! the project path. No progress reporting is consumed; only the exit
//! status matters.

use crate::config::MappingConfig;
use crate::error::{AeromapError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// One orthophoto reconstruction run.
///
/// Expects the dataset layout ODM consumes: images under
/// `{dataset_root}/{project_name}/images`, outputs written next to them.
#[derive(Debug, Clone)]
pub struct MappingJob {
    docker_image: String,
    dataset_root: PathBuf,
    project_name: String,
    orthophoto_resolution: f64,
    min_num_features: u32,
    fast_orthophoto: bool,
    skip_report: bool,
}

impl MappingJob {
    /// Builds a job from the mapping configuration section.
    #[must_use]
    pub fn from_config(config: &MappingConfig) -> Self {
        Self {
            docker_image: config.docker_image.clone(),
            dataset_root: PathBuf::from(&config.dataset_root),
            project_name: config.project_name.clone(),
            orthophoto_resolution: config.orthophoto_resolution,
            min_num_features: config.min_num_features,
            fast_orthophoto: config.fast_orthophoto,
            skip_report: config.skip_report,
        }
    }

    /// The `docker` argument vector this job will run.
    ///
    /// The dataset root is bind-mounted into the container and passed as the
    /// project path, so image input and orthophoto output both live under it
    /// on the host.
    #[must_use]
    pub fn command_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/datasets", self.dataset_root.display()),
            self.docker_image.clone(),
            "--project-path".to_string(),
            "/datasets".to_string(),
            self.project_name.clone(),
        ];

        if self.fast_orthophoto {
            args.push("--fast-orthophoto".to_string());
        }
        args.push("--orthophoto-resolution".to_string());
        args.push(self.orthophoto_resolution.to_string());
        args.push("--min-num-features".to_string());
        args.push(self.min_num_features.to_string());
        if self.skip_report {
            args.push("--skip-report".to_string());
        }

        args
    }

    /// Directory the job reads images from.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.dataset_root.join(&self.project_name).join("images")
    }

    /// Where the finished orthophoto lands on the host.
    #[must_use]
    pub fn orthophoto_path(&self) -> PathBuf {
        self.dataset_root
            .join(&self.project_name)
            .join("odm_orthophoto")
            .join("odm_orthophoto.tif")
    }

    /// Copies captured images into the dataset layout the tool expects.
    ///
    /// Returns the number of images staged.
    pub async fn stage_images(&self, capture_dir: &Path) -> Result<usize> {
        let images_dir = self.images_dir();
        tokio::fs::create_dir_all(&images_dir).await?;

        let mut entries = tokio::fs::read_dir(capture_dir).await?;
        let mut staged = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name() {
                tokio::fs::copy(&path, images_dir.join(name)).await?;
                staged += 1;
            }
        }

        info!("Staged {} image(s) into {}", staged, images_dir.display());
        Ok(staged)
    }

    /// Runs the containerized job to completion.
    ///
    /// # Errors
    ///
    /// Returns [`AeromapError::Mapping`] when the container exits non-zero
    /// and [`AeromapError::Io`] when `docker` cannot be spawned.
    pub async fn run(&self) -> Result<()> {
        let args = self.command_args();
        info!("Starting mapping job: docker {}", args.join(" "));

        let status = tokio::process::Command::new("docker")
            .args(&args)
            .status()
            .await?;

        if !status.success() {
            return Err(AeromapError::Mapping(format!(
                "docker exited with {}",
                status
            )));
        }

        info!(
            "Mapping job finished; orthophoto at {}",
            self.orthophoto_path().display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> MappingJob {
        MappingJob {
            docker_image: "opendronemap/odm".to_string(),
            dataset_root: PathBuf::from("datasets"),
            project_name: "project".to_string(),
            orthophoto_resolution: 5.0,
            min_num_features: 10000,
            fast_orthophoto: true,
            skip_report: true,
        }
    }

    #[test]
    fn test_command_args_with_all_flags() {
        assert_eq!(
            job().command_args(),
            vec![
                "run",
                "--rm",
                "-v",
                "datasets:/datasets",
                "opendronemap/odm",
                "--project-path",
                "/datasets",
                "project",
                "--fast-orthophoto",
                "--orthophoto-resolution",
                "5",
                "--min-num-features",
                "10000",
                "--skip-report",
            ]
        );
    }

    #[test]
    fn test_command_args_without_optional_flags() {
        let mut job = job();
        job.fast_orthophoto = false;
        job.skip_report = false;

        let args = job.command_args();
        assert!(!args.contains(&"--fast-orthophoto".to_string()));
        assert!(!args.contains(&"--skip-report".to_string()));
        assert!(args.contains(&"--orthophoto-resolution".to_string()));
    }

    #[test]
    fn test_fractional_resolution_is_rendered() {
        let mut job = job();
        job.orthophoto_resolution = 2.5;
        let args = job.command_args();
        let index = args
            .iter()
            .position(|a| a == "--orthophoto-resolution")
            .unwrap();
        assert_eq!(args[index + 1], "2.5");
    }

    #[test]
    fn test_dataset_paths() {
        let job = job();
        assert_eq!(job.images_dir(), PathBuf::from("datasets/project/images"));
        assert_eq!(
            job.orthophoto_path(),
            PathBuf::from("datasets/project/odm_orthophoto/odm_orthophoto.tif")
        );
    }

    #[tokio::test]
    async fn test_stage_images_copies_only_files() {
        let capture = tempfile::tempdir().unwrap();
        let dataset = tempfile::tempdir().unwrap();

        std::fs::write(capture.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(capture.path().join("b.jpg"), b"b").unwrap();
        std::fs::create_dir(capture.path().join("subdir")).unwrap();

        let mut job = job();
        job.dataset_root = dataset.path().to_path_buf();

        let staged = job.stage_images(capture.path()).await.unwrap();
        assert_eq!(staged, 2);
        assert!(job.images_dir().join("a.jpg").exists());
        assert!(job.images_dir().join("b.jpg").exists());
    }
}
