use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use crate::config::MediaConfig;
use crate::error::{Result, SubcastError};
use crate::process::ProcessRunner;
use crate::storage::{is_non_empty_file, stem_of};
use super::MediaCommandBuilder;

#[derive(Debug, Clone)]
pub struct ThumbnailCapturer {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
    runner: ProcessRunner,
}

impl ThumbnailCapturer {
    pub fn new(config: MediaConfig, runner: ProcessRunner) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);
        Self {
            config,
            command_builder,
            runner,
        }
    }

    /// Write one JPEG frame of `video_path` to `<output_dir>/<stem>.jpg`
    pub async fn capture(&self, video_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        if !fs::try_exists(video_path).await.unwrap_or(false) {
            return Err(SubcastError::InputNotFound(video_path.to_path_buf()));
        }
        fs::create_dir_all(output_dir).await?;

        let image_path = output_dir.join(format!("{}.jpg", stem_of(video_path)));
        self.command_builder
            .thumbnail(video_path, &image_path, self.config.thumbnail_offset_secs)
            .timeout(self.config.timeout())
            .execute(&self.runner)
            .await?;

        if !is_non_empty_file(&image_path).await {
            return Err(SubcastError::OutputMissingOrEmpty(image_path));
        }

        info!("Thumbnail written to {}", image_path.display());
        Ok(image_path)
    }
}
