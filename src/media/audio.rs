use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use crate::config::MediaConfig;
use crate::error::{Result, SubcastError};
use crate::process::ProcessRunner;
use crate::storage::{ScratchPath, is_non_empty_file, stem_of, unique_token};
use super::MediaCommandBuilder;

/// Pulls the audio track out of a video as canonical mono 16 kHz PCM WAV
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
    runner: ProcessRunner,
}

impl AudioExtractor {
    pub fn new(config: MediaConfig, runner: ProcessRunner) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);
        Self {
            config,
            command_builder,
            runner,
        }
    }

    /// Extract audio from `video_path` into `output_dir`, returning the WAV path.
    ///
    /// The file is named `<stem>_<token>.wav` so concurrent jobs on the same
    /// basename never collide.
    pub async fn extract(&self, video_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        if !fs::try_exists(video_path).await.unwrap_or(false) {
            return Err(SubcastError::InputNotFound(video_path.to_path_buf()));
        }
        fs::create_dir_all(output_dir).await?;

        let audio_path = ScratchPath::new(output_dir.join(format!("{}_{}.wav", stem_of(video_path), unique_token())));
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.path().display());

        let command = self
            .command_builder
            .extract_audio(video_path, audio_path.path())
            .timeout(self.config.timeout());

        let outcome = match command.execute(&self.runner).await {
            Ok(_) if is_non_empty_file(audio_path.path()).await => Ok(()),
            Ok(_) => Err(SubcastError::OutputMissingOrEmpty(audio_path.path().to_path_buf())),
            Err(e) => Err(e),
        };

        // Dropping the guard removes any partial output
        outcome.map_err(|e| SubcastError::ExtractionFailed(Box::new(e)))?;
        let path = audio_path.keep();
        info!("Audio extraction completed: {}", path.display());
        Ok(path)
    }
}
