// Media processing stages
//
// Each stage shells out (without a shell) to an external binary:
// - AudioExtractor: video -> canonical WAV (ffmpeg)
// - SubtitleBurner: video + SRT -> MP4 with burned-in subtitles (ffmpeg)
// - ThumbnailCapturer: video -> JPEG still (ffmpeg)
// - Transcriber (crate::transcribe): WAV -> SRT (whisper)
//
// MediaToolkit bundles them behind the MediaTool trait the workflow talks to.

pub mod audio;
pub mod burner;
pub mod commands;
pub mod thumbnail;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use audio::AudioExtractor;
pub use burner::{SubtitleBurner, normalize_to_utf8, subtitle_filter};
pub use commands::*;
pub use thumbnail::ThumbnailCapturer;

use crate::config::Config;
use crate::error::Result;
use crate::process::{ProcessRunner, RunOptions};
use crate::transcribe::{TranscriptOutcome, Transcriber};

/// The external capabilities the pipeline is built from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Extract canonical WAV audio from a video into `output_dir`
    async fn extract_audio(&self, video_path: &Path, output_dir: &Path) -> Result<PathBuf>;

    /// Transcribe a canonical WAV into `<stem>.srt` inside `output_dir`
    async fn transcribe(&self, audio_path: &Path, output_dir: &Path) -> Result<TranscriptOutcome>;

    /// Burn subtitles into a video, writing the result into `output_dir`
    async fn burn_subtitles(&self, video_path: &Path, subtitle_path: &Path, output_dir: &Path) -> Result<PathBuf>;

    /// Capture a still frame of a video into `output_dir`
    async fn capture_thumbnail(&self, video_path: &Path, output_dir: &Path) -> Result<PathBuf>;
}

/// Process-backed implementation of [`MediaTool`]
#[derive(Debug, Clone)]
pub struct MediaToolkit {
    extractor: AudioExtractor,
    transcriber: Transcriber,
    burner: SubtitleBurner,
    thumbnails: ThumbnailCapturer,
    config: Config,
    runner: ProcessRunner,
}

impl MediaToolkit {
    pub fn new(config: Config) -> Self {
        let runner = ProcessRunner::new();
        Self {
            extractor: AudioExtractor::new(config.media.clone(), runner.clone()),
            transcriber: Transcriber::new(config.transcriber.clone(), runner.clone()),
            burner: SubtitleBurner::new(config.media.clone(), runner.clone()),
            thumbnails: ThumbnailCapturer::new(config.media.clone(), runner.clone()),
            config,
            runner,
        }
    }

    /// First line of `ffmpeg -version`
    pub async fn encoder_version(&self) -> Result<String> {
        let output = MediaCommandBuilder::new(&self.config.media.binary_path)
            .version_check()
            .execute(&self.runner)
            .await?;
        Ok(first_line(&output.stdout))
    }

    /// First line of the recognizer's `--help` output
    pub async fn recognizer_version(&self) -> Result<String> {
        let output = self
            .runner
            .run(
                &self.config.transcriber.binary_path,
                &["--help".to_string()],
                RunOptions::labeled("Recognizer check"),
            )
            .await?;
        let text = if output.stdout.trim().is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(first_line(&text))
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("Unknown version")
        .to_string()
}

#[async_trait]
impl MediaTool for MediaToolkit {
    async fn extract_audio(&self, video_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        self.extractor.extract(video_path, output_dir).await
    }

    async fn transcribe(&self, audio_path: &Path, output_dir: &Path) -> Result<TranscriptOutcome> {
        self.transcriber.transcribe(audio_path, output_dir).await
    }

    async fn burn_subtitles(&self, video_path: &Path, subtitle_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        self.burner.burn(video_path, subtitle_path, output_dir).await
    }

    async fn capture_thumbnail(&self, video_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        self.thumbnails.capture(video_path, output_dir).await
    }
}

/// Factory for creating media tool instances
pub struct MediaToolFactory;

impl MediaToolFactory {
    /// Create the default process-backed tool (ffmpeg + whisper)
    pub fn create_tool(config: Config) -> Arc<dyn MediaTool> {
        Arc::new(MediaToolkit::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line_skips_blank_lines() {
        assert_eq!(first_line("\n  ffmpeg version 6.1\nbuilt with gcc"), "ffmpeg version 6.1");
        assert_eq!(first_line(""), "Unknown version");
    }
}
