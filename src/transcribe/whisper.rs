use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tracing::{info, warn};

use crate::config::TranscriberConfig;
use crate::error::{Result, SubcastError};
use crate::process::{ProcessRunner, RunOptions};
use crate::storage::{ScratchPath, stem_of, unique_token};
use crate::subtitle::SubtitleDocument;
use super::{OutputCandidates, TranscriptOutcome, plain_text_from_stdout};

/// Runs the whisper command line recognizer to produce SubRip subtitles
#[derive(Debug, Clone)]
pub struct Transcriber {
    config: TranscriberConfig,
    runner: ProcessRunner,
}

impl Transcriber {
    pub fn new(config: TranscriberConfig, runner: ProcessRunner) -> Self {
        Self { config, runner }
    }

    /// Recognizer arguments for `audio_path`, writing into `output_dir`
    pub fn build_args(&self, audio_path: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            audio_path.to_string_lossy().to_string(),
            "--model".to_string(),
            self.config.model.clone(),
            "--language".to_string(),
            self.config.language.clone(),
            "--output_format".to_string(),
            "srt".to_string(),
            "--output_dir".to_string(),
            output_dir.to_string_lossy().to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    /// Transcribe `audio_path` into `<output_dir>/<stem>.srt`.
    ///
    /// The recognizer runs on a uniquely named copy of the WAV, which is
    /// deleted afterwards whatever the outcome.
    pub async fn transcribe(&self, audio_path: &Path, output_dir: &Path) -> Result<TranscriptOutcome> {
        if !fs::try_exists(audio_path).await.unwrap_or(false) {
            return Err(SubcastError::InputNotFound(audio_path.to_path_buf()));
        }
        fs::create_dir_all(output_dir).await?;

        let stem = stem_of(audio_path);
        let canonical = output_dir.join(format!("{}.srt", stem));
        let working_copy = ScratchPath::new(output_dir.join(format!("{}_{}.wav", stem, unique_token())));
        fs::copy(audio_path, working_copy.path()).await?;

        self.transcribe_copy(working_copy.path(), output_dir, &canonical).await
    }

    async fn transcribe_copy(&self, working_copy: &Path, output_dir: &Path, canonical: &Path) -> Result<TranscriptOutcome> {
        info!("Transcribing {} ({})", working_copy.display(), self.config.language);

        let output = self
            .runner
            .run(
                &self.config.binary_path,
                &self.build_args(working_copy, output_dir),
                RunOptions::labeled("Transcription").timeout(self.config.timeout()),
            )
            .await?;

        let candidates = OutputCandidates::for_audio(working_copy, output_dir, &self.config.language);
        if let Some(found) = candidates.find_existing().await {
            fs::rename(&found, canonical).await?;
            info!("Transcription written to {}", canonical.display());
            return Ok(TranscriptOutcome::Recognized(canonical.to_path_buf()));
        }

        let Some(text) = plain_text_from_stdout(&output.stdout) else {
            return Err(SubcastError::TranscriptionFailed(format!(
                "no subtitle file among {:?} and no text on stdout",
                candidates.paths()
            )));
        };

        warn!(
            "No subtitle file from recognizer, synthesizing a single {}s cue from stdout",
            self.config.fallback_cue_secs
        );
        let mut document = SubtitleDocument::new();
        document.push(
            Duration::ZERO,
            Duration::from_secs(self.config.fallback_cue_secs.max(1)),
            text,
        )?;
        document.write_to(canonical).await?;

        Ok(TranscriptOutcome::Synthesized(canonical.to_path_buf()))
    }
}
