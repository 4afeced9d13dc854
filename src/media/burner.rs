use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::config::MediaConfig;
use crate::error::{Result, SubcastError};
use crate::process::ProcessRunner;
use crate::storage::{ScratchPath, is_non_empty_file, stem_of, unique_token};
use super::MediaCommandBuilder;

/// Name of the normalized subtitle copy inside the isolated temp directory
const STAGED_SUBTITLE_NAME: &str = "subtitles.srt";

/// Burns SubRip subtitles into the picture of a video
#[derive(Debug, Clone)]
pub struct SubtitleBurner {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
    runner: ProcessRunner,
}

impl SubtitleBurner {
    pub fn new(config: MediaConfig, runner: ProcessRunner) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);
        Self {
            config,
            command_builder,
            runner,
        }
    }

    /// Whether the source container is transcoded before burn-in
    pub fn needs_conversion(&self, video_path: &Path) -> bool {
        video_path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| {
                self.config
                    .convert_extensions
                    .iter()
                    .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(&ext))
            })
    }

    /// Burn `subtitle_path` into `video_path`, writing `<stem>_<token>.mp4` to `output_dir`.
    ///
    /// The intermediate container and the staged subtitle directory are
    /// removed whether or not the burn succeeds, and a partial output unless
    /// it does. This also holds when the returned future is dropped.
    pub async fn burn(&self, video_path: &Path, subtitle_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        for input in [video_path, subtitle_path] {
            if !fs::try_exists(input).await.unwrap_or(false) {
                return Err(SubcastError::InputNotFound(input.to_path_buf()));
            }
        }
        fs::create_dir_all(output_dir).await?;

        let stem = stem_of(video_path);
        let token = unique_token();
        let intermediate = self
            .needs_conversion(video_path)
            .then(|| ScratchPath::new(output_dir.join(format!("{}_{}.intermediate.mp4", stem, token))));
        let output = ScratchPath::new(output_dir.join(format!("{}_{}.mp4", stem, token)));

        self.convert_and_burn(
            video_path,
            subtitle_path,
            output_dir,
            intermediate.as_ref().map(ScratchPath::path),
            output.path(),
        )
        .await?;

        let output_path = output.keep();
        info!("Subtitle burn-in completed: {}", output_path.display());
        Ok(output_path)
    }

    async fn convert_and_burn(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_dir: &Path,
        intermediate: Option<&Path>,
        output_path: &Path,
    ) -> Result<()> {
        let source = match intermediate {
            Some(intermediate) => {
                info!("Converting {} to {} before burn-in", video_path.display(), intermediate.display());
                self.command_builder
                    .convert_container(video_path, intermediate, &self.config)
                    .timeout(self.config.timeout())
                    .execute(&self.runner)
                    .await
                    .map_err(|e| SubcastError::ContainerConversionFailed(Box::new(e)))?;
                if !is_non_empty_file(intermediate).await {
                    return Err(SubcastError::ContainerConversionFailed(Box::new(
                        SubcastError::OutputMissingOrEmpty(intermediate.to_path_buf()),
                    )));
                }
                intermediate
            }
            None => video_path,
        };

        let staging = tempfile::Builder::new()
            .prefix(".subtitles-")
            .tempdir_in(output_dir)?;
        let staged_subtitle = staging.path().join(STAGED_SUBTITLE_NAME);
        let raw = fs::read(subtitle_path).await?;
        fs::write(&staged_subtitle, normalize_to_utf8(&raw)).await?;

        info!(
            "Burning subtitles from {} into {} -> {}",
            subtitle_path.display(),
            source.display(),
            output_path.display()
        );

        let command = self
            .command_builder
            .burn_subtitles(source, subtitle_filter(&staged_subtitle), output_path, &self.config)
            .timeout(self.config.timeout());

        let outcome = match command.execute(&self.runner).await {
            Ok(_) if is_non_empty_file(output_path).await => Ok(()),
            Ok(_) => Err(SubcastError::OutputMissingOrEmpty(output_path.to_path_buf())),
            Err(e) => Err(e),
        };

        let staging_path = staging.path().to_path_buf();
        if let Err(e) = staging.close() {
            warn!("Failed to remove {}: {}", staging_path.display(), e);
        }

        outcome.map_err(|e| SubcastError::BurnFailed(Box::new(e)))
    }
}

/// Build the `subtitles` filter for `path`.
///
/// ffmpeg unescapes the `-vf` argument twice: once when splitting the
/// filtergraph and again when splitting the filter's `key=value` options.
/// The path is therefore escaped for the option level (`:`) and the result
/// escaped again for the graph level (`[ ] , ;`). Backslashes and quotes are
/// escaped at both levels. Separators are normalized to `/` first.
pub fn subtitle_filter(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let option_value = escape_filter_text(&normalized, &[':']);
    let graph_value = escape_filter_text(&option_value, &['[', ']', ',', ';']);
    format!("subtitles=filename={}", graph_value)
}

fn escape_filter_text(text: &str, specials: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if c == '\\' || c == '\'' || specials.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Decode subtitle bytes to UTF-8 text without a byte-order mark.
///
/// UTF-16 input is recognised by its BOM; anything else is read as UTF-8,
/// replacing invalid sequences.
pub fn normalize_to_utf8(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            warn!("Subtitle is not valid UTF-8, replacing invalid sequences");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
