use std::path::{Path, PathBuf};

use tokio::fs;

/// Ordered list of filenames the recognizer may have written its SRT to.
///
/// Derived from the basename of the audio handed to the recognizer. Earlier
/// entries win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCandidates {
    paths: Vec<PathBuf>,
}

impl OutputCandidates {
    pub fn for_audio(audio_path: &Path, output_dir: &Path, language: &str) -> Self {
        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = audio_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut names = vec![
            format!("{}.srt", stem),
            format!("{}.{}.srt", stem, language),
            format!("{}.srt", file_name),
            format!("{}_{}.srt", stem, language),
        ];
        names.dedup();

        Self {
            paths: names.into_iter().map(|name| output_dir.join(name)).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// First candidate that exists on disk
    pub async fn find_existing(&self) -> Option<PathBuf> {
        for path in &self.paths {
            if fs::try_exists(path).await.unwrap_or(false) {
                return Some(path.clone());
            }
        }
        None
    }
}

/// Transcribed text from recognizer stdout, with per-segment timestamp
/// prefixes such as `[00:00.000 --> 00:02.000]` removed.
///
/// Returns `None` when nothing but whitespace remains.
pub fn plain_text_from_stdout(stdout: &str) -> Option<String> {
    let text = stdout
        .lines()
        .map(strip_timestamp_prefix)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() { None } else { Some(text) }
}

fn strip_timestamp_prefix(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with('[') && trimmed.contains("-->") {
        if let Some(end) = trimmed.find(']') {
            return &trimmed[end + 1..];
        }
    }
    line
}
