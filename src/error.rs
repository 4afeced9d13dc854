use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Pipeline stage that a job-level error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Transcription,
    Burn,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extraction => "audio extraction",
            Stage::Transcription => "transcription",
            Stage::Burn => "subtitle burn-in",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SubcastError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Failed to launch {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", exit_code_label(.exit_code))]
    ProcessFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    ProcessTimeout { program: String, timeout: Duration },

    #[error("Audio extraction failed: {0}")]
    ExtractionFailed(#[source] Box<SubcastError>),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Container conversion failed: {0}")]
    ContainerConversionFailed(#[source] Box<SubcastError>),

    #[error("Subtitle burn-in failed: {0}")]
    BurnFailed(#[source] Box<SubcastError>),

    #[error("Output missing or empty: {}", .0.display())]
    OutputMissingOrEmpty(PathBuf),

    #[error("Range not satisfiable: {range} (size {size})")]
    RangeNotSatisfiable { range: String, size: u64 },

    #[error("Artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Invalid subtitle: {0}")]
    InvalidSubtitle(String),

    #[error("Pipeline failed during {stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<SubcastError>,
    },
}

impl SubcastError {
    /// Wrap an error with the stage it happened in.
    pub fn at_stage(stage: Stage, source: SubcastError) -> Self {
        SubcastError::Stage {
            stage,
            source: Box::new(source),
        }
    }

    /// Stage a job-level error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SubcastError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, SubcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_reports_stage() {
        let err = SubcastError::at_stage(
            Stage::Transcription,
            SubcastError::TranscriptionFailed("no output".to_string()),
        );
        assert_eq!(err.stage(), Some(Stage::Transcription));
        assert_eq!(
            err.to_string(),
            "Pipeline failed during transcription: Transcription failed: no output"
        );
    }

    #[test]
    fn test_process_failed_message() {
        let err = SubcastError::ProcessFailed {
            program: "ffmpeg".to_string(),
            exit_code: Some(1),
            stderr: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "ffmpeg exited with exit code 1: boom");

        let killed = SubcastError::ProcessFailed {
            program: "ffmpeg".to_string(),
            exit_code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("terminated by signal"));
    }
}
