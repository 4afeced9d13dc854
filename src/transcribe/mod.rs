// Speech recognition stage
//
// The recognizer's output filename is not fully predictable, so the stage
// probes an ordered list of candidate names (candidates.rs). When none exists
// but the recognizer printed text, a single-cue document is synthesized and the
// result is marked as degraded through TranscriptOutcome::Synthesized.

pub mod candidates;
pub mod whisper;

use serde::Serialize;
use std::path::{Path, PathBuf};

pub use candidates::{OutputCandidates, plain_text_from_stdout};
pub use whisper::Transcriber;

/// How a subtitle file came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptQuality {
    /// Written by the recognizer with real cue timings
    Recognized,
    /// Built from stdout text with a placeholder span
    Synthesized,
}

/// Successful transcription result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutcome {
    Recognized(PathBuf),
    Synthesized(PathBuf),
}

impl TranscriptOutcome {
    pub fn path(&self) -> &Path {
        match self {
            TranscriptOutcome::Recognized(path) | TranscriptOutcome::Synthesized(path) => path,
        }
    }

    pub fn quality(&self) -> TranscriptQuality {
        match self {
            TranscriptOutcome::Recognized(_) => TranscriptQuality::Recognized,
            TranscriptOutcome::Synthesized(_) => TranscriptQuality::Synthesized,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.quality() == TranscriptQuality::Synthesized
    }
}
