//! Subcast - Upload-to-Stream Subtitle Pipeline
//!
//! Turns an uploaded video into a subtitled, streamable one: extracts the audio
//! with ffmpeg, transcribes it with whisper, burns the subtitles into the
//! picture with ffmpeg and serves the result with HTTP byte ranges.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod process;
pub mod server;
pub mod storage;
pub mod stream;
pub mod subtitle;
pub mod transcribe;
pub mod workflow;
