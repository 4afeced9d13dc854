use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SubcastError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub media: MediaConfig,
    pub transcriber: TranscriberConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Video encoder used for burn-in and container conversion
    pub video_codec: String,
    /// Constant rate factor for the burn-in encode (0-51, lower = better quality)
    pub crf: u32,
    /// Encoder speed preset (ultrafast, fast, medium, slow, veryslow)
    pub preset: String,
    /// Source extensions that are transcoded to mp4 before burn-in
    pub convert_extensions: Vec<String>,
    /// Audio codec for the intermediate container
    pub intermediate_audio_codec: String,
    /// Additional encoding options appended to the burn-in command
    /// e.g. ["-pix_fmt", "yuv420p"]
    pub extra_options: Vec<String>,
    /// Position of the thumbnail frame in seconds
    pub thumbnail_offset_secs: f64,
    /// Kill the encoder if it runs longer than this
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Path to transcriber binary, resolved through PATH when bare
    pub binary_path: String,
    /// Model passed to the recognizer
    pub model: String,
    /// Spoken language of the source audio
    pub language: String,
    /// Additional arguments appended to the recognizer command
    pub extra_args: Vec<String>,
    /// Length of the single cue synthesized when only stdout text is available
    pub fallback_cue_secs: u64,
    /// Kill the recognizer if it runs longer than this
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root under which the uploads/ tree lives
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Delete the uploaded source video once the burned video exists
    pub remove_source_on_success: bool,
    /// Capture a still frame of the final video into uploads/thumbnails
    pub generate_thumbnail: bool,
    /// Upper bound on jobs running at once in batch mode
    pub max_concurrent_jobs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bytes read per body chunk when streaming
    pub chunk_size: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            crf: 23,
            preset: "medium".to_string(),
            convert_extensions: vec!["webm".to_string()],
            intermediate_audio_codec: "aac".to_string(),
            extra_options: Vec::new(),
            thumbnail_offset_secs: 1.0,
            timeout_secs: None,
        }
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            binary_path: "whisper".to_string(),
            model: "base".to_string(),
            language: "en".to_string(),
            extra_args: Vec::new(),
            fallback_cue_secs: 30,
            timeout_secs: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remove_source_on_success: false,
            generate_thumbnail: false,
            max_concurrent_jobs: 2,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            chunk_size: 64 * 1024,
        }
    }
}

impl MediaConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl TranscriberConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubcastError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SubcastError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubcastError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubcastError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
