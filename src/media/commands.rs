use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::process::{ProcessOutput, ProcessRunner, RunOptions};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
    pub timeout: Option<Duration>,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
            timeout: None,
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Only print errors and the progress stats line
    pub fn quiet(self) -> Self {
        self.arg("-hide_banner").arg("-loglevel").arg("error").arg("-stats")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Encoder speed/quality pair
    pub fn quality<S: Into<String>>(self, preset: S, crf: u32) -> Self {
        self.arg("-preset").arg(preset).arg("-crf").arg(crf.to_string())
    }

    /// Move the moov atom to the front so playback can start before the download ends
    pub fn faststart(self) -> Self {
        self.arg("-movflags").arg("+faststart")
    }

    /// Kill the process if it runs longer than `timeout`
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute the command
    pub async fn execute(&self, runner: &ProcessRunner) -> Result<ProcessOutput> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        runner
            .run(
                &self.binary_path,
                &self.args,
                RunOptions::labeled(self.description.clone()).timeout(self.timeout),
            )
            .await
    }
}

/// Builder for the encoder invocations the pipeline needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Canonical audio extraction: mono, 16 kHz, 16-bit little endian PCM
    pub fn extract_audio<P: AsRef<Path>, Q: AsRef<Path>>(&self, video_path: P, audio_path: Q) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .quiet()
            .overwrite()
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .output(audio_path)
    }

    /// Transcode into an mp4 the burn step handles reliably
    pub fn convert_container<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        config: &MediaConfig,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Container conversion")
            .quiet()
            .overwrite()
            .input(input_path)
            .video_codec(&config.video_codec)
            .audio_codec(&config.intermediate_audio_codec)
            .output(output_path)
    }

    /// Re-encode video with the subtitle filter applied, audio copied unchanged
    pub fn burn_subtitles<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        video_path: P,
        filter: String,
        output_path: Q,
        config: &MediaConfig,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Subtitle burn-in")
            .quiet()
            .overwrite()
            .input(video_path)
            .video_filter(filter)
            .video_codec(&config.video_codec)
            .quality(&config.preset, config.crf)
            .copy_audio()
            .faststart()
            .args(config.extra_options.iter().cloned())
            .output(output_path)
    }

    /// Grab a single frame at `offset_secs`
    pub fn thumbnail<P: AsRef<Path>, Q: AsRef<Path>>(&self, video_path: P, image_path: Q, offset_secs: f64) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Thumbnail capture")
            .quiet()
            .overwrite()
            .arg("-ss")
            .arg(format!("{:.3}", offset_secs))
            .input(video_path)
            .arg("-frames:v")
            .arg("1")
            .output(image_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}
