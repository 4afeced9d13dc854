use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one uploaded video through extraction, transcription and burn-in
    Process {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Print the job result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process all video files in a directory as independent jobs
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,
    },

    /// Extract canonical 16 kHz mono WAV audio from a video file
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the WAV file
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Transcribe a WAV file to SubRip subtitles
    Transcribe {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the SRT file
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Burn subtitles into a video file
    Burn {
        /// Input video file
        #[arg(long)]
        video: PathBuf,

        /// Subtitle file
        #[arg(short, long)]
        subtitles: PathBuf,

        /// Output directory for the burned video
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Serve finished videos over HTTP with byte-range support
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check that the encoder and recognizer binaries can be launched
    Check,

    /// Write the effective configuration to a TOML file
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "subcast.toml")]
        output: PathBuf,
    },
}
