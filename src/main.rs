//! Subcast - Upload-to-Stream Subtitle Pipeline
//!
//! Entry point for the command line: runs the pipeline or one of its stages,
//! or serves finished videos over HTTP.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use subcast::cli::{Args, Commands};
use subcast::config::Config;
use subcast::media::{MediaTool, MediaToolkit};
use subcast::server;
use subcast::subtitle::SubtitleDocument;
use subcast::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("subcast.toml").exists() {
                Config::from_file("subcast.toml")?
            } else {
                Config::default()
            }
        }
    };

    // Setup logging to both console and file
    setup_logging(&config, args.verbose)?;
    info!("Starting Subcast");

    let toolkit = MediaToolkit::new(config.clone());

    match args.command {
        Commands::Process { input, json } => {
            info!("Processing video file: {}", input.display());
            let workflow = Workflow::new(config);

            let spinner = spinner(&format!("Processing {}", input.display()));
            let result = workflow.process(&input).await;
            spinner.finish_and_clear();

            let output = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Video:     {}", output.video.path.display());
                println!("Subtitles: {} cues ({:?})", output.cue_count.unwrap_or(0), output.transcript_quality);
                if let Some(thumbnail) = &output.thumbnail {
                    println!("Thumbnail: {}", thumbnail.path.display());
                }
            }
        }
        Commands::Batch { input_dir } => {
            info!("Processing directory: {}", input_dir.display());
            let report = Workflow::new(config).process_directory(&input_dir).await?;

            for output in &report.succeeded {
                println!("ok      {}", output.video.path.display());
            }
            for (path, error) in &report.failed {
                println!("failed  {}: {}", path.display(), error);
            }
            println!("{} succeeded, {} failed", report.succeeded.len(), report.failed.len());
        }
        Commands::Extract { input, output_dir } => {
            info!("Extracting audio from: {}", input.display());
            let audio = toolkit.extract_audio(&input, &output_dir).await?;
            println!("{}", audio.display());
        }
        Commands::Transcribe { input, output_dir } => {
            info!("Transcribing audio: {}", input.display());
            let outcome = toolkit.transcribe(&input, &output_dir).await?;
            let text = tokio::fs::read_to_string(outcome.path()).await?;
            let cues = SubtitleDocument::parse(&text).map(|doc| doc.len()).unwrap_or(0);
            println!("{} ({} cues, {:?})", outcome.path().display(), cues, outcome.quality());
        }
        Commands::Burn { video, subtitles, output_dir } => {
            info!("Burning subtitles into video: {}", video.display());
            let output = toolkit.burn_subtitles(&video, &subtitles, &output_dir).await?;
            println!("{}", output.display());
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let workflow = Workflow::new(config.clone());
            workflow.layout().ensure().await?;
            server::serve(workflow.layout(), &config.server).await?;
        }
        Commands::Check => {
            println!("Encoder:    {}", toolkit.encoder_version().await?);
            println!("Recognizer: {}", toolkit.recognizer_version().await?);
        }
        Commands::InitConfig { output } => {
            config.save_to_file(&output)?;
            println!("Wrote {}", output.display());
        }
    }

    info!("Subcast finished");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = config.storage.root.join(".subcast").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "subcast.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("subcast.log").display());

    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
