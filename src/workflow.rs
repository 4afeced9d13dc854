use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::artifact::{ArtifactKind, MediaArtifact};
use crate::config::{Config, PipelineConfig};
use crate::error::{Result, Stage, SubcastError};
use crate::media::{MediaTool, MediaToolFactory};
use crate::storage::{StorageLayout, remove_now, remove_quietly};
use crate::subtitle::SubtitleDocument;
use crate::transcribe::TranscriptQuality;

/// Extensions picked up when processing a directory
const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum JobState {
    Pending,
    Running(Stage),
    Succeeded,
    Failed(Stage),
}

/// One upload's run through the pipeline.
///
/// Owns every transient artifact it produced; they are removed when the job
/// finishes, whichever way it finishes. A job dropped mid-stage removes them
/// synchronously in `Drop`.
#[derive(Debug)]
pub struct PipelineJob {
    pub id: Uuid,
    pub input: PathBuf,
    pub working_dir: PathBuf,
    transient: Vec<MediaArtifact>,
    state: JobState,
}

impl PipelineJob {
    pub fn new(input: &Path, working_dir: &Path) -> Self {
        Self {
            id: Uuid::new_v4(),
            input: input.to_path_buf(),
            working_dir: working_dir.to_path_buf(),
            transient: Vec::new(),
            state: JobState::Pending,
        }
    }

    fn track(&mut self, artifact: MediaArtifact) {
        self.transient.push(artifact);
    }

    /// Stop tracking `path` so it outlives the job
    fn keep(&mut self, path: &Path) {
        self.transient.retain(|artifact| artifact.path != path);
    }

    /// Best-effort removal of every tracked artifact; returns how many are gone.
    async fn release(&mut self) -> usize {
        let mut removed = 0;
        for artifact in self.transient.drain(..) {
            if remove_quietly(&artifact.path).await {
                removed += 1;
            }
        }
        removed
    }
}

impl Drop for PipelineJob {
    fn drop(&mut self) {
        if self.transient.is_empty() {
            return;
        }
        warn!(
            "Job {} dropped while {:?}, removing {} transient artifacts",
            self.id,
            self.state,
            self.transient.len()
        );
        for artifact in self.transient.drain(..) {
            remove_now(&artifact.path);
        }
    }
}

/// Result handed back to the caller of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub job_id: Uuid,
    pub video: MediaArtifact,
    pub subtitle_text: String,
    /// Number of cues, when the subtitle parses as SubRip
    pub cue_count: Option<usize>,
    pub transcript_quality: TranscriptQuality,
    pub thumbnail: Option<MediaArtifact>,
}

/// Summary of a directory run
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<PipelineOutput>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Sequences extraction, transcription and burn-in for uploaded videos
#[derive(Clone)]
pub struct Workflow {
    tool: Arc<dyn MediaTool>,
    layout: StorageLayout,
    options: PipelineConfig,
}

impl Workflow {
    pub fn new(config: Config) -> Self {
        let layout = StorageLayout::new(config.storage.root.clone());
        let options = config.pipeline.clone();
        Self::with_tool(MediaToolFactory::create_tool(config), layout, options)
    }

    pub fn with_tool(tool: Arc<dyn MediaTool>, layout: StorageLayout, options: PipelineConfig) -> Self {
        Self { tool, layout, options }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Run one video through all three stages.
    ///
    /// On failure every transient artifact produced so far is removed and the
    /// error names the failing stage. On success only the burned video (and
    /// thumbnail, when enabled) remain.
    pub async fn process(&self, input: &Path) -> Result<PipelineOutput> {
        if !fs::try_exists(input).await.unwrap_or(false) {
            return Err(SubcastError::InputNotFound(input.to_path_buf()));
        }
        self.layout.ensure().await?;

        let mut job = PipelineJob::new(input, self.layout.root());
        info!("Job {} started for {}", job.id, input.display());

        match self.run_stages(&mut job).await {
            Ok(output) => {
                let removed = job.release().await;
                job.state = JobState::Succeeded;
                info!("Job {} succeeded, removed {} transient artifacts", job.id, removed);
                self.finish(output, input).await
            }
            Err(e) => {
                let removed = job.release().await;
                if let JobState::Running(stage) = job.state {
                    job.state = JobState::Failed(stage);
                }
                warn!("Job {} failed: {} (removed {} transient artifacts)", job.id, e, removed);
                Err(e)
            }
        }
    }

    async fn run_stages(&self, job: &mut PipelineJob) -> Result<PipelineOutput> {
        job.state = JobState::Running(Stage::Extraction);
        let audio = self
            .tool
            .extract_audio(&job.input, &self.layout.audios_dir())
            .await
            .map_err(|e| SubcastError::at_stage(Stage::Extraction, e))?;
        job.track(MediaArtifact::new(&audio, ArtifactKind::Audio));

        job.state = JobState::Running(Stage::Transcription);
        let transcript = self
            .tool
            .transcribe(&audio, &self.layout.subtitles_dir())
            .await
            .map_err(|e| SubcastError::at_stage(Stage::Transcription, e))?;
        job.track(MediaArtifact::new(transcript.path(), ArtifactKind::Subtitle));
        if transcript.is_degraded() {
            warn!("Job {} continues with a synthesized subtitle", job.id);
        }

        job.state = JobState::Running(Stage::Burn);
        let video = self
            .tool
            .burn_subtitles(&job.input, transcript.path(), &self.layout.videos_dir())
            .await
            .map_err(|e| SubcastError::at_stage(Stage::Burn, e))?;
        job.track(MediaArtifact::new(&video, ArtifactKind::Video));

        let subtitle_text = fs::read_to_string(transcript.path())
            .await
            .map_err(|e| SubcastError::at_stage(Stage::Burn, e.into()))?;
        let cue_count = match SubtitleDocument::parse(&subtitle_text) {
            Ok(document) => Some(document.len()),
            Err(e) => {
                warn!("Job {} produced a subtitle that does not parse: {}", job.id, e);
                None
            }
        };

        job.keep(&video);
        Ok(PipelineOutput {
            job_id: job.id,
            video: MediaArtifact::new(video, ArtifactKind::Video),
            subtitle_text,
            cue_count,
            transcript_quality: transcript.quality(),
            thumbnail: None,
        })
    }

    async fn finish(&self, mut output: PipelineOutput, input: &Path) -> Result<PipelineOutput> {
        if self.options.remove_source_on_success && input != output.video.path() {
            remove_quietly(input).await;
        }

        if self.options.generate_thumbnail {
            match self
                .tool
                .capture_thumbnail(output.video.path(), &self.layout.thumbnails_dir())
                .await
            {
                Ok(path) => output.thumbnail = Some(MediaArtifact::new(path, ArtifactKind::Thumbnail)),
                Err(e) => warn!("Thumbnail for job {} skipped: {}", output.job_id, e),
            }
        }

        Ok(output)
    }

    /// Process every video below `input_dir` as an independent job.
    ///
    /// At most `max_concurrent_jobs` run at once; a failing file is reported
    /// and does not stop the others.
    pub async fn process_directory(&self, input_dir: &Path) -> Result<BatchReport> {
        if !input_dir.is_dir() {
            return Err(SubcastError::Config(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }

        let video_files = find_videos(input_dir);
        info!("Found {} video files to process", video_files.len());

        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_jobs.max(1)));
        let mut jobs = JoinSet::new();
        for video_path in video_files {
            let workflow = self.clone();
            let permits = permits.clone();
            jobs.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = workflow.process(&video_path).await;
                (video_path, result)
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok((path, Ok(output))) => {
                    info!("Successfully processed: {}", path.display());
                    report.succeeded.push(output);
                }
                Ok((path, Err(e))) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
                Err(e) => warn!("Job task aborted: {}", e),
            }
        }

        Ok(report)
    }
}

fn find_videos(input_dir: &Path) -> Vec<PathBuf> {
    let mut video_files: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    video_files.sort();
    video_files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaTool;
    use crate::transcribe::TranscriptOutcome;
    use std::fs as stdfs;

    const SRT: &str = "1\n00:00:00,000 --> 00:00:02,000\nhello\n\n";

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: StorageLayout,
        input: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let input = dir.path().join("upload.mp4");
        stdfs::write(&input, b"source video").unwrap();
        Fixture {
            _dir: dir,
            layout,
            input,
        }
    }

    fn expect_extract(tool: &mut MockMediaTool) {
        tool.expect_extract_audio().times(1).returning(|_, dir| {
            let path = dir.join("upload_1.wav");
            stdfs::write(&path, b"RIFF").unwrap();
            Ok(path)
        });
    }

    fn expect_transcribe(tool: &mut MockMediaTool) {
        tool.expect_transcribe().times(1).returning(|audio, dir| {
            let stem = audio.file_stem().unwrap().to_string_lossy().into_owned();
            let path = dir.join(format!("{}.srt", stem));
            stdfs::write(&path, SRT).unwrap();
            Ok(TranscriptOutcome::Recognized(path))
        });
    }

    fn expect_burn(tool: &mut MockMediaTool) {
        tool.expect_burn_subtitles().times(1).returning(|_, _, dir| {
            let path = dir.join("upload_1.mp4");
            stdfs::write(&path, b"burned").unwrap();
            Ok(path)
        });
    }

    fn workflow(tool: MockMediaTool, layout: &StorageLayout, options: PipelineConfig) -> Workflow {
        Workflow::with_tool(Arc::new(tool), layout.clone(), options)
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        stdfs::read_dir(dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_success_keeps_only_final_video() {
        let fx = fixture();
        let mut tool = MockMediaTool::new();
        expect_extract(&mut tool);
        expect_transcribe(&mut tool);
        expect_burn(&mut tool);
        tool.expect_capture_thumbnail().never();

        let output = workflow(tool, &fx.layout, PipelineConfig::default())
            .process(&fx.input)
            .await
            .unwrap();

        assert_eq!(output.subtitle_text, SRT);
        assert_eq!(output.cue_count, Some(1));
        assert_eq!(output.transcript_quality, TranscriptQuality::Recognized);
        assert!(stdfs::metadata(output.video.path()).unwrap().len() > 0);
        assert!(files_in(&fx.layout.audios_dir()).is_empty());
        assert!(files_in(&fx.layout.subtitles_dir()).is_empty());
        assert_eq!(files_in(&fx.layout.videos_dir()), vec![output.video.path.clone()]);
        assert!(fx.input.exists());
    }

    #[tokio::test]
    async fn test_extraction_failure_is_attributed() {
        let fx = fixture();
        let mut tool = MockMediaTool::new();
        tool.expect_extract_audio().times(1).returning(|_, _| {
            Err(SubcastError::ExtractionFailed(Box::new(SubcastError::ProcessFailed {
                program: "ffmpeg".to_string(),
                exit_code: Some(1),
                stderr: "no audio stream".to_string(),
            })))
        });
        tool.expect_transcribe().never();
        tool.expect_burn_subtitles().never();

        let err = workflow(tool, &fx.layout, PipelineConfig::default())
            .process(&fx.input)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Extraction));
        assert!(fx.input.exists());
    }

    #[tokio::test]
    async fn test_transcription_failure_removes_audio() {
        let fx = fixture();
        let mut tool = MockMediaTool::new();
        expect_extract(&mut tool);
        tool.expect_transcribe()
            .times(1)
            .returning(|_, _| Err(SubcastError::TranscriptionFailed("nothing heard".to_string())));
        tool.expect_burn_subtitles().never();

        let err = workflow(tool, &fx.layout, PipelineConfig::default())
            .process(&fx.input)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Transcription));
        assert!(files_in(&fx.layout.audios_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_burn_failure_removes_audio_and_subtitle() {
        let fx = fixture();
        let mut tool = MockMediaTool::new();
        expect_extract(&mut tool);
        expect_transcribe(&mut tool);
        tool.expect_burn_subtitles().times(1).returning(|_, _, _| {
            Err(SubcastError::BurnFailed(Box::new(SubcastError::OutputMissingOrEmpty(
                PathBuf::from("out.mp4"),
            ))))
        });

        let err = workflow(tool, &fx.layout, PipelineConfig::default())
            .process(&fx.input)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Burn));
        assert!(matches!(
            err,
            SubcastError::Stage { ref source, .. } if matches!(**source, SubcastError::BurnFailed(_))
        ));
        assert!(files_in(&fx.layout.audios_dir()).is_empty());
        assert!(files_in(&fx.layout.subtitles_dir()).is_empty());
        assert!(files_in(&fx.layout.videos_dir()).is_empty());
    }

    #[tokio::test]
    async fn test_optional_source_removal_and_thumbnail() {
        let fx = fixture();
        let mut tool = MockMediaTool::new();
        expect_extract(&mut tool);
        expect_transcribe(&mut tool);
        expect_burn(&mut tool);
        tool.expect_capture_thumbnail().times(1).returning(|video, dir| {
            assert!(video.exists());
            let path = dir.join("upload_1.jpg");
            stdfs::write(&path, b"jpeg").unwrap();
            Ok(path)
        });

        let options = PipelineConfig {
            remove_source_on_success: true,
            generate_thumbnail: true,
            ..PipelineConfig::default()
        };
        let output = workflow(tool, &fx.layout, options).process(&fx.input).await.unwrap();

        assert!(!fx.input.exists());
        let thumbnail = output.thumbnail.expect("thumbnail captured");
        assert_eq!(thumbnail.kind, ArtifactKind::Thumbnail);
        assert!(thumbnail.path.exists());
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_not_fatal() {
        let fx = fixture();
        let mut tool = MockMediaTool::new();
        expect_extract(&mut tool);
        expect_transcribe(&mut tool);
        expect_burn(&mut tool);
        tool.expect_capture_thumbnail()
            .times(1)
            .returning(|_, _| Err(SubcastError::OutputMissingOrEmpty(PathBuf::from("x.jpg"))));

        let options = PipelineConfig {
            generate_thumbnail: true,
            ..PipelineConfig::default()
        };
        let output = workflow(tool, &fx.layout, options).process(&fx.input).await.unwrap();
        assert!(output.thumbnail.is_none());
    }

    #[tokio::test]
    async fn test_synthesized_transcript_is_reported() {
        let fx = fixture();
        let mut tool = MockMediaTool::new();
        expect_extract(&mut tool);
        tool.expect_transcribe().times(1).returning(|_, dir| {
            let path = dir.join("upload_1.srt");
            stdfs::write(&path, "1\n00:00:00,000 --> 00:00:30,000\nsome words\n\n").unwrap();
            Ok(TranscriptOutcome::Synthesized(path))
        });
        expect_burn(&mut tool);

        let output = workflow(tool, &fx.layout, PipelineConfig::default())
            .process(&fx.input)
            .await
            .unwrap();
        assert_eq!(output.transcript_quality, TranscriptQuality::Synthesized);
    }

    #[tokio::test]
    async fn test_missing_input_never_reaches_tool() {
        let fx = fixture();
        let tool = MockMediaTool::new();
        let err = workflow(tool, &fx.layout, PipelineConfig::default())
            .process(&fx.layout.root().join("nope.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubcastError::InputNotFound(_)));
    }

    #[tokio::test]
    async fn test_directory_run_reports_each_file() {
        let fx = fixture();
        let incoming = fx.layout.root().join("incoming");
        stdfs::create_dir_all(incoming.join("nested")).unwrap();
        stdfs::write(incoming.join("a.mp4"), b"a").unwrap();
        stdfs::write(incoming.join("nested/b.webm"), b"b").unwrap();
        stdfs::write(incoming.join("notes.txt"), b"skip me").unwrap();

        let mut tool = MockMediaTool::new();
        tool.expect_extract_audio().times(2).returning(|video, dir| {
            if video.ends_with("b.webm") {
                return Err(SubcastError::ExtractionFailed(Box::new(SubcastError::OutputMissingOrEmpty(
                    dir.join("b.wav"),
                ))));
            }
            let path = dir.join("a_1.wav");
            stdfs::write(&path, b"RIFF").unwrap();
            Ok(path)
        });
        expect_transcribe(&mut tool);
        tool.expect_burn_subtitles().times(1).returning(|_, _, dir| {
            let path = dir.join("a_1.mp4");
            stdfs::write(&path, b"burned").unwrap();
            Ok(path)
        });

        let report = workflow(tool, &fx.layout, PipelineConfig::default())
            .process_directory(&incoming)
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("nested/b.webm"));
    }

    #[tokio::test]
    async fn test_transcript_read_failure_removes_burned_video() {
        let fx = fixture();
        let mut tool = MockMediaTool::new();
        expect_extract(&mut tool);
        tool.expect_transcribe()
            .times(1)
            .returning(|_, dir| Ok(TranscriptOutcome::Recognized(dir.join("vanished.srt"))));
        expect_burn(&mut tool);

        let err = workflow(tool, &fx.layout, PipelineConfig::default())
            .process(&fx.input)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Burn));
        assert!(files_in(&fx.layout.videos_dir()).is_empty());
        assert!(files_in(&fx.layout.audios_dir()).is_empty());
    }

    /// Extracts like the real tool, then never finishes transcribing
    struct StalledTool;

    #[async_trait::async_trait]
    impl MediaTool for StalledTool {
        async fn extract_audio(&self, _video_path: &Path, output_dir: &Path) -> Result<PathBuf> {
            let path = output_dir.join("upload_1.wav");
            stdfs::write(&path, b"RIFF").unwrap();
            Ok(path)
        }

        async fn transcribe(&self, _audio_path: &Path, _output_dir: &Path) -> Result<TranscriptOutcome> {
            std::future::pending().await
        }

        async fn burn_subtitles(&self, _video: &Path, _subtitle: &Path, _output_dir: &Path) -> Result<PathBuf> {
            unreachable!("burn after a stalled transcription")
        }

        async fn capture_thumbnail(&self, _video_path: &Path, _output_dir: &Path) -> Result<PathBuf> {
            unreachable!("thumbnail after a stalled transcription")
        }
    }

    #[tokio::test]
    async fn test_dropped_job_removes_transient_artifacts() {
        let fx = fixture();
        let workflow = Workflow::with_tool(Arc::new(StalledTool), fx.layout.clone(), PipelineConfig::default());

        let outcome = tokio::time::timeout(std::time::Duration::from_millis(100), workflow.process(&fx.input)).await;

        assert!(outcome.is_err());
        assert!(files_in(&fx.layout.audios_dir()).is_empty());
        assert!(fx.input.exists());
    }

    #[test]
    fn test_find_videos_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(dir.path().join("x.MKV"), b"").unwrap();
        stdfs::write(dir.path().join("y.srt"), b"").unwrap();
        assert_eq!(find_videos(dir.path()), vec![dir.path().join("x.MKV")]);
    }
}
