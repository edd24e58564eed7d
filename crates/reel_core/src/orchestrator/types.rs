//! Context, job state and step outputs shared by the composition steps.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::{StepError, StepResult};
use super::pipeline::CancelHandle;
use crate::captions::CaptionTrack;
use crate::config::Settings;
use crate::logging::JobLogger;
use crate::models::{CompositionJob, NormalizedClip, Track};
use crate::timeline::ReconcilePlan;
use crate::tools::{MediaInfo, MediaTool, ToolInvocation, ToolResult};

/// Receives `(step, percent, message)` as a job advances.
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// What every step may read: the job, settings, scratch space, log and
/// engine. Step results go in [`JobState`].
pub struct Context {
    /// The job being composed.
    pub job: CompositionJob,
    pub settings: Settings,
    /// Copied from `job.name` for error messages.
    pub job_name: String,
    /// Job-specific scratch directory.
    pub work_dir: PathBuf,
    pub logger: Arc<JobLogger>,
    /// External transcoding engine.
    pub tool: Arc<dyn MediaTool>,
    /// Cancellation flag shared with the pipeline.
    pub cancel: CancelHandle,
    progress: Option<ProgressCallback>,
}

impl Context {
    pub fn new(
        job: CompositionJob,
        settings: Settings,
        work_dir: PathBuf,
        logger: Arc<JobLogger>,
        tool: Arc<dyn MediaTool>,
    ) -> Self {
        Self {
            job_name: job.name.clone(),
            job,
            settings,
            work_dir,
            logger,
            tool,
            cancel: CancelHandle::new(),
            progress: None,
        }
    }

    /// Use a shared cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Report progress to the job log and the callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        self.logger.progress(step_name, percent);
        if let Some(notify) = &self.progress {
            notify(step_name, percent, message);
        }
    }

    /// Scratch path for an intermediate file.
    pub fn work_path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    /// The media tool, with invocations and failures echoed to the job log.
    pub fn media_tool(&self) -> LoggedTool<'_> {
        LoggedTool {
            inner: self.tool.as_ref(),
            logger: self.logger.as_ref(),
            show_commands: self.settings.logging.show_commands,
        }
    }
}

/// A [`MediaTool`] that writes each command line and failure tail to a
/// [`JobLogger`].
pub struct LoggedTool<'a> {
    inner: &'a dyn MediaTool,
    logger: &'a JobLogger,
    show_commands: bool,
}

impl MediaTool for LoggedTool<'_> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn run(&self, invocation: &ToolInvocation, cancel: &CancelHandle) -> ToolResult<Track> {
        if self.show_commands {
            self.logger.invocation(self.inner.name(), invocation);
        }
        self.logger.clear_tail();

        let result = self.inner.run(invocation, cancel);
        match &result {
            Ok(track) => self.logger.debug(&format!(
                "{} -> {} ({:.3}s)",
                invocation.label(),
                track.display_name(),
                track.duration
            )),
            Err(e) if e.is_cancelled() => self.logger.warn(&format!("{} cancelled", invocation.label())),
            Err(e) => self.logger.tool_failure(invocation.label(), e),
        }
        result
    }

    fn probe(&self, path: &Path) -> ToolResult<MediaInfo> {
        self.inner.probe(path)
    }
}

#[cfg(test)]
impl Context {
    /// Context with an empty job, default settings, and a fake tool.
    pub(crate) fn for_test(dir: &Path) -> Self {
        Self::for_test_with(dir, Self::test_job(dir), crate::tools::testing::FakeTool::new())
    }

    /// A job with no clips writing to `dir/out.mp4`.
    pub(crate) fn test_job(dir: &Path) -> CompositionJob {
        CompositionJob::new(
            "test",
            Vec::new(),
            Track::audio(dir.join("voice.wav"), 1.0),
            dir.join("out.mp4"),
        )
    }

    pub(crate) fn for_test_with(
        dir: &Path,
        job: CompositionJob,
        tool: crate::tools::testing::FakeTool,
    ) -> Self {
        let logger = JobLogger::new(
            "test",
            "0",
            dir.join("logs"),
            crate::logging::LogConfig::default(),
            None,
        )
        .unwrap();
        let work_dir = dir.join("work");
        std::fs::create_dir_all(&work_dir).unwrap();
        Self::new(job, Settings::default(), work_dir, Arc::new(logger), Arc::new(tool))
    }
}

/// Results recorded by the steps of one job. Each step fills its own
/// section and leaves earlier ones alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    /// RFC 3339 start time.
    pub started_at: Option<String>,
    /// Normalize step results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize: Option<NormalizeOutput>,
    /// Concatenate step results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concat: Option<ConcatOutput>,
    /// Reconcile step results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile: Option<ReconcileOutput>,
    /// Captions step results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions: Option<CaptionsOutput>,
    /// Render step results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderOutput>,
    /// Finish step results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<FinishOutput>,
    /// "Step: reason" for every step that fell back.
    #[serde(default)]
    pub degradations: Vec<String>,
}

impl JobState {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// Normalized clips, in timeline order.
    pub fn normalized_clips(&self) -> StepResult<&[NormalizedClip]> {
        self.normalize
            .as_ref()
            .map(|n| n.clips.as_slice())
            .ok_or_else(|| StepError::precondition_failed("Clips have not been normalized"))
    }

    /// The concatenated video track.
    pub fn video_track(&self) -> StepResult<&Track> {
        self.concat
            .as_ref()
            .map(|c| &c.track)
            .ok_or_else(|| StepError::precondition_failed("Clips have not been concatenated"))
    }

    /// The reconciled (muxed) track.
    pub fn reconciled_track(&self) -> StepResult<&Track> {
        self.reconcile
            .as_ref()
            .map(|r| &r.track)
            .ok_or_else(|| StepError::precondition_failed("Audio has not been reconciled"))
    }

    /// Timed captions, if any were produced.
    pub fn caption_track(&self) -> Option<&CaptionTrack> {
        self.captions.as_ref().map(|c| &c.track)
    }
}

/// Output from the Normalize step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeOutput {
    /// Normalized clips, in input order.
    pub clips: Vec<NormalizedClip>,
    /// Source clips that could not be normalized.
    pub failed: Vec<PathBuf>,
}

/// Output from the Concatenate step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcatOutput {
    /// The joined video track.
    pub track: Track,
    /// Leading clips included in `track`.
    pub clips_used: usize,
    /// Clips handed to the step.
    pub clips_requested: usize,
    /// Sum of all input clip durations.
    pub expected_duration: f64,
}

/// Output from the Reconcile step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutput {
    /// Muxed track, or the video track when reconciliation fell back.
    pub track: Track,
    /// Plan chosen from the two lengths.
    pub plan: Option<ReconcilePlan>,
    /// Why the video was passed through, if it was.
    pub fallback: Option<String>,
}

/// Output from the Captions step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionsOutput {
    /// Final caption timing.
    pub track: CaptionTrack,
    /// SubRip file in the scratch directory.
    pub srt_path: PathBuf,
    /// Whether the track was realigned to the reconciled duration.
    pub realigned: bool,
}

/// Output from the Render step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOutput {
    /// Final output file.
    pub output_path: PathBuf,
    /// Duration of the final output.
    pub duration: f64,
    /// Whether captions were burned in.
    pub captions_burned: bool,
}

/// Output from the Finish step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinishOutput {
    /// Passes now in the output: "fade", "watermark", "music".
    pub applied: Vec<String>,
    /// "pass: reason" for every pass that was dropped.
    pub failed: Vec<String>,
}

/// How a step ended, short of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Step produced its output through a fallback.
    Degraded(String),
    /// Step was skipped (nothing to do, not an error).
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_tracks_progress() {
        let mut state = JobState::new("job-123");
        assert!(state.video_track().is_err());

        state.concat = Some(ConcatOutput {
            track: Track::video("/tmp/concat.mp4", 12.0),
            clips_used: 2,
            clips_requested: 2,
            expected_duration: 12.0,
        });

        assert_eq!(state.video_track().unwrap().duration, 12.0);
        assert!(state.reconciled_track().is_err());
        assert!(state.caption_track().is_none());
    }

    #[test]
    fn empty_sections_are_left_out_of_json() {
        let state = JobState::new("job-456");
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"job_id\":\"job-456\""));
        assert!(!json.contains("\"concat\""));
    }
}
