//! Job runner: validates a job, sets up its scratch space and logger, and
//! runs it through the composition pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use serde::Serialize;

use super::create_composition_pipeline;
use super::errors::{PipelineError, PipelineResult};
use super::pipeline::{CancelHandle, PipelineRunResult};
use super::types::{Context, JobState, ProgressCallback};
use crate::config::Settings;
use crate::logging::{JobLogger, LogCallback, LogConfig};
use crate::models::CompositionJob;
use crate::timeline::ReconcilePlan;
use crate::tools::MediaTool;

type SharedProgress = Arc<dyn Fn(&str, u32, &str) + Send + Sync>;
type SharedEcho = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Summary of a finished job.
///
/// A job that fell back somewhere still produces a playable file; check
/// [`CompositionReport::is_degraded`] and `final_duration` to detect it.
#[derive(Debug, Clone, Serialize)]
pub struct CompositionReport {
    pub job_id: String,
    pub job_name: String,
    pub output_path: PathBuf,
    /// Duration of the written output.
    pub final_duration: f64,
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
    pub steps_degraded: Vec<String>,
    /// "Step: reason" for every fallback taken.
    pub degradations: Vec<String>,
    /// Clips that made it into the timeline, and clips requested.
    pub clips_used: usize,
    pub clips_requested: usize,
    pub reconcile_plan: Option<ReconcilePlan>,
    pub caption_count: usize,
    pub captions_burned: bool,
    /// Finishing passes present in the output.
    pub finishing: Vec<String>,
    pub log_path: PathBuf,
}

impl CompositionReport {
    fn from_run(
        job: &CompositionJob,
        state: &JobState,
        run: PipelineRunResult,
        log_path: PathBuf,
    ) -> Self {
        let render = state.render.as_ref();
        Self {
            job_id: state.job_id.clone(),
            job_name: job.name.clone(),
            output_path: render
                .map(|r| r.output_path.clone())
                .unwrap_or_else(|| job.output_path.clone()),
            final_duration: render.map(|r| r.duration).unwrap_or(0.0),
            steps_completed: run.steps_completed,
            steps_skipped: run.steps_skipped,
            steps_degraded: run.steps_degraded,
            degradations: state.degradations.clone(),
            clips_used: state.concat.as_ref().map(|c| c.clips_used).unwrap_or(0),
            clips_requested: job.clips.len(),
            reconcile_plan: state.reconcile.as_ref().and_then(|r| r.plan.clone()),
            caption_count: state.caption_track().map(|t| t.len()).unwrap_or(0),
            captions_burned: render.map(|r| r.captions_burned).unwrap_or(false),
            finishing: state
                .finish
                .as_ref()
                .map(|f| f.applied.clone())
                .unwrap_or_default(),
            log_path,
        }
    }

    /// Whether any step fell back.
    pub fn is_degraded(&self) -> bool {
        !self.steps_degraded.is_empty()
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }
}

/// Runs composition jobs with one set of settings and one media tool.
pub struct Composer {
    settings: Settings,
    tool: Arc<dyn MediaTool>,
    progress: Option<SharedProgress>,
    echo: Option<SharedEcho>,
}

impl Composer {
    pub fn new(settings: Settings, tool: Arc<dyn MediaTool>) -> Self {
        Self {
            settings,
            tool,
            progress: None,
            echo: None,
        }
    }

    /// Receive (step, percent, message) updates from every job.
    pub fn with_progress(
        mut self,
        callback: impl Fn(&str, u32, &str) + Send + Sync + 'static,
    ) -> Self {
        let callback: SharedProgress = Arc::new(callback);
        self.progress = Some(callback);
        self
    }

    /// Receive (job name, line) for every line written to a job log.
    pub fn with_log_echo(mut self, echo: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        let echo: SharedEcho = Arc::new(echo);
        self.echo = Some(echo);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Compose one job.
    pub fn compose(&self, job: CompositionJob) -> PipelineResult<CompositionReport> {
        self.compose_with_cancel(job, CancelHandle::new())
    }

    /// Compose one job, stopping early once `cancel` is set.
    ///
    /// The job's scratch directory is removed when this returns, whether the
    /// job succeeded or not.
    pub fn compose_with_cancel(
        &self,
        job: CompositionJob,
        cancel: CancelHandle,
    ) -> PipelineResult<CompositionReport> {
        self.validate(&job)?;

        let job_name = job.name.clone();
        let job_id = uuid::Uuid::new_v4().to_string();

        let temp_root = PathBuf::from(&self.settings.paths.temp_root);
        fs::create_dir_all(&temp_root).map_err(|e| {
            PipelineError::setup_failed(&job_name, format!("creating {}: {}", temp_root.display(), e))
        })?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", sanitize(&job_name)))
            .tempdir_in(&temp_root)
            .map_err(|e| PipelineError::setup_failed(&job_name, format!("creating work dir: {}", e)))?;

        let echo = self.echo.as_ref().map(|echo| {
            let echo = Arc::clone(echo);
            let name = job_name.clone();
            let callback: LogCallback = Box::new(move |line: &str| echo(&name, line));
            callback
        });
        let logger = JobLogger::new(
            &job_name,
            &job_id,
            &self.settings.paths.logs_folder,
            LogConfig::from_settings(&self.settings.logging),
            echo,
        )
        .map_err(|e| PipelineError::setup_failed(&job_name, format!("creating job log: {}", e)))?;
        let logger = Arc::new(logger);
        let log_path = logger.log_path().to_path_buf();

        logger.info(&format!("Job '{}' ({}) started", job_name, job_id));
        logger.info(&format!(
            "{} clip(s), audio {} ({:.3}s), captions: {}",
            job.clips.len(),
            job.audio.display_name(),
            job.audio.duration,
            job.captions.label()
        ));
        tracing::info!(job = %job_name, id = %job_id, "Composition started");

        let mut ctx = Context::new(
            job,
            self.settings.clone(),
            scratch.path().to_path_buf(),
            Arc::clone(&logger),
            Arc::clone(&self.tool),
        )
        .with_cancel(cancel.clone());
        if let Some(ref progress) = self.progress {
            let progress = Arc::clone(progress);
            let callback: ProgressCallback =
                Box::new(move |step: &str, percent: u32, message: &str| {
                    progress(step, percent, message)
                });
            ctx = ctx.with_progress_callback(callback);
        }

        let pipeline = create_composition_pipeline().with_cancel_handle(cancel);
        let mut state = JobState::new(&job_id);
        let run = pipeline.run(&ctx, &mut state);
        logger.flush();

        let run = match run {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(job = %job_name, "{}", e);
                return Err(e);
            }
        };

        let report = CompositionReport::from_run(&ctx.job, &state, run, log_path);
        logger.info(&format!(
            "Wrote {} ({:.3}s)",
            report.output_path.display(),
            report.final_duration
        ));

        if self.settings.logging.write_report {
            let report_path = report.output_path.with_extension("report.json");
            match report.write_json(&report_path) {
                Ok(()) => logger.info(&format!("Report: {}", report_path.display())),
                Err(e) => logger.warn(&format!("Could not write report: {}", e)),
            }
        }

        tracing::info!(
            job = %job_name,
            degraded = report.is_degraded(),
            "Composition finished"
        );
        Ok(report)
    }

    /// Compose independent jobs concurrently, one thread per job.
    ///
    /// Results are returned in input order. Tool concurrency is bounded by
    /// the tool's own limiter, not here.
    pub fn compose_batch(
        &self,
        jobs: Vec<CompositionJob>,
    ) -> Vec<PipelineResult<CompositionReport>> {
        thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| {
                    let name = job.name.clone();
                    (name, scope.spawn(move || self.compose(job)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(PipelineError::setup_failed(name, "job thread panicked"))
                    })
                })
                .collect()
        })
    }

    /// Reject jobs with nothing usable to compose.
    fn validate(&self, job: &CompositionJob) -> PipelineResult<()> {
        let problems = self.settings.validate();
        if !problems.is_empty() {
            return Err(PipelineError::validation_failed(
                &job.name,
                format!("invalid settings: {}", problems.join("; ")),
            ));
        }
        if job.clips.is_empty() {
            return Err(PipelineError::validation_failed(&job.name, "no input clips"));
        }
        if !job.audio.path.exists() {
            return Err(PipelineError::validation_failed(
                &job.name,
                format!("audio file not found: {}", job.audio.path.display()),
            ));
        }
        if !job.target.is_valid() {
            return Err(PipelineError::validation_failed(
                &job.name,
                "target width, height and frame rate must be positive",
            ));
        }
        Ok(())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
