//! Pipeline orchestrator for composition jobs.
//!
//! Each job runs as one linear sequence of steps that validate, execute,
//! and record their results. A step that falls back reports
//! [`StepOutcome::Degraded`] instead of failing; only a job with nothing
//! usable left fails with a [`PipelineError`].
//!
//! # Architecture
//!
//! ```text
//! Composer
//!   └── Pipeline
//!         ├── Step: Normalize
//!         ├── Step: Concatenate
//!         ├── Step: Reconcile
//!         ├── Step: Captions
//!         ├── Step: Render
//!         └── Step: Finish
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use reel_core::config::Settings;
//! use reel_core::models::{CaptionSource, CompositionJob, Track};
//! use reel_core::orchestrator::Composer;
//! use reel_core::tools::FfmpegTool;
//!
//! let job = CompositionJob::new(
//!     "promo",
//!     vec!["intro.mp4".into(), "beach.mp4".into()],
//!     Track::audio("voice.mp3", 24.0),
//!     "promo.mp4",
//! )
//! .with_captions(CaptionSource::Text("Welcome. Enjoy the view.".into()));
//!
//! let composer = Composer::new(Settings::default(), Arc::new(FfmpegTool::new()));
//! let report = composer.compose(job).unwrap();
//! println!("{} ({:.1}s)", report.output_path.display(), report.final_duration);
//! ```

mod composer;
mod errors;
mod pipeline;
mod step;
pub mod steps;
mod types;

pub use composer::{CompositionReport, Composer};
pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{
    CaptionsStep, ConcatStep, FinishStep, NormalizeStep, ReconcileStep, RenderStep,
};
pub use types::{
    CaptionsOutput, ConcatOutput, Context, FinishOutput, JobState, LoggedTool, NormalizeOutput,
    ProgressCallback, ReconcileOutput, RenderOutput, StepOutcome,
};

/// Create the composition pipeline with all steps in order.
///
/// 1. Normalize - bring clips to the target format
/// 2. Concatenate - join clips into one video track
/// 3. Reconcile - match video to narration length and mux
/// 4. Captions - chunk, time and write captions (skipped without a source)
/// 5. Render - burn captions in and write the output
/// 6. Finish - fade, watermark and music passes (skipped when none is set)
pub fn create_composition_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(NormalizeStep::new())
        .with_step(ConcatStep::new())
        .with_step(ReconcileStep::new())
        .with_step(CaptionsStep::new())
        .with_step(RenderStep::new())
        .with_step(FinishStep::new())
}
