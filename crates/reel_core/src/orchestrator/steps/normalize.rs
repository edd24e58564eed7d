//! Normalize step - brings every clip to the job's target format.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, NormalizeOutput, StepOutcome};
use crate::timeline::normalize_clips;

/// Scales, pads and resamples each clip; failed clips are excluded and
/// reported, never silently dropped.
pub struct NormalizeStep;

impl NormalizeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NormalizeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for NormalizeStep {
    fn name(&self) -> &str {
        "Normalize"
    }

    fn description(&self) -> &str {
        "Scale, letterbox and resample clips to the target format"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if ctx.job.clips.is_empty() {
            return Err(StepError::invalid_input("No clips to normalize"));
        }
        if !ctx.job.target.is_valid() {
            return Err(StepError::invalid_input(format!(
                "Invalid target format {}x{}@{}",
                ctx.job.target.width, ctx.job.target.height, ctx.job.target.frame_rate
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let target = ctx.job.target;
        ctx.logger.info(&format!(
            "Normalizing {} clip(s) to {}x{}@{}",
            ctx.job.clips.len(),
            target.width,
            target.height,
            target.frame_rate
        ));

        let batch = normalize_clips(
            &ctx.media_tool(),
            &ctx.job.clips,
            &ctx.work_dir,
            &target,
            &ctx.settings.composition,
            &ctx.cancel,
        );

        for clip in &batch.clips {
            ctx.logger.debug(&format!(
                "{} -> {:.3}s",
                clip.source.display(),
                clip.duration
            ));
        }

        if batch.clips.is_empty() {
            let detail = batch
                .failures
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no clip was processed".to_string());
            return Err(StepError::other(format!(
                "None of the {} clip(s) could be normalized: {}",
                ctx.job.clips.len(),
                detail
            )));
        }

        let failed: Vec<_> = batch.failures.iter().map(|f| f.path.clone()).collect();
        for path in &failed {
            ctx.logger.warn(&format!("Excluding clip '{}'", path.display()));
        }

        let outcome = if failed.is_empty() {
            StepOutcome::Success
        } else {
            StepOutcome::Degraded(format!(
                "{} of {} clip(s) could not be normalized",
                failed.len(),
                ctx.job.clips.len()
            ))
        };

        state.normalize = Some(NormalizeOutput {
            clips: batch.clips,
            failed,
        });

        Ok(outcome)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let clips = state.normalized_clips()?;
        if clips.is_empty() {
            return Err(StepError::invalid_output("No normalized clips recorded"));
        }
        Ok(())
    }
}
