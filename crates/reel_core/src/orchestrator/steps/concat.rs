//! Concatenate step - joins normalized clips into one video track.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{ConcatOutput, Context, JobState, StepOutcome};
use crate::timeline::{concatenate, ConcatError};

/// Joins clips by stream copy. A partial join (longest working prefix) is
/// reported as a degradation.
pub struct ConcatStep;

impl ConcatStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConcatStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ConcatStep {
    fn name(&self) -> &str {
        "Concatenate"
    }

    fn description(&self) -> &str {
        "Join normalized clips by stream copy"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let clips = state.normalized_clips()?;

        let outcome = match concatenate(&ctx.media_tool(), clips, &ctx.work_dir, &ctx.cancel) {
            Ok(outcome) => outcome,
            Err(ConcatError::ListWrite { source, .. }) => {
                return Err(StepError::io_error("writing concat list", source))
            }
            Err(e) => return Err(StepError::other(e.to_string())),
        };

        ctx.logger.info(&format!(
            "Video timeline: {:.3}s from {} clip(s)",
            outcome.track.duration, outcome.clips_used
        ));

        let step_outcome = if outcome.is_complete() {
            StepOutcome::Success
        } else {
            StepOutcome::Degraded(format!(
                "kept {} of {} clips ({:.2}s of {:.2}s)",
                outcome.clips_used,
                outcome.clips_requested,
                outcome.track.duration,
                outcome.expected_duration
            ))
        };

        state.concat = Some(ConcatOutput {
            track: outcome.track,
            clips_used: outcome.clips_used,
            clips_requested: outcome.clips_requested,
            expected_duration: outcome.expected_duration,
        });

        Ok(step_outcome)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let track = state.video_track()?;
        if !track.path.exists() {
            return Err(StepError::file_not_found(&track.path));
        }
        Ok(())
    }
}
