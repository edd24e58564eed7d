//! Reconcile step - matches video and narration lengths and muxes them.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, ReconcileOutput, StepOutcome};
use crate::timeline::Reconciler;

/// Applies the loop/pad/stretch decision table. Tool failures pass the
/// video through and are reported as a degradation.
pub struct ReconcileStep;

impl ReconcileStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReconcileStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ReconcileStep {
    fn name(&self) -> &str {
        "Reconcile"
    }

    fn description(&self) -> &str {
        "Match video length to narration and mux audio"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        let audio = &ctx.job.audio;
        if !audio.path.exists() {
            return Err(StepError::file_not_found(&audio.path));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let video = state.video_track()?.clone();
        let audio = &ctx.job.audio;

        ctx.logger.info(&format!(
            "Video {:.3}s, audio {:.3}s",
            video.duration, audio.duration
        ));

        let tool = ctx.media_tool();
        let outcome = Reconciler::new(
            &tool,
            &ctx.settings.reconcile,
            &ctx.settings.composition,
            &ctx.work_dir,
            &ctx.cancel,
        )
        .run(&video, audio);

        if let Some(ref plan) = outcome.plan {
            ctx.logger.info(&format!("Plan: {}", plan));
        }

        let step_outcome = match outcome.fallback {
            Some(ref reason) => StepOutcome::Degraded(format!(
                "audio reconciliation skipped, original video kept: {}",
                reason
            )),
            None => {
                if let Some(ref plan) = outcome.plan {
                    let expected = plan.expected_duration(video.duration, audio.duration);
                    ctx.logger.info(&format!(
                        "Reconciled to {:.3}s (expected {:.3}s)",
                        outcome.track.duration, expected
                    ));
                }
                StepOutcome::Success
            }
        };

        state.reconcile = Some(ReconcileOutput {
            track: outcome.track,
            plan: outcome.plan,
            fallback: outcome.fallback,
        });

        Ok(step_outcome)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let track = state.reconciled_track()?;
        if !(track.duration.is_finite() && track.duration > 0.0) {
            return Err(StepError::invalid_output(format!(
                "Reconciled track has invalid duration {}",
                track.duration
            )));
        }
        Ok(())
    }
}
