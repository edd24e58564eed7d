//! Captions step - builds, times and writes the caption track.

use crate::captions::{build_captions, load_srt, save_srt, CaptionTrack};
use crate::models::CaptionSource;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{CaptionsOutput, Context, JobState, StepOutcome};

/// Produces `captions.srt` in the scratch directory from the job's caption
/// source. Invariant violations are fatal; an empty source skips the step.
pub struct CaptionsStep;

impl CaptionsStep {
    pub fn new() -> Self {
        Self
    }

    /// Turn the job's caption source into a timed track.
    fn build(&self, ctx: &Context) -> StepResult<CaptionTrack> {
        let settings = &ctx.settings.captions;
        let track = match &ctx.job.captions {
            CaptionSource::None => CaptionTrack::default(),
            CaptionSource::Text(text) => {
                let narration = ctx.job.audio.duration;
                let known = (narration.is_finite() && narration > 0.0).then_some(narration);
                build_captions(text, known, settings)?
            }
            CaptionSource::Timed(track) => track.clone(),
            CaptionSource::SrtFile(path) => {
                ctx.logger
                    .info(&format!("Loading captions from {}", path.display()));
                load_srt(path)?
            }
        };
        Ok(track)
    }
}

impl Default for CaptionsStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for CaptionsStep {
    fn name(&self) -> &str {
        "Captions"
    }

    fn description(&self) -> &str {
        "Chunk and time narration captions"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if let CaptionSource::SrtFile(path) = &ctx.job.captions {
            if !path.exists() {
                return Err(StepError::file_not_found(path));
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        if ctx.job.captions.is_none() {
            return Ok(StepOutcome::Skipped("no caption source".to_string()));
        }

        let settings = &ctx.settings.captions;
        let mut track = self.build(ctx)?;
        if track.is_empty() {
            return Ok(StepOutcome::Skipped("no caption chunks".to_string()));
        }

        let mut realigned = false;
        if settings.realign_to_final_duration {
            let final_duration = state.reconciled_track()?.duration;
            if (final_duration - track.total_duration).abs() > f64::EPSILON {
                ctx.logger.info(&format!(
                    "Realigning {} caption(s) from {:.3}s to {:.3}s",
                    track.len(),
                    track.total_duration,
                    final_duration
                ));
            }
            track = track.realigned(final_duration)?;
            realigned = true;
        }

        track.validate(settings.end_epsilon_secs)?;

        let srt_path = ctx.work_path("captions.srt");
        save_srt(&track, &srt_path)?;

        ctx.logger.info(&format!(
            "{} caption(s) over {:.3}s written to {}",
            track.len(),
            track.total_duration,
            srt_path.display()
        ));

        state.captions = Some(CaptionsOutput {
            track,
            srt_path,
            realigned,
        });

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match state.captions {
            Some(ref captions) if !captions.srt_path.exists() => {
                Err(StepError::file_not_found(&captions.srt_path))
            }
            _ => Ok(()),
        }
    }
}
