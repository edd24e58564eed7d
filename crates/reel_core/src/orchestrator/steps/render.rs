//! Render step - burns captions in and writes the final output file.

use std::fs;
use std::path::Path;

use crate::config::{BurnSettings, CompositionSettings};
use crate::models::TrackKind;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, RenderOutput, StepOutcome};
use crate::tools::{MediaTool, ToolInvocation};

/// Writes the job's output. With captions, they are burned in; if that
/// fails the reconciled track is copied as-is and the step is degraded.
pub struct RenderStep;

impl RenderStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RenderStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape a path for use as a filter option value.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// `subtitles` filter rendering `srt` with the configured style.
pub fn subtitles_filter(srt: &Path, burn: &BurnSettings) -> String {
    format!(
        "subtitles={}:force_style='{}'",
        escape_filter_path(srt),
        burn.force_style()
    )
}

/// Invocation that burns `srt` into `source`, copying the audio.
pub fn burn_invocation(
    source: &Path,
    srt: &Path,
    output: &Path,
    burn: &BurnSettings,
    encoder: &CompositionSettings,
) -> ToolInvocation {
    ToolInvocation::new("burn_captions", output, TrackKind::Muxed)
        .input(source)
        .args(["-vf".to_string(), subtitles_filter(srt, burn)])
        .args(encoder.video_encoder_args())
        .args(["-c:a", "copy"])
}

impl PipelineStep for RenderStep {
    fn name(&self) -> &str {
        "Render"
    }

    fn description(&self) -> &str {
        "Burn in captions and write the output file"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if let Some(parent) = ctx.job.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StepError::io_error("creating output directory", e))?;
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let source = state.reconciled_track()?.clone();
        let output = ctx.job.output_path.clone();
        let mut burn_failure = None;

        match state.captions {
            Some(ref captions) if ctx.settings.burn.enabled => {
                ctx.logger.section("Burning captions");
                let invocation = burn_invocation(
                    &source.path,
                    &captions.srt_path,
                    &output,
                    &ctx.settings.burn,
                    &ctx.settings.composition,
                );

                match ctx.media_tool().run(&invocation, &ctx.cancel) {
                    Ok(track) => {
                        ctx.logger.info(&format!("Output: {}", track.path.display()));
                        state.render = Some(RenderOutput {
                            output_path: track.path,
                            duration: track.duration,
                            captions_burned: true,
                        });
                        return Ok(StepOutcome::Success);
                    }
                    Err(e) if e.is_cancelled() => return Err(e.into()),
                    Err(e) => {
                        ctx.logger
                            .fallback("Caption burn-in failed, writing output without captions");
                        burn_failure = Some(e.to_string());
                    }
                }
            }
            Some(_) => ctx.logger.info("Caption burn-in disabled"),
            None => {}
        }

        if source.path != output {
            fs::copy(&source.path, &output)
                .map_err(|e| StepError::io_error("copying final output", e))?;
        }
        ctx.logger.info(&format!("Output: {}", output.display()));

        state.render = Some(RenderOutput {
            output_path: output,
            duration: source.duration,
            captions_burned: false,
        });

        Ok(match burn_failure {
            Some(reason) => StepOutcome::Degraded(format!("caption burn-in failed: {}", reason)),
            None => StepOutcome::Success,
        })
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let render = state
            .render
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("No output recorded"))?;
        if !render.output_path.exists() {
            return Err(StepError::file_not_found(&render.output_path));
        }
        Ok(())
    }
}
