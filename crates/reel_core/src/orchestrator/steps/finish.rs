//! Finish step - optional fade, watermark and background music passes.
//!
//! Each pass rewrites the rendered output through the media tool. A pass
//! that fails leaves the previous file in place and degrades the step.

use std::fs;
use std::path::Path;

use crate::config::CompositionSettings;
use crate::models::TrackKind;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, FinishOutput, JobState, StepOutcome};
use crate::tools::{MediaTool, ToolInvocation};

pub struct FinishStep;

impl FinishStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FinishStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Fade in from black at the start and out at the end. The fade is capped
/// at half the duration so the two never overlap.
pub fn fade_filter(duration: f64, fade_secs: f64) -> String {
    let fade = fade_secs.min(duration / 2.0);
    format!(
        "fade=t=in:st=0:d={fade:.3},fade=t=out:st={:.3}:d={fade:.3}",
        (duration - fade).max(0.0)
    )
}

fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '\'' | ':' | ',' | ';' | '[' | ']' | '%') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Semi-transparent text in the bottom-right corner.
pub fn watermark_filter(text: &str, font_size: u32) -> String {
    format!(
        "drawtext=text={}:x=W-tw-10:y=H-th-10:fontsize={}:fontcolor=white@0.5:box=1:boxcolor=black@0.2",
        escape_drawtext(text),
        font_size
    )
}

/// Music gain in dB: 0.0 maps to -20 dB, 1.0 leaves the music unchanged.
pub fn music_gain_db(volume: f64) -> f64 {
    -20.0 + volume.clamp(0.0, 1.0) * 20.0
}

/// Re-encode `source` through `filters`, copying the audio.
pub fn video_pass_invocation(
    source: &Path,
    output: &Path,
    duration: f64,
    filters: &[String],
    encoder: &CompositionSettings,
) -> ToolInvocation {
    ToolInvocation::new("finish_video", output, TrackKind::Muxed)
        .input(source)
        .args(["-vf".to_string(), filters.join(",")])
        .args(encoder.video_encoder_args())
        .args(["-c:a".to_string(), "copy".to_string()])
        .args(["-t".to_string(), format!("{:.3}", duration)])
}

/// Loop `music` under the audio of `source` at `volume`, copying the video.
pub fn music_invocation(
    source: &Path,
    music: &Path,
    output: &Path,
    duration: f64,
    volume: f64,
    encoder: &CompositionSettings,
) -> ToolInvocation {
    let graph = format!(
        "[1:a]volume={:.1}dB[bg];[0:a][bg]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[mix]",
        music_gain_db(volume)
    );
    ToolInvocation::new("mix_music", output, TrackKind::Muxed)
        .input(source)
        .input_with(["-stream_loop", "-1"], music)
        .args(["-filter_complex".to_string(), graph])
        .args(["-map", "0:v", "-map", "[mix]", "-c:v", "copy", "-c:a"])
        .arg(encoder.audio_codec.clone())
        .args(["-t".to_string(), format!("{:.3}", duration)])
}

impl PipelineStep for FinishStep {
    fn name(&self) -> &str {
        "Finish"
    }

    fn description(&self) -> &str {
        "Apply fade, watermark and background music"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let finish = &ctx.settings.finish;
        if !finish.is_enabled() {
            return Ok(StepOutcome::Skipped("no finishing passes configured".into()));
        }

        let render = state
            .render
            .clone()
            .ok_or_else(|| StepError::precondition_failed("Output has not been rendered"))?;
        let duration = render.duration;
        let mut current = render.output_path.clone();
        let mut applied = Vec::new();
        let mut failed = Vec::new();

        let mut filters = Vec::new();
        let mut passes = Vec::new();
        if finish.fade_secs > 0.0 && duration > 0.0 {
            filters.push(fade_filter(duration, finish.fade_secs));
            passes.push("fade".to_string());
        }
        if let Some(text) = finish.watermark() {
            filters.push(watermark_filter(text, finish.watermark_font_size));
            passes.push("watermark".to_string());
        }

        if !filters.is_empty() {
            ctx.logger.section(&format!("Applying {}", passes.join(" and ")));
            let invocation = video_pass_invocation(
                &current,
                &ctx.work_path("finished.mp4"),
                duration,
                &filters,
                &ctx.settings.composition,
            );
            match ctx.media_tool().run(&invocation, &ctx.cancel) {
                Ok(track) => {
                    current = track.path;
                    applied.extend(passes);
                }
                Err(e) if e.is_cancelled() => return Err(e.into()),
                Err(e) => {
                    ctx.logger
                        .fallback(&format!("{} failed, keeping the plain picture", passes.join(" and ")));
                    failed.push(format!("{}: {}", passes.join(" and "), e));
                }
            }
        }

        if let Some(music) = finish.music() {
            ctx.logger.section("Mixing background music");
            if !music.exists() {
                ctx.logger.fallback(&format!("Music file not found: {}", music.display()));
                failed.push(format!("music: file not found: {}", music.display()));
            } else {
                let invocation = music_invocation(
                    &current,
                    music,
                    &ctx.work_path("with_music.mp4"),
                    duration,
                    finish.music_volume,
                    &ctx.settings.composition,
                );
                match ctx.media_tool().run(&invocation, &ctx.cancel) {
                    Ok(track) => {
                        current = track.path;
                        applied.push("music".to_string());
                    }
                    Err(e) if e.is_cancelled() => return Err(e.into()),
                    Err(e) => {
                        ctx.logger.fallback("Music mix failed, keeping narration only");
                        failed.push(format!("music: {}", e));
                    }
                }
            }
        }

        if current != render.output_path {
            fs::copy(&current, &render.output_path)
                .map_err(|e| StepError::io_error("replacing output with finished file", e))?;
        }

        let outcome = if failed.is_empty() {
            StepOutcome::Success
        } else {
            StepOutcome::Degraded(failed.join("; "))
        };
        state.finish = Some(FinishOutput { applied, failed });
        Ok(outcome)
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
