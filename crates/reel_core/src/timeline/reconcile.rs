//! Reconcile video and audio lengths, then mux them.
//!
//! # Decision Table
//!
//! Evaluated in order, with `Dv` the video length and `Da` the audio length:
//!
//! | Condition                       | Plan           | Result length |
//! |---------------------------------|----------------|---------------|
//! | `abs(Dv - Da) < tolerance`      | direct mux     | `min(Dv, Da)` |
//! | `Dv > Da`, `Da < Dv * fraction` | loop audio     | `Dv`          |
//! | `Dv > Da` otherwise             | pad audio      | `Dv`          |
//! | `Da > Dv`, `Da/Dv <= max`       | stretch video  | `Da`          |
//! | `Da > Dv` otherwise             | loop video     | `Da`          |
//!
//! Any tool failure leaves the original video track in place and is
//! reported as a fallback; it is never raised to the caller.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::concat::{concat_invocation, render_concat_list};
use crate::config::{CompositionSettings, ReconcileSettings};
use crate::models::{Track, TrackKind};
use crate::orchestrator::CancelHandle;
use crate::tools::{MediaTool, ToolError, ToolInvocation, ToolResult};

/// How the two lengths will be brought together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ReconcilePlan {
    /// Lengths are close enough; mux and keep the shorter.
    DirectMux,
    /// Audio is much shorter; repeat it from the start to cover the video.
    LoopAudio { target_secs: f64, repeats: u32 },
    /// Audio is somewhat shorter; append silence.
    PadAudio { silence_secs: f64 },
    /// Audio is somewhat longer; slow the video by `ratio`.
    StretchVideo { ratio: f64 },
    /// Audio is much longer; repeat the video `loops` times.
    LoopVideo { loops: u32 },
}

impl ReconcilePlan {
    /// Pick a plan for video length `video` and audio length `audio`.
    ///
    /// Returns `None` when either length is not a positive finite number.
    pub fn decide(video: f64, audio: f64, settings: &ReconcileSettings) -> Option<Self> {
        let usable = |d: f64| d.is_finite() && d > 0.0;
        if !usable(video) || !usable(audio) {
            return None;
        }

        if (video - audio).abs() < settings.tolerance_secs {
            return Some(Self::DirectMux);
        }

        if video > audio {
            if audio < video * settings.loop_audio_below {
                let repeats = ((video / audio).ceil() as u32).max(2);
                Some(Self::LoopAudio {
                    target_secs: video,
                    repeats,
                })
            } else {
                Some(Self::PadAudio {
                    silence_secs: video - audio,
                })
            }
        } else {
            let ratio = audio / video;
            if ratio <= settings.max_stretch_ratio {
                Some(Self::StretchVideo { ratio })
            } else {
                Some(Self::LoopVideo {
                    loops: ratio.ceil() as u32,
                })
            }
        }
    }

    /// Short name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DirectMux => "direct_mux",
            Self::LoopAudio { .. } => "loop_audio",
            Self::PadAudio { .. } => "pad_audio",
            Self::StretchVideo { .. } => "stretch_video",
            Self::LoopVideo { .. } => "loop_video",
        }
    }

    /// Length the muxed result should have.
    pub fn expected_duration(&self, video: f64, audio: f64) -> f64 {
        match self {
            Self::DirectMux => video.min(audio),
            Self::LoopAudio { .. } | Self::PadAudio { .. } => video,
            Self::StretchVideo { .. } | Self::LoopVideo { .. } => audio,
        }
    }
}

impl std::fmt::Display for ReconcilePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectMux => write!(f, "direct mux"),
            Self::LoopAudio { target_secs, repeats } => {
                write!(f, "loop audio x{} to {:.3}s", repeats, target_secs)
            }
            Self::PadAudio { silence_secs } => write!(f, "pad audio with {:.3}s silence", silence_secs),
            Self::StretchVideo { ratio } => write!(f, "stretch video by {:.4}", ratio),
            Self::LoopVideo { loops } => write!(f, "loop video x{}", loops),
        }
    }
}

/// Result of a reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// The muxed track, or the untouched video track on fallback.
    pub track: Track,
    /// The plan chosen, if the lengths allowed one.
    pub plan: Option<ReconcilePlan>,
    /// Why the original video was kept instead.
    pub fallback: Option<String>,
}

impl ReconcileOutcome {
    /// Whether the original video was passed through.
    pub fn is_degraded(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Runs reconciliation plans against a media tool inside a work directory.
pub struct Reconciler<'a> {
    tool: &'a dyn MediaTool,
    settings: &'a ReconcileSettings,
    encoder: &'a CompositionSettings,
    work_dir: &'a Path,
    cancel: &'a CancelHandle,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        tool: &'a dyn MediaTool,
        settings: &'a ReconcileSettings,
        encoder: &'a CompositionSettings,
        work_dir: &'a Path,
        cancel: &'a CancelHandle,
    ) -> Self {
        Self {
            tool,
            settings,
            encoder,
            work_dir,
            cancel,
        }
    }

    /// Bring `video` and `audio` to a common length and mux them.
    pub fn run(&self, video: &Track, audio: &Track) -> ReconcileOutcome {
        let Some(plan) = ReconcilePlan::decide(video.duration, audio.duration, self.settings) else {
            let reason = format!(
                "cannot reconcile video {:.3}s with audio {:.3}s",
                video.duration, audio.duration
            );
            tracing::warn!("Reconciliation skipped: {}", reason);
            return Self::passthrough(video, None, reason);
        };

        tracing::info!(
            "Reconciling video {:.3}s with audio {:.3}s: {}",
            video.duration,
            audio.duration,
            plan
        );

        match self.execute(&plan, video, audio) {
            Ok(track) => ReconcileOutcome {
                track,
                plan: Some(plan),
                fallback: None,
            },
            Err(e) => {
                tracing::warn!("Reconciliation ({}) failed, keeping original video: {}", plan.name(), e);
                Self::passthrough(video, Some(plan), e.to_string())
            }
        }
    }

    fn passthrough(video: &Track, plan: Option<ReconcilePlan>, reason: String) -> ReconcileOutcome {
        ReconcileOutcome {
            track: video.clone(),
            plan,
            fallback: Some(reason),
        }
    }

    fn execute(&self, plan: &ReconcilePlan, video: &Track, audio: &Track) -> ToolResult<Track> {
        match plan {
            ReconcilePlan::DirectMux => self.mux(&video.path, &audio.path),
            ReconcilePlan::LoopAudio { target_secs, .. } => {
                let looped = self.run_tool(loop_audio_invocation(
                    &audio.path,
                    &self.path("audio_looped.m4a"),
                    *target_secs,
                    &self.encoder.audio_codec,
                ))?;
                self.mux(&video.path, &looped.path)
            }
            ReconcilePlan::PadAudio { silence_secs } => {
                let padded = self.run_tool(pad_audio_invocation(
                    &audio.path,
                    &self.path("audio_padded.m4a"),
                    *silence_secs,
                    video.duration,
                    &self.encoder.audio_codec,
                ))?;
                self.mux(&video.path, &padded.path)
            }
            ReconcilePlan::StretchVideo { ratio } => self.run_tool(stretch_video_invocation(
                &video.path,
                &audio.path,
                &self.path("reconciled.mp4"),
                *ratio,
                audio.duration,
                self.encoder,
            )),
            ReconcilePlan::LoopVideo { loops } => {
                let list = self.path("video_loop.txt");
                let repeated: Vec<&Path> = (0..*loops).map(|_| video.path.as_path()).collect();
                fs::write(&list, render_concat_list(&repeated))
                    .map_err(|e| ToolError::io("writing loop list", e))?;
                let looped = self.run_tool(concat_invocation(
                    "loop_video",
                    &list,
                    &self.path("video_looped.mp4"),
                    TrackKind::Video,
                ))?;
                self.mux(&looped.path, &audio.path)
            }
        }
    }

    fn mux(&self, video: &Path, audio: &Path) -> ToolResult<Track> {
        self.run_tool(mux_invocation(
            video,
            audio,
            &self.path("reconciled.mp4"),
            &self.encoder.audio_codec,
        ))
    }

    fn run_tool(&self, invocation: ToolInvocation) -> ToolResult<Track> {
        self.tool.run(&invocation, self.cancel)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}

fn seconds_arg(secs: f64) -> String {
    format!("{:.3}", secs)
}

/// Mux the first video stream with the first audio stream, shortest wins.
pub fn mux_invocation(video: &Path, audio: &Path, output: &Path, audio_codec: &str) -> ToolInvocation {
    ToolInvocation::new("mux", output, TrackKind::Muxed)
        .input(video)
        .input(audio)
        .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", audio_codec])
        .arg("-shortest")
}

/// Repeat `audio` from the start until it covers `target_secs`.
pub fn loop_audio_invocation(
    audio: &Path,
    output: &Path,
    target_secs: f64,
    audio_codec: &str,
) -> ToolInvocation {
    ToolInvocation::new("loop_audio", output, TrackKind::Audio)
        .input_with(["-stream_loop", "-1"], audio)
        .args(["-t".to_string(), seconds_arg(target_secs)])
        .args(["-vn", "-c:a", audio_codec])
}

/// Append `silence_secs` of silence so the audio lasts `target_secs`.
pub fn pad_audio_invocation(
    audio: &Path,
    output: &Path,
    silence_secs: f64,
    target_secs: f64,
    audio_codec: &str,
) -> ToolInvocation {
    ToolInvocation::new("pad_audio", output, TrackKind::Audio)
        .input(audio)
        .args(["-af".to_string(), format!("apad=pad_dur={}", seconds_arg(silence_secs))])
        .args(["-t".to_string(), seconds_arg(target_secs)])
        .args(["-vn", "-c:a", audio_codec])
}

/// Slow the video's timestamps by `ratio` and mux the audio unchanged.
pub fn stretch_video_invocation(
    video: &Path,
    audio: &Path,
    output: &Path,
    ratio: f64,
    audio_secs: f64,
    encoder: &CompositionSettings,
) -> ToolInvocation {
    ToolInvocation::new("stretch_video", output, TrackKind::Muxed)
        .input(video)
        .input(audio)
        .args([
            "-filter_complex".to_string(),
            format!("[0:v]setpts={}*PTS[v]", ratio),
        ])
        .args(["-map", "[v]", "-map", "1:a:0"])
        .args(encoder.video_encoder_args())
        .args(["-c:a", "copy"])
        .args(["-t".to_string(), seconds_arg(audio_secs)])
}
