//! Normalize clips to a common geometry and frame rate.
//!
//! Every clip is scaled to fit inside the target while keeping its aspect
//! ratio, padded (letterboxed) to exactly the target size, resampled to the
//! target frame rate, and re-encoded without audio.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::CompositionSettings;
use crate::models::{NormalizedClip, TargetFormat, TrackKind};
use crate::orchestrator::CancelHandle;
use crate::tools::{MediaTool, ToolError, ToolInvocation};

/// A clip that could not be normalized.
#[derive(Error, Debug)]
#[error("Failed to normalize '{}': {source}", path.display())]
pub struct NormalizeError {
    /// The offending clip.
    pub path: PathBuf,
    #[source]
    pub source: ToolError,
}

/// Filter graph: fit inside the target, pad to it, square pixels, fixed rate.
pub fn scale_pad_filter(target: &TargetFormat) -> String {
    let (w, h) = (target.width, target.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}",
        fps = target.frame_rate
    )
}

/// Build the invocation that normalizes `clip` into `output`.
pub fn normalize_invocation(
    clip: &Path,
    output: &Path,
    target: &TargetFormat,
    encoder: &CompositionSettings,
) -> ToolInvocation {
    ToolInvocation::new("normalize", output, TrackKind::Video)
        .input(clip)
        .args(["-vf".to_string(), scale_pad_filter(target)])
        .args(["-r".to_string(), target.frame_rate.to_string()])
        .arg("-an")
        .args(encoder.video_encoder_args())
}

/// Normalize one clip.
pub fn normalize_clip(
    tool: &dyn MediaTool,
    clip: &Path,
    output: &Path,
    target: &TargetFormat,
    encoder: &CompositionSettings,
    cancel: &CancelHandle,
) -> Result<NormalizedClip, NormalizeError> {
    let invocation = normalize_invocation(clip, output, target, encoder);
    let track = tool.run(&invocation, cancel).map_err(|source| NormalizeError {
        path: clip.to_path_buf(),
        source,
    })?;

    Ok(NormalizedClip {
        source: clip.to_path_buf(),
        path: track.path,
        duration: track.duration,
        target: *target,
    })
}

/// Output path for the clip at `index`.
pub fn normalized_path(work_dir: &Path, index: usize) -> PathBuf {
    work_dir.join(format!("normalized_{:03}.mp4", index))
}

/// Result of normalizing a list of clips.
#[derive(Debug, Default)]
pub struct NormalizeBatch {
    /// Successfully normalized clips, in input order.
    pub clips: Vec<NormalizedClip>,
    /// Clips that failed, in input order.
    pub failures: Vec<NormalizeError>,
}

/// Normalize every clip, keeping input order and collecting failures.
///
/// Stops early (without error) once `cancel` is set.
pub fn normalize_clips(
    tool: &dyn MediaTool,
    clips: &[PathBuf],
    work_dir: &Path,
    target: &TargetFormat,
    encoder: &CompositionSettings,
    cancel: &CancelHandle,
) -> NormalizeBatch {
    let mut batch = NormalizeBatch::default();

    for (i, clip) in clips.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        match normalize_clip(tool, clip, &normalized_path(work_dir, i), target, encoder, cancel) {
            Ok(normalized) => batch.clips.push(normalized),
            Err(e) => {
                tracing::warn!("{}", e);
                batch.failures.push(e);
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::FakeTool;
    use tempfile::tempdir;

    #[test]
    fn filter_letterboxes_to_target() {
        let filter = scale_pad_filter(&TargetFormat::new(1920, 1080, 30));
        assert_eq!(
            filter,
            "scale=1920:1080:force_original_aspect_ratio=decrease,\
             pad=1920:1080:(ow-iw)/2:(oh-ih)/2,setsar=1,fps=30"
        );
    }

    #[test]
    fn invocation_drops_audio_and_sets_rate() {
        let inv = normalize_invocation(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &TargetFormat::new(1280, 720, 25),
            &CompositionSettings::default(),
        );
        assert!(inv.has_arg("-an"));
        assert_eq!(inv.arg_value("-r"), Some("25"));
        assert_eq!(inv.arg_value("-c:v"), Some("libx264"));
        assert_eq!(inv.arg_value("-crf"), Some("23"));
        assert_eq!(inv.output_kind(), TrackKind::Video);
    }

    #[test]
    fn normalizes_and_keeps_duration() {
        let dir = tempdir().unwrap();
        let tool = FakeTool::new().with_video("a.mp4", 6.0, 640, 480);

        let clip = normalize_clip(
            &tool,
            Path::new("a.mp4"),
            &normalized_path(dir.path(), 0),
            &TargetFormat::default(),
            &CompositionSettings::default(),
            &CancelHandle::new(),
        )
        .unwrap();

        assert_eq!(clip.duration, 6.0);
        assert_eq!(clip.source, PathBuf::from("a.mp4"));
        assert!(clip.path.ends_with("normalized_000.mp4"));
    }

    #[test]
    fn batch_reports_failures_without_dropping_order() {
        let dir = tempdir().unwrap();
        let tool = FakeTool::new()
            .with_video("a.mp4", 5.0, 1920, 1080)
            .with_video("b.mp4", 7.0, 1920, 1080)
            .with_video("c.mp4", 9.0, 1920, 1080)
            .fail_when(|inv| inv.inputs()[0].path == Path::new("b.mp4"));

        let clips = vec![
            PathBuf::from("a.mp4"),
            PathBuf::from("b.mp4"),
            PathBuf::from("c.mp4"),
        ];
        let batch = normalize_clips(
            &tool,
            &clips,
            dir.path(),
            &TargetFormat::default(),
            &CompositionSettings::default(),
            &CancelHandle::new(),
        );

        assert_eq!(batch.clips.len(), 2);
        assert_eq!(batch.clips[0].source, PathBuf::from("a.mp4"));
        assert_eq!(batch.clips[1].source, PathBuf::from("c.mp4"));
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].path, PathBuf::from("b.mp4"));
    }
}
