//! External transcoding engine.
//!
//! All pixel- and sample-level work is delegated to an external tool behind
//! the [`MediaTool`] trait. Components build a [`ToolInvocation`] describing
//! inputs, options and output, and get back the produced [`Track`] with its
//! probed duration.
//!
//! # Example
//!
//! ```no_run
//! use reel_core::models::TrackKind;
//! use reel_core::orchestrator::CancelHandle;
//! use reel_core::tools::{FfmpegTool, MediaTool, ToolInvocation};
//!
//! let tool = FfmpegTool::new();
//! let inv = ToolInvocation::new("loop_audio", "/tmp/looped.m4a", TrackKind::Audio)
//!     .input_with(["-stream_loop", "-1"], "/tmp/voice.mp3")
//!     .args(["-t", "10.000", "-c:a", "aac"]);
//!
//! let track = tool.run(&inv, &CancelHandle::new()).unwrap();
//! println!("{:.2}s", track.duration);
//! ```

mod error;
mod ffmpeg;
mod invocation;
mod limiter;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ToolError, ToolResult};
pub use ffmpeg::FfmpegTool;
pub use invocation::{ToolInput, ToolInvocation};
pub use limiter::{ToolLimiter, ToolPermit};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{Clip, Track};
use crate::orchestrator::CancelHandle;

/// Properties reported by probing a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration: f64,
    /// Width of the first video stream.
    pub width: Option<u32>,
    /// Height of the first video stream.
    pub height: Option<u32>,
    /// Whether any video stream is present.
    pub has_video: bool,
    /// Whether any audio stream is present.
    pub has_audio: bool,
}

/// Capability to transcode and probe media files.
///
/// Implementations must be safe to share across jobs. `run` blocks until the
/// output is complete, and must honour `cancel` while the work is in flight.
pub trait MediaTool: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Execute one invocation and return the produced track.
    ///
    /// The returned duration is measured from the written file, not assumed
    /// from the request.
    fn run(&self, invocation: &ToolInvocation, cancel: &CancelHandle) -> ToolResult<Track>;

    /// Read duration and geometry of a media file.
    fn probe(&self, path: &Path) -> ToolResult<MediaInfo>;
}

/// Probe a file and describe it as a [`Clip`].
pub fn probe_clip(tool: &dyn MediaTool, path: &Path) -> ToolResult<Clip> {
    let info = tool.probe(path)?;
    if !info.has_video {
        return Err(ToolError::probe(path, "no video stream"));
    }
    Ok(Clip::new(
        path,
        info.duration,
        info.width.unwrap_or(0),
        info.height.unwrap_or(0),
    ))
}

/// Probe a file and describe it as an audio [`Track`].
pub fn probe_audio(tool: &dyn MediaTool, path: &Path) -> ToolResult<Track> {
    let info = tool.probe(path)?;
    if !info.has_audio {
        return Err(ToolError::probe(path, "no audio stream"));
    }
    Ok(Track::audio(path, info.duration))
}

#[cfg(test)]
mod tests {
    use super::testing::FakeTool;
    use super::*;

    #[test]
    fn probe_clip_reads_geometry() {
        let tool = FakeTool::new().with_video("a.mp4", 7.5, 1280, 720);
        let clip = probe_clip(&tool, Path::new("a.mp4")).unwrap();
        assert_eq!(clip.duration, 7.5);
        assert_eq!((clip.width, clip.height), (1280, 720));
    }

    #[test]
    fn probe_audio_rejects_silent_file() {
        let tool = FakeTool::new().with_video("a.mp4", 7.5, 1280, 720);
        assert!(probe_audio(&tool, Path::new("a.mp4")).is_err());
    }
}
