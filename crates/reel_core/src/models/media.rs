//! Media structures: clips, normalized clips, and tracks.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of media a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Video only.
    Video,
    /// Audio only.
    Audio,
    /// Video with an audio stream muxed in.
    Muxed,
}

impl TrackKind {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
            TrackKind::Muxed => "muxed",
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Target geometry and frame rate every clip is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetFormat {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub frame_rate: u32,
}

impl TargetFormat {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }

    /// Check that all dimensions are usable.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.frame_rate > 0
    }
}

impl Default for TargetFormat {
    fn default() -> Self {
        Self::new(1920, 1080, 30)
    }
}

/// A source video clip with probed properties.
///
/// Immutable once constructed; normalization produces a new
/// [`NormalizedClip`] rather than altering this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Location of the clip file.
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration: f64,
    /// Frame width in pixels (0 if unknown).
    pub width: u32,
    /// Frame height in pixels (0 if unknown).
    pub height: u32,
}

impl Clip {
    pub fn new(path: impl Into<PathBuf>, duration: f64, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            duration,
            width,
            height,
        }
    }

    /// Pixel count used for quality ordering.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// File name for log output.
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

/// A clip re-encoded to the job's [`TargetFormat`].
///
/// Lives in the job's scratch directory and is discarded with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedClip {
    /// The clip this one was produced from.
    pub source: PathBuf,
    /// Location of the normalized file.
    pub path: PathBuf,
    /// Duration in seconds (probed from the produced file).
    pub duration: f64,
    /// Format the clip was normalized to.
    pub target: TargetFormat,
}

impl NormalizedClip {
    /// View this clip as a video track.
    pub fn as_track(&self) -> Track {
        Track::video(&self.path, self.duration)
    }
}

/// A single media stream file with a known duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Location of the track file.
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration: f64,
    /// What the file carries.
    pub kind: TrackKind,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>, duration: f64, kind: TrackKind) -> Self {
        Self {
            path: path.into(),
            duration,
            kind,
        }
    }

    /// Create a video-only track.
    pub fn video(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self::new(path, duration, TrackKind::Video)
    }

    /// Create an audio-only track.
    pub fn audio(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self::new(path, duration, TrackKind::Audio)
    }

    /// Create a muxed audio/video track.
    pub fn muxed(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self::new(path, duration, TrackKind::Muxed)
    }

    /// Whether the track carries an audio stream.
    pub fn has_audio(&self) -> bool {
        matches!(self.kind, TrackKind::Audio | TrackKind::Muxed)
    }

    /// File name for log output.
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_count_does_not_overflow() {
        let clip = Clip::new("big.mp4", 10.0, 65_535, 65_535);
        assert_eq!(clip.pixel_count(), 65_535u64 * 65_535u64);
    }

    #[test]
    fn track_kind_reports_audio() {
        assert!(Track::muxed("a.mp4", 1.0).has_audio());
        assert!(Track::audio("a.mp3", 1.0).has_audio());
        assert!(!Track::video("a.mp4", 1.0).has_audio());
    }

    #[test]
    fn display_name_uses_file_name() {
        let track = Track::video("/tmp/work/concat.mp4", 3.0);
        assert_eq!(track.display_name(), "concat.mp4");
    }

    #[test]
    fn target_format_validity() {
        assert!(TargetFormat::default().is_valid());
        assert!(!TargetFormat::new(0, 1080, 30).is_valid());
    }

    #[test]
    fn track_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TrackKind::Muxed).unwrap();
        assert_eq!(json, "\"muxed\"");
    }
}
