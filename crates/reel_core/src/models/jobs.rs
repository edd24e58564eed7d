//! Job structures describing one composition request.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::media::{TargetFormat, Track};
use crate::captions::CaptionTrack;

/// Where a job's captions come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CaptionSource {
    /// No captions; the reconciled track is written as-is.
    #[default]
    None,
    /// Raw narration text to chunk and time.
    Text(String),
    /// Captions that already carry timing.
    Timed(CaptionTrack),
    /// An existing SubRip file.
    SrtFile(PathBuf),
}

impl CaptionSource {
    /// Whether this source can produce any captions at all.
    pub fn is_none(&self) -> bool {
        match self {
            CaptionSource::None => true,
            CaptionSource::Text(text) => text.trim().is_empty(),
            CaptionSource::Timed(track) => track.is_empty(),
            CaptionSource::SrtFile(_) => false,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            CaptionSource::None => "none",
            CaptionSource::Text(_) => "text",
            CaptionSource::Timed(_) => "timed",
            CaptionSource::SrtFile(_) => "srt",
        }
    }
}

/// A single composition request.
///
/// Clips are concatenated in the order given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionJob {
    /// Human-readable job name (used for the log file).
    pub name: String,
    /// Ordered clip paths.
    pub clips: Vec<PathBuf>,
    /// Narration track.
    pub audio: Track,
    /// Caption source.
    #[serde(default)]
    pub captions: CaptionSource,
    /// Where the finished video is written.
    pub output_path: PathBuf,
    /// Format clips are normalized to.
    pub target: TargetFormat,
}

impl CompositionJob {
    /// Create a job with no captions and the default target format.
    pub fn new(
        name: impl Into<String>,
        clips: Vec<PathBuf>,
        audio: Track,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            clips,
            audio,
            captions: CaptionSource::None,
            output_path: output_path.into(),
            target: TargetFormat::default(),
        }
    }

    /// Set the caption source (builder pattern).
    pub fn with_captions(mut self, captions: CaptionSource) -> Self {
        self.captions = captions;
        self
    }

    /// Set the target format (builder pattern).
    pub fn with_target(mut self, target: TargetFormat) -> Self {
        self.target = target;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_text_counts_as_no_captions() {
        assert!(CaptionSource::Text("  \n\t ".to_string()).is_none());
        assert!(!CaptionSource::Text("Hello.".to_string()).is_none());
        assert!(CaptionSource::None.is_none());
    }

    #[test]
    fn job_builder_sets_fields() {
        let job = CompositionJob::new(
            "demo",
            vec![PathBuf::from("a.mp4")],
            Track::audio("voice.mp3", 12.0),
            "out.mp4",
        )
        .with_captions(CaptionSource::Text("Hi there.".into()))
        .with_target(TargetFormat::new(1280, 720, 25));

        assert_eq!(job.captions.label(), "text");
        assert_eq!(job.target.width, 1280);
        assert_eq!(job.output_path, PathBuf::from("out.mp4"));
    }

    #[test]
    fn job_serializes() {
        let job = CompositionJob::new("demo", vec![], Track::audio("v.mp3", 1.0), "o.mp4");
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"name\":\"demo\""));
        assert!(json.contains("\"type\":\"none\""));
    }
}
