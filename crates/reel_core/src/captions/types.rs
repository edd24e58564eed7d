//! Caption data structures.

use serde::{Deserialize, Serialize};

use super::error::{CaptionError, CaptionResult};

/// Tolerance for comparing computed boundaries.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// One caption's text and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionChunk {
    /// Position in the caption sequence (0-based, contiguous).
    pub index: usize,
    /// Caption text.
    pub text: String,
    /// Number of whitespace-separated words.
    pub word_count: usize,
    /// Number of characters (not bytes).
    pub char_count: usize,
}

impl CaptionChunk {
    /// Build a chunk, computing its counts.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            index,
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
            text,
        }
    }
}

/// Display window for one caption, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptionInterval {
    pub chunk_index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl CaptionInterval {
    pub fn new(chunk_index: usize, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            chunk_index,
            start_seconds,
            end_seconds,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// A timed caption sequence spanning `total_duration` seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub chunks: Vec<CaptionChunk>,
    pub intervals: Vec<CaptionInterval>,
    pub total_duration: f64,
}

impl CaptionTrack {
    /// Assemble a track without checking it; call [`validate`](Self::validate) before use.
    pub fn new(chunks: Vec<CaptionChunk>, intervals: Vec<CaptionInterval>, total_duration: f64) -> Self {
        Self {
            chunks,
            intervals,
            total_duration,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterate over chunks paired with their intervals.
    pub fn entries(&self) -> impl Iterator<Item = (&CaptionChunk, &CaptionInterval)> {
        self.chunks.iter().zip(self.intervals.iter())
    }

    /// The whitespace-normalized text the chunks were cut from.
    pub fn joined_text(&self) -> String {
        self.chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check ordering and bounds.
    ///
    /// - one interval per chunk, indices contiguous from 0
    /// - every interval has positive length
    /// - starts strictly increase and intervals never overlap
    /// - the last end is within `end_epsilon` of `total_duration`
    pub fn validate(&self, end_epsilon: f64) -> CaptionResult<()> {
        if self.chunks.len() != self.intervals.len() {
            return Err(CaptionError::invariant(
                self.chunks.len().min(self.intervals.len()),
                format!(
                    "{} chunks but {} intervals",
                    self.chunks.len(),
                    self.intervals.len()
                ),
            ));
        }

        if !self.is_empty() && !(self.total_duration.is_finite() && self.total_duration > 0.0) {
            return Err(CaptionError::InvalidDuration(self.total_duration));
        }

        let mut previous: Option<&CaptionInterval> = None;
        for (i, (chunk, interval)) in self.entries().enumerate() {
            if chunk.index != i || interval.chunk_index != i {
                return Err(CaptionError::invariant(i, "indices are not contiguous"));
            }
            if chunk.text.trim().is_empty() {
                return Err(CaptionError::invariant(i, "empty caption text"));
            }
            if !(interval.start_seconds.is_finite() && interval.end_seconds.is_finite()) {
                return Err(CaptionError::invariant(i, "non-finite timestamp"));
            }
            if interval.start_seconds < 0.0 {
                return Err(CaptionError::invariant(i, "starts before zero"));
            }
            if interval.end_seconds <= interval.start_seconds {
                return Err(CaptionError::invariant(
                    i,
                    format!(
                        "ends at {:.3}s, not after its start {:.3}s",
                        interval.end_seconds, interval.start_seconds
                    ),
                ));
            }
            if interval.end_seconds > self.total_duration + end_epsilon {
                return Err(CaptionError::invariant(
                    i,
                    format!(
                        "ends at {:.3}s, past the track end {:.3}s",
                        interval.end_seconds, self.total_duration
                    ),
                ));
            }
            if let Some(prev) = previous {
                if interval.start_seconds <= prev.start_seconds {
                    return Err(CaptionError::invariant(i, "start does not increase"));
                }
                if prev.end_seconds > interval.start_seconds + BOUNDARY_EPSILON {
                    return Err(CaptionError::invariant(i, "overlaps the previous caption"));
                }
            }
            previous = Some(interval);
        }

        Ok(())
    }
}
