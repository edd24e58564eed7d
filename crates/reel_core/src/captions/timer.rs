//! Assign display intervals to caption chunks.
//!
//! The track length `T` is either the known narration length or an estimate
//! from a nominal speaking rate. Each of the `N` chunks owns an equal slot of
//! `T/N` seconds starting at `i·T/N`. Within its slot a chunk is shown for
//! a duration proportional to its length at the effective rate, clamped to
//! the configured display bounds and never past the start of the next slot.

use super::error::{CaptionError, CaptionResult};
use super::types::{CaptionChunk, CaptionInterval, CaptionTrack};
use crate::config::CaptionSettings;

/// Rate and display bounds used for timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingParams {
    /// Nominal speaking rate used when `T` is estimated.
    pub chars_per_second: f64,
    /// Floor for an estimated `T`.
    pub min_estimated_secs: f64,
    pub min_display_secs: f64,
    pub max_display_secs: f64,
}

impl TimingParams {
    pub fn from_settings(settings: &CaptionSettings) -> Self {
        Self {
            chars_per_second: settings.chars_per_second,
            min_estimated_secs: settings.min_estimated_secs,
            min_display_secs: settings.min_display_secs,
            max_display_secs: settings.max_display_secs,
        }
    }

    fn check(&self) -> CaptionResult<()> {
        let positive = [
            ("chars_per_second", self.chars_per_second),
            ("min_display_secs", self.min_display_secs),
            ("max_display_secs", self.max_display_secs),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(CaptionError::InvalidParameter { name, value });
            }
        }
        if !(self.min_estimated_secs.is_finite() && self.min_estimated_secs >= 0.0) {
            return Err(CaptionError::InvalidParameter {
                name: "min_estimated_secs",
                value: self.min_estimated_secs,
            });
        }
        if self.min_display_secs > self.max_display_secs {
            return Err(CaptionError::InvalidParameter {
                name: "min_display_secs",
                value: self.min_display_secs,
            });
        }
        Ok(())
    }
}

impl Default for TimingParams {
    fn default() -> Self {
        Self::from_settings(&CaptionSettings::default())
    }
}

/// Character count of the normalized text the chunks came from.
///
/// Chunks are joined by single spaces, so separators are counted too.
pub fn total_chars(chunks: &[CaptionChunk]) -> usize {
    let chars: usize = chunks.iter().map(|c| c.char_count).sum();
    chars + chunks.len().saturating_sub(1)
}

/// Estimated narration length for `total_chars` characters.
///
/// Whole seconds, never below `min_estimated_secs`.
pub fn estimate_duration(total_chars: usize, params: &TimingParams) -> f64 {
    let spoken = (total_chars as f64 / params.chars_per_second).ceil();
    spoken.max(params.min_estimated_secs)
}

/// Start of slot `i` out of `n` across `total` seconds.
pub(crate) fn slot_start(total: f64, i: usize, n: usize) -> f64 {
    total * i as f64 / n as f64
}

/// Time `chunks` across the known narration length, or an estimate.
///
/// A known duration that is not positive and finite is an error.
pub fn time_chunks(
    chunks: Vec<CaptionChunk>,
    known_duration: Option<f64>,
    params: &TimingParams,
) -> CaptionResult<CaptionTrack> {
    params.check()?;

    if let Some(d) = known_duration {
        if !(d.is_finite() && d > 0.0) {
            return Err(CaptionError::InvalidDuration(d));
        }
    }

    if chunks.is_empty() {
        return Ok(CaptionTrack::new(
            Vec::new(),
            Vec::new(),
            known_duration.unwrap_or(0.0),
        ));
    }

    let chars = total_chars(&chunks);
    let total = known_duration.unwrap_or_else(|| estimate_duration(chars, params));
    let effective_cps = chars as f64 / total;
    let n = chunks.len();

    let intervals = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let start = slot_start(total, i, n);
            let next = slot_start(total, i + 1, n);
            let shown = (chunk.char_count as f64 / effective_cps)
                .clamp(params.min_display_secs, params.max_display_secs);
            let end = (start + shown).min(next);
            CaptionInterval::new(i, start, end)
        })
        .collect();

    Ok(CaptionTrack::new(chunks, intervals, total))
}
