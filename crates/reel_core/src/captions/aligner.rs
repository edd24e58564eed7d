//! Re-time captions onto a new total length.
//!
//! Caption `i` of `N` is stretched over `[i/N·T', (i+1)/N·T')`. The remap is
//! index-proportional: it ignores how much text each caption carries, so a
//! short caption gets the same window as a long one. Applying it twice with
//! the same `T'` gives the same result as applying it once.

use super::error::{CaptionError, CaptionResult};
use super::timer::slot_start;
use super::types::{CaptionInterval, CaptionTrack};

/// Remap every interval of `track` onto `new_total` seconds.
///
/// Text and chunk order are unchanged.
pub fn realign(track: &CaptionTrack, new_total: f64) -> CaptionResult<CaptionTrack> {
    if !(new_total.is_finite() && new_total > 0.0) {
        return Err(CaptionError::InvalidDuration(new_total));
    }

    let n = track.chunks.len();
    let intervals = (0..n)
        .map(|i| {
            CaptionInterval::new(
                i,
                slot_start(new_total, i, n),
                slot_start(new_total, i + 1, n),
            )
        })
        .collect();

    Ok(CaptionTrack::new(track.chunks.clone(), intervals, new_total))
}

impl CaptionTrack {
    /// See [`realign`].
    pub fn realigned(&self, new_total: f64) -> CaptionResult<CaptionTrack> {
        realign(self, new_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::chunker::{chunk_text, ChunkLimits};
    use crate::captions::timer::{time_chunks, TimingParams};

    fn sample() -> CaptionTrack {
        let chunks = chunk_text(
            "First caption here. Second one. And a third that is a bit longer.",
            ChunkLimits::new(4, 30),
        )
        .unwrap();
        time_chunks(chunks, None, &TimingParams::default()).unwrap()
    }

    #[test]
    fn spreads_intervals_evenly() {
        let track = sample();
        let n = track.len() as f64;
        let aligned = realign(&track, 30.0).unwrap();

        for (i, interval) in aligned.intervals.iter().enumerate() {
            assert!((interval.start_seconds - 30.0 * i as f64 / n).abs() < 1e-9);
            assert!((interval.end_seconds - 30.0 * (i + 1) as f64 / n).abs() < 1e-9);
        }
        assert_eq!(aligned.total_duration, 30.0);
        assert!(aligned.validate(0.001).is_ok());
    }

    #[test]
    fn text_is_untouched() {
        let track = sample();
        let aligned = track.realigned(12.5).unwrap();
        assert_eq!(aligned.chunks, track.chunks);
    }

    #[test]
    fn is_idempotent() {
        let once = realign(&sample(), 17.3).unwrap();
        let twice = realign(&once, 17.3).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn last_caption_ends_at_new_total() {
        let aligned = realign(&sample(), 9.0).unwrap();
        assert_eq!(aligned.intervals.last().unwrap().end_seconds, 9.0);
    }

    #[test]
    fn rejects_non_positive_total() {
        assert!(realign(&sample(), 0.0).is_err());
        assert!(realign(&sample(), f64::NAN).is_err());
    }
}
