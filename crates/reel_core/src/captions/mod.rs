//! Caption chunking, timing, and alignment.
//!
//! # Flow
//!
//! ```text
//! narration text
//!     → chunker (sentence-aware, word/char limits)  → Vec<CaptionChunk>
//!     → timer   (known or estimated length)          → CaptionTrack
//!     → aligner (optional, onto final video length)  → CaptionTrack
//!     → srt     (SubRip text)
//! ```
//!
//! # Example
//!
//! ```
//! use reel_core::captions::{build_captions, write_srt};
//! use reel_core::config::CaptionSettings;
//!
//! let track = build_captions("Hello there. How are you?", None, &CaptionSettings::default()).unwrap();
//! assert_eq!(track.len(), 1);
//! assert_eq!(track.total_duration, 5.0);
//! assert!(write_srt(&track).starts_with("1\n00:00:00,000 --> "));
//! ```

pub mod aligner;
pub mod chunker;
mod error;
pub mod srt;
pub mod timer;
mod types;

pub use aligner::realign;
pub use chunker::{chunk_text, normalize_whitespace, ChunkLimits};
pub use error::{CaptionError, CaptionResult};
pub use srt::{format_srt_time, load_srt, parse_srt, parse_srt_time, save_srt, write_srt};
pub use timer::{estimate_duration, time_chunks, TimingParams};
pub use types::{CaptionChunk, CaptionInterval, CaptionTrack};

use crate::config::CaptionSettings;

/// Chunk and time `text`, then check the result.
///
/// `known_duration` is the narration length when it is already known;
/// otherwise it is estimated from the configured speaking rate.
pub fn build_captions(
    text: &str,
    known_duration: Option<f64>,
    settings: &CaptionSettings,
) -> CaptionResult<CaptionTrack> {
    let limits = ChunkLimits::new(settings.max_words, settings.max_chars);
    let chunks = chunk_text(text, limits)?;
    let track = time_chunks(chunks, known_duration, &TimingParams::from_settings(settings))?;
    track.validate(settings.end_epsilon_secs)?;
    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_captions_uses_settings_limits() {
        let mut settings = CaptionSettings::default();
        settings.max_words = 1;

        let track = build_captions("A. B. C.", Some(6.0), &settings).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track.intervals[1].start_seconds, 2.0);
    }

    #[test]
    fn build_captions_on_empty_text_is_empty() {
        let track = build_captions("   ", None, &CaptionSettings::default()).unwrap();
        assert!(track.is_empty());
    }
}
