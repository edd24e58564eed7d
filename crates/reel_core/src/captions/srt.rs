//! SubRip (.srt) reading and writing.
//!
//! # Format Overview
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:02,500
//! Hello, world!
//!
//! 2
//! 00:00:02,500 --> 00:00:05,000
//! This is a test.
//!
//! ```
//!
//! Each entry is followed by a blank line. Timestamps are rounded to the
//! nearest millisecond on write.

use std::fs;
use std::path::Path;

use super::error::{CaptionError, CaptionResult};
use super::types::{CaptionChunk, CaptionInterval, CaptionTrack};

/// Render a caption track as SubRip text.
pub fn write_srt(track: &CaptionTrack) -> String {
    let mut output = String::new();

    for (i, (chunk, interval)) in track.entries().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(interval.start_seconds),
            format_srt_time(interval.end_seconds)
        ));
        output.push_str(&chunk.text);
        output.push_str("\n\n");
    }

    output
}

/// Write a caption track to `path`.
pub fn save_srt(track: &CaptionTrack, path: &Path) -> CaptionResult<()> {
    fs::write(path, write_srt(track)).map_err(|source| CaptionError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse a SubRip file.
pub fn load_srt(path: &Path) -> CaptionResult<CaptionTrack> {
    let content = fs::read_to_string(path).map_err(|source| CaptionError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_srt(&content)
}

/// Format seconds as a SubRip timestamp (`HH:MM:SS,mmm`).
pub fn format_srt_time(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;

    let millis = ms % 1000;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

/// Parse a SubRip timestamp (`HH:MM:SS,mmm` or `HH:MM:SS.mmm`) into seconds.
pub fn parse_srt_time(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', ".");

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: u64 = parts[0].trim().parse().ok()?;
    let minutes: u64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// Parse SubRip content into a caption track.
///
/// Indices are ignored and regenerated; entries are ordered by start time.
/// Multi-line entries are joined with single spaces. The track length is
/// the latest end time.
pub fn parse_srt(content: &str) -> CaptionResult<CaptionTrack> {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");
    let content = content.trim_start_matches('\u{feff}');

    let mut entries: Vec<(f64, f64, String)> = Vec::new();
    let mut line_offset = 0;

    for block in content.split("\n\n") {
        let lines: Vec<&str> = block.lines().collect();
        let block_start = line_offset;
        line_offset += lines.len() + 1;

        let Some(timing_idx) = lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };
        let timing_line = lines[timing_idx];

        let (start, end) = timing_line
            .split_once("-->")
            .and_then(|(a, b)| Some((parse_srt_time(a)?, parse_srt_time(b)?)))
            .ok_or_else(|| CaptionError::invalid_time(block_start + timing_idx + 1, timing_line))?;

        let text = lines[timing_idx + 1..]
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !text.is_empty() {
            entries.push((start, end, text));
        }
    }

    entries.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total = entries.iter().map(|e| e.1).fold(0.0, f64::max);
    let mut chunks = Vec::with_capacity(entries.len());
    let mut intervals = Vec::with_capacity(entries.len());
    for (i, (start, end, text)) in entries.into_iter().enumerate() {
        chunks.push(CaptionChunk::new(i, text));
        intervals.push(CaptionInterval::new(i, start, end));
    }

    Ok(CaptionTrack::new(chunks, intervals, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn track() -> CaptionTrack {
        CaptionTrack::new(
            vec![CaptionChunk::new(0, "Hello there."), CaptionChunk::new(1, "General Kenobi.")],
            vec![
                CaptionInterval::new(0, 0.0, 2.5),
                CaptionInterval::new(1, 2.5, 3661.0019),
            ],
            3661.002,
        )
    }

    #[test]
    fn writes_entries_with_blank_line_after_each() {
        let srt = write_srt(&track());
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:02,500\nHello there.\n\n\
             2\n00:00:02,500 --> 01:01:01,002\nGeneral Kenobi.\n\n"
        );
    }

    #[test]
    fn timestamps_round_to_nearest_millisecond() {
        assert_eq!(format_srt_time(1.2346), "00:00:01,235");
        assert_eq!(format_srt_time(1.2344), "00:00:01,234");
        assert_eq!(format_srt_time(59.9996), "00:01:00,000");
        assert_eq!(format_srt_time(-1.0), "00:00:00,000");
    }

    #[test]
    fn parses_time_formats() {
        assert_eq!(parse_srt_time("00:00:01,500"), Some(1.5));
        assert_eq!(parse_srt_time("01:02:03.250"), Some(3723.25));
        assert_eq!(parse_srt_time("1:02"), None);
        assert_eq!(parse_srt_time("00:61:00,000"), None);
    }

    #[test]
    fn parse_reads_written_output() {
        let parsed = parse_srt(&write_srt(&track())).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.chunks[1].text, "General Kenobi.");
        assert!((parsed.intervals[1].end_seconds - 3661.002).abs() < 1e-9);
        assert!((parsed.total_duration - 3661.002).abs() < 1e-9);
    }

    #[test]
    fn parse_tolerates_crlf_missing_index_and_multiline() {
        let content = "00:00:01,000 --> 00:00:02,000\r\nLine one\r\nline two\r\n\r\n\
                       7\r\n00:00:03,000 --> 00:00:04,000\r\nNext\r\n";
        let parsed = parse_srt(content).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.chunks[0].text, "Line one line two");
        assert_eq!(parsed.intervals[1].chunk_index, 1);
    }

    #[test]
    fn parse_orders_by_start() {
        let content = "1\n00:00:05,000 --> 00:00:06,000\nLater\n\n2\n00:00:01,000 --> 00:00:02,000\nEarlier\n";
        let parsed = parse_srt(content).unwrap();
        assert_eq!(parsed.chunks[0].text, "Earlier");
        assert_eq!(parsed.chunks[0].index, 0);
    }

    #[test]
    fn parse_reports_bad_timing_line() {
        let content = "1\n00:00:01,000 --> soon\nText\n";
        let err = parse_srt(content).unwrap_err();
        assert!(matches!(err, CaptionError::InvalidTime { line: 2, .. }));
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("captions.srt");
        save_srt(&track(), &path).unwrap();

        let loaded = load_srt(&path).unwrap();
        assert_eq!(loaded.chunks, track().chunks);
    }
}
