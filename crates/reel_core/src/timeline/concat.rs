//! Join normalized clips into one continuous video track.
//!
//! Clips already share codec, geometry and frame rate, so they are joined by
//! stream copy through a concat list. If the join fails, successively shorter
//! prefixes are tried; the longest prefix that works is returned, down to the
//! first clip on its own.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{NormalizedClip, Track, TrackKind};
use crate::orchestrator::CancelHandle;
use crate::tools::{MediaTool, ToolError, ToolInvocation};

/// Errors that stop concatenation entirely.
#[derive(Error, Debug)]
pub enum ConcatError {
    #[error("No clips to concatenate")]
    Empty,

    #[error("Failed to write concat list '{}': {source}", path.display())]
    ListWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Concatenation was cancelled")]
    Cancelled,
}

/// Result of a concatenation, including how much of the input made it in.
#[derive(Debug)]
pub struct ConcatOutcome {
    /// The joined track (the first clip's own file when only one is used).
    pub track: Track,
    /// Number of leading clips included.
    pub clips_used: usize,
    /// Number of clips supplied.
    pub clips_requested: usize,
    /// Sum of all supplied clip durations.
    pub expected_duration: f64,
    /// Errors from the attempts that failed, longest first.
    pub failures: Vec<ToolError>,
}

impl ConcatOutcome {
    /// Whether every supplied clip is in the result.
    pub fn is_complete(&self) -> bool {
        self.clips_used == self.clips_requested
    }
}

/// Concat demuxer list naming `paths` in order, as absolute paths.
pub fn render_concat_list(paths: &[&Path]) -> String {
    let mut content = String::new();
    for path in paths {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        content.push_str(&format!("file '{}'\n", escape_list_path(&absolute)));
    }
    content
}

/// Write a concat demuxer list naming `paths` in order.
pub fn write_concat_list(list_path: &Path, paths: &[&Path]) -> Result<(), ConcatError> {
    fs::write(list_path, render_concat_list(paths)).map_err(|source| ConcatError::ListWrite {
        path: list_path.to_path_buf(),
        source,
    })
}

/// Quote a path for a concat list (single quotes closed, escaped, reopened).
fn escape_list_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

/// Invocation joining the files in `list_path` by stream copy.
pub fn concat_invocation(
    label: &str,
    list_path: &Path,
    output: &Path,
    kind: TrackKind,
) -> ToolInvocation {
    ToolInvocation::new(label, output, kind)
        .input_with(["-f", "concat", "-safe", "0"], list_path)
        .args(["-c", "copy"])
}

/// Concatenate `clips` in order inside `work_dir`.
///
/// A single clip is returned as-is without invoking the tool.
pub fn concatenate(
    tool: &dyn MediaTool,
    clips: &[NormalizedClip],
    work_dir: &Path,
    cancel: &CancelHandle,
) -> Result<ConcatOutcome, ConcatError> {
    let first = clips.first().ok_or(ConcatError::Empty)?;
    let expected_duration: f64 = clips.iter().map(|c| c.duration).sum();
    let mut failures = Vec::new();

    for used in (2..=clips.len()).rev() {
        if cancel.is_cancelled() {
            return Err(ConcatError::Cancelled);
        }

        let list_path = work_dir.join(format!("concat_{}.txt", used));
        let paths: Vec<&Path> = clips[..used].iter().map(|c| c.path.as_path()).collect();
        write_concat_list(&list_path, &paths)?;

        let output = work_dir.join(format!("concat_{}.mp4", used));
        let invocation = concat_invocation("concat", &list_path, &output, TrackKind::Video);

        match tool.run(&invocation, cancel) {
            Ok(track) => {
                if used < clips.len() {
                    tracing::warn!(
                        "Concatenation kept {} of {} clips ({:.2}s of {:.2}s)",
                        used,
                        clips.len(),
                        track.duration,
                        expected_duration
                    );
                }
                return Ok(ConcatOutcome {
                    track,
                    clips_used: used,
                    clips_requested: clips.len(),
                    expected_duration,
                    failures,
                });
            }
            Err(e) if e.is_cancelled() => return Err(ConcatError::Cancelled),
            Err(e) => {
                tracing::warn!("Concatenating {} clips failed: {}", used, e);
                failures.push(e);
            }
        }
    }

    if clips.len() > 1 {
        tracing::warn!(
            "Concatenation fell back to the first clip only ({:.2}s of {:.2}s)",
            first.duration,
            expected_duration
        );
    }

    Ok(ConcatOutcome {
        track: first.as_track(),
        clips_used: 1,
        clips_requested: clips.len(),
        expected_duration,
        failures,
    })
}
