//! Shared helpers for integration tests.
//!
//! `ScriptedTool` stands in for the transcoding engine. It knows the length
//! of every file it was told about or has produced, and computes output
//! lengths from the invocation: `-t` caps, concat lists sum their entries,
//! `setpts=R*PTS` scales the first input, `-shortest` takes the minimum.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use reel_core::models::{Track, TrackKind};
use reel_core::orchestrator::CancelHandle;
use reel_core::tools::{MediaInfo, MediaTool, ToolError, ToolInvocation, ToolResult};

#[derive(Default)]
pub struct ScriptedTool {
    files: Mutex<HashMap<PathBuf, MediaInfo>>,
    labels: Mutex<Vec<String>>,
    failing: Vec<String>,
}

impl ScriptedTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video(self, path: impl Into<PathBuf>, duration: f64) -> Self {
        self.files.lock().insert(
            path.into(),
            MediaInfo {
                duration,
                width: Some(1920),
                height: Some(1080),
                has_video: true,
                has_audio: false,
            },
        );
        self
    }

    pub fn audio(self, path: impl Into<PathBuf>, duration: f64) -> Self {
        self.files.lock().insert(
            path.into(),
            MediaInfo {
                duration,
                width: None,
                height: None,
                has_video: false,
                has_audio: true,
            },
        );
        self
    }

    /// Make every invocation with `label` fail.
    pub fn failing(mut self, label: &str) -> Self {
        self.failing.push(label.to_string());
        self
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().clone()
    }

    fn length(&self, path: &Path) -> ToolResult<f64> {
        self.files
            .lock()
            .get(path)
            .map(|info| info.duration)
            .ok_or_else(|| ToolError::probe(path, "not scripted"))
    }

    fn input_length(&self, options: &[String], path: &Path) -> ToolResult<f64> {
        if !options.iter().any(|o| o == "concat") {
            return self.length(path);
        }
        let list = fs::read_to_string(path).map_err(|e| ToolError::io("reading concat list", e))?;
        list.lines()
            .filter_map(|line| line.trim().strip_prefix("file '")?.strip_suffix('\''))
            .map(|entry| self.length(Path::new(&entry.replace("'\\''", "'"))))
            .sum()
    }
}

fn speed_factor(invocation: &ToolInvocation) -> Option<f64> {
    invocation.output_args().iter().find_map(|arg| {
        let (_, rest) = arg.split_once("setpts=")?;
        let (ratio, _) = rest.split_once("*PTS")?;
        ratio.parse().ok()
    })
}

impl MediaTool for ScriptedTool {
    fn name(&self) -> &str {
        "scripted"
    }

    fn run(&self, invocation: &ToolInvocation, cancel: &CancelHandle) -> ToolResult<Track> {
        self.labels.lock().push(invocation.label().to_string());
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                tool: "scripted".into(),
            });
        }
        if self.failing.iter().any(|l| l == invocation.label()) {
            return Err(ToolError::failed("scripted", 1, "scripted failure"));
        }

        let duration = match invocation.arg_value("-t").and_then(|t| t.parse().ok()) {
            Some(limit) => limit,
            None => {
                let mut lengths = invocation
                    .inputs()
                    .iter()
                    .map(|input| self.input_length(&input.options, &input.path))
                    .collect::<ToolResult<Vec<f64>>>()?;
                if let (Some(first), Some(factor)) = (lengths.first_mut(), speed_factor(invocation)) {
                    *first *= factor;
                }
                if invocation.has_arg("-shortest") {
                    lengths.iter().copied().fold(f64::INFINITY, f64::min)
                } else {
                    lengths.first().copied().unwrap_or(0.0)
                }
            }
        };

        let output = invocation.output();
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| ToolError::io("creating output dir", e))?;
        }
        fs::write(output, invocation.label()).map_err(|e| ToolError::io("writing output", e))?;

        let kind = invocation.output_kind();
        self.files.lock().insert(
            output.to_path_buf(),
            MediaInfo {
                duration,
                width: None,
                height: None,
                has_video: kind != TrackKind::Audio,
                has_audio: kind != TrackKind::Video,
            },
        );
        Ok(Track::new(output, duration, kind))
    }

    fn probe(&self, path: &Path) -> ToolResult<MediaInfo> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| ToolError::probe(path, "not scripted"))
    }
}

/// Write a placeholder file so existence checks pass.
pub fn touch(path: &Path) -> PathBuf {
    fs::write(path, b"media").unwrap();
    path.to_path_buf()
}
