//! Scripted in-memory tool for unit tests.
//!
//! Files are tracked by path with a registered duration. `run` writes a
//! placeholder output and derives its duration from the invocation the way
//! the real engine would: `-t` caps, concat lists sum, `setpts` scales the
//! first input, `-shortest` takes the minimum input.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{MediaInfo, MediaTool, ToolError, ToolInvocation, ToolResult};
use crate::models::{Track, TrackKind};
use crate::orchestrator::CancelHandle;

type FailurePredicate = Box<dyn Fn(&ToolInvocation) -> bool + Send + Sync>;

pub(crate) struct FakeTool {
    media: Mutex<HashMap<PathBuf, MediaInfo>>,
    calls: Mutex<Vec<ToolInvocation>>,
    failures: Vec<FailurePredicate>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self {
            media: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Vec::new(),
        }
    }

    /// Register a video file.
    pub fn with_video(self, path: impl Into<PathBuf>, duration: f64, width: u32, height: u32) -> Self {
        self.media.lock().insert(
            path.into(),
            MediaInfo {
                duration,
                width: Some(width),
                height: Some(height),
                has_video: true,
                has_audio: false,
            },
        );
        self
    }

    /// Register an audio file.
    pub fn with_audio(self, path: impl Into<PathBuf>, duration: f64) -> Self {
        self.media.lock().insert(
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

    /// Fail every invocation with this label.
    pub fn fail_label(self, label: &'static str) -> Self {
        self.fail_when(move |inv| inv.label() == label)
    }

    /// Fail every invocation matching `predicate`.
    pub fn fail_when(
        mut self,
        predicate: impl Fn(&ToolInvocation) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.failures.push(Box::new(predicate));
        self
    }

    /// All invocations received, in order.
    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().clone()
    }

    /// Labels of all invocations received, in order.
    pub fn labels(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.label().to_string()).collect()
    }

    fn duration_of(&self, path: &Path) -> ToolResult<f64> {
        self.media
            .lock()
            .get(path)
            .map(|info| info.duration)
            .ok_or_else(|| ToolError::probe(path, "unknown to fake tool"))
    }

    fn input_duration(&self, options: &[String], path: &Path) -> ToolResult<f64> {
        if options.iter().any(|o| o == "concat") {
            let list = fs::read_to_string(path).map_err(|e| ToolError::io("reading list", e))?;
            let mut total = 0.0;
            for entry in parse_concat_list(&list) {
                total += self.duration_of(&entry)?;
            }
            return Ok(total);
        }
        self.duration_of(path)
    }
}

impl MediaTool for FakeTool {
    fn name(&self) -> &str {
        "fake"
    }

    fn run(&self, invocation: &ToolInvocation, cancel: &CancelHandle) -> ToolResult<Track> {
        self.calls.lock().push(invocation.clone());

        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                tool: "fake".into(),
            });
        }

        if self.failures.iter().any(|fail| fail(invocation)) {
            return Err(ToolError::failed(
                "fake",
                1,
                format!("simulated failure in {}", invocation.label()),
            ));
        }

        let duration = match invocation.arg_value("-t").and_then(|t| t.parse::<f64>().ok()) {
            Some(limit) => limit,
            None => {
                let mut durations = Vec::new();
                for input in invocation.inputs() {
                    durations.push(self.input_duration(&input.options, &input.path)?);
                }
                if let (Some(first), Some(ratio)) = (durations.first_mut(), setpts_ratio(invocation)) {
                    *first *= ratio;
                }
                if invocation.has_arg("-shortest") {
                    durations.iter().copied().fold(f64::INFINITY, f64::min)
                } else {
                    durations.first().copied().unwrap_or(0.0)
                }
            }
        };

        let output = invocation.output();
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| ToolError::io("creating dir", e))?;
        }
        fs::write(output, b"fake media").map_err(|e| ToolError::io("writing output", e))?;

        let kind = invocation.output_kind();
        self.media.lock().insert(
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
        self.media
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| ToolError::probe(path, "unknown to fake tool"))
    }
}

/// Entries of a concat demuxer list file.
pub(crate) fn parse_concat_list(list: &str) -> Vec<PathBuf> {
    list.lines()
        .filter_map(|line| line.trim().strip_prefix("file '"))
        .filter_map(|rest| rest.strip_suffix('\''))
        .map(|quoted| PathBuf::from(quoted.replace("'\\''", "'")))
        .collect()
}

fn setpts_ratio(invocation: &ToolInvocation) -> Option<f64> {
    invocation.output_args().iter().find_map(|arg| {
        let start = arg.find("setpts=")? + "setpts=".len();
        let rest = &arg[start..];
        let end = rest.find("*PTS")?;
        rest[..end].parse().ok()
    })
}
