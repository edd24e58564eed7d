//! FFmpeg/FFprobe implementation of [`MediaTool`].
//!
//! Each invocation runs as a child process with stderr captured. The child is
//! polled so that a timeout or cancellation request can kill it; in either
//! case any partial output file is removed.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::error::{ToolError, ToolResult};
use super::invocation::ToolInvocation;
use super::limiter::ToolLimiter;
use super::{MediaInfo, MediaTool};
use crate::config::ToolSettings;
use crate::models::Track;
use crate::orchestrator::CancelHandle;

/// Options added to every ffmpeg run.
const BASE_ARGS: [&str; 5] = ["-y", "-hide_banner", "-nostdin", "-loglevel", "error"];

/// Interval between child status checks.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Transcoding engine backed by the ffmpeg command-line tools.
pub struct FfmpegTool {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    timeout: Duration,
    limiter: Option<Arc<ToolLimiter>>,
}

impl FfmpegTool {
    /// Use `ffmpeg`/`ffprobe` from PATH with a ten minute timeout.
    pub fn new() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            timeout: Duration::from_secs(600),
            limiter: None,
        }
    }

    /// Build from the `[tools]` settings section, with its own limiter.
    pub fn from_settings(settings: &ToolSettings) -> Self {
        Self::new()
            .with_paths(&settings.ffmpeg_path, &settings.ffprobe_path)
            .with_timeout(Duration::from_secs(settings.timeout_secs))
            .with_limiter(Arc::new(ToolLimiter::new(settings.max_concurrent)))
    }

    /// Set custom executable paths.
    pub fn with_paths(mut self, ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = ffmpeg.into();
        self.ffprobe_path = ffprobe.into();
        self
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share a limiter with other tools or jobs.
    pub fn with_limiter(mut self, limiter: Arc<ToolLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    fn ffmpeg_name(&self) -> String {
        tool_name(&self.ffmpeg_path)
    }

    /// Kill a running child and remove whatever it wrote.
    fn abort(&self, child: &mut Child, output: &Path) {
        let _ = child.kill();
        let _ = child.wait();
        remove_partial(output);
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaTool for FfmpegTool {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn run(&self, invocation: &ToolInvocation, cancel: &CancelHandle) -> ToolResult<Track> {
        let tool = self.ffmpeg_name();
        let cancelled = || ToolError::Cancelled { tool: tool.clone() };

        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let _permit = match &self.limiter {
            Some(limiter) => Some(limiter.acquire(cancel).ok_or_else(cancelled)?),
            None => None,
        };

        let output = invocation.output();
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ToolError::io("creating output directory", e))?;
            }
        }

        tracing::debug!(
            "Running {}: {}",
            invocation.label(),
            invocation.command_line(&tool)
        );

        let mut child = Command::new(&self.ffmpeg_path)
            .args(BASE_ARGS)
            .args(invocation.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::Spawn {
                tool: tool.clone(),
                source: e,
            })?;

        // Drain stderr on a separate thread so a chatty child never blocks on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    self.abort(&mut child, output);
                    return Err(ToolError::io(format!("waiting for {}", tool), e));
                }
            }

            if cancel.is_cancelled() {
                self.abort(&mut child, output);
                tracing::warn!("{} cancelled", invocation.label());
                return Err(cancelled());
            }

            if started.elapsed() >= self.timeout {
                self.abort(&mut child, output);
                tracing::warn!(
                    "{} timed out after {}s",
                    invocation.label(),
                    self.timeout.as_secs()
                );
                return Err(ToolError::TimedOut {
                    tool: tool.clone(),
                    seconds: self.timeout.as_secs(),
                });
            }

            thread::sleep(POLL_INTERVAL);
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            remove_partial(output);
            return Err(ToolError::failed(
                tool,
                status.code().unwrap_or(-1),
                stderr.trim().to_string(),
            ));
        }

        if !output.exists() {
            return Err(ToolError::MissingOutput {
                tool,
                path: output.to_path_buf(),
            });
        }

        let info = self.probe(output)?;
        tracing::debug!(
            "{} produced {} ({:.3}s)",
            invocation.label(),
            output.display(),
            info.duration
        );

        Ok(Track::new(output, info.duration, invocation.output_kind()))
    }

    fn probe(&self, path: &Path) -> ToolResult<MediaInfo> {
        if !path.exists() {
            return Err(ToolError::probe(path, "file not found"));
        }

        tracing::debug!("Probing file: {}", path.display());

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| ToolError::Spawn {
                tool: tool_name(&self.ffprobe_path),
                source: e,
            })?;

        if !output.status.success() {
            return Err(ToolError::failed(
                tool_name(&self.ffprobe_path),
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let json: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ToolError::probe(path, format!("invalid JSON: {}", e)))?;

        parse_probe_json(&json, path)
    }
}

/// Parse the JSON output of `ffprobe -show_format -show_streams`.
///
/// Duration comes from the container, falling back to the longest stream.
pub(crate) fn parse_probe_json(json: &Value, path: &Path) -> ToolResult<MediaInfo> {
    let streams: &[Value] = json
        .get("streams")
        .and_then(|s| s.as_array())
        .map(|s| s.as_slice())
        .unwrap_or(&[]);

    let is_type = |stream: &Value, kind: &str| {
        stream.get("codec_type").and_then(|t| t.as_str()) == Some(kind)
    };

    let video = streams.iter().find(|s| is_type(s, "video"));
    let has_audio = streams.iter().any(|s| is_type(s, "audio"));

    let container_duration = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(parse_seconds);

    let duration = container_duration
        .or_else(|| {
            streams
                .iter()
                .filter_map(|s| s.get("duration").and_then(parse_seconds))
                .reduce(f64::max)
        })
        .ok_or_else(|| ToolError::probe(path, "no duration reported"))?;

    let dimension = |key: &str| {
        video
            .and_then(|v| v.get(key))
            .and_then(|d| d.as_u64())
            .and_then(|d| u32::try_from(d).ok())
    };

    Ok(MediaInfo {
        duration,
        width: dimension("width"),
        height: dimension("height"),
        has_video: video.is_some(),
        has_audio,
    })
}

/// ffprobe reports durations as strings; accept numbers too.
fn parse_seconds(value: &Value) -> Option<f64> {
    let seconds = match value {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

fn tool_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn remove_partial(output: &Path) {
    if output.exists() {
        if let Err(e) = fs::remove_file(output) {
            tracing::warn!("Could not remove partial output {}: {}", output.display(), e);
        }
    }
}
