//! Logging levels, per-job log configuration and line markers.

use serde::{Deserialize, Serialize};

use crate::config::LoggingSettings;

/// Severity used for filtering job log lines and the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive understood by `EnvFilter`.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// One step more verbose than `self`, used for `--verbose`.
    pub fn more_verbose(self) -> Self {
        match self {
            LogLevel::Error => LogLevel::Warn,
            LogLevel::Warn => LogLevel::Info,
            LogLevel::Info => LogLevel::Debug,
            LogLevel::Debug | LogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// How a job log behaves.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Lines below this level are dropped.
    pub level: LogLevel,
    /// Keep tool output out of the log unless the tool fails.
    pub compact: bool,
    /// In compact mode, only log progress when it crosses a multiple of this.
    pub progress_step: u32,
    /// Tool output lines kept for failure reports.
    pub error_tail: usize,
    /// Prefix lines with a wall-clock time.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: 20,
            error_tail: 20,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Build from the `[logging]` settings section.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level,
            compact: settings.compact,
            progress_step: settings.progress_step.max(1),
            error_tail: settings.error_tail as usize,
            timestamps: true,
        }
    }
}

/// Receives every line written to a job log, already formatted.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Marker placed in front of a job log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Plain,
    /// `$ ffmpeg ...`
    Command,
    /// `=== Normalize ===`
    Phase,
    /// `--- Burning captions ---`
    Section,
    /// `[FALLBACK] ...`
    Fallback,
    /// `[OK] ...`
    Success,
    /// `[WARN] ...`
    Warning,
    /// `[ERROR] ...`
    Error,
    /// `  | ...` tool output echoed from the tail
    ToolOutput,
}

impl LineKind {
    pub fn render(self, message: &str) -> String {
        match self {
            LineKind::Plain => message.to_string(),
            LineKind::Command => format!("$ {}", message),
            LineKind::Phase => format!("=== {} ===", message),
            LineKind::Section => format!("--- {} ---", message),
            LineKind::Fallback => format!("[FALLBACK] {}", message),
            LineKind::Success => format!("[OK] {}", message),
            LineKind::Warning => format!("[WARN] {}", message),
            LineKind::Error => format!("[ERROR] {}", message),
            LineKind::ToolOutput => format!("  | {}", message),
        }
    }
}
