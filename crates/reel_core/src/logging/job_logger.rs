//! Per-job log file.
//!
//! Every composition job writes one log under the logs folder. Warnings,
//! errors and fallbacks are mirrored to `tracing` so they also reach the
//! process-wide subscriber. Tool stderr goes into a bounded tail that is
//! cleared before each invocation and written out when the invocation fails.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LineKind, LogCallback, LogConfig, LogLevel};
use crate::tools::{ToolError, ToolInvocation};

/// Log file for one composition job.
pub struct JobLogger {
    job_name: String,
    log_path: PathBuf,
    config: LogConfig,
    echo: Option<LogCallback>,
    state: Mutex<LogState>,
}

struct LogState {
    writer: BufWriter<File>,
    tail: VecDeque<String>,
    last_progress: Option<u32>,
}

impl JobLogger {
    /// Create `<log_dir>/<job_name>-<job_id>.log`. The id keeps jobs that
    /// share a name from writing into one file. `echo` receives every
    /// formatted line as well.
    pub fn new(
        job_name: impl Into<String>,
        job_id: &str,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        echo: Option<LogCallback>,
    ) -> io::Result<Self> {
        let job_name = job_name.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let file_name = format!("{}-{}.log", file_stem(&job_name), file_stem(job_id));
        let log_path = log_dir.join(file_name);
        let mut writer = BufWriter::new(File::create(&log_path)?);
        writeln!(
            writer,
            "# Reelsmith job '{}' ({}) opened {}",
            job_name,
            job_id,
            Local::now().to_rfc3339()
        )?;

        Ok(Self {
            job_name,
            log_path,
            state: Mutex::new(LogState {
                writer,
                tail: VecDeque::with_capacity(config.error_tail),
                last_progress: None,
            }),
            config,
            echo,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn info(&self, message: &str) {
        self.line(LogLevel::Info, LineKind::Plain, message);
    }

    pub fn debug(&self, message: &str) {
        self.line(LogLevel::Debug, LineKind::Plain, message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(job = %self.job_name, "{}", message);
        self.line(LogLevel::Warn, LineKind::Warning, message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(job = %self.job_name, "{}", message);
        self.line(LogLevel::Error, LineKind::Error, message);
    }

    /// A stage produced its output through a fallback.
    pub fn fallback(&self, message: &str) {
        tracing::warn!(job = %self.job_name, "fallback: {}", message);
        self.line(LogLevel::Warn, LineKind::Fallback, message);
    }

    pub fn phase(&self, name: &str) {
        self.line(LogLevel::Info, LineKind::Phase, name);
    }

    pub fn section(&self, name: &str) {
        self.line(LogLevel::Info, LineKind::Section, name);
    }

    pub fn success(&self, message: &str) {
        self.line(LogLevel::Info, LineKind::Success, message);
    }

    pub fn command(&self, command_line: &str) {
        self.line(LogLevel::Info, LineKind::Command, command_line);
    }

    /// Log `invocation` as the command line `program` would run.
    pub fn invocation(&self, program: &str, invocation: &ToolInvocation) {
        self.command(&invocation.command_line(program));
    }

    /// Log pipeline progress. In compact mode a line is only written when
    /// `percent` enters a new `progress_step` bucket or reaches 100.
    ///
    /// Returns whether a line was written.
    pub fn progress(&self, step: &str, percent: u32) -> bool {
        if self.config.compact {
            let mut state = self.state.lock();
            let bucket = self.config.progress_step.max(1);
            if let Some(previous) = state.last_progress {
                if percent / bucket <= previous / bucket && percent < 100 {
                    return false;
                }
            }
            state.last_progress = Some(percent);
        }

        self.line(LogLevel::Info, LineKind::Plain, &format!("{}: {}%", step, percent));
        true
    }

    /// Record one line of tool output. It is only written right away when
    /// compact mode is off.
    pub fn tool_output(&self, line: &str) {
        if self.config.error_tail > 0 {
            let mut state = self.state.lock();
            if state.tail.len() >= self.config.error_tail {
                state.tail.pop_front();
            }
            state.tail.push_back(line.to_string());
        }

        if !self.config.compact {
            self.line(LogLevel::Info, LineKind::ToolOutput, line);
        }
    }

    /// Record a failed invocation: its output goes to the tail, which is
    /// then written under a header naming the invocation.
    pub fn tool_failure(&self, label: &str, err: &ToolError) {
        for line in err.output_lines() {
            self.tool_output(line);
        }

        let summary = err.to_string();
        self.warn(&format!(
            "{} failed: {}",
            label,
            summary.lines().next().unwrap_or_default()
        ));

        let tail = self.tail();
        if !tail.is_empty() {
            self.line(LogLevel::Warn, LineKind::Plain, &format!("[{} output]", label));
            for line in &tail {
                self.line(LogLevel::Warn, LineKind::ToolOutput, line);
            }
        }
    }

    /// Tool output lines currently held.
    pub fn tail(&self) -> Vec<String> {
        self.state.lock().tail.iter().cloned().collect()
    }

    pub fn clear_tail(&self) {
        self.state.lock().tail.clear();
    }

    pub fn flush(&self) {
        let _ = self.state.lock().writer.flush();
    }

    fn line(&self, level: LogLevel, kind: LineKind, message: &str) {
        if level < self.config.level {
            return;
        }

        let body = kind.render(message);
        let formatted = if self.config.timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S"), body)
        } else {
            body
        };

        {
            let mut state = self.state.lock();
            let _ = writeln!(state.writer, "{}", formatted);
        }

        if let Some(ref echo) = self.echo {
            echo(&formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        let _ = self.state.get_mut().writer.flush();
    }
}

/// Job name reduced to characters that are safe in a file name.
fn file_stem(job_name: &str) -> String {
    let stem: String = job_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if stem.is_empty() {
        "job".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn quiet() -> LogConfig {
        LogConfig {
            timestamps: false,
            ..LogConfig::default()
        }
    }

    fn contents(logger: &JobLogger) -> String {
        logger.flush();
        fs::read_to_string(logger.log_path()).unwrap()
    }

    #[test]
    fn log_file_is_named_after_job_and_id() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("promo/v2", "7f3a", dir.path(), quiet(), None).unwrap();

        assert_eq!(logger.log_path(), dir.path().join("promo_v2-7f3a.log"));
        assert!(contents(&logger).starts_with("# Reelsmith job 'promo/v2' (7f3a) opened "));
    }

    #[test]
    fn same_name_different_ids_do_not_share_a_file() {
        let dir = tempdir().unwrap();
        let first = JobLogger::new("out", "a1", dir.path(), quiet(), None).unwrap();
        let second = JobLogger::new("out", "b2", dir.path(), quiet(), None).unwrap();

        first.info("from first");
        second.info("from second");

        assert_ne!(first.log_path(), second.log_path());
        assert!(contents(&first).contains("from first"));
        assert!(!contents(&first).contains("from second"));
    }

    #[test]
    fn markers_reach_the_file() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("markers", "1", dir.path(), quiet(), None).unwrap();

        logger.phase("Normalize");
        logger.fallback("concatenation used 2 of 3 clips");
        logger.success("done");

        let log = contents(&logger);
        assert!(log.contains("\n=== Normalize ===\n"));
        assert!(log.contains("\n[FALLBACK] concatenation used 2 of 3 clips\n"));
        assert!(log.contains("\n[OK] done\n"));
    }

    #[test]
    fn echo_skips_filtered_lines() {
        let dir = tempdir().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let echo: LogCallback = Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let logger = JobLogger::new("echo", "1", dir.path(), quiet(), Some(echo)).unwrap();
        logger.info("one");
        logger.warn("two");
        logger.debug("filtered at info level");

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn compact_progress_logs_once_per_bucket() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("progress", "1", dir.path(), quiet(), None).unwrap();

        assert!(logger.progress("Normalize", 0));
        assert!(!logger.progress("Normalize", 5));
        assert!(!logger.progress("Normalize", 15));
        assert!(logger.progress("Concatenate", 20));
        assert!(!logger.progress("Concatenate", 25));
        assert!(logger.progress("Reconcile", 40));
        assert!(logger.progress("Complete", 100));
        assert!(contents(&logger).contains("Reconcile: 40%"));
    }

    #[test]
    fn tail_keeps_latest_lines() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            error_tail: 5,
            ..quiet()
        };
        let logger = JobLogger::new("tail", "1", dir.path(), config, None).unwrap();

        for i in 0..10 {
            logger.tool_output(&format!("frame {}", i));
        }

        let tail = logger.tail();
        assert_eq!(tail, vec!["frame 5", "frame 6", "frame 7", "frame 8", "frame 9"]);
        assert!(!contents(&logger).contains("frame 9"));

        logger.clear_tail();
        assert!(logger.tail().is_empty());
    }

    #[test]
    fn failure_writes_output_tail() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("failure", "1", dir.path(), quiet(), None).unwrap();

        let err = ToolError::failed("ffmpeg", 1, "Invalid data found\nConversion failed!");
        logger.tool_failure("concat", &err);

        let log = contents(&logger);
        assert!(log.contains("[WARN] concat failed: ffmpeg failed with exit code 1: Invalid data found"));
        assert!(log.contains("[concat output]\n  | Invalid data found\n  | Conversion failed!\n"));
    }

    #[test]
    fn file_stem_replaces_unsafe_characters() {
        assert_eq!(file_stem("normal_name"), "normal_name");
        assert_eq!(file_stem("a<b>c:d"), "a_b_c_d");
        assert_eq!(file_stem("  "), "job");
    }
}
