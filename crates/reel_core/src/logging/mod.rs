//! Job logs and the process-wide `tracing` subscriber.
//!
//! Each composition job gets its own [`JobLogger`] file. Everything else
//! goes through `tracing`, installed once by [`init_tracing`] or
//! [`init_tracing_with_file`].
//!
//! ```no_run
//! use reel_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("harbour", "3f2c9a", "/tmp/reel-logs", LogConfig::default(), None)?;
//! logger.phase("Normalize");
//! logger.command("ffmpeg -i clip0.mp4 -vf scale=1920:1080 n0.mp4");
//! logger.progress("Normalize", 20);
//! logger.success("harbour.mp4 written");
//! # Ok::<(), std::io::Error>(())
//! ```

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub use types::{LineKind, LogCallback, LogConfig, LogLevel};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber writing to stderr. `RUST_LOG` overrides
/// `default_level`. Call once at startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(env_filter(default_level))
        .init();
}

/// Like [`init_tracing`], plus a daily rolling log file in `log_dir`.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the program.
pub fn init_tracing_with_file(default_level: LogLevel, log_dir: &Path) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(log_dir, "reel.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter(default_level))
        .init();

    guard
}

/// Warnings and above, captured by the test harness.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_can_be_installed_twice() {
        init_test_tracing();
        init_test_tracing();
        tracing::warn!("visible in test output");
    }
}
