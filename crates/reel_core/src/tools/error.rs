//! Errors from external tool invocations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error from running or probing with an external media tool.
///
/// Every variant is recoverable from the pipeline's point of view: the
/// calling stage decides whether to fall back or fail the job.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool binary could not be started.
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The tool exited with a non-zero status.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    Failed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// The tool exceeded its time budget and was killed.
    #[error("{tool} timed out after {seconds}s")]
    TimedOut { tool: String, seconds: u64 },

    /// The invocation was cancelled and the child was killed.
    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    /// The tool exited cleanly but the output file is missing.
    #[error("{tool} produced no output at {path}")]
    MissingOutput { tool: String, path: PathBuf },

    /// Probe output could not be read.
    #[error("Failed to probe '{path}': {message}")]
    Probe { path: PathBuf, message: String },

    /// Filesystem error around an invocation.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl ToolError {
    /// Create a failed-exit error.
    pub fn failed(tool: impl Into<String>, exit_code: i32, message: impl Into<String>) -> Self {
        Self::Failed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    /// Create a probe error.
    pub fn probe(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Whether the error came from a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ToolError::Cancelled { .. })
    }

    /// Diagnostic output lines captured from the tool, if any.
    pub fn output_lines(&self) -> Vec<&str> {
        match self {
            ToolError::Failed { message, .. } => message.lines().collect(),
            _ => Vec::new(),
        }
    }
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
