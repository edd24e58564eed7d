//! Caption error types.

use std::path::PathBuf;

/// Errors that can occur while building, timing, or reading captions.
#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    /// Chunk limits that can never be satisfied.
    #[error("Invalid chunk limits: max_words={max_words}, max_chars={max_chars} (both must be at least 1)")]
    InvalidLimits { max_words: usize, max_chars: usize },

    /// A duration that is zero, negative, or not finite.
    #[error("Invalid duration: {0}")]
    InvalidDuration(f64),

    /// A timing parameter that is zero, negative, or not finite.
    #[error("Invalid timing parameter '{name}': {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Produced captions break an ordering or bounds rule.
    #[error("Caption {index} is invalid: {message}")]
    InvariantViolated { index: usize, message: String },

    /// Malformed SubRip content.
    #[error("Invalid SubRip timing at line {line}: '{value}'")]
    InvalidTime { line: usize, value: String },

    /// Failed to read a caption file.
    #[error("Failed to read file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a caption file.
    #[error("Failed to write file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CaptionError {
    /// Create an invariant violation error.
    pub fn invariant(index: usize, message: impl Into<String>) -> Self {
        Self::InvariantViolated {
            index,
            message: message.into(),
        }
    }

    /// Create an invalid time error.
    pub fn invalid_time(line: usize, value: impl Into<String>) -> Self {
        Self::InvalidTime {
            line,
            value: value.into(),
        }
    }
}

/// Result type for caption operations.
pub type CaptionResult<T> = Result<T, CaptionError>;
