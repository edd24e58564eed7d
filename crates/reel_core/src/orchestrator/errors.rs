//! Job and step errors.
//!
//! A [`StepError`] says what went wrong inside one step. The pipeline wraps
//! it in a [`PipelineError`] naming the job and the step.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::captions::CaptionError;
use crate::tools::ToolError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed and had nothing to fall back to.
    #[error("{job_name}: {step_name} failed: {source}")]
    StepFailed {
        job_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// The job was rejected before any step ran.
    #[error("{job_name}: rejected: {message}")]
    ValidationFailed { job_name: String, message: String },

    #[error("{job_name}: cancelled")]
    Cancelled { job_name: String },

    /// Scratch directory or job log could not be prepared.
    #[error("{job_name}: could not start: {message}")]
    SetupFailed { job_name: String, message: String },
}

impl PipelineError {
    pub fn step_failed(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        PipelineError::StepFailed {
            job_name: job_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    pub fn validation_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::ValidationFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    pub fn setup_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::SetupFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(job_name: impl Into<String>) -> Self {
        PipelineError::Cancelled {
            job_name: job_name.into(),
        }
    }

    pub fn step_name(&self) -> Option<&str> {
        if let PipelineError::StepFailed { step_name, .. } = self {
            Some(step_name)
        } else {
            None
        }
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error("bad input: {0}")]
    InvalidInput(String),

    #[error("bad output: {0}")]
    InvalidOutput(String),

    /// The engine failed and no fallback artifact existed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Caption(#[from] CaptionError),

    #[error("{operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("missing file {}", path.display())]
    FileNotFound { path: PathBuf },

    /// An earlier step left no record in the job state.
    #[error("out of order: {0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StepError::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        StepError::InvalidOutput(message.into())
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        StepError::IoError {
            operation: operation.into(),
            source,
        }
    }

    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        StepError::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        StepError::PreconditionFailed(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        StepError::Other(message.into())
    }
}

pub type StepResult<T> = Result<T, StepError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_keeps_its_message() {
        let err = StepError::from(ToolError::failed("ffmpeg", 1, "Invalid data found"));
        assert!(matches!(err, StepError::Tool(_)));
        assert!(err.to_string().contains("Invalid data found"));
    }

    #[test]
    fn job_and_step_appear_in_message() {
        let err = PipelineError::step_failed(
            "promo_01",
            "Reconcile",
            StepError::file_not_found("/media/voice.mp3"),
        );

        assert_eq!(
            err.to_string(),
            "promo_01: Reconcile failed: missing file /media/voice.mp3"
        );
        assert_eq!(err.step_name(), Some("Reconcile"));
        assert_eq!(PipelineError::cancelled("promo_01").step_name(), None);
    }
}
