//! The step trait.

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// One stage of a composition job.
///
/// For each step the pipeline calls `validate_input`, then `execute`, then
/// `validate_output` unless the step was skipped. A step reads earlier
/// results from [`JobState`] and writes only its own section.
pub trait PipelineStep: Send + Sync {
    /// Name used in logs, progress and errors.
    fn name(&self) -> &str;

    /// Shown as the progress message when the step starts.
    fn description(&self) -> &str {
        self.name()
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()>;

    /// Do the work. Return [`StepOutcome::Degraded`] when a fallback
    /// produced the result and [`StepOutcome::Skipped`] when there was
    /// nothing to do.
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl PipelineStep for Noop {
        fn name(&self) -> &str {
            "Noop"
        }

        fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
            Ok(StepOutcome::Skipped("nothing to do".into()))
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }
    }

    #[test]
    fn description_defaults_to_name() {
        let step: Box<dyn PipelineStep> = Box::new(Noop);
        assert_eq!(step.description(), "Noop");
    }
}
