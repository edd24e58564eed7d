//! Runs the steps of a job in order and sorts their outcomes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult, StepError};
use super::step::PipelineStep;
use super::types::{Context, JobState, StepOutcome};

/// Shared cancellation flag.
///
/// Clones share the flag. The pipeline looks at it between steps and the
/// media tool polls it while a child process runs.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Names of the steps that ran, grouped by how they ended.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
    /// Steps whose output came from a fallback.
    pub steps_degraded: Vec<String>,
}

impl PipelineRunResult {
    pub fn is_degraded(&self) -> bool {
        !self.steps_degraded.is_empty()
    }
}

/// An ordered list of steps sharing one cancellation flag.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    cancel: CancelHandle,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: impl PipelineStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Replace the pipeline's own flag with one the caller holds.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Run every step against `state`.
    ///
    /// A step error ends the run unless the flag was raised while the step
    /// ran, in which case the job reports cancellation instead.
    pub fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let mut summary = PipelineRunResult::default();
        let count = self.steps.len().max(1);

        for (index, step) in self.steps.iter().enumerate() {
            let name = step.name();
            if self.is_cancelled() {
                ctx.logger.warn(&format!("Cancelled before {}", name));
                return Err(PipelineError::cancelled(&ctx.job_name));
            }

            ctx.logger.phase(name);
            ctx.report_progress(name, (index * 100 / count) as u32, step.description());

            match self.run_step(step.as_ref(), ctx, state)? {
                StepOutcome::Success => {
                    ctx.logger.success(&format!("{} done", name));
                    summary.steps_completed.push(name.to_string());
                }
                StepOutcome::Degraded(reason) => {
                    ctx.logger.fallback(&format!("{}: {}", name, reason));
                    state.degradations.push(format!("{}: {}", name, reason));
                    summary.steps_degraded.push(name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger.info(&format!("{} skipped: {}", name, reason));
                    summary.steps_skipped.push(name.to_string());
                }
            }
        }

        ctx.report_progress("Complete", 100, "Job finished");
        if summary.is_degraded() {
            ctx.logger.warn(&format!(
                "Finished with fallbacks in {}",
                summary.steps_degraded.join(", ")
            ));
        } else {
            ctx.logger.success("Finished");
        }
        Ok(summary)
    }

    fn run_step(
        &self,
        step: &dyn PipelineStep,
        ctx: &Context,
        state: &mut JobState,
    ) -> PipelineResult<StepOutcome> {
        let name = step.name();
        let fail = |stage: &str, err: StepError| {
            ctx.logger.error(&format!("{} {}: {}", name, stage, err));
            PipelineError::step_failed(&ctx.job_name, name, err)
        };

        step.validate_input(ctx).map_err(|e| fail("input check", e))?;

        let executed = step.execute(ctx, state);
        if self.is_cancelled() {
            ctx.logger.warn(&format!("Cancelled during {}", name));
            return Err(PipelineError::cancelled(&ctx.job_name));
        }
        let outcome = executed.map_err(|e| fail("failed", e))?;

        if !matches!(outcome, StepOutcome::Skipped(_)) {
            step.validate_output(ctx, state)
                .map_err(|e| fail("output check", e))?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::errors::StepResult;
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;

    /// Returns a fixed outcome, optionally raising a flag first.
    struct Scripted {
        name: &'static str,
        outcome: StepResult<StepOutcome>,
        runs: Arc<AtomicUsize>,
        raise: Option<CancelHandle>,
    }

    impl Scripted {
        fn ok(name: &'static str, outcome: StepOutcome) -> Self {
            Self {
                name,
                outcome: Ok(outcome),
                runs: Arc::new(AtomicUsize::new(0)),
                raise: None,
            }
        }

        fn cancels_then_fails(cancel: CancelHandle) -> Self {
            Self {
                name: "Doomed",
                outcome: Err(StepError::other("tool killed")),
                runs: Arc::new(AtomicUsize::new(0)),
                raise: Some(cancel),
            }
        }
    }

    impl PipelineStep for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(ref cancel) = self.raise {
                cancel.cancel();
            }
            match &self.outcome {
                Ok(outcome) => Ok(outcome.clone()),
                Err(e) => Err(StepError::other(e.to_string())),
            }
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }
    }

    #[test]
    fn outcomes_are_grouped_and_fallbacks_recorded() {
        let dir = tempdir().unwrap();
        let ctx = Context::for_test(dir.path());
        let mut state = JobState::new("job-1");

        let pipeline = Pipeline::new()
            .with_step(Scripted::ok("A", StepOutcome::Success))
            .with_step(Scripted::ok("B", StepOutcome::Degraded("fell back".into())))
            .with_step(Scripted::ok("C", StepOutcome::Skipped("nothing to do".into())));
        assert_eq!(pipeline.step_names(), vec!["A", "B", "C"]);

        let summary = pipeline.run(&ctx, &mut state).unwrap();

        assert_eq!(summary.steps_completed, vec!["A"]);
        assert_eq!(summary.steps_degraded, vec!["B"]);
        assert_eq!(summary.steps_skipped, vec!["C"]);
        assert_eq!(state.degradations, vec!["B: fell back"]);
    }

    #[test]
    fn failing_step_names_itself() {
        let dir = tempdir().unwrap();
        let ctx = Context::for_test(dir.path());
        let mut state = JobState::new("job-2");

        let mut broken = Scripted::ok("Broken", StepOutcome::Success);
        broken.outcome = Err(StepError::other("no clips left"));
        let after = Scripted::ok("After", StepOutcome::Success);
        let after_runs = Arc::clone(&after.runs);

        let err = Pipeline::new()
            .with_step(broken)
            .with_step(after)
            .run(&ctx, &mut state)
            .unwrap_err();

        assert_eq!(err.step_name(), Some("Broken"));
        assert_eq!(after_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn raised_flag_stops_before_first_step() {
        let dir = tempdir().unwrap();
        let ctx = Context::for_test(dir.path());
        let mut state = JobState::new("job-3");

        let step = Scripted::ok("A", StepOutcome::Success);
        let runs = Arc::clone(&step.runs);
        let pipeline = Pipeline::new().with_step(step);
        pipeline.cancel_handle().cancel();
        assert!(pipeline.is_cancelled());

        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancellation_during_step_beats_its_error() {
        let dir = tempdir().unwrap();
        let ctx = Context::for_test(dir.path());
        let mut state = JobState::new("job-4");

        let cancel = CancelHandle::new();
        let err = Pipeline::new()
            .with_cancel_handle(cancel.clone())
            .with_step(Scripted::cancels_then_fails(cancel))
            .run(&ctx, &mut state)
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled { .. }));
    }
}
