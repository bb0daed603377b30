use super::states::{StepState, StepType};
use crate::models::TodoStep;
use chrono::{DateTime, Utc};

/// Pure transition rules for a todo's fixed step pipeline.
///
/// The rules here mutate a single step record; the todo-level cascades
/// (promote / complete / tangle) are derived afterwards from the whole
/// pipeline via [`StepPipeline::summarize`].
pub struct StepPipeline;

/// Aggregate view of a pipeline after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Every step is completed or skipped.
    pub all_done: bool,
    /// At least one step failed.
    pub any_failed: bool,
    /// Lowest-ordered step not yet completed or skipped.
    pub current_step: Option<StepType>,
}

impl StepPipeline {
    /// Apply a status update to one step record.
    pub fn apply(
        step: &mut TodoStep,
        new_status: StepState,
        output: Option<String>,
        now: DateTime<Utc>,
    ) {
        match new_status {
            StepState::InProgress => {
                // Idempotent re-entry does not reset the timer.
                if step.status != StepState::InProgress {
                    step.started_at = Some(now);
                }
            }
            StepState::Completed => {
                step.completed_at = Some(now);
                if output.is_some() {
                    step.output = output;
                }
            }
            StepState::Failed => {
                step.completed_at = Some(now);
                if output.is_some() {
                    step.output = output;
                }
            }
            StepState::Skipped => {
                step.completed_at = Some(now);
            }
            StepState::Pending => {
                // Corrective reset only.
                step.started_at = None;
                step.completed_at = None;
            }
        }
        step.status = new_status;
    }

    /// Derive the pipeline summary used for todo-level cascades.
    pub fn summarize(steps: &[TodoStep]) -> PipelineOutcome {
        let all_done = !steps.is_empty() && steps.iter().all(|s| s.status.counts_as_done());
        let any_failed = steps.iter().any(|s| s.status == StepState::Failed);
        let current_step = steps
            .iter()
            .filter(|s| !s.status.counts_as_done())
            .map(|s| s.step_type)
            .min();
        PipelineOutcome {
            all_done,
            any_failed,
            current_step,
        }
    }
}
