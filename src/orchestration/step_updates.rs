use crate::error::{Result, WeaverError};
use crate::events::{EventKind, EventPublisher};
use crate::models::TodoId;
use crate::orchestration::progress::ProgressAggregator;
use crate::orchestration::scheduler::AutoStartScheduler;
use crate::state_machine::states::{StepState, StepType, TodoState};
use crate::state_machine::StepPipeline;
use crate::store::StateStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Wire payload of the step-update operation. Tokens are validated before
/// any mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepUpdateRequest {
    pub todo_id: TodoId,
    pub step_type: String,
    pub status: String,
    pub output: Option<String>,
}

impl StepUpdateRequest {
    /// Parse the string tokens, rejecting unknown values.
    pub fn parse(&self) -> Result<(StepType, StepState)> {
        let step_type: StepType = self
            .step_type
            .parse()
            .map_err(WeaverError::Validation)?;
        let status: StepState = self.status.parse().map_err(WeaverError::Validation)?;
        Ok((step_type, status))
    }
}

/// Applies worker step reports and drives the todo-level cascades.
pub struct StepUpdateProcessor {
    store: Arc<dyn StateStore>,
    event_publisher: EventPublisher,
    scheduler: Arc<AutoStartScheduler>,
    progress: ProgressAggregator,
}

impl StepUpdateProcessor {
    pub fn new(
        store: Arc<dyn StateStore>,
        event_publisher: EventPublisher,
        scheduler: Arc<AutoStartScheduler>,
        progress: ProgressAggregator,
    ) -> Self {
        Self {
            store,
            event_publisher,
            scheduler,
            progress,
        }
    }

    /// Apply one step status update.
    ///
    /// Side effects on the owning todo: the first step entering in-progress
    /// while the todo is pending promotes it to threading; a fully
    /// completed/skipped pipeline weaves the todo exactly once and hands
    /// off to the scheduler; any failed step tangles the todo.
    #[instrument(skip(self, output), fields(todo_id = %todo_id, step = %step_type, status = %new_status))]
    pub async fn apply_step_update(
        &self,
        todo_id: TodoId,
        step_type: StepType,
        new_status: StepState,
        output: Option<String>,
    ) -> Result<StepState> {
        let todo = self.store.todo(todo_id).await?;
        let steps = self.store.steps(todo_id).await?;
        let mut step = steps
            .iter()
            .find(|s| s.step_type == step_type)
            .cloned()
            .ok_or_else(|| WeaverError::not_found("Step", step_type))?;

        let previous = step.status;
        StepPipeline::apply(&mut step, new_status, output, Utc::now());
        self.store.update_step(step).await?;

        self.event_publisher.record_event(
            EventKind::StepStatusChanged,
            &[todo_id],
            format!("step {step_type} transitioned {previous} -> {new_status}"),
        );

        let steps = self.store.steps(todo_id).await?;
        let outcome = StepPipeline::summarize(&steps);
        self.store.set_current_step(todo_id, outcome.current_step).await?;

        // Todo-level cascades.
        if new_status == StepState::InProgress && todo.status == TodoState::Pending {
            // A worker reporting progress is evidence the todo is already
            // underway; the dependency guard applies to the scheduler and
            // manual paths, not here.
            if self
                .store
                .compare_and_set_todo_status(todo_id, TodoState::Pending, TodoState::Threading)
                .await?
            {
                self.event_publisher.record_event(
                    EventKind::TodoStatusChanged,
                    &[todo_id],
                    "todo transitioned pending -> threading",
                );
            }
        }

        if outcome.any_failed {
            self.tangle_todo(todo_id).await?;
        } else if outcome.all_done {
            self.weave_todo(todo_id).await?;
        }

        self.progress.recompute(todo.mission_id).await?;
        Ok(new_status)
    }

    /// Complete a todo exactly once; the conditional write makes a second
    /// concurrent completion a no-op.
    async fn weave_todo(&self, todo_id: TodoId) -> Result<()> {
        let mut won = self
            .store
            .compare_and_set_todo_status(todo_id, TodoState::Threading, TodoState::Woven)
            .await?;
        if !won
            && self
                .store
                .compare_and_set_todo_status(todo_id, TodoState::Pending, TodoState::Threading)
                .await?
        {
            // A pipeline can finish without any in-progress report (all
            // steps skipped, or a worker that only reports completions);
            // the todo is then still pending and weaves through the same
            // promotion the in-progress cascade would have performed.
            won = self
                .store
                .compare_and_set_todo_status(todo_id, TodoState::Threading, TodoState::Woven)
                .await?;
        }
        if !won {
            // Already woven by a concurrent completion.
            return Ok(());
        }

        info!(todo_id = %todo_id, "✅ Todo woven: all steps complete");
        self.event_publisher.record_event(
            EventKind::TodoStatusChanged,
            &[todo_id],
            "todo transitioned threading -> woven",
        );
        self.scheduler.on_todo_completed(todo_id).await
    }

    async fn tangle_todo(&self, todo_id: TodoId) -> Result<()> {
        // The todo may be threading (normal) or still pending (failure
        // reported before any start); either way it tangles.
        let won = self
            .store
            .compare_and_set_todo_status(todo_id, TodoState::Threading, TodoState::Tangled)
            .await?
            || self
                .store
                .compare_and_set_todo_status(todo_id, TodoState::Pending, TodoState::Tangled)
                .await?;
        if won {
            info!(todo_id = %todo_id, "Todo tangled by failed step");
            self.event_publisher.record_event(
                EventKind::TodoStatusChanged,
                &[todo_id],
                "todo transitioned to tangled",
            );
        }
        Ok(())
    }
}
