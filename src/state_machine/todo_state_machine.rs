use super::events::TodoEvent;
use super::states::{StepState, TodoState};
use crate::error::{Result, WeaverError};
use crate::events::{EventKind, EventPublisher};
use crate::models::TodoId;
use crate::store::StateStore;
use std::sync::Arc;

/// Guarded todo lifecycle transitions.
///
/// The status write is always the store's conditional update, so a
/// concurrent caller cannot slip a second transition through between the
/// guard check and the write.
pub struct TodoStateMachine {
    store: Arc<dyn StateStore>,
    event_publisher: EventPublisher,
}

impl TodoStateMachine {
    pub fn new(store: Arc<dyn StateStore>, event_publisher: EventPublisher) -> Self {
        Self {
            store,
            event_publisher,
        }
    }

    /// Attempt to transition the todo, enforcing guards.
    pub async fn transition(&self, todo_id: TodoId, event: TodoEvent) -> Result<TodoState> {
        let todo = self.store.todo(todo_id).await?;
        let current_state = todo.status;
        let target_state = Self::determine_target_state(current_state, &event)?;

        // Guard: a manual start requires every dependency to be woven.
        if current_state == TodoState::Pending && target_state == TodoState::Threading {
            if !self.store.is_ready_to_start(&todo).await? {
                return Err(WeaverError::GuardViolation(format!(
                    "Todo {todo_id} cannot start threading: unmet dependencies"
                )));
            }
        }

        let won = self
            .store
            .compare_and_set_todo_status(todo_id, current_state, target_state)
            .await?;
        if !won {
            return Err(WeaverError::GuardViolation(format!(
                "Todo {todo_id} status changed concurrently; transition {} aborted",
                event.event_type()
            )));
        }

        // Corrective reset clears the pipeline along with the todo.
        if matches!(event, TodoEvent::Reset) {
            self.reset_steps(todo_id).await?;
        }

        tracing::info!(
            todo_id = %todo_id,
            from = %current_state,
            to = %target_state,
            event = event.event_type(),
            "Todo state transition"
        );
        self.event_publisher.record_event(
            EventKind::TodoStatusChanged,
            &[todo_id],
            format!("todo transitioned {current_state} -> {target_state}"),
        );

        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: TodoState,
        event: &TodoEvent,
    ) -> Result<TodoState> {
        let target = match (current_state, event) {
            (TodoState::Pending, TodoEvent::Start) => TodoState::Threading,

            (TodoState::Threading, TodoEvent::Complete) => TodoState::Woven,

            (TodoState::Pending, TodoEvent::Fail(_)) => TodoState::Tangled,
            (TodoState::Threading, TodoEvent::Fail(_)) => TodoState::Tangled,

            // Tangled is terminal unless explicitly reset.
            (TodoState::Tangled, TodoEvent::Reset) => TodoState::Pending,

            (from_state, _) => {
                return Err(WeaverError::GuardViolation(format!(
                    "Todo cannot {} from state {from_state}",
                    event.event_type()
                )))
            }
        };

        Ok(target)
    }

    async fn reset_steps(&self, todo_id: TodoId) -> Result<()> {
        for mut step in self.store.steps(todo_id).await? {
            step.status = StepState::Pending;
            step.started_at = None;
            step.completed_at = None;
            step.output = None;
            self.store.update_step(step).await?;
        }
        self.store
            .set_current_step(todo_id, Some(super::states::StepType::Analysis))
            .await
    }
}
