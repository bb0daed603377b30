use crate::models::{StepId, TodoId};
use crate::state_machine::states::{StepState, StepType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stage of a todo's fixed execution pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoStep {
    pub step_id: StepId,
    pub todo_id: TodoId,
    pub step_type: StepType,
    pub status: StepState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Option<String>,
}

impl TodoStep {
    pub fn new(todo_id: TodoId, step_type: StepType) -> Self {
        Self {
            step_id: Uuid::new_v4(),
            todo_id,
            step_type,
            status: StepState::default(),
            started_at: None,
            completed_at: None,
            output: None,
        }
    }

    /// Instantiate the full ordered pipeline for a new todo.
    pub fn full_pipeline(todo_id: TodoId) -> Vec<TodoStep> {
        StepType::ORDERED
            .iter()
            .map(|step_type| TodoStep::new(todo_id, *step_type))
            .collect()
    }
}
