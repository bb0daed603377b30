use crate::models::{MissionId, TodoId};
use crate::state_machine::states::{StepType, TodoState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A schedulable task with a dependency set and a fixed pipeline of steps.
///
/// Dependencies must resolve to todos of the same mission; the store rejects
/// self-edges, cross-mission edges and anything that would close a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub todo_id: TodoId,
    pub mission_id: MissionId,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoState,
    pub complexity: i32,
    pub priority: i32,
    pub order_index: i32,
    pub estimated_minutes: Option<i64>,
    pub actual_minutes: Option<i64>,
    /// Lowest-ordered step not yet completed or skipped.
    pub current_step: Option<StepType>,
    /// Live isolation path, at most one at a time.
    pub worktree_path: Option<PathBuf>,
    /// Forward edges of the per-mission DAG.
    pub depends_on: Vec<TodoId>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(mission_id: MissionId, title: impl Into<String>, order_index: i32) -> Self {
        let now = Utc::now();
        Self {
            todo_id: Uuid::new_v4(),
            mission_id,
            title: title.into(),
            description: None,
            status: TodoState::default(),
            complexity: 0,
            priority: 0,
            order_index,
            estimated_minutes: None,
            actual_minutes: None,
            current_step: Some(StepType::Analysis),
            worktree_path: None,
            depends_on: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_complexity(mut self, complexity: i32) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimate(mut self, minutes: i64) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }
}

/// Payload for bulk todo creation when a mission starts weaving.
///
/// `depends_on_drafts` refers to other drafts in the same batch by list
/// position; the orchestration core maps positions to the generated stable
/// ids after insertion. Resolution is never done by order_index matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoDraft {
    pub title: String,
    pub description: Option<String>,
    pub complexity: i32,
    pub priority: i32,
    pub estimated_minutes: Option<i64>,
    pub depends_on_drafts: Vec<usize>,
}

impl TodoDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            complexity: 0,
            priority: 0,
            estimated_minutes: None,
            depends_on_drafts: Vec::new(),
        }
    }

    pub fn depending_on(mut self, draft_indices: &[usize]) -> Self {
        self.depends_on_drafts = draft_indices.to_vec();
        self
    }
}
