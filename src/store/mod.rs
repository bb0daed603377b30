//! # State Store
//!
//! Abstract persistence interface the orchestration core depends on, plus
//! the in-memory reference implementation.
//!
//! The single correctness-critical operation is
//! [`StateStore::compare_and_set_todo_status`]: a genuine conditional write
//! that succeeds only if the prior status still matches at the moment of the
//! update. Every at-most-once guarantee in the scheduler rests on it; a
//! read-then-write emulation is not an acceptable implementation.

pub mod memory;

pub use memory::InMemoryStore;

use crate::error::Result;
use crate::models::{Mission, MissionId, Todo, TodoId, TodoStep};
use crate::state_machine::states::{MissionState, StepType, TodoState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Persistence seam for missions, todos, steps and the dependency graph.
///
/// Graph invariants enforced by every implementation of
/// [`set_dependencies`](Self::set_dependencies): no self-edges, no
/// cross-mission edges, no cycles; validation happens before any mutation
/// and a rejected call leaves the prior edge set untouched.
#[async_trait]
pub trait StateStore: Send + Sync {
    // -- missions ----------------------------------------------------------

    async fn insert_mission(&self, mission: Mission) -> Result<()>;

    async fn mission(&self, mission_id: MissionId) -> Result<Mission>;

    /// Unconditionally set the mission status, maintaining the
    /// started/completed timestamps implied by the target state.
    async fn set_mission_status(&self, mission_id: MissionId, status: MissionState) -> Result<()>;

    /// Write the derived progress value. Only the progress aggregator calls
    /// this; progress is never hand-set by API callers.
    async fn set_mission_progress(&self, mission_id: MissionId, progress: u8) -> Result<()>;

    /// Cascade-delete the mission together with its todos, steps and edges.
    async fn delete_mission(&self, mission_id: MissionId) -> Result<()>;

    // -- todos -------------------------------------------------------------

    /// Insert a todo together with its full step pipeline, atomically.
    async fn insert_todo(&self, todo: Todo, steps: Vec<TodoStep>) -> Result<()>;

    async fn todo(&self, todo_id: TodoId) -> Result<Todo>;

    async fn todos_in_mission(&self, mission_id: MissionId) -> Result<Vec<Todo>>;

    async fn pending_todos(&self, mission_id: MissionId) -> Result<Vec<Todo>>;

    /// Atomic conditional status update: succeeds only if the todo's status
    /// still equals `expected` at the moment of the write. Returns
    /// `Ok(false)` on a lost race; that is not an error. Timestamps implied
    /// by the target state (started/completed, actual duration) are
    /// maintained inside the same atomic section.
    async fn compare_and_set_todo_status(
        &self,
        todo_id: TodoId,
        expected: TodoState,
        new: TodoState,
    ) -> Result<bool>;

    async fn set_worktree_path(&self, todo_id: TodoId, path: Option<PathBuf>) -> Result<()>;

    async fn set_current_step(&self, todo_id: TodoId, step: Option<StepType>) -> Result<()>;

    /// Delete a todo and its steps. Rejected while another todo still
    /// depends on it; clear that edge first.
    async fn delete_todo(&self, todo_id: TodoId) -> Result<()>;

    // -- dependency graph --------------------------------------------------

    /// Replace the todo's dependency set transactionally. Rejects
    /// self-dependencies, cross-mission references and anything that would
    /// close a cycle reachable from `todo_id`.
    async fn set_dependencies(&self, todo_id: TodoId, deps: Vec<TodoId>) -> Result<()>;

    /// All todos whose dependency set includes `todo_id` (reverse lookup).
    async fn dependents(&self, todo_id: TodoId) -> Result<Vec<Todo>>;

    // -- steps -------------------------------------------------------------

    /// Steps of a todo in pipeline order.
    async fn steps(&self, todo_id: TodoId) -> Result<Vec<TodoStep>>;

    /// Replace a step record (matched by step id).
    async fn update_step(&self, step: TodoStep) -> Result<()>;

    // -- readiness ---------------------------------------------------------

    /// True iff the todo is pending and every dependency is woven, checked
    /// against freshly loaded dependency records. A todo without
    /// dependencies is vacuously ready.
    async fn is_ready_to_start(&self, todo: &Todo) -> Result<bool> {
        if todo.status != TodoState::Pending {
            return Ok(false);
        }
        for dep_id in &todo.depends_on {
            if !self.todo(*dep_id).await?.status.satisfies_dependency() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True iff the todo is pending and at least one dependency is not woven.
    async fn is_blocked(&self, todo: &Todo) -> Result<bool> {
        if todo.status != TodoState::Pending {
            return Ok(false);
        }
        Ok(!self.is_ready_to_start(todo).await?)
    }
}

/// Timestamp bookkeeping applied inside a successful conditional status
/// write. Shared by store implementations.
pub(crate) fn apply_status_timestamps(todo: &mut Todo, new: TodoState, now: DateTime<Utc>) {
    match new {
        TodoState::Threading => {
            if todo.started_at.is_none() {
                todo.started_at = Some(now);
            }
        }
        TodoState::Woven => {
            todo.completed_at = Some(now);
            if let Some(started) = todo.started_at {
                todo.actual_minutes = Some((now - started).num_minutes().max(0));
            }
        }
        TodoState::Pending => {
            // Corrective reset path.
            todo.started_at = None;
            todo.completed_at = None;
            todo.actual_minutes = None;
        }
        TodoState::Tangled => {}
    }
    todo.updated_at = now;
}
