//! In-memory state store.
//!
//! Entity maps are sharded [`DashMap`]s; the conditional status write runs
//! under the owning shard lock, which makes it a true compare-and-swap
//! rather than a read-then-write. Dependency edges are guarded by a single
//! `parking_lot` lock so that replacing an edge set is validate-fully,
//! then-commit: a rejected mutation leaves the graph untouched.

use crate::error::{Result, WeaverError};
use crate::models::{Mission, MissionId, Todo, TodoId, TodoStep};
use crate::state_machine::states::{MissionState, StepType, TodoState};
use crate::store::{apply_status_timestamps, StateStore};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

#[derive(Default)]
pub struct InMemoryStore {
    missions: DashMap<MissionId, Mission>,
    todos: DashMap<TodoId, Todo>,
    steps: DashMap<TodoId, Vec<TodoStep>>,
    /// Reverse edge index: dependency id -> ids of todos that depend on it.
    /// The write lock doubles as the graph mutation lock; every edge change
    /// goes through it.
    reverse_edges: RwLock<HashMap<TodoId, HashSet<TodoId>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth-first search over forward edges with an explicit recursion
    /// stack; a node found on the active stack closes a cycle.
    fn has_cycle_from(adjacency: &HashMap<TodoId, Vec<TodoId>>, start: TodoId) -> bool {
        fn visit(
            node: TodoId,
            adjacency: &HashMap<TodoId, Vec<TodoId>>,
            visited: &mut HashSet<TodoId>,
            stack: &mut HashSet<TodoId>,
        ) -> bool {
            if stack.contains(&node) {
                return true;
            }
            if !visited.insert(node) {
                return false;
            }
            stack.insert(node);
            if let Some(deps) = adjacency.get(&node) {
                for dep in deps {
                    if visit(*dep, adjacency, visited, stack) {
                        return true;
                    }
                }
            }
            stack.remove(&node);
            false
        }

        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        visit(start, adjacency, &mut visited, &mut stack)
    }

    /// Snapshot of the forward adjacency with `todo_id`'s edges replaced by
    /// the proposed set.
    fn adjacency_with_replacement(&self, todo_id: TodoId, deps: &[TodoId]) -> HashMap<TodoId, Vec<TodoId>> {
        let mut adjacency: HashMap<TodoId, Vec<TodoId>> = self
            .todos
            .iter()
            .map(|entry| (*entry.key(), entry.value().depends_on.clone()))
            .collect();
        adjacency.insert(todo_id, deps.to_vec());
        adjacency
    }

    /// Validate a proposed edge set for `todo` without mutating anything.
    /// Caller must hold the graph mutation lock.
    fn validate_edges(&self, todo: &Todo, deps: &[TodoId]) -> Result<()> {
        for dep_id in deps {
            if *dep_id == todo.todo_id {
                return Err(WeaverError::Validation(format!(
                    "Todo {} cannot depend on itself",
                    todo.todo_id
                )));
            }
            let dep = self
                .todos
                .get(dep_id)
                .ok_or_else(|| WeaverError::not_found("Todo", dep_id))?;
            if dep.mission_id != todo.mission_id {
                return Err(WeaverError::Validation(format!(
                    "Todo {} belongs to mission {}, not {}",
                    dep_id, dep.mission_id, todo.mission_id
                )));
            }
        }

        let adjacency = self.adjacency_with_replacement(todo.todo_id, deps);
        if Self::has_cycle_from(&adjacency, todo.todo_id) {
            return Err(WeaverError::Validation(format!(
                "Dependency update for todo {} would create a cycle",
                todo.todo_id
            )));
        }

        Ok(())
    }

    /// Commit a validated edge replacement. Caller must hold the graph
    /// mutation lock (passed in as the locked reverse index).
    fn commit_edges(
        reverse: &mut HashMap<TodoId, HashSet<TodoId>>,
        todo_id: TodoId,
        old_deps: &[TodoId],
        new_deps: &[TodoId],
    ) {
        for old in old_deps {
            if let Some(set) = reverse.get_mut(old) {
                set.remove(&todo_id);
                if set.is_empty() {
                    reverse.remove(old);
                }
            }
        }
        for new in new_deps {
            reverse.entry(*new).or_default().insert(todo_id);
        }
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn insert_mission(&self, mission: Mission) -> Result<()> {
        self.missions.insert(mission.mission_id, mission);
        Ok(())
    }

    async fn mission(&self, mission_id: MissionId) -> Result<Mission> {
        self.missions
            .get(&mission_id)
            .map(|m| m.clone())
            .ok_or_else(|| WeaverError::not_found("Mission", mission_id))
    }

    async fn set_mission_status(&self, mission_id: MissionId, status: MissionState) -> Result<()> {
        let mut mission = self
            .missions
            .get_mut(&mission_id)
            .ok_or_else(|| WeaverError::not_found("Mission", mission_id))?;
        let now = Utc::now();
        match status {
            MissionState::Threading => {
                if mission.started_at.is_none() {
                    mission.started_at = Some(now);
                }
            }
            MissionState::Woven => mission.completed_at = Some(now),
            _ => {}
        }
        mission.status = status;
        mission.updated_at = now;
        Ok(())
    }

    async fn set_mission_progress(&self, mission_id: MissionId, progress: u8) -> Result<()> {
        let mut mission = self
            .missions
            .get_mut(&mission_id)
            .ok_or_else(|| WeaverError::not_found("Mission", mission_id))?;
        mission.progress = progress.min(100);
        mission.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_mission(&self, mission_id: MissionId) -> Result<()> {
        if self.missions.remove(&mission_id).is_none() {
            return Err(WeaverError::not_found("Mission", mission_id));
        }

        let todo_ids: Vec<TodoId> = self
            .todos
            .iter()
            .filter(|entry| entry.value().mission_id == mission_id)
            .map(|entry| *entry.key())
            .collect();

        let mut reverse = self.reverse_edges.write();
        for todo_id in &todo_ids {
            self.todos.remove(todo_id);
            self.steps.remove(todo_id);
            reverse.remove(todo_id);
        }
        // Edges are intra-mission, so dropping every todo of the mission
        // from the remaining reverse sets finishes the cascade.
        for set in reverse.values_mut() {
            for todo_id in &todo_ids {
                set.remove(todo_id);
            }
        }
        reverse.retain(|_, set| !set.is_empty());
        Ok(())
    }

    async fn insert_todo(&self, todo: Todo, steps: Vec<TodoStep>) -> Result<()> {
        if !self.missions.contains_key(&todo.mission_id) {
            return Err(WeaverError::not_found("Mission", todo.mission_id));
        }

        let mut reverse = self.reverse_edges.write();
        if !todo.depends_on.is_empty() {
            self.validate_edges(&todo, &todo.depends_on)?;
            Self::commit_edges(&mut reverse, todo.todo_id, &[], &todo.depends_on);
        }
        self.steps.insert(todo.todo_id, steps);
        self.todos.insert(todo.todo_id, todo);
        Ok(())
    }

    async fn todo(&self, todo_id: TodoId) -> Result<Todo> {
        self.todos
            .get(&todo_id)
            .map(|t| t.clone())
            .ok_or_else(|| WeaverError::not_found("Todo", todo_id))
    }

    async fn todos_in_mission(&self, mission_id: MissionId) -> Result<Vec<Todo>> {
        let mut todos: Vec<Todo> = self
            .todos
            .iter()
            .filter(|entry| entry.value().mission_id == mission_id)
            .map(|entry| entry.value().clone())
            .collect();
        todos.sort_by_key(|t| t.order_index);
        Ok(todos)
    }

    async fn pending_todos(&self, mission_id: MissionId) -> Result<Vec<Todo>> {
        let todos = self.todos_in_mission(mission_id).await?;
        Ok(todos
            .into_iter()
            .filter(|t| t.status == TodoState::Pending)
            .collect())
    }

    async fn compare_and_set_todo_status(
        &self,
        todo_id: TodoId,
        expected: TodoState,
        new: TodoState,
    ) -> Result<bool> {
        let mut todo = self
            .todos
            .get_mut(&todo_id)
            .ok_or_else(|| WeaverError::not_found("Todo", todo_id))?;
        if todo.status != expected {
            return Ok(false);
        }
        todo.status = new;
        apply_status_timestamps(&mut todo, new, Utc::now());
        Ok(true)
    }

    async fn set_worktree_path(&self, todo_id: TodoId, path: Option<PathBuf>) -> Result<()> {
        let mut todo = self
            .todos
            .get_mut(&todo_id)
            .ok_or_else(|| WeaverError::not_found("Todo", todo_id))?;
        todo.worktree_path = path;
        todo.updated_at = Utc::now();
        Ok(())
    }

    async fn set_current_step(&self, todo_id: TodoId, step: Option<StepType>) -> Result<()> {
        let mut todo = self
            .todos
            .get_mut(&todo_id)
            .ok_or_else(|| WeaverError::not_found("Todo", todo_id))?;
        todo.current_step = step;
        todo.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_todo(&self, todo_id: TodoId) -> Result<()> {
        let mut reverse = self.reverse_edges.write();

        if let Some(dependents) = reverse.get(&todo_id) {
            if !dependents.is_empty() {
                return Err(WeaverError::Validation(format!(
                    "Todo {} is still referenced as a dependency by {} todo(s)",
                    todo_id,
                    dependents.len()
                )));
            }
        }

        let (_, todo) = self
            .todos
            .remove(&todo_id)
            .ok_or_else(|| WeaverError::not_found("Todo", todo_id))?;
        self.steps.remove(&todo_id);
        Self::commit_edges(&mut reverse, todo_id, &todo.depends_on, &[]);
        reverse.remove(&todo_id);
        Ok(())
    }

    async fn set_dependencies(&self, todo_id: TodoId, deps: Vec<TodoId>) -> Result<()> {
        let mut reverse = self.reverse_edges.write();

        let todo = self
            .todos
            .get(&todo_id)
            .map(|t| t.clone())
            .ok_or_else(|| WeaverError::not_found("Todo", todo_id))?;
        self.validate_edges(&todo, &deps)?;

        Self::commit_edges(&mut reverse, todo_id, &todo.depends_on, &deps);
        if let Some(mut entry) = self.todos.get_mut(&todo_id) {
            entry.depends_on = deps;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn dependents(&self, todo_id: TodoId) -> Result<Vec<Todo>> {
        let ids: Vec<TodoId> = {
            let reverse = self.reverse_edges.read();
            reverse
                .get(&todo_id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };
        let mut dependents = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(todo) = self.todos.get(&id) {
                dependents.push(todo.clone());
            }
        }
        dependents.sort_by_key(|t| t.order_index);
        Ok(dependents)
    }

    async fn steps(&self, todo_id: TodoId) -> Result<Vec<TodoStep>> {
        let mut steps = self
            .steps
            .get(&todo_id)
            .map(|s| s.clone())
            .ok_or_else(|| WeaverError::not_found("Todo", todo_id))?;
        steps.sort_by_key(|s| s.step_type);
        Ok(steps)
    }

    async fn update_step(&self, step: TodoStep) -> Result<()> {
        let mut steps = self
            .steps
            .get_mut(&step.todo_id)
            .ok_or_else(|| WeaverError::not_found("Todo", step.todo_id))?;
        let slot = steps
            .iter_mut()
            .find(|s| s.step_id == step.step_id)
            .ok_or_else(|| WeaverError::not_found("Step", step.step_id))?;
        *slot = step;
        Ok(())
    }
}
