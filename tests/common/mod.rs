//! Shared factories and mock collaborators for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use weaver_core::error::{Result, WeaverError};
use weaver_core::isolation::{SessionHandle, WorkerSessionLauncher, WorkspaceIsolation};
use weaver_core::models::{Mission, Todo, TodoId, TodoStep};
use weaver_core::store::{InMemoryStore, StateStore};

/// One recorded isolation call, in invocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsolationCall {
    Create(TodoId),
    Commit(TodoId),
    Remove(TodoId),
}

/// Isolation mock that records call order and can be told to fail.
#[derive(Default)]
pub struct RecordingIsolation {
    pub calls: Mutex<Vec<IsolationCall>>,
    pub fail_create: AtomicBool,
    pub fail_commit: AtomicBool,
}

impl RecordingIsolation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<IsolationCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl WorkspaceIsolation for RecordingIsolation {
    async fn create_isolation(&self, todo: &Todo) -> Result<PathBuf> {
        self.calls.lock().push(IsolationCall::Create(todo.todo_id));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(WeaverError::External("simulated create failure".into()));
        }
        Ok(PathBuf::from(format!("/tmp/worktrees/{}", todo.todo_id)))
    }

    async fn commit_isolation(&self, todo: &Todo) -> Result<()> {
        self.calls.lock().push(IsolationCall::Commit(todo.todo_id));
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(WeaverError::External("simulated commit failure".into()));
        }
        Ok(())
    }

    async fn remove_isolation(&self, todo: &Todo) -> Result<()> {
        self.calls.lock().push(IsolationCall::Remove(todo.todo_id));
        Ok(())
    }
}

/// Launcher mock counting how often each todo's session was started.
#[derive(Default)]
pub struct CountingLauncher {
    pub launches: Mutex<HashMap<TodoId, usize>>,
}

impl CountingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launch_count(&self, todo_id: TodoId) -> usize {
        self.launches.lock().get(&todo_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl WorkerSessionLauncher for CountingLauncher {
    async fn start_worker_session(
        &self,
        todo_id: TodoId,
        _isolation_path: &Path,
    ) -> Result<SessionHandle> {
        *self.launches.lock().entry(todo_id).or_insert(0) += 1;
        Ok(SessionHandle::new(todo_id))
    }
}

/// Seed a mission directly into a store.
pub async fn seed_mission(store: &Arc<InMemoryStore>, auto_start: bool) -> Mission {
    let mission = Mission::new(uuid::Uuid::new_v4(), "integration mission")
        .with_auto_start(auto_start);
    store.insert_mission(mission.clone()).await.unwrap();
    mission
}

/// Seed a todo (with full pipeline) directly into a store.
pub async fn seed_todo(
    store: &Arc<InMemoryStore>,
    mission: &Mission,
    title: &str,
    order_index: i32,
) -> Todo {
    let todo = Todo::new(mission.mission_id, title, order_index);
    let steps = TodoStep::full_pipeline(todo.todo_id);
    store.insert_todo(todo.clone(), steps).await.unwrap();
    todo
}
