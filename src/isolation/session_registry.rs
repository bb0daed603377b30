use crate::error::Result;
use crate::models::TodoId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::Path;
use uuid::Uuid;

/// Launches a worker session against a todo's isolation. Invoked only after
/// a successful auto-start.
#[async_trait]
pub trait WorkerSessionLauncher: Send + Sync {
    async fn start_worker_session(
        &self,
        todo_id: TodoId,
        isolation_path: &Path,
    ) -> Result<SessionHandle>;
}

/// Handle to a launched worker session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub todo_id: TodoId,
    pub started_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn new(todo_id: TodoId) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            todo_id,
            started_at: Utc::now(),
        }
    }
}

/// Liveness cache of running worker sessions, keyed by todo id.
///
/// Populated on spawn, removed on stop. This registry is not a source of
/// truth; the state store is authoritative and the cache only answers "is a
/// worker believed to be live right now".
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<TodoId, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: SessionHandle) {
        self.sessions.insert(handle.todo_id, handle);
    }

    pub fn remove(&self, todo_id: TodoId) -> Option<SessionHandle> {
        self.sessions.remove(&todo_id).map(|(_, handle)| handle)
    }

    pub fn get(&self, todo_id: TodoId) -> Option<SessionHandle> {
        self.sessions.get(&todo_id).map(|h| h.clone())
    }

    pub fn is_live(&self, todo_id: TodoId) -> bool {
        self.sessions.contains_key(&todo_id)
    }

    pub fn live_count(&self) -> usize {
        self.sessions.len()
    }
}
