//! # Atomic Auto-Start Scheduler
//!
//! ## Architecture: Compare-and-Swap Promotion
//!
//! Triggered whenever a todo reaches woven. The scheduler resolves
//! dependents, re-checks readiness against freshly loaded records and
//! promotes each eligible dependent pending -> threading through the
//! store's atomic conditional write. Two triggers racing over the same
//! dependent cannot both win; the loser's conditional write observes a
//! non-pending status and no-ops.
//!
//! ## Sequencing contract
//!
//! The completing todo's isolation is committed (success or failure) before
//! any dependent's isolation is created. Within one completion this order
//! is strict; across different completed todos no ordering is guaranteed.
//!
//! The scheduler takes no in-process lock around the dependent set: the
//! conditional status write is the only point of atomicity, which keeps the
//! component safe to invoke concurrently from any number of completion
//! events. A periodic sweep re-evaluates pending todos with the same
//! conditional transition, so missed triggers degrade to a delay rather
//! than a violation of at-most-once-start.

use crate::error::{Result, WeaverError};
use crate::events::{EventKind, EventPublisher};
use crate::isolation::{SessionRegistry, WorkerSessionLauncher, WorkspaceIsolation};
use crate::models::{MissionId, Todo, TodoId};
use crate::state_machine::states::{MissionState, TodoState};
use crate::store::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

pub struct AutoStartScheduler {
    store: Arc<dyn StateStore>,
    event_publisher: EventPublisher,
    isolation: Arc<dyn WorkspaceIsolation>,
    launcher: Arc<dyn WorkerSessionLauncher>,
    sessions: Arc<SessionRegistry>,
}

/// Handle to a spawned periodic sweep loop.
pub struct SweeperHandle {
    running: Arc<RwLock<bool>>,
    join: tokio::task::JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep loop after its current tick.
    pub async fn stop(self) {
        *self.running.write().await = false;
        self.join.abort();
    }
}

impl AutoStartScheduler {
    pub fn new(
        store: Arc<dyn StateStore>,
        event_publisher: EventPublisher,
        isolation: Arc<dyn WorkspaceIsolation>,
        launcher: Arc<dyn WorkerSessionLauncher>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            store,
            event_publisher,
            isolation,
            launcher,
            sessions,
        }
    }

    /// Handle a todo having reached woven: commit its isolation, then
    /// evaluate and promote eligible dependents.
    #[instrument(skip(self), fields(todo_id = %completed_todo_id))]
    pub async fn on_todo_completed(&self, completed_todo_id: TodoId) -> Result<()> {
        let completed = self.store.todo(completed_todo_id).await?;
        if completed.status != TodoState::Woven {
            return Err(WeaverError::GuardViolation(format!(
                "Todo {completed_todo_id} is {} rather than woven",
                completed.status
            )));
        }

        // Strict sequencing: the predecessor's outstanding changes are
        // committed (or the attempt has failed) before any dependent's
        // isolation can be created below.
        if let Err(e) = self.isolation.commit_isolation(&completed).await {
            warn!(todo_id = %completed_todo_id, error = %e, "Isolation commit failed; proceeding");
            self.event_publisher.record_event(
                EventKind::IsolationCommitFailed,
                &[completed_todo_id],
                format!("commit failed: {e}"),
            );
        }
        self.sessions.remove(completed_todo_id);

        let dependents = self.store.dependents(completed_todo_id).await?;
        debug!(
            todo_id = %completed_todo_id,
            dependent_count = dependents.len(),
            "Evaluating dependents of completed todo"
        );
        for dependent in dependents {
            self.try_start(dependent.todo_id).await?;
        }

        self.maybe_complete_mission(completed.mission_id).await?;
        Ok(())
    }

    /// Attempt to auto-start one todo. Returns true iff this caller won the
    /// promotion. A lost race is a silent no-op by design.
    pub async fn try_start(&self, todo_id: TodoId) -> Result<bool> {
        // Freshly loaded: other dependencies may have changed concurrently.
        let todo = self.store.todo(todo_id).await?;
        if todo.status != TodoState::Pending {
            return Ok(false);
        }
        if !self.store.is_ready_to_start(&todo).await? {
            return Ok(false);
        }

        let mission = self.store.mission(todo.mission_id).await?;
        if !mission.auto_start_enabled || mission.status != MissionState::Threading {
            let reason = if mission.auto_start_enabled {
                format!("its mission is {}, not threading", mission.status)
            } else {
                "auto-start is disabled for its mission".to_string()
            };
            self.event_publisher.record_event(
                EventKind::TodoReady,
                &[todo_id, todo.mission_id],
                format!("todo is ready to start; {reason}"),
            );
            return Ok(false);
        }

        let won = self
            .store
            .compare_and_set_todo_status(todo_id, TodoState::Pending, TodoState::Threading)
            .await?;
        if !won {
            debug!(todo_id = %todo_id, "Lost auto-start race; another trigger promoted this todo");
            return Ok(false);
        }

        info!(todo_id = %todo_id, mission_id = %todo.mission_id, "🚀 Auto-started todo");
        self.event_publisher.record_event(
            EventKind::TodoAutoStarted,
            &[todo_id, todo.mission_id],
            "todo promoted pending -> threading",
        );
        self.event_publisher.record_event(
            EventKind::TodoStatusChanged,
            &[todo_id],
            "todo transitioned pending -> threading",
        );

        let started = self.store.todo(todo_id).await?;
        self.provision_isolation(&started).await;
        Ok(true)
    }

    /// Create the isolation and launch the worker session for a freshly
    /// started todo. Failures leave the todo threading and are surfaced as
    /// a started-without-isolation condition rather than unwound.
    async fn provision_isolation(&self, todo: &Todo) {
        match self.isolation.create_isolation(todo).await {
            Ok(path) => {
                if let Err(e) = self.store.set_worktree_path(todo.todo_id, Some(path.clone())).await
                {
                    warn!(todo_id = %todo.todo_id, error = %e, "Failed to record worktree path");
                }
                match self.launcher.start_worker_session(todo.todo_id, &path).await {
                    Ok(handle) => self.sessions.register(handle),
                    Err(e) => {
                        warn!(todo_id = %todo.todo_id, error = %e, "Worker session launch failed");
                        self.event_publisher.record_event(
                            EventKind::TodoStartedWithoutIsolation,
                            &[todo.todo_id],
                            format!("worker session launch failed: {e}"),
                        );
                    }
                }
            }
            Err(e) => {
                warn!(todo_id = %todo.todo_id, error = %e, "Isolation creation failed");
                self.event_publisher.record_event(
                    EventKind::TodoStartedWithoutIsolation,
                    &[todo.todo_id],
                    format!("isolation creation failed: {e}"),
                );
            }
        }
    }

    /// Periodic-sweep entry point: re-evaluate every pending todo of a
    /// mission. Returns how many todos this call promoted.
    #[instrument(skip(self), fields(mission_id = %mission_id))]
    pub async fn start_ready_todos(&self, mission_id: MissionId) -> Result<usize> {
        let pending = self.store.pending_todos(mission_id).await?;
        let mut started = 0;
        for todo in pending {
            if self.try_start(todo.todo_id).await? {
                started += 1;
            }
        }
        if started > 0 {
            info!(mission_id = %mission_id, started = started, "Ready sweep promoted todos");
        }
        Ok(started)
    }

    /// When the last todo weaves, the mission weaves with it.
    async fn maybe_complete_mission(&self, mission_id: MissionId) -> Result<()> {
        let mission = self.store.mission(mission_id).await?;
        if mission.status != MissionState::Threading {
            return Ok(());
        }
        let todos = self.store.todos_in_mission(mission_id).await?;
        if todos.is_empty() || !todos.iter().all(|t| t.status == TodoState::Woven) {
            return Ok(());
        }

        self.store
            .set_mission_status(mission_id, MissionState::Woven)
            .await?;
        info!(mission_id = %mission_id, "🧵 Mission woven: all todos complete");
        self.event_publisher.record_event(
            EventKind::MissionStatusChanged,
            &[mission_id],
            "mission transitioned threading -> woven",
        );
        Ok(())
    }

    /// Spawn a background loop that sweeps a mission's pending todos on an
    /// interval, tolerating missed completion triggers.
    pub fn spawn_sweeper(self: &Arc<Self>, mission_id: MissionId, interval: Duration) -> SweeperHandle {
        let running = Arc::new(RwLock::new(true));
        let scheduler = Arc::clone(self);
        let flag = Arc::clone(&running);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !*flag.read().await {
                    break;
                }
                if let Err(e) = scheduler.start_ready_todos(mission_id).await {
                    warn!(mission_id = %mission_id, error = %e, "Ready sweep failed");
                }
            }
        });

        SweeperHandle { running, join }
    }
}
