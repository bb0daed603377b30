//! # Orchestration Core
//!
//! Facade wiring the store, event publisher, isolation manager, worker
//! launcher and scheduler into the operation surface consumed by transport
//! layers: dependency updates, guarded status updates, step updates, bulk
//! weaving and the ready/dependents queries.

use crate::config::WeaverConfig;
use crate::error::{Result, WeaverError};
use crate::events::EventPublisher;
use crate::isolation::{SessionRegistry, WorkerSessionLauncher, WorkspaceIsolation};
use crate::models::{Mission, MissionId, Todo, TodoDraft, TodoId, TodoStep, WorkspaceId};
use crate::orchestration::progress::ProgressAggregator;
use crate::orchestration::scheduler::{AutoStartScheduler, SweeperHandle};
use crate::orchestration::step_updates::{StepUpdateProcessor, StepUpdateRequest};
use crate::state_machine::states::TodoState;
use crate::state_machine::{MissionEvent, MissionStateMachine, TodoEvent, TodoStateMachine};
use crate::store::StateStore;
use futures::future;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct OrchestrationCore {
    config: WeaverConfig,
    store: Arc<dyn StateStore>,
    event_publisher: EventPublisher,
    scheduler: Arc<AutoStartScheduler>,
    step_processor: StepUpdateProcessor,
    mission_machine: MissionStateMachine,
    todo_machine: TodoStateMachine,
    progress: ProgressAggregator,
    sessions: Arc<SessionRegistry>,
}

impl OrchestrationCore {
    pub fn new(
        config: WeaverConfig,
        store: Arc<dyn StateStore>,
        isolation: Arc<dyn WorkspaceIsolation>,
        launcher: Arc<dyn WorkerSessionLauncher>,
    ) -> Self {
        let event_publisher = EventPublisher::new(config.event_channel_capacity);
        let sessions = Arc::new(SessionRegistry::new());
        let scheduler = Arc::new(AutoStartScheduler::new(
            Arc::clone(&store),
            event_publisher.clone(),
            isolation,
            launcher,
            Arc::clone(&sessions),
        ));
        let progress = ProgressAggregator::new(Arc::clone(&store), event_publisher.clone());
        let step_processor = StepUpdateProcessor::new(
            Arc::clone(&store),
            event_publisher.clone(),
            Arc::clone(&scheduler),
            ProgressAggregator::new(Arc::clone(&store), event_publisher.clone()),
        );
        let mission_machine =
            MissionStateMachine::new(Arc::clone(&store), event_publisher.clone());
        let todo_machine = TodoStateMachine::new(Arc::clone(&store), event_publisher.clone());

        Self {
            config,
            store,
            event_publisher,
            scheduler,
            step_processor,
            mission_machine,
            todo_machine,
            progress,
            sessions,
        }
    }

    // -- mission operations ------------------------------------------------

    pub async fn create_mission(
        &self,
        workspace_id: WorkspaceId,
        title: impl Into<String>,
    ) -> Result<Mission> {
        let mission =
            Mission::new(workspace_id, title).with_auto_start(self.config.auto_start_enabled);
        self.store.insert_mission(mission.clone()).await?;
        Ok(mission)
    }

    /// Begin weaving: transition the mission out of the backlog, create the
    /// batch of todos with their step pipelines, resolve declared
    /// dependencies by the generated stable ids, then start everything that
    /// is already eligible.
    #[instrument(skip(self, drafts), fields(mission_id = %mission_id, draft_count = drafts.len()))]
    pub async fn start_weaving(
        &self,
        mission_id: MissionId,
        drafts: Vec<TodoDraft>,
    ) -> Result<Vec<Todo>> {
        self.mission_machine
            .transition(mission_id, MissionEvent::StartWeaving)
            .await?;

        // First pass: instantiate todos and pipelines without edges so the
        // draft-index -> stable-id map is complete before resolution.
        let mut created = Vec::with_capacity(drafts.len());
        for (index, draft) in drafts.iter().enumerate() {
            let mut todo = Todo::new(mission_id, draft.title.clone(), index as i32)
                .with_complexity(draft.complexity)
                .with_priority(draft.priority);
            todo.description = draft.description.clone();
            todo.estimated_minutes = draft.estimated_minutes;
            let steps = TodoStep::full_pipeline(todo.todo_id);
            self.store.insert_todo(todo.clone(), steps).await?;
            created.push(todo);
        }

        // Second pass: dependency resolution by stable id.
        for (index, draft) in drafts.iter().enumerate() {
            if draft.depends_on_drafts.is_empty() {
                continue;
            }
            let mut dep_ids = Vec::with_capacity(draft.depends_on_drafts.len());
            for dep_index in &draft.depends_on_drafts {
                let dep = created.get(*dep_index).ok_or_else(|| {
                    WeaverError::Validation(format!(
                        "Draft {index} references draft index {dep_index}, batch has {} drafts",
                        created.len()
                    ))
                })?;
                dep_ids.push(dep.todo_id);
            }
            self.store
                .set_dependencies(created[index].todo_id, dep_ids)
                .await?;
        }

        info!(mission_id = %mission_id, todos = created.len(), "🧶 Mission weaving started");
        self.scheduler.start_ready_todos(mission_id).await?;

        // Return fresh records: the scheduler may already have promoted some.
        future::try_join_all(created.iter().map(|todo| self.store.todo(todo.todo_id))).await
    }

    /// Guarded manual mission transition.
    pub async fn update_mission_status(
        &self,
        mission_id: MissionId,
        event: MissionEvent,
    ) -> Result<()> {
        self.mission_machine.transition(mission_id, event).await?;
        Ok(())
    }

    /// Cascade-delete a mission with its todos, steps and edges.
    pub async fn delete_mission(&self, mission_id: MissionId) -> Result<()> {
        self.store.delete_mission(mission_id).await
    }

    pub async fn mission(&self, mission_id: MissionId) -> Result<Mission> {
        self.store.mission(mission_id).await
    }

    // -- todo operations ---------------------------------------------------

    /// Add a single todo (with its step pipeline) to an existing mission.
    pub async fn add_todo(&self, todo: Todo) -> Result<Todo> {
        let steps = TodoStep::full_pipeline(todo.todo_id);
        self.store.insert_todo(todo.clone(), steps).await?;
        Ok(todo)
    }

    /// Replace a todo's dependency set. Rejects cycles, self-dependencies
    /// and cross-mission references before any mutation.
    pub async fn update_dependencies(&self, todo_id: TodoId, deps: Vec<TodoId>) -> Result<()> {
        self.store.set_dependencies(todo_id, deps).await
    }

    /// Guarded manual todo transition. A completion hands off to the
    /// scheduler exactly as a step-driven completion would.
    pub async fn update_todo_status(&self, todo_id: TodoId, event: TodoEvent) -> Result<()> {
        let target = self.todo_machine.transition(todo_id, event).await?;
        if target == TodoState::Woven {
            self.scheduler.on_todo_completed(todo_id).await?;
        }
        let todo = self.store.todo(todo_id).await?;
        self.progress.recompute(todo.mission_id).await?;
        Ok(())
    }

    /// Delete a todo; rejected while another todo depends on it.
    pub async fn delete_todo(&self, todo_id: TodoId) -> Result<()> {
        self.store.delete_todo(todo_id).await
    }

    pub async fn todo(&self, todo_id: TodoId) -> Result<Todo> {
        self.store.todo(todo_id).await
    }

    pub async fn steps(&self, todo_id: TodoId) -> Result<Vec<TodoStep>> {
        self.store.steps(todo_id).await
    }

    // -- step operations ---------------------------------------------------

    /// Apply a worker's step report from wire tokens.
    pub async fn apply_step_update(&self, request: StepUpdateRequest) -> Result<()> {
        let (step_type, status) = request.parse()?;
        self.step_processor
            .apply_step_update(request.todo_id, step_type, status, request.output)
            .await?;
        Ok(())
    }

    // -- queries -----------------------------------------------------------

    /// Pending todos of a mission whose dependencies are all woven.
    pub async fn ready_todos(&self, mission_id: MissionId) -> Result<Vec<Todo>> {
        let pending = self.store.pending_todos(mission_id).await?;
        let mut ready = Vec::new();
        for todo in pending {
            if self.store.is_ready_to_start(&todo).await? {
                ready.push(todo);
            }
        }
        Ok(ready)
    }

    /// Todos whose dependency set includes the given todo.
    pub async fn dependents(&self, todo_id: TodoId) -> Result<Vec<Todo>> {
        self.store.dependents(todo_id).await
    }

    // -- scheduling --------------------------------------------------------

    /// Re-evaluate every pending todo of a mission (sweep entry point).
    pub async fn start_ready_todos(&self, mission_id: MissionId) -> Result<usize> {
        self.scheduler.start_ready_todos(mission_id).await
    }

    /// Spawn the periodic ready sweep for a mission.
    pub fn spawn_sweeper(&self, mission_id: MissionId) -> SweeperHandle {
        self.scheduler
            .spawn_sweeper(mission_id, self.config.sweep_interval)
    }

    // -- accessors ---------------------------------------------------------

    pub fn event_publisher(&self) -> &EventPublisher {
        &self.event_publisher
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn config(&self) -> &WeaverConfig {
        &self.config
    }
}
