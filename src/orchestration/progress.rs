use crate::error::Result;
use crate::events::{EventKind, EventPublisher};
use crate::models::{MissionId, TodoStep};
use crate::state_machine::states::TodoState;
use crate::store::StateStore;
use std::sync::Arc;

/// Derives mission-level completion from todo/step state.
///
/// Progress is a pure function of stored state and is always recomputed,
/// never hand-set: a woven todo contributes its full share, any other todo
/// contributes partial credit for its completed/skipped steps.
pub struct ProgressAggregator {
    store: Arc<dyn StateStore>,
    event_publisher: EventPublisher,
}

impl ProgressAggregator {
    pub fn new(store: Arc<dyn StateStore>, event_publisher: EventPublisher) -> Self {
        Self {
            store,
            event_publisher,
        }
    }

    /// Recompute and persist the mission's progress. Returns the new value.
    pub async fn recompute(&self, mission_id: MissionId) -> Result<u8> {
        let todos = self.store.todos_in_mission(mission_id).await?;
        if todos.is_empty() {
            self.store.set_mission_progress(mission_id, 0).await?;
            return Ok(0);
        }

        let mut total = 0.0;
        for todo in &todos {
            let steps = self.store.steps(todo.todo_id).await?;
            total += todo_fraction(todo.status, &steps);
        }
        let progress = ((total / todos.len() as f64) * 100.0).floor() as u8;

        self.store.set_mission_progress(mission_id, progress).await?;
        self.event_publisher.record_event(
            EventKind::ProgressUpdated,
            &[mission_id],
            format!("mission progress {progress}%"),
        );
        Ok(progress)
    }
}

/// Completion fraction one todo contributes to its mission.
pub fn todo_fraction(status: TodoState, steps: &[TodoStep]) -> f64 {
    if status == TodoState::Woven {
        return 1.0;
    }
    if steps.is_empty() {
        return 0.0;
    }
    let done = steps.iter().filter(|s| s.status.counts_as_done()).count();
    done as f64 / steps.len() as f64
}
