use super::events::MissionEvent;
use super::states::MissionState;
use crate::error::{Result, WeaverError};
use crate::events::{EventKind, EventPublisher};
use crate::models::MissionId;
use crate::store::StateStore;
use std::sync::Arc;

/// Guarded mission lifecycle transitions.
pub struct MissionStateMachine {
    store: Arc<dyn StateStore>,
    event_publisher: EventPublisher,
}

impl MissionStateMachine {
    pub fn new(store: Arc<dyn StateStore>, event_publisher: EventPublisher) -> Self {
        Self {
            store,
            event_publisher,
        }
    }

    /// Attempt to transition the mission, enforcing guards.
    pub async fn transition(
        &self,
        mission_id: MissionId,
        event: MissionEvent,
    ) -> Result<MissionState> {
        let mission = self.store.mission(mission_id).await?;
        let current_state = mission.status;
        let target_state = Self::determine_target_state(current_state, &event)?;

        // Guard: manual completion requires every todo woven.
        if target_state == MissionState::Woven {
            let todos = self.store.todos_in_mission(mission_id).await?;
            let unwoven = todos
                .iter()
                .filter(|t| !t.status.satisfies_dependency())
                .count();
            if unwoven > 0 {
                return Err(WeaverError::GuardViolation(format!(
                    "Mission {mission_id} has {unwoven} unwoven todo(s)"
                )));
            }
        }

        self.store.set_mission_status(mission_id, target_state).await?;

        tracing::info!(
            mission_id = %mission_id,
            from = %current_state,
            to = %target_state,
            event = event.event_type(),
            "Mission state transition"
        );
        self.event_publisher.record_event(
            EventKind::MissionStatusChanged,
            &[mission_id],
            format!("mission transitioned {current_state} -> {target_state}"),
        );

        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: MissionState,
        event: &MissionEvent,
    ) -> Result<MissionState> {
        let target = match (current_state, event) {
            // Weaving begins only from the backlog.
            (MissionState::Backlog, MissionEvent::StartWeaving) => MissionState::Threading,

            (MissionState::Threading, MissionEvent::Complete) => MissionState::Woven,

            (MissionState::Backlog, MissionEvent::Drop) => MissionState::Dropped,
            (MissionState::Threading, MissionEvent::Drop) => MissionState::Dropped,

            (MissionState::Woven, MissionEvent::Archive) => MissionState::Archived,

            (from_state, _) => {
                return Err(WeaverError::GuardViolation(format!(
                    "Mission cannot {} from state {from_state}",
                    event.event_type()
                )))
            }
        };

        Ok(target)
    }
}
