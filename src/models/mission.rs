use crate::models::{MissionId, WorkspaceId};
use crate::state_machine::states::MissionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level unit of work containing an ordered set of todos.
///
/// `progress` is derived from todo/step state and recomputed by the
/// progress aggregator; it is never set by callers directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub mission_id: MissionId,
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub description: Option<String>,
    pub status: MissionState,
    pub priority: i32,
    /// Derived completion percentage, 0-100.
    pub progress: u8,
    /// When false, the scheduler only notifies about ready todos instead of
    /// promoting them.
    pub auto_start_enabled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    pub fn new(workspace_id: WorkspaceId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            mission_id: Uuid::new_v4(),
            workspace_id,
            title: title.into(),
            description: None,
            status: MissionState::default(),
            priority: 0,
            progress: 0,
            auto_start_enabled: true,
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

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_auto_start(mut self, enabled: bool) -> Self {
        self.auto_start_enabled = enabled;
        self
    }
}
