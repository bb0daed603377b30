//! Event system: timeline records and fire-and-forget publication.

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kinds of timeline events the orchestration core records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MissionStatusChanged,
    TodoStatusChanged,
    StepStatusChanged,
    TodoReady,
    TodoAutoStarted,
    TodoStartedWithoutIsolation,
    IsolationCommitFailed,
    ProgressUpdated,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissionStatusChanged => "mission_status_changed",
            Self::TodoStatusChanged => "todo_status_changed",
            Self::StepStatusChanged => "step_status_changed",
            Self::TodoReady => "todo_ready",
            Self::TodoAutoStarted => "todo_auto_started",
            Self::TodoStartedWithoutIsolation => "todo_started_without_isolation",
            Self::IsolationCommitFailed => "isolation_commit_failed",
            Self::ProgressUpdated => "progress_updated",
        };
        write!(f, "{name}")
    }
}

/// A recorded timeline entry. Consumers (notification transports, activity
/// feeds) subscribe through the publisher; delivery is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub kind: EventKind,
    pub subject_ids: Vec<Uuid>,
    pub message: String,
}
