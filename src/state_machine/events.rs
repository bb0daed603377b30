use serde::{Deserialize, Serialize};

/// Events that can trigger mission state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MissionEvent {
    /// Begin weaving: the mission has been broken down and work starts
    StartWeaving,
    /// Mark the mission as complete
    Complete,
    /// Abandon the mission
    Drop,
    /// File a completed mission away
    Archive,
}

impl MissionEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StartWeaving => "start_weaving",
            Self::Complete => "complete",
            Self::Drop => "drop",
            Self::Archive => "archive",
        }
    }
}

/// Events that can trigger todo state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TodoEvent {
    /// Start working the todo
    Start,
    /// Mark the todo as complete
    Complete,
    /// Mark the todo as failed with an error message
    Fail(String),
    /// Reset a tangled todo back to pending
    Reset,
}

impl TodoEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Reset => "reset",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
