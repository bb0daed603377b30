use serde::{Deserialize, Serialize};
use std::fmt;

/// Mission lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionState {
    /// Initial state when a mission is created
    #[default]
    Backlog,
    /// Mission has been broken down and its todos are being worked
    Threading,
    /// Every todo completed successfully
    Woven,
    /// Mission was abandoned
    Dropped,
    /// Completed mission filed away
    Archived,
}

impl MissionState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dropped | Self::Archived)
    }

    /// Check if the mission is actively being worked
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Threading)
    }
}

impl fmt::Display for MissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backlog => write!(f, "backlog"),
            Self::Threading => write!(f, "threading"),
            Self::Woven => write!(f, "woven"),
            Self::Dropped => write!(f, "dropped"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for MissionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(Self::Backlog),
            "threading" => Ok(Self::Threading),
            "woven" => Ok(Self::Woven),
            "dropped" => Ok(Self::Dropped),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Invalid mission state: {s}")),
        }
    }
}

/// Todo lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoState {
    /// Initial state; waiting on dependencies or on a start trigger
    #[default]
    Pending,
    /// Todo is currently being worked
    Threading,
    /// Todo completed successfully
    Woven,
    /// Todo failed; terminal unless explicitly reset
    Tangled,
}

impl TodoState {
    /// Check if this is a terminal state. Tangled leaves only through an
    /// explicit reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Woven | Self::Tangled)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Threading)
    }

    /// Check if this todo satisfies the dependency of a downstream todo
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, Self::Woven)
    }
}

impl fmt::Display for TodoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Threading => write!(f, "threading"),
            Self::Woven => write!(f, "woven"),
            Self::Tangled => write!(f, "tangled"),
        }
    }
}

impl std::str::FromStr for TodoState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "threading" => Ok(Self::Threading),
            "woven" => Ok(Self::Woven),
            "tangled" => Ok(Self::Tangled),
            _ => Err(format!("Invalid todo state: {s}")),
        }
    }
}

/// Step status within a todo's fixed pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Initial state when the step is instantiated
    #[default]
    Pending,
    /// Step is currently being executed
    InProgress,
    /// Step completed successfully
    Completed,
    /// Step failed; tangles the owning todo
    Failed,
    /// Step was skipped; counts as satisfied for completion purposes
    Skipped,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Check if this step counts toward todo completion
    pub fn counts_as_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for StepState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid step state: {s}")),
        }
    }
}

/// Fixed, ordered pipeline of step types every todo owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Analysis,
    Design,
    Implementation,
    Verification,
    Review,
    Integration,
}

impl StepType {
    /// All step types in pipeline order.
    pub const ORDERED: [StepType; 6] = [
        Self::Analysis,
        Self::Design,
        Self::Implementation,
        Self::Verification,
        Self::Review,
        Self::Integration,
    ];

    /// Position of this step type within the pipeline.
    pub fn position(&self) -> usize {
        Self::ORDERED.iter().position(|s| s == self).unwrap_or(0)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::Design => write!(f, "design"),
            Self::Implementation => write!(f, "implementation"),
            Self::Verification => write!(f, "verification"),
            Self::Review => write!(f, "review"),
            Self::Integration => write!(f, "integration"),
        }
    }
}

impl std::str::FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(Self::Analysis),
            "design" => Ok(Self::Design),
            "implementation" => Ok(Self::Implementation),
            "verification" => Ok(Self::Verification),
            "review" => Ok(Self::Review),
            "integration" => Ok(Self::Integration),
            _ => Err(format!("Invalid step type: {s}")),
        }
    }
}
