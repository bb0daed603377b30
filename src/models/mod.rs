//! Data layer: missions, todos and their fixed step pipelines.

pub mod mission;
pub mod todo;
pub mod todo_step;

pub use mission::Mission;
pub use todo::{Todo, TodoDraft};
pub use todo_step::TodoStep;

/// Stable identifier types. All ids are v4 UUIDs.
pub type MissionId = uuid::Uuid;
pub type TodoId = uuid::Uuid;
pub type StepId = uuid::Uuid;
pub type WorkspaceId = uuid::Uuid;
