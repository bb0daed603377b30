// State machine module for mission/todo orchestration
//
// Guarded transition tables for missions and todos, plus the fixed step
// pipeline rules that drive todo status as a side effect.

pub mod events;
pub mod mission_state_machine;
pub mod states;
pub mod step_pipeline;
pub mod todo_state_machine;

// Re-export main types for convenient access
pub use events::{MissionEvent, TodoEvent};
pub use mission_state_machine::MissionStateMachine;
pub use states::{MissionState, StepState, StepType, TodoState};
pub use step_pipeline::{PipelineOutcome, StepPipeline};
pub use todo_state_machine::TodoStateMachine;
