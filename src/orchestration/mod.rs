//! Orchestration logic: the atomic auto-start scheduler, step-update
//! processing, progress derivation and the operation facade.

pub mod core;
pub mod progress;
pub mod scheduler;
pub mod step_updates;

pub use core::OrchestrationCore;
pub use progress::{todo_fraction, ProgressAggregator};
pub use scheduler::{AutoStartScheduler, SweeperHandle};
pub use step_updates::{StepUpdateProcessor, StepUpdateRequest};
