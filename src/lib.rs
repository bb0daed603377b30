#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Weaver Core
//!
//! Dependency-aware orchestration engine for hierarchical units of work:
//! missions contain todos, todos contain a fixed pipeline of steps. Workers
//! report step progress; the engine keeps the per-mission dependency graph
//! acyclic, promotes eligible todos exactly once under concurrent
//! completion events and coordinates per-todo git worktree isolation.
//!
//! ## Architecture
//!
//! - **Dependency graph store**: todos and directed depends-on edges scoped
//!   to one mission, with cycle-safe mutation behind the [`store`] trait.
//! - **State machines**: guarded mission/todo lifecycles and the fixed step
//!   pipeline that drives todo status as a side effect.
//! - **Atomic auto-start scheduler**: reacts to a todo weaving, re-checks
//!   dependent readiness against fresh state and promotes each eligible
//!   dependent through an atomic conditional status write.
//! - **Workspace isolation**: per-todo git worktrees, sequenced so a
//!   completed todo's work is committed before any dependent's worktree is
//!   created.
//! - **Progress aggregation**: mission progress derived from todo/step
//!   state, never hand-set.
//!
//! ## Module Organization
//!
//! - [`models`] - missions, todos and step pipelines
//! - [`state_machine`] - lifecycle states, events and transition tables
//! - [`store`] - persistence seam and the in-memory CAS store
//! - [`orchestration`] - scheduler, step updates, progress, facade
//! - [`isolation`] - git worktree isolation and worker session registry
//! - [`events`] - timeline records and fire-and-forget publication
//! - [`config`] - runtime configuration
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weaver_core::config::WeaverConfig;
//! use weaver_core::isolation::GitWorktreeIsolation;
//! use weaver_core::orchestration::OrchestrationCore;
//! use weaver_core::store::InMemoryStore;
//! # use weaver_core::isolation::{SessionHandle, WorkerSessionLauncher};
//! # use weaver_core::models::TodoId;
//! # use std::path::Path;
//! # struct NoopLauncher;
//! # #[async_trait::async_trait]
//! # impl WorkerSessionLauncher for NoopLauncher {
//! #     async fn start_worker_session(
//! #         &self,
//! #         todo_id: TodoId,
//! #         _isolation_path: &Path,
//! #     ) -> weaver_core::error::Result<SessionHandle> {
//! #         Ok(SessionHandle::new(todo_id))
//! #     }
//! # }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = WeaverConfig::from_env()?;
//! let isolation = Arc::new(GitWorktreeIsolation::new(
//!     ".",
//!     config.worktrees_dir.clone(),
//!     config.external_timeout,
//! ));
//! let core = OrchestrationCore::new(
//!     config,
//!     Arc::new(InMemoryStore::new()),
//!     isolation,
//!     Arc::new(NoopLauncher),
//! );
//!
//! let mission = core
//!     .create_mission(uuid::Uuid::new_v4(), "refactor billing")
//!     .await?;
//! println!("mission {} created", mission.mission_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod isolation;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;

pub use config::WeaverConfig;
pub use error::{Result, WeaverError};
pub use events::{EventKind, EventPublisher, TimelineEvent};
pub use models::{Mission, Todo, TodoDraft, TodoStep};
pub use orchestration::{OrchestrationCore, StepUpdateRequest};
pub use state_machine::{MissionEvent, MissionState, StepState, StepType, TodoEvent, TodoState};
pub use store::{InMemoryStore, StateStore};
