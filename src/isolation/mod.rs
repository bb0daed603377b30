//! # Workspace Isolation
//!
//! Per-todo isolated git worktrees so concurrent workers never touch the
//! same working copy. The orchestration core's sequencing contract: on todo
//! completion, `commit_isolation` for the completing todo runs to completion
//! (success or failure) before any dependent's `create_isolation`.

pub mod git_worktree;
pub mod session_registry;

pub use git_worktree::GitWorktreeIsolation;
pub use session_registry::{SessionHandle, SessionRegistry, WorkerSessionLauncher};

use crate::error::Result;
use crate::models::Todo;
use async_trait::async_trait;
use std::path::PathBuf;

/// External collaborator managing per-todo isolated working copies.
///
/// All operations are best-effort from the orchestration core's view:
/// failures are logged and surfaced as events, never rolled back into the
/// status transition that already succeeded.
#[async_trait]
pub trait WorkspaceIsolation: Send + Sync {
    /// Create an isolated working copy for the todo and return its path.
    async fn create_isolation(&self, todo: &Todo) -> Result<PathBuf>;

    /// Stage and commit any outstanding changes in the todo's isolation.
    /// No-ops when there is nothing to commit.
    async fn commit_isolation(&self, todo: &Todo) -> Result<()>;

    /// Remove the todo's isolated working copy.
    async fn remove_isolation(&self, todo: &Todo) -> Result<()>;
}
