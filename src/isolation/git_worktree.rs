use crate::error::{Result, WeaverError};
use crate::isolation::WorkspaceIsolation;
use crate::models::Todo;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Workspace isolation backed by `git worktree`, driven through the git CLI.
///
/// Every external call is bounded by a hard timeout; an expired process is
/// forcibly killed and reported as a failure. There is no cooperative
/// cancellation.
pub struct GitWorktreeIsolation {
    repo_path: PathBuf,
    worktrees_dir: PathBuf,
    timeout: Duration,
}

impl GitWorktreeIsolation {
    pub fn new(
        repo_path: impl Into<PathBuf>,
        worktrees_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            repo_path: repo_path.into(),
            worktrees_dir: worktrees_dir.into(),
            timeout,
        }
    }

    fn worktree_path_for(&self, todo: &Todo) -> PathBuf {
        self.worktrees_dir.join(todo.todo_id.to_string())
    }

    fn branch_for(todo: &Todo) -> String {
        format!("weaver/todo-{}", todo.todo_id)
    }

    /// Run one git command with the hard timeout, killing the child on
    /// expiry.
    async fn run_git(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        debug!(args = ?args, dir = %dir.display(), "Running git command");

        let mut child = Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WeaverError::External(format!("Failed to spawn git: {e}")))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(args = ?args, stderr = %stderr, "Git command failed");
                }
                Ok(output)
            }
            Ok(Err(e)) => Err(WeaverError::External(format!("Git I/O failure: {e}"))),
            Err(_) => Err(WeaverError::External(format!(
                "Git command {:?} exceeded {}s timeout and was killed",
                args,
                self.timeout.as_secs()
            ))),
        }
    }

    async fn run_git_checked(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        let output = self.run_git(dir, args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WeaverError::External(format!(
                "git {:?} failed: {}",
                args,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl WorkspaceIsolation for GitWorktreeIsolation {
    async fn create_isolation(&self, todo: &Todo) -> Result<PathBuf> {
        let worktree_path = self.worktree_path_for(todo);

        if worktree_path.exists() {
            debug!(path = %worktree_path.display(), "Worktree already exists");
            return Ok(worktree_path);
        }

        tokio::fs::create_dir_all(&self.worktrees_dir)
            .await
            .map_err(|e| WeaverError::External(format!("Failed to create worktrees dir: {e}")))?;

        let branch = Self::branch_for(todo);
        let path_str = worktree_path.to_string_lossy().to_string();
        self.run_git_checked(
            &self.repo_path,
            &["worktree", "add", "-b", &branch, &path_str],
        )
        .await?;

        info!(
            todo_id = %todo.todo_id,
            branch = %branch,
            path = %worktree_path.display(),
            "Created worktree"
        );
        Ok(worktree_path)
    }

    async fn commit_isolation(&self, todo: &Todo) -> Result<()> {
        let Some(worktree_path) = &todo.worktree_path else {
            debug!(todo_id = %todo.todo_id, "No live isolation, nothing to commit");
            return Ok(());
        };
        if !worktree_path.exists() {
            debug!(todo_id = %todo.todo_id, "Isolation path gone, nothing to commit");
            return Ok(());
        }

        self.run_git_checked(worktree_path, &["add", "-A"]).await?;

        let message = format!("weaver: checkpoint todo {} ({})", todo.todo_id, todo.title);
        let output = self
            .run_git(worktree_path, &["commit", "-m", &message])
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            if stderr.contains("nothing to commit") || stdout.contains("nothing to commit") {
                debug!(todo_id = %todo.todo_id, "Nothing to commit");
                return Ok(());
            }
            return Err(WeaverError::External(format!(
                "git commit failed: {}",
                stderr.trim()
            )));
        }

        info!(todo_id = %todo.todo_id, "Committed isolation checkpoint");
        Ok(())
    }

    async fn remove_isolation(&self, todo: &Todo) -> Result<()> {
        let Some(worktree_path) = &todo.worktree_path else {
            return Ok(());
        };
        let path_str = worktree_path.to_string_lossy().to_string();

        if let Err(e) = self
            .run_git_checked(&self.repo_path, &["worktree", "remove", "--force", &path_str])
            .await
        {
            debug!(path = %worktree_path.display(), error = %e, "Worktree remove failed, forcing directory removal");
            tokio::fs::remove_dir_all(worktree_path)
                .await
                .map_err(|e| WeaverError::External(format!("Force remove failed: {e}")))?;
        }

        info!(todo_id = %todo.todo_id, path = %worktree_path.display(), "Removed worktree");
        Ok(())
    }
}
