//! Working-copy provisioning abstraction.
//!
//! Each workspace is backed by a git worktree of its project's source
//! repository. The [`WorktreeProvisioner`] trait keeps the orchestrator
//! independent of the `git` executable.

pub mod git;

use std::path::Path;

use crate::driver::DriverFuture;

pub use git::GitWorktrees;

/// Interface to the version-control tooling that manages worktrees.
pub trait WorktreeProvisioner: Send + Sync {
    /// Create `dest` as a new worktree of `repo` on a new branch `branch`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Git`](crate::AppError::Git) if the command fails.
    fn add(&self, repo: &str, branch: &str, dest: &Path) -> DriverFuture<'_, ()>;

    /// Forcefully remove the worktree at `dest` from `repo`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Git`](crate::AppError::Git) if the command fails.
    fn remove(&self, repo: &str, dest: &Path) -> DriverFuture<'_, ()>;

    /// Delete `branch` from `repo` if it is fully merged.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Git`](crate::AppError::Git) if the command fails.
    fn delete_branch(&self, repo: &str, branch: &str) -> DriverFuture<'_, ()>;
}
