//! `git` CLI implementation of [`WorktreeProvisioner`].

use std::path::{Path, PathBuf};

use tracing::info;

use super::WorktreeProvisioner;
use crate::driver::DriverFuture;
use crate::process::run_tool;
use crate::{AppError, Result};

/// Manages worktrees through the `git` executable.
#[derive(Debug, Clone)]
pub struct GitWorktrees {
    git: String,
}

impl GitWorktrees {
    /// Create a provisioner using the given `git` binary.
    #[must_use]
    pub fn new(git: impl Into<String>) -> Self {
        Self { git: git.into() }
    }

    async fn git(&self, repo: &str, args: &[&str]) -> Result<()> {
        let mut full = vec!["-C", repo];
        full.extend_from_slice(args);

        let output = run_tool(&self.git, &full, None)
            .await
            .map_err(|err| AppError::Git(format!("failed to run {}: {err}", self.git)))?;

        if output.success() {
            Ok(())
        } else {
            Err(AppError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                output.failure_summary()
            )))
        }
    }

    async fn add_inner(&self, repo: String, branch: String, dest: PathBuf) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                AppError::Io(format!(
                    "failed to create worktree parent {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let dest_str = dest.to_string_lossy();
        self.git(&repo, &["worktree", "add", "-b", &branch, &dest_str])
            .await?;
        info!(%repo, %branch, dest = %dest.display(), "worktree added");
        Ok(())
    }

    async fn remove_inner(&self, repo: String, dest: PathBuf) -> Result<()> {
        let dest_str = dest.to_string_lossy();
        self.git(&repo, &["worktree", "remove", "-f", &dest_str])
            .await?;
        info!(%repo, dest = %dest.display(), "worktree removed");
        Ok(())
    }

    async fn delete_branch_inner(&self, repo: String, branch: String) -> Result<()> {
        self.git(&repo, &["branch", "-d", &branch]).await
    }
}

impl WorktreeProvisioner for GitWorktrees {
    fn add(&self, repo: &str, branch: &str, dest: &Path) -> DriverFuture<'_, ()> {
        Box::pin(self.add_inner(repo.to_owned(), branch.to_owned(), dest.to_path_buf()))
    }

    fn remove(&self, repo: &str, dest: &Path) -> DriverFuture<'_, ()> {
        Box::pin(self.remove_inner(repo.to_owned(), dest.to_path_buf()))
    }

    fn delete_branch(&self, repo: &str, branch: &str) -> DriverFuture<'_, ()> {
        Box::pin(self.delete_branch_inner(repo.to_owned(), branch.to_owned()))
    }
}
