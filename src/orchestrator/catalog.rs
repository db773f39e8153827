//! Project and workspace registration.

use std::path::PathBuf;

use tracing::{info, info_span, warn, Instrument};

use super::Orchestrator;
use crate::models::{validate_name, Project, Workspace};
use crate::{AppError, Result};

impl Orchestrator {
    /// Register a source repository under `name`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the name is invalid, the path is
    /// empty, or the project already exists.
    pub async fn create_project(&self, name: &str, path: &str) -> Result<Project> {
        self.ensure_accepting()?;
        validate_name("project", name)?;
        if path.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "project `{name}` needs a repository path"
            )));
        }

        let project = self
            .store
            .transact(|doc| {
                if doc.projects.contains_key(name) {
                    return Err(AppError::Validation(format!("project `{name}` exists")));
                }
                let project = Project::new(path.to_owned());
                doc.projects.insert(name.to_owned(), project.clone());
                Ok(project)
            })
            .await?;

        info!(project = name, path, "project registered");
        Ok(project)
    }

    /// Remove a project and every workspace record it holds.
    ///
    /// Worktrees and branches are left on disk.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the project is absent.
    /// - `AppError::Conflict` if any of its workspaces is running.
    pub async fn delete_project(&self, name: &str) -> Result<()> {
        let span = info_span!("delete_project", project = name);
        async move {
            self.ensure_accepting()?;

            let snapshot = self.store.load().await?;
            let keys: Vec<_> = snapshot
                .project(name)?
                .workspaces
                .keys()
                .map(|ws| (name.to_owned(), ws.clone()))
                .collect();
            let _locks = self.locks.acquire_many(keys).await;

            let removed = self
                .store
                .transact(|doc| {
                    let project = doc.project(name)?;
                    if let Some(ws) = project.running_workspaces().next() {
                        return Err(AppError::Conflict(format!(
                            "workspace `{ws}` in project `{name}` is running"
                        )));
                    }
                    Ok(doc.projects.remove(name).map_or(0, |p| p.workspaces.len()))
                })
                .await?;

            info!(workspaces = removed, "project deleted");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Provision a worktree and record a new workspace in `beforeStart`.
    ///
    /// Without an explicit `branch` the workspace gets a new branch named
    /// from the configured prefix and the workspace name.
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` for an invalid or duplicate name.
    /// - `AppError::NotFound` if the project is absent.
    /// - `AppError::Git` or `AppError::Io` if the worktree cannot be created.
    pub async fn create_workspace(
        &self,
        project: &str,
        workspace: &str,
        branch: Option<String>,
    ) -> Result<Workspace> {
        let span = info_span!("create_workspace", project, workspace);
        async move {
            validate_name("workspace", workspace)?;
            let _lock = self.locks.acquire(project, workspace).await;
            self.ensure_accepting()?;

            let snapshot = self.store.load().await?;
            let repo = snapshot.project(project)?.path.clone();
            if snapshot.workspace(project, workspace).is_ok() {
                return Err(AppError::Validation(format!(
                    "workspace `{workspace}` exists in project `{project}`"
                )));
            }

            let branch = branch
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| format!("{}{workspace}", self.branch_prefix));
            let dest = self.worktree_path(project, workspace);

            self.worktrees.add(&repo, &branch, &dest).await?;

            let record = Workspace::new(branch.clone(), dest.to_string_lossy().into_owned());
            let committed = self
                .store
                .transact(|doc| {
                    let pj = doc.project_mut(project)?;
                    if pj.workspaces.contains_key(workspace) {
                        return Err(AppError::Validation(format!(
                            "workspace `{workspace}` exists in project `{project}`"
                        )));
                    }
                    pj.workspaces.insert(workspace.to_owned(), record.clone());
                    Ok(record)
                })
                .await;

            match committed {
                Ok(ws) => {
                    info!(%branch, path = %ws.path, "workspace created");
                    Ok(ws)
                }
                Err(err) => {
                    warn!(%err, "record not written; removing provisioned worktree");
                    if let Err(cleanup) = self.worktrees.remove(&repo, &dest).await {
                        warn!(err = %cleanup, "worktree cleanup failed");
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Remove a workspace's worktree, its branch and its record.
    ///
    /// A branch that cannot be deleted (for example because it is not
    /// merged) is kept and only logged.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the project or workspace is absent.
    /// - `AppError::Conflict` if the workspace is running.
    /// - `AppError::Git` if the worktree cannot be removed; the record is
    ///   kept in that case.
    pub async fn delete_workspace(&self, project: &str, workspace: &str) -> Result<()> {
        let span = info_span!("delete_workspace", project, workspace);
        async move {
            let _lock = self.locks.acquire(project, workspace).await;
            self.ensure_accepting()?;

            let snapshot = self.store.load().await?;
            let repo = snapshot.project(project)?.path.clone();
            let current = snapshot.workspace(project, workspace)?;
            if current.is_running() {
                return Err(AppError::Conflict(format!(
                    "workspace `{workspace}` is running; down it first"
                )));
            }

            let dest = if current.path.is_empty() {
                self.worktree_path(project, workspace)
            } else {
                PathBuf::from(&current.path)
            };

            self.worktrees.remove(&repo, &dest).await?;

            if !current.branch_name.is_empty() {
                if let Err(err) = self.worktrees.delete_branch(&repo, &current.branch_name).await {
                    warn!(%err, branch = %current.branch_name, "branch kept");
                }
            }

            self.store
                .transact(|doc| {
                    doc.project_mut(project)?.workspaces.remove(workspace);
                    Ok(())
                })
                .await?;

            info!("workspace deleted");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Default worktree location, used when a record carries no path.
    pub(super) fn worktree_path(&self, project: &str, workspace: &str) -> PathBuf {
        self.worktree_root.join(project).join(workspace)
    }
}
