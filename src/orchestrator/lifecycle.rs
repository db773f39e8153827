//! Container lifecycle transitions: launch and down.
//!
//! ```text
//! beforeStart | stopped --launch--> running
//! running               --down----> beforeStart
//! ```
//!
//! A workspace is recorded as running only after the container started
//! and its address resolved. It is cleared only after the driver reported
//! a successful stop.

use tracing::{error, info, info_span, warn, Instrument};

use super::Orchestrator;
use crate::driver::{stop_identity, StartedContainer};
use crate::models::{RuntimeInfo, Workspace};
use crate::{AppError, Result};

impl Orchestrator {
    /// Start the workspace's container and record it as running.
    ///
    /// If the container starts but its address cannot be resolved, or the
    /// record cannot be written, the container is stopped again so no
    /// unrecorded container is left behind.
    ///
    /// # Errors
    ///
    /// - `AppError::ShuttingDown` once the shutdown sweep has begun.
    /// - `AppError::NotFound` if the project or workspace is absent.
    /// - `AppError::Conflict` if the workspace is already running; the
    ///   driver is not called.
    /// - Driver errors from start or address resolution, and store errors.
    pub async fn launch(&self, project: &str, workspace: &str) -> Result<Workspace> {
        let span = info_span!("launch", project, workspace);
        async move {
            let _lock = self.locks.acquire(project, workspace).await;
            self.ensure_accepting()?;

            let snapshot = self.store.load().await?;
            let current = snapshot.workspace(project, workspace)?;
            if current.is_running() {
                return Err(AppError::Conflict(format!(
                    "container already launched in workspace `{workspace}`"
                )));
            }

            let folder = if current.path.is_empty() {
                self.worktree_path(project, workspace).display().to_string()
            } else {
                current.path.clone()
            };
            let started = self.driver.start(&folder).await?;

            let ip_address = match self.driver.resolve_address(&started.container_id).await {
                Ok(addr) => addr,
                Err(err) => {
                    warn!(
                        %err,
                        container_id = %started.container_id,
                        "address resolution failed after start"
                    );
                    self.compensate(&started).await;
                    return Err(err);
                }
            };

            let runtime = RuntimeInfo {
                identity: started.identity(),
                remote_user: started.remote_user.clone(),
                remote_workspace_folder: started.remote_workspace_folder.clone(),
                ip_address,
            };

            let committed = self
                .store
                .transact(|doc| {
                    let ws = doc.workspace_mut(project, workspace)?;
                    if ws.is_running() {
                        return Err(AppError::Conflict(format!(
                            "container already launched in workspace `{workspace}`"
                        )));
                    }
                    ws.mark_running(runtime);
                    Ok(ws.clone())
                })
                .await;

            match committed {
                Ok(ws) => {
                    info!(ip_address = %ws.ip_address, "workspace running");
                    Ok(ws)
                }
                Err(err) => {
                    error!(%err, "failed to record running container");
                    self.compensate(&started).await;
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Stop the workspace's container and clear its running-only fields.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the project or workspace is absent.
    /// - `AppError::Conflict` if the workspace is not running; the driver
    ///   is not called.
    /// - Driver stop errors; the record is left unchanged.
    /// - Store errors after a successful stop.
    pub async fn down(&self, project: &str, workspace: &str) -> Result<Workspace> {
        let span = info_span!("down", project, workspace);
        async move {
            let _lock = self.locks.acquire(project, workspace).await;

            let snapshot = self.store.load().await?;
            let current = snapshot.workspace(project, workspace)?;
            if !current.is_running() {
                return Err(AppError::Conflict(format!(
                    "container already stopped in workspace `{workspace}`"
                )));
            }

            stop_identity(self.driver.as_ref(), current.identity().as_ref()).await?;

            let ws = self
                .store
                .transact(|doc| {
                    let ws = doc.workspace_mut(project, workspace)?;
                    ws.clear_runtime();
                    Ok(ws.clone())
                })
                .await?;

            info!("workspace stopped");
            Ok(ws)
        }
        .instrument(span)
        .await
    }

    /// Best-effort teardown of a container that will not be recorded.
    async fn compensate(&self, started: &StartedContainer) {
        let identity = started.identity();
        match stop_identity(self.driver.as_ref(), Some(&identity)).await {
            Ok(()) => info!(?identity, "unrecorded container stopped"),
            Err(err) => error!(%err, ?identity, "unrecorded container left running"),
        }
    }
}
