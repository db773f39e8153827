//! Container sweep on process termination.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use super::{Orchestrator, WorkspaceKey};
use crate::driver::stop_identity;
use crate::Result;

/// Outcome of [`Orchestrator::sweep`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Workspaces whose container was stopped and whose record was cleared.
    pub stopped: Vec<WorkspaceKey>,
    /// Workspaces left as they were, with the reason.
    pub failed: Vec<(WorkspaceKey, String)>,
}

impl Orchestrator {
    /// Refuse new transitions, then sweep running containers.
    ///
    /// Each stop is bounded by the sweep deadline. Workspaces stopped
    /// before a stop hangs are still written as cleared.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::sweep`].
    pub async fn shutdown(&self, budget: Duration) -> Result<SweepReport> {
        self.begin_shutdown();
        self.sweep(budget).await
    }

    /// Stop every running workspace before the process exits.
    ///
    /// Waits for in-flight transitions until the budget runs out, then
    /// stops each running container with the same logic as `down`. One
    /// failure does not prevent the others from being stopped. The
    /// document is written once at the end.
    ///
    /// Call [`Orchestrator::begin_shutdown`] first so no new launch can
    /// start while the sweep runs.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the document cannot be read or the
    /// final write fails. Per-workspace failures only end up in the report.
    pub async fn sweep(&self, budget: Duration) -> Result<SweepReport> {
        let span = info_span!("shutdown_sweep");
        async move {
            let deadline = Instant::now() + budget;
            let mut report = SweepReport::default();

            self.locks.track(self.store.snapshot().await?.running());
            let (_guards, busy) = self.locks.quiesce(deadline).await;
            for key in &busy {
                warn!(project = %key.0, workspace = %key.1, "transition still in flight; skipped");
                report
                    .failed
                    .push((key.clone(), "transition still in flight".to_owned()));
            }

            let _doc_lock = self.store.lock().await;
            let mut document = self.store.load().await?;

            for key in document.running() {
                if busy.contains(&key) {
                    continue;
                }
                let (project, workspace) = (&key.0, &key.1);
                let Ok(ws) = document.workspace_mut(project, workspace) else {
                    continue;
                };

                let identity = ws.identity();
                match tokio::time::timeout_at(
                    deadline,
                    stop_identity(self.driver.as_ref(), identity.as_ref()),
                )
                .await
                {
                    Ok(Ok(())) => {
                        ws.clear_runtime();
                        info!(%project, %workspace, "container stopped");
                        report.stopped.push(key);
                    }
                    Ok(Err(err)) => {
                        warn!(%project, %workspace, %err, "container stop failed; skipped");
                        report.failed.push((key, err.to_string()));
                    }
                    Err(_) => {
                        warn!(%project, %workspace, "shutdown deadline reached; skipped");
                        report.failed.push((key, "shutdown deadline reached".to_owned()));
                    }
                }
            }

            if !report.stopped.is_empty() {
                self.store.save(&document).await?;
            }

            info!(
                stopped = report.stopped.len(),
                failed = report.failed.len(),
                "shutdown sweep finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }
}
