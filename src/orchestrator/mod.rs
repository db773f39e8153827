//! Workspace orchestration.
//!
//! Covers the container lifecycle state machine, project and workspace
//! registration, per-workspace serialization, and the shutdown sweep.

pub mod catalog;
pub mod lifecycle;
pub mod locks;
pub mod shutdown;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::driver::ContainerDriver;
use crate::models::Document;
use crate::persistence::ProjectStore;
use crate::worktree::WorktreeProvisioner;
use crate::{AppError, Result};

pub use locks::{WorkspaceKey, WorkspaceLocks};
pub use shutdown::SweepReport;

/// Drives workspace transitions against the store and external tools.
pub struct Orchestrator {
    store: Arc<ProjectStore>,
    driver: Arc<dyn ContainerDriver>,
    worktrees: Arc<dyn WorktreeProvisioner>,
    worktree_root: PathBuf,
    branch_prefix: String,
    locks: WorkspaceLocks,
    shutting_down: AtomicBool,
}

impl Orchestrator {
    /// Wire the orchestrator to its store and collaborators.
    #[must_use]
    pub fn new(
        config: &GlobalConfig,
        store: Arc<ProjectStore>,
        driver: Arc<dyn ContainerDriver>,
        worktrees: Arc<dyn WorktreeProvisioner>,
    ) -> Self {
        Self {
            store,
            driver,
            worktrees,
            worktree_root: config.worktree_root(),
            branch_prefix: config.default_branch_prefix.clone(),
            locks: WorkspaceLocks::default(),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Fresh copy of the whole document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the document cannot be read.
    pub async fn document(&self) -> Result<Document> {
        self.store.snapshot().await
    }

    /// Workspaces recorded as running, e.g. left behind by a crash.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the document cannot be read.
    pub async fn recorded_running(&self) -> Result<Vec<WorkspaceKey>> {
        Ok(self.store.snapshot().await?.running())
    }

    /// Stop accepting new transitions other than `down`.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Whether [`Orchestrator::begin_shutdown`] has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.is_shutting_down() {
            Err(AppError::ShuttingDown)
        } else {
            Ok(())
        }
    }
}
