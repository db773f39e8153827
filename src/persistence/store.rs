//! The project document on disk.
//!
//! The whole project graph lives in a single JSON file. Every mutation
//! loads it fresh, edits it in memory, and replaces the file as a whole
//! while holding the store's write lock.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::GlobalConfig;
use crate::models::Document;
use crate::{AppError, Result};

use super::writer::replace_file;

/// Store for the `projects.json` document.
#[derive(Debug)]
pub struct ProjectStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ProjectStore {
    /// Create a store backed by the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the file cannot be read or decoded.
    pub async fn load(&self) -> Result<Document> {
        let raw = tokio::fs::read(&self.path).await.map_err(|err| {
            AppError::Store(format!("error read {}: {err}", self.path.display()))
        })?;
        serde_json::from_slice(&raw).map_err(|err| {
            AppError::Store(format!("error decode {}: {err}", self.path.display()))
        })
    }

    /// Encode `document` and replace the whole file with it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if encoding fails or the file cannot be
    /// replaced. The previous content stays intact in both cases.
    pub async fn save(&self, document: &Document) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|err| {
            AppError::Store(format!("error encode {}: {err}", self.path.display()))
        })?;
        let path = self.path.clone();
        let summary = tokio::task::spawn_blocking(move || replace_file(&path, &bytes))
            .await
            .map_err(|err| AppError::Store(format!("document write task panicked: {err}")))??;
        debug!(path = %summary.path.display(), bytes = summary.bytes_written, "document saved");
        Ok(())
    }

    /// Lock-free read of the current document.
    ///
    /// # Errors
    ///
    /// Same as [`ProjectStore::load`].
    pub async fn snapshot(&self) -> Result<Document> {
        self.load().await
    }

    /// Hold the write lock across a multi-step update.
    ///
    /// Used by callers that must interleave external calls between
    /// [`ProjectStore::load`] and [`ProjectStore::save`].
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Run `mutate` on a fresh copy of the document and persist the result.
    ///
    /// The write lock is held across load, mutation and save, so
    /// transactions never interleave. Nothing is written when `mutate`
    /// returns an error.
    ///
    /// # Errors
    ///
    /// Propagates errors from loading, from `mutate`, and from saving.
    pub async fn transact<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<T>,
    {
        let _guard = self.lock().await;
        let mut document = self.load().await?;
        let value = mutate(&mut document)?;
        self.save(&document).await?;
        Ok(value)
    }
}

/// Create the data directory layout on first start.
///
/// Creates the data directory, the worktree root and an empty `{}`
/// document when missing. Returns `true` if the document had to be created.
///
/// # Errors
///
/// Returns `AppError::Io` if a directory cannot be created and
/// `AppError::Store` if the empty document cannot be written.
pub fn ensure_layout(config: &GlobalConfig) -> Result<bool> {
    fs::create_dir_all(&config.data_dir).map_err(|err| {
        AppError::Io(format!(
            "failed to create data dir {}: {err}",
            config.data_dir.display()
        ))
    })?;
    fs::create_dir_all(config.worktree_root()).map_err(|err| {
        AppError::Io(format!(
            "failed to create worktree root {}: {err}",
            config.worktree_root().display()
        ))
    })?;

    let projects = config.projects_path();
    if projects.exists() {
        return Ok(false);
    }

    replace_file(&projects, b"{}")?;
    info!(path = %projects.display(), "initialized empty project document");
    Ok(true)
}
