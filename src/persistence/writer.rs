//! Atomic whole-file replacement.
//!
//! Content is written to a temporary file in the target's directory and
//! then renamed over the target with `tempfile::NamedTempFile::persist()`.
//! Readers observe either the old file or the new one, never a mix, and a
//! failure at any step leaves the previous file untouched.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{AppError, Result};

/// Summary of a completed replacement.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// Path of the replaced file.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes_written: usize,
}

/// Replace the whole content of `target` with `bytes`.
///
/// # Errors
///
/// Returns `AppError::Store` if the temporary file cannot be created,
/// written, flushed, or renamed over the target.
pub fn replace_file(target: &Path, bytes: &[u8]) -> Result<WriteSummary> {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|err| AppError::Store(format!("failed to create temporary file: {err}")))?;

    tmp.write_all(bytes)
        .map_err(|err| AppError::Store(format!("failed to write temporary file: {err}")))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| AppError::Store(format!("failed to flush temporary file: {err}")))?;

    tmp.persist(target).map_err(|err| {
        AppError::Store(format!(
            "failed to persist file to {}: {err}",
            target.display()
        ))
    })?;

    Ok(WriteSummary {
        path: target.to_path_buf(),
        bytes_written: bytes.len(),
    })
}
