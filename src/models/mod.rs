//! Domain model module declarations.

use serde::{Deserialize, Deserializer};

use crate::{AppError, Result};

pub mod project;
pub mod workspace;

pub use project::{Document, Project};
pub use workspace::{ContainerIdentity, RuntimeInfo, Workspace, WorkspaceState};

/// Treat an explicit JSON `null` as the type's default.
///
/// Documents written by earlier releases store empty maps as `null`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Validate a project or workspace name.
///
/// Names become path segments under the worktree root, so they must be
/// non-empty and must not contain separators or relative components.
///
/// # Errors
///
/// Returns `AppError::Validation` describing the problem.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(format!("{kind} name must not be empty")));
    }
    if name == "." || name == ".." {
        return Err(AppError::Validation(format!(
            "{kind} name `{name}` is reserved"
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(AppError::Validation(format!(
            "{kind} name `{name}` must not contain path separators"
        )));
    }
    Ok(())
}
