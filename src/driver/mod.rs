//! Container lifecycle driver abstraction.
//!
//! The [`ContainerDriver`] trait decouples the lifecycle orchestrator
//! from the external tools that actually start and stop containers, so
//! the orchestrator can run against a fake in tests.

pub mod devcontainer;

use std::future::Future;
use std::pin::Pin;

use crate::models::ContainerIdentity;
use crate::Result;

pub use devcontainer::DevcontainerDriver;

/// Boxed future returned by driver operations.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// What the container tool reports after a successful start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedContainer {
    /// Id of the container the workspace folder is mounted in.
    pub container_id: String,
    /// Compose project, when the definition is compose based.
    pub compose_project_name: Option<String>,
    /// User inside the container.
    pub remote_user: String,
    /// Workspace folder inside the container.
    pub remote_workspace_folder: String,
}

impl StartedContainer {
    /// The identity to record for later teardown.
    ///
    /// The compose project wins over the container id so that `down`
    /// removes every service of the project.
    #[must_use]
    pub fn identity(&self) -> ContainerIdentity {
        match self.compose_project_name.as_deref() {
            Some(name) if !name.is_empty() => ContainerIdentity::Compose(name.to_owned()),
            _ => ContainerIdentity::Container(self.container_id.clone()),
        }
    }
}

/// Interface to the external container lifecycle tooling.
///
/// Every call is a blocking external process from the caller's point of
/// view. Implementations never retry.
pub trait ContainerDriver: Send + Sync {
    /// Start (or reuse) the dev container for `workspace_folder`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Launch`](crate::AppError::Launch) if the tool
    /// fails or reports a non-success outcome.
    fn start(&self, workspace_folder: &str) -> DriverFuture<'_, StartedContainer>;

    /// Tear down a compose project, or a single container when no compose
    /// project is given.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NoTarget`](crate::AppError::NoTarget) when both
    /// arguments are absent and [`AppError::Stop`](crate::AppError::Stop)
    /// when the tool fails.
    fn stop(
        &self,
        container_id: Option<&str>,
        compose_project_name: Option<&str>,
    ) -> DriverFuture<'_, ()>;

    /// First network address attached to a running container.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Inspect`](crate::AppError::Inspect) if inspection
    /// fails and [`AppError::AddressNotFound`](crate::AppError::AddressNotFound)
    /// if the container has no address.
    fn resolve_address(&self, container_id: &str) -> DriverFuture<'_, String>;
}

/// Stop whatever `identity` names.
///
/// # Errors
///
/// Propagates the driver's stop error.
pub async fn stop_identity(
    driver: &dyn ContainerDriver,
    identity: Option<&ContainerIdentity>,
) -> Result<()> {
    match identity {
        Some(ContainerIdentity::Compose(name)) => driver.stop(None, Some(name)).await,
        Some(ContainerIdentity::Container(id)) => driver.stop(Some(id), None).await,
        None => driver.stop(None, None).await,
    }
}
