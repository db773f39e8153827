//! Management API handlers under `/api`.
//!
//! Request bodies are decoded by hand so that a malformed or mistyped
//! body is a plain 400 regardless of its content type. Keys are accepted
//! in camelCase and in the PascalCase of older clients.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::AppState;
use crate::models::{Document, Project, Workspace};
use crate::orchestrator::Orchestrator;
use crate::{AppError, Result};

/// Body of `POST /api/project`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateProjectRequest {
    /// Unique project name.
    #[serde(alias = "Name")]
    pub name: String,
    /// Path of the source repository.
    #[serde(alias = "Path")]
    pub path: String,
}

/// Body of `POST /api/workspace`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateWorkspaceRequest {
    /// Owning project.
    #[serde(alias = "ProjectName")]
    pub project_name: String,
    /// New workspace name.
    #[serde(alias = "WorkspaceName")]
    pub workspace_name: String,
    /// Branch to create; derived from the workspace name when absent.
    #[serde(alias = "BranchName")]
    pub branch_name: Option<String>,
}

/// Body of the launch and down endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceRef {
    /// Owning project.
    #[serde(alias = "ProjectName")]
    pub project_name: String,
    /// Target workspace.
    #[serde(alias = "WorkspaceName")]
    pub workspace_name: String,
}

/// Query of the delete endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    pjname: Option<String>,
    wsname: Option<String>,
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|err| AppError::Validation(format!("error decode request body: {err}")))
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value.ok_or_else(|| AppError::Validation(format!("`{name}` param not exists")))
}

/// Run a state transition on its own task and wait for it.
///
/// The transition keeps running to completion even if the client goes
/// away and the handler future is dropped.
async fn detached<T, F, Fut>(state: &AppState, op: F) -> Result<T>
where
    F: FnOnce(Arc<Orchestrator>) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(op(Arc::clone(&state.orchestrator)));
    task.await
        .map_err(|err| AppError::Io(format!("transition task failed: {err}")))?
}

/// `GET /api/project`
pub(crate) async fn list_projects(State(state): State<AppState>) -> Result<Json<Document>> {
    Ok(Json(state.orchestrator.document().await?))
}

/// `POST /api/project`
pub(crate) async fn create_project(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Project>> {
    let req: CreateProjectRequest = decode(&body)?;
    let project = detached(&state, move |orch| async move {
        orch.create_project(&req.name, &req.path).await
    })
    .await?;
    Ok(Json(project))
}

/// `DELETE /api/project?pjname=`
pub(crate) async fn delete_project(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<()> {
    let name = required(params.pjname, "pjname")?;
    detached(&state, move |orch| async move { orch.delete_project(&name).await }).await
}

/// `POST /api/workspace`
pub(crate) async fn create_workspace(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Workspace>> {
    let req: CreateWorkspaceRequest = decode(&body)?;
    let workspace = detached(&state, move |orch| async move {
        orch.create_workspace(&req.project_name, &req.workspace_name, req.branch_name)
            .await
    })
    .await?;
    Ok(Json(workspace))
}

/// `DELETE /api/workspace?pjname=&wsname=`
pub(crate) async fn delete_workspace(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<()> {
    let project = required(params.pjname, "pjname")?;
    let workspace = required(params.wsname, "wsname")?;
    detached(&state, move |orch| async move {
        orch.delete_workspace(&project, &workspace).await
    })
    .await
}

/// `POST /api/workspace/launch`
pub(crate) async fn launch_workspace(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Workspace>> {
    let req: WorkspaceRef = decode(&body)?;
    let workspace = detached(&state, move |orch| async move {
        orch.launch(&req.project_name, &req.workspace_name).await
    })
    .await?;
    Ok(Json(workspace))
}

/// `POST /api/workspace/down`
pub(crate) async fn down_workspace(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Workspace>> {
    let req: WorkspaceRef = decode(&body)?;
    let workspace = detached(&state, move |orch| async move {
        orch.down(&req.project_name, &req.workspace_name).await
    })
    .await?;
    Ok(Json(workspace))
}
