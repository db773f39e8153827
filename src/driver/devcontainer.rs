//! `devcontainer` CLI + `docker` CLI implementation of [`ContainerDriver`].
//!
//! - start: `devcontainer up --workspace-folder <dir>`; the CLI prints log
//!   lines followed by a JSON result object on stdout.
//! - stop: `docker compose -p <project> down` or `docker rm -f <id>`.
//! - address: `docker inspect <id>`, first network with an address.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{info, warn};

use super::{ContainerDriver, DriverFuture, StartedContainer};
use crate::config::ToolsConfig;
use crate::process::run_tool;
use crate::{AppError, Result};

/// Result object printed by `devcontainer up`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UpResult {
    outcome: String,
    container_id: String,
    compose_project_name: String,
    remote_user: String,
    remote_workspace_folder: String,
    message: String,
    description: String,
}

/// The subset of `docker inspect` output needed to find an address.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    #[serde(default)]
    network_settings: NetworkSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettings {
    #[serde(default)]
    networks: Option<BTreeMap<String, NetworkAttachment>>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkAttachment {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

/// Decode the stdout of `devcontainer up`.
///
/// Log output before the result object is skipped: decoding starts at the
/// first `{` and stops after one JSON value.
///
/// # Errors
///
/// Returns `AppError::Launch` if no result object is found, it does not
/// decode, its outcome is not `success`, or it names no container.
pub fn parse_up_output(stdout: &str) -> Result<StartedContainer> {
    let start = stdout
        .find('{')
        .ok_or_else(|| AppError::Launch("not found result json".into()))?;

    let result: UpResult = serde_json::Deserializer::from_str(&stdout[start..])
        .into_iter::<UpResult>()
        .next()
        .ok_or_else(|| AppError::Launch("not found result json".into()))?
        .map_err(|err| AppError::Launch(format!("invalid result json: {err}")))?;

    if result.outcome != "success" {
        let detail = [result.message.as_str(), result.description.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(": ");
        return Err(AppError::Launch(if detail.is_empty() {
            format!("container start reported outcome `{}`", result.outcome)
        } else {
            format!(
                "container start reported outcome `{}`: {detail}",
                result.outcome
            )
        }));
    }

    if result.container_id.is_empty() {
        return Err(AppError::Launch(
            "container start succeeded without a container id".into(),
        ));
    }

    Ok(StartedContainer {
        container_id: result.container_id,
        compose_project_name: Some(result.compose_project_name).filter(|s| !s.is_empty()),
        remote_user: result.remote_user,
        remote_workspace_folder: result.remote_workspace_folder,
    })
}

/// Decode the stdout of `docker inspect` and pick the first address.
///
/// Networks are visited in name order so the choice is stable.
///
/// # Errors
///
/// Returns `AppError::Inspect` if the output does not decode and
/// `AppError::AddressNotFound` if no network carries an address.
pub fn parse_inspect_output(stdout: &str) -> Result<String> {
    let entries: Vec<InspectEntry> = serde_json::from_str(stdout)
        .map_err(|err| AppError::Inspect(format!("invalid inspect json: {err}")))?;

    entries
        .into_iter()
        .next()
        .and_then(|entry| entry.network_settings.networks)
        .unwrap_or_default()
        .into_values()
        .map(|net| net.ip_address)
        .find(|addr| !addr.is_empty())
        .ok_or_else(|| AppError::AddressNotFound("IPAddress not found".into()))
}

/// Drives the `devcontainer` and `docker` executables.
#[derive(Debug, Clone)]
pub struct DevcontainerDriver {
    devcontainer: String,
    docker: String,
}

impl DevcontainerDriver {
    /// Create a driver using the configured tool paths.
    #[must_use]
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            devcontainer: tools.devcontainer.clone(),
            docker: tools.docker.clone(),
        }
    }

    async fn start_inner(&self, workspace_folder: String) -> Result<StartedContainer> {
        let mut args = vec!["up", "--workspace-folder", workspace_folder.as_str()];
        if self.docker != "docker" {
            args.extend(["--docker-path", self.docker.as_str()]);
        }

        let output = run_tool(&self.devcontainer, &args, None)
            .await
            .map_err(|err| {
                AppError::Launch(format!("failed to run {}: {err}", self.devcontainer))
            })?;

        if !output.success() {
            // The CLI prints an error result object on failure; prefer it.
            return Err(match parse_up_output(&output.stdout) {
                Err(err) if output.stdout.contains("\"outcome\"") => err,
                _ => AppError::Launch(format!(
                    "devcontainer up failed: {}",
                    output.failure_summary()
                )),
            });
        }

        let started = parse_up_output(&output.stdout)?;
        info!(
            workspace_folder = %workspace_folder,
            container_id = %started.container_id,
            compose_project = ?started.compose_project_name,
            "container started"
        );
        Ok(started)
    }

    async fn stop_inner(
        &self,
        container_id: Option<String>,
        compose_project_name: Option<String>,
    ) -> Result<()> {
        let (args, instance) = match (compose_project_name, container_id) {
            (Some(name), _) if !name.is_empty() => {
                (vec!["compose".to_owned(), "-p".to_owned(), name.clone(), "down".to_owned()], name)
            }
            (_, Some(id)) if !id.is_empty() => {
                (vec!["rm".to_owned(), "-f".to_owned(), id.clone()], id)
            }
            _ => {
                return Err(AppError::NoTarget(
                    "cannot find any compose project or container".into(),
                ))
            }
        };

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_tool(&self.docker, &arg_refs, None)
            .await
            .map_err(|err| AppError::Stop(format!("failed to run {}: {err}", self.docker)))?;

        if !output.success() {
            warn!(%instance, "container teardown failed");
            return Err(AppError::Stop(format!(
                "docker {} failed: {}",
                args.join(" "),
                output.failure_summary()
            )));
        }

        info!(%instance, "container stopped");
        Ok(())
    }

    async fn resolve_inner(&self, container_id: String) -> Result<String> {
        let output = run_tool(&self.docker, &["inspect", container_id.as_str()], None)
            .await
            .map_err(|err| AppError::Inspect(format!("failed to run {}: {err}", self.docker)))?;

        if !output.success() {
            return Err(AppError::Inspect(format!(
                "docker inspect {container_id} failed: {}",
                output.failure_summary()
            )));
        }

        parse_inspect_output(&output.stdout)
    }
}

impl ContainerDriver for DevcontainerDriver {
    fn start(&self, workspace_folder: &str) -> DriverFuture<'_, StartedContainer> {
        let workspace_folder = workspace_folder.to_owned();
        Box::pin(self.start_inner(workspace_folder))
    }

    fn stop(
        &self,
        container_id: Option<&str>,
        compose_project_name: Option<&str>,
    ) -> DriverFuture<'_, ()> {
        let container_id = container_id.map(str::to_owned);
        let compose_project_name = compose_project_name.map(str::to_owned);
        Box::pin(self.stop_inner(container_id, compose_project_name))
    }

    fn resolve_address(&self, container_id: &str) -> DriverFuture<'_, String> {
        let container_id = container_id.to_owned();
        Box::pin(self.resolve_inner(container_id))
    }
}
