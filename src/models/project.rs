//! Project records and the document that holds all of them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::null_as_default;
use super::workspace::Workspace;
use crate::{AppError, Result};

/// A registered source repository and its workspaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    /// Path of the source repository on the host.
    #[serde(alias = "Path", deserialize_with = "null_as_default")]
    pub path: String,
    /// Workspaces keyed by name.
    #[serde(alias = "Workspaces", deserialize_with = "null_as_default")]
    pub workspaces: BTreeMap<String, Workspace>,
}

impl Project {
    /// Construct a project without workspaces.
    #[must_use]
    pub fn new(path: String) -> Self {
        Self {
            path,
            workspaces: BTreeMap::new(),
        }
    }

    /// Names of workspaces currently recorded as running.
    pub fn running_workspaces(&self) -> impl Iterator<Item = &str> {
        self.workspaces
            .iter()
            .filter(|(_, ws)| ws.is_running())
            .map(|(name, _)| name.as_str())
    }
}

/// The whole persisted state: project name to project.
///
/// Always read and written as one unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Document {
    /// Projects keyed by name.
    pub projects: BTreeMap<String, Project>,
}

impl Document {
    /// Look up a project.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the project is absent.
    pub fn project(&self, name: &str) -> Result<&Project> {
        self.projects
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("project `{name}` not exists")))
    }

    /// Look up a project for mutation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the project is absent.
    pub fn project_mut(&mut self, name: &str) -> Result<&mut Project> {
        self.projects
            .get_mut(name)
            .ok_or_else(|| AppError::NotFound(format!("project `{name}` not exists")))
    }

    /// Look up a workspace.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the project or workspace is absent.
    pub fn workspace(&self, project: &str, workspace: &str) -> Result<&Workspace> {
        self.project(project)?.workspaces.get(workspace).ok_or_else(|| {
            AppError::NotFound(format!(
                "workspace `{workspace}` not exists in project `{project}`"
            ))
        })
    }

    /// Look up a workspace for mutation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the project or workspace is absent.
    pub fn workspace_mut(&mut self, project: &str, workspace: &str) -> Result<&mut Workspace> {
        self.project_mut(project)?
            .workspaces
            .get_mut(workspace)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "workspace `{workspace}` not exists in project `{project}`"
                ))
            })
    }

    /// Every `(project, workspace)` pair recorded as running.
    #[must_use]
    pub fn running(&self) -> Vec<(String, String)> {
        self.projects
            .iter()
            .flat_map(|(pj, project)| {
                project
                    .running_workspaces()
                    .map(move |ws| (pj.clone(), ws.to_owned()))
            })
            .collect()
    }

    /// Every `(project, workspace)` pair in the document.
    #[must_use]
    pub fn all_workspaces(&self) -> Vec<(String, String)> {
        self.projects
            .iter()
            .flat_map(|(pj, project)| {
                project
                    .workspaces
                    .keys()
                    .map(move |ws| (pj.clone(), ws.clone()))
            })
            .collect()
    }
}
