//! Workspace model and lifecycle helpers.

use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Lifecycle state of a workspace's container.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WorkspaceState {
    /// Worktree provisioned, no container started yet (or torn down).
    #[default]
    BeforeStart,
    /// Container started and reachable.
    Running,
    /// Container stopped.
    Stopped,
}

impl std::fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::BeforeStart => "beforeStart",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Identity of the running container instance.
///
/// A compose project takes precedence: tearing it down removes every
/// service container, including the one the workspace is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerIdentity {
    /// Stop with `docker compose -p <name> down`.
    Compose(String),
    /// Stop with `docker rm -f <id>`.
    Container(String),
}

/// Container-side facts recorded while a workspace is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    /// Which instance to tear down later.
    pub identity: ContainerIdentity,
    /// User inside the container.
    pub remote_user: String,
    /// Workspace folder inside the container.
    pub remote_workspace_folder: String,
    /// Address reachable from the host.
    pub ip_address: String,
}

/// Workspace record persisted inside its project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Workspace {
    /// Current lifecycle state.
    #[serde(alias = "State")]
    pub state: WorkspaceState,
    /// Branch checked out in the worktree; immutable after creation.
    #[serde(alias = "BranchName", deserialize_with = "null_as_default")]
    pub branch_name: String,
    /// Host path of the worktree.
    #[serde(alias = "Path", deserialize_with = "null_as_default")]
    pub path: String,
    /// Running container id (empty when a compose project identifies it).
    #[serde(alias = "ContainerId", deserialize_with = "null_as_default")]
    pub container_id: String,
    /// Running compose project name.
    #[serde(alias = "ComposeProjectName", deserialize_with = "null_as_default")]
    pub compose_project_name: String,
    /// Container-side user.
    #[serde(alias = "RemoteUser", deserialize_with = "null_as_default")]
    pub remote_user: String,
    /// Container-side workspace folder.
    #[serde(alias = "RemoteWorkspaceFolder", deserialize_with = "null_as_default")]
    pub remote_workspace_folder: String,
    /// Container address used by the port router.
    #[serde(
        alias = "IPAddress",
        alias = "IpAddress",
        deserialize_with = "null_as_default"
    )]
    pub ip_address: String,
}

impl Workspace {
    /// Construct a freshly provisioned workspace in `beforeStart`.
    #[must_use]
    pub fn new(branch_name: String, path: String) -> Self {
        Self {
            state: WorkspaceState::BeforeStart,
            branch_name,
            path,
            ..Self::default()
        }
    }

    /// Whether the record claims a live container.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == WorkspaceState::Running
    }

    /// Recorded container identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<ContainerIdentity> {
        if !self.compose_project_name.is_empty() {
            Some(ContainerIdentity::Compose(self.compose_project_name.clone()))
        } else if !self.container_id.is_empty() {
            Some(ContainerIdentity::Container(self.container_id.clone()))
        } else {
            None
        }
    }

    /// Record a started container and flip the state to `running`.
    pub fn mark_running(&mut self, runtime: RuntimeInfo) {
        let (container_id, compose_project_name) = match runtime.identity {
            ContainerIdentity::Compose(name) => (String::new(), name),
            ContainerIdentity::Container(id) => (id, String::new()),
        };
        self.state = WorkspaceState::Running;
        self.container_id = container_id;
        self.compose_project_name = compose_project_name;
        self.remote_user = runtime.remote_user;
        self.remote_workspace_folder = runtime.remote_workspace_folder;
        self.ip_address = runtime.ip_address;
    }

    /// Clear every running-only field and return to `beforeStart`.
    pub fn clear_runtime(&mut self) {
        self.state = WorkspaceState::BeforeStart;
        self.container_id.clear();
        self.compose_project_name.clear();
        self.remote_user.clear();
        self.remote_workspace_folder.clear();
        self.ip_address.clear();
    }

    /// Check the running/identity/address invariant.
    ///
    /// Running records carry exactly one identity and an address; other
    /// states carry no running-only field at all.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let has_container = !self.container_id.is_empty();
        let has_compose = !self.compose_project_name.is_empty();
        if self.is_running() {
            (has_container != has_compose) && !self.ip_address.is_empty()
        } else {
            !has_container
                && !has_compose
                && self.ip_address.is_empty()
                && self.remote_user.is_empty()
                && self.remote_workspace_folder.is_empty()
        }
    }
}
