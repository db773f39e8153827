//! Global configuration parsing and validation.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Paths of the external executables the server drives.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ToolsConfig {
    /// `devcontainer` CLI used to start containers.
    #[serde(default = "default_devcontainer")]
    pub devcontainer: String,
    /// `docker` CLI used to inspect and tear down containers.
    #[serde(default = "default_docker")]
    pub docker: String,
    /// `git` CLI used to manage worktrees.
    #[serde(default = "default_git")]
    pub git: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            devcontainer: default_devcontainer(),
            docker: default_docker(),
            git: default_git(),
        }
    }
}

fn default_devcontainer() -> String {
    "devcontainer".into()
}

fn default_docker() -> String {
    "docker".into()
}

fn default_git() -> String {
    "git".into()
}

fn default_address() -> String {
    ":8000".into()
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_branch_prefix() -> String {
    "devco/".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Listen address; a leading `:` binds every interface.
    #[serde(default = "default_address")]
    pub address: String,
    /// Directory holding `projects.json` and the worktrees.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Upper bound for the container sweep on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    /// Prefix of the branch created when a workspace names none.
    #[serde(default = "default_branch_prefix")]
    pub default_branch_prefix: String,
    /// External executables.
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            data_dir: default_data_dir(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
            default_branch_prefix: default_branch_prefix(),
            tools: ToolsConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Socket address the HTTP server binds to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the address does not parse.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let normalized = if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        };
        normalized
            .parse()
            .map_err(|err| AppError::Config(format!("invalid address '{}': {err}", self.address)))
    }

    /// Location of the persisted project document.
    #[must_use]
    pub fn projects_path(&self) -> PathBuf {
        self.data_dir.join("projects.json")
    }

    /// Root directory under which worktrees are provisioned.
    #[must_use]
    pub fn worktree_root(&self) -> PathBuf {
        self.data_dir.join("worktree")
    }

    /// Shutdown sweep budget.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Validate value ranges and tool paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.shutdown_timeout_seconds == 0 {
            return Err(AppError::Config(
                "shutdown_timeout_seconds must be greater than zero".into(),
            ));
        }

        for (name, value) in [
            ("tools.devcontainer", &self.tools.devcontainer),
            ("tools.docker", &self.tools.docker),
            ("tools.git", &self.tools.git),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{name} must not be empty")));
            }
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(AppError::Config("data_dir must not be empty".into()));
        }

        self.socket_addr()?;
        Ok(())
    }
}

/// `$XDG_DATA_HOME/devco`, falling back to `~/.local/share/devco`.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    match env::var_os("XDG_DATA_HOME") {
        Some(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join("devco"),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share")
            .join("devco"),
    }
}
