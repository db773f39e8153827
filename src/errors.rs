//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Malformed request, bad name, or duplicate entity.
    Validation(String),
    /// Requested project or workspace does not exist.
    NotFound(String),
    /// Operation is not valid for the workspace's current state.
    Conflict(String),
    /// `devcontainer up` failed or reported a non-success outcome.
    Launch(String),
    /// Container or compose project teardown failed.
    Stop(String),
    /// Neither a compose project nor a container id was recorded.
    NoTarget(String),
    /// `docker inspect` failed or returned undecodable output.
    Inspect(String),
    /// The container has no network address.
    AddressNotFound(String),
    /// A `git` worktree or branch command failed.
    Git(String),
    /// Reading, decoding, encoding or writing the project document failed.
    Store(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// The forwarded-port backend could not be reached.
    Gateway(String),
    /// The server is shutting down and accepts no new transitions.
    ShuttingDown,
}

impl AppError {
    /// Whether the error originates from an external tool invocation.
    #[must_use]
    pub fn is_external_tool(&self) -> bool {
        matches!(
            self,
            Self::Launch(_)
                | Self::Stop(_)
                | Self::NoTarget(_)
                | Self::Inspect(_)
                | Self::AddressNotFound(_)
                | Self::Git(_)
        )
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Launch(msg) => write!(f, "launch: {msg}"),
            Self::Stop(msg) => write!(f, "stop: {msg}"),
            Self::NoTarget(msg) => write!(f, "no target: {msg}"),
            Self::Inspect(msg) => write!(f, "inspect: {msg}"),
            Self::AddressNotFound(msg) => write!(f, "address not found: {msg}"),
            Self::Git(msg) => write!(f, "git: {msg}"),
            Self::Store(msg) => write!(f, "store: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Gateway(msg) => write!(f, "gateway: {msg}"),
            Self::ShuttingDown => write!(f, "shutting down: no new transitions accepted"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(format!("invalid json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
