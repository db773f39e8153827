//! External tool invocation.
//!
//! All external executables (`devcontainer`, `docker`, `git`) are run
//! through [`run_tool`]: stdin is closed, stdout and stderr are captured,
//! and the call returns once the process exits. Nothing is retried.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished tool process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit status of the process.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Short human-readable failure description: exit status plus the
    /// last non-empty stderr line.
    #[must_use]
    pub fn failure_summary(&self) -> String {
        let detail = self
            .stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty());
        match detail {
            Some(line) => format!("{}: {line}", self.status),
            None => self.status.to_string(),
        }
    }
}

/// Run `program` with `args` to completion.
///
/// # Errors
///
/// Returns the spawn or wait error if the process cannot be started.
/// A non-zero exit is not an error here; inspect [`ToolOutput::success`].
pub async fn run_tool(
    program: &str,
    args: &[&str],
    current_dir: Option<&Path>,
) -> std::io::Result<ToolOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    debug!(program, ?args, "running external tool");
    let output = cmd.output().await?;

    Ok(ToolOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
