#![forbid(unsafe_code)]

//! Local codespaces: per-branch dev containers behind an HTTP API with
//! forwarded-port routing into the running containers.

pub mod config;
pub mod driver;
pub mod errors;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod process;
pub mod worktree;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
