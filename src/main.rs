#![forbid(unsafe_code)]

//! `devco`: local codespaces server binary.
//!
//! Bootstraps configuration and the data directory, serves the HTTP API
//! and the forwarded-port proxy, and stops every running container when
//! the process is asked to terminate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use devco::config::GlobalConfig;
use devco::driver::DevcontainerDriver;
use devco::http::{self, AppState};
use devco::orchestrator::Orchestrator;
use devco::persistence::{ensure_layout, ProjectStore};
use devco::worktree::GitWorktrees;
use devco::{AppError, Result};

/// Upper bound for in-flight requests to drain after the sweep.
const SERVER_DRAIN: Duration = Duration::from_secs(5);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "devco", about = "Local codespaces server", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. `:8000` or `127.0.0.1:8000`.
    #[arg(short, long)]
    address: Option<String>,

    /// Data directory holding `projects.json` and the worktrees.
    #[arg(long)]
    datadir: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("devco server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

fn load_config(args: Cli) -> Result<GlobalConfig> {
    let mut config = match args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(address) = args.address {
        config.address = address;
    }
    if let Some(datadir) = args.datadir {
        config.data_dir = datadir;
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = Arc::new(load_config(args)?);
    info!(data_dir = %config.data_dir.display(), "configuration loaded");

    // ── Prepare data directory ──────────────────────────
    if ensure_layout(&config)? {
        info!("data directory initialized");
    }

    let store = Arc::new(ProjectStore::new(config.projects_path()));
    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        store,
        Arc::new(DevcontainerDriver::new(&config.tools)),
        Arc::new(GitWorktrees::new(config.tools.git.clone())),
    ));

    report_recorded_running(&orchestrator).await?;

    // ── Start HTTP server ───────────────────────────────
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {addr}: {err}")))?;

    let state = AppState::new(Arc::clone(&config), Arc::clone(&orchestrator))?;
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    let mut server = tokio::spawn(async move {
        if let Err(err) = http::serve(state, listener, server_ct).await {
            error!(%err, "http server failed");
        }
    });

    info!(%addr, "devco ready");

    // ── Wait for shutdown signal ────────────────────────
    let server_exited = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            false
        }
        _ = &mut server => {
            warn!("http server exited unexpectedly");
            true
        }
    };
    ct.cancel();

    // ── Stop running containers ─────────────────────────
    match orchestrator.shutdown(config.shutdown_timeout()).await {
        Ok(report) => {
            for ((project, workspace), reason) in &report.failed {
                warn!(%project, %workspace, %reason, "container left running");
            }
        }
        Err(err) => error!(%err, "shutdown sweep failed"),
    }

    // ── Wait for in-flight requests ─────────────────────
    if !server_exited && tokio::time::timeout(SERVER_DRAIN, &mut server).await.is_err() {
        warn!("http server did not drain in time");
        server.abort();
    }
    info!("devco shut down");

    Ok(())
}

/// Log workspaces a previous process left recorded as running.
///
/// Their containers may or may not still exist; the records are left
/// untouched so that `down` can still tear them down.
async fn report_recorded_running(orchestrator: &Orchestrator) -> Result<()> {
    let running = orchestrator.recorded_running().await?;
    if running.is_empty() {
        info!("no workspaces recorded as running");
        return Ok(());
    }
    warn!(
        count = running.len(),
        "workspaces recorded as running from a previous process"
    );
    for (project, workspace) in &running {
        info!(%project, %workspace, "recorded as running");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
