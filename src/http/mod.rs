//! HTTP surface: management API, forwarded-port proxy and health probe.
//!
//! Every handler is a thin mapping onto [`Orchestrator`]; failures are
//! turned into plain-text responses by the `IntoResponse` implementation
//! for [`AppError`](crate::AppError).

pub mod api;
pub mod error;
pub mod proxy;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GlobalConfig;
use crate::orchestrator::Orchestrator;
use crate::{AppError, Result};

/// Shared state for all handlers, passed via axum `State`.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration.
    pub config: Arc<GlobalConfig>,
    /// Lifecycle and catalog operations.
    pub orchestrator: Arc<Orchestrator>,
    /// Outbound client used by the port proxy.
    pub client: reqwest::Client,
}

impl AppState {
    /// Bundle the state and build the proxy client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the proxy client cannot be built.
    pub fn new(config: Arc<GlobalConfig>, orchestrator: Arc<Orchestrator>) -> Result<Self> {
        Ok(Self {
            config,
            orchestrator,
            client: proxy::build_client()?,
        })
    }
}

/// Handler for `GET /health`.
async fn health() -> &'static str {
    "ok"
}

/// Build the full route table.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/project",
            get(api::list_projects)
                .post(api::create_project)
                .delete(api::delete_project),
        )
        .route(
            "/api/workspace",
            post(api::create_workspace).delete(api::delete_workspace),
        )
        .route("/api/workspace/launch", post(api::launch_workspace))
        .route("/api/workspace/down", post(api::down_workspace))
        .route("/port/{project}/{workspace}/{port}", any(proxy::forward))
        .route("/port/{project}/{workspace}/{port}/", any(proxy::forward))
        .route("/port/{project}/{workspace}/{port}/{*rest}", any(proxy::forward))
        .with_state(state)
}

/// Serve `state` on `listener` until `ct` is cancelled.
///
/// In-flight requests are allowed to finish after cancellation.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve(state: AppState, listener: TcpListener, ct: CancellationToken) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("failed to read listener address: {err}")))?;
    info!(%local, "http server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { ct.cancelled().await })
    .await
    .map_err(|err| AppError::Io(format!("http server error: {err}")))?;

    info!("http server shut down");
    Ok(())
}
