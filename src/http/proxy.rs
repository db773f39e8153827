//! Forwarded-port reverse proxy.
//!
//! `/port/{project}/{workspace}/{port}/{rest...}` is forwarded to
//! `http://<ipAddress>:<port>/<rest>` of the workspace's running
//! container. The address is looked up in a fresh snapshot for every
//! request; nothing is cached.
//!
//! Requests carrying `Connection: upgrade` (WebSocket and friends) are
//! relayed with their upgrade headers. When the container answers `101`,
//! both upgraded connections are spliced together until either side closes.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tracing::{debug, warn};

use super::AppState;
use crate::models::Document;
use crate::{AppError, Result};

/// Headers that only apply to a single connection.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Path captures of the forwarded-port routes.
#[derive(Debug, Deserialize)]
pub struct PortParams {
    project: String,
    workspace: String,
    port: String,
}

/// Build the outbound client: no redirects followed, no environment proxy.
///
/// # Errors
///
/// Returns `AppError::Config` if the client cannot be built.
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build proxy client: {err}")))
}

/// Address and port of the container serving a forwarded request.
///
/// # Errors
///
/// - `AppError::NotFound` for an unknown project or workspace.
/// - `AppError::Validation` if the workspace is not running or the port
///   is not a valid TCP port.
pub fn resolve_upstream(
    document: &Document,
    project: &str,
    workspace: &str,
    port: &str,
) -> Result<(String, u16)> {
    let ws = document.workspace(project, workspace)?;
    if !ws.is_running() || ws.ip_address.is_empty() {
        return Err(AppError::Validation(format!(
            "workspace `{workspace}` in project `{project}` is not running"
        )));
    }
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| AppError::Validation(format!("invalid port `{port}`")))?;
    Ok((ws.ip_address.clone(), port))
}

/// Upstream URL for a forwarded request.
#[must_use]
pub fn forward_target(ip: &str, port: u16, rest: &str, query: Option<&str>) -> String {
    let mut url = format!("http://{ip}:{port}/{}", rest.trim_start_matches('/'));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Raw remainder of `/port/{p}/{w}/{port}/{rest...}`, still percent-encoded.
fn raw_rest(path: &str) -> &str {
    path.splitn(6, '/').nth(5).unwrap_or("")
}

/// Raw mount point `/port/{p}/{w}/{port}` of a forwarded path, still
/// percent-encoded.
fn raw_prefix(path: &str) -> &str {
    let end = path.match_indices('/').nth(4).map_or(path.len(), |(i, _)| i);
    &path[..end]
}

/// Protocol named by `Upgrade` when `Connection` asks for an upgrade.
fn requested_upgrade(headers: &HeaderMap) -> Option<HeaderValue> {
    let wants_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    if wants_upgrade {
        headers.get(header::UPGRADE).cloned()
    } else {
        None
    }
}

fn restore_upgrade(headers: &mut HeaderMap, protocol: HeaderValue) {
    headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(header::UPGRADE, protocol);
}

/// Drop hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn set_forwarded(headers: &mut HeaderMap, client: Option<SocketAddr>, prefix: &str) -> Result<()> {
    let original_host = headers.get(header::HOST).cloned();
    headers.remove(header::HOST);

    if let Some(client) = client {
        let ip = client.ip().to_string();
        let value = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            Some(prior) if !prior.is_empty() => format!("{prior}, {ip}"),
            _ => ip,
        };
        headers.insert("x-forwarded-for", header_value(&value)?);
    }
    if let Some(host) = original_host {
        headers.insert("x-forwarded-host", host);
    }
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    headers.insert("x-forwarded-prefix", header_value(prefix)?);
    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|err| AppError::Validation(format!("invalid header value `{value}`: {err}")))
}

/// Handler for every method on the forwarded-port routes.
pub async fn forward(
    State(state): State<AppState>,
    Path(params): Path<PortParams>,
    request: Request,
) -> Response {
    match forward_inner(&state, &params, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn forward_inner(
    state: &AppState,
    params: &PortParams,
    mut request: Request,
) -> Result<Response> {
    let document = state.orchestrator.document().await?;
    let (ip, port) =
        resolve_upstream(&document, &params.project, &params.workspace, &params.port)?;

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let upgrade = requested_upgrade(request.headers());
    let on_upgrade = upgrade.is_some().then(|| hyper::upgrade::on(&mut request));
    let (parts, body) = request.into_parts();

    let path = parts.uri.path();
    let url = forward_target(&ip, port, raw_rest(path), parts.uri.query());

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    set_forwarded(&mut headers, client, raw_prefix(path))?;

    debug!(method = %parts.method, %url, upgrade = upgrade.is_some(), "forwarding request");
    let outbound = state.client.request(parts.method, &url);
    let outbound = match upgrade {
        Some(protocol) => {
            restore_upgrade(&mut headers, protocol);
            outbound.headers(headers)
        }
        None => outbound
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream())),
    };
    let upstream = outbound.send().await.map_err(|err| {
        warn!(%url, %err, "upstream unreachable");
        AppError::Gateway(format!("error forward to {url}: {err}"))
    })?;

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut response_headers);

    let switched = on_upgrade.filter(|_| status == StatusCode::SWITCHING_PROTOCOLS);
    let body = if let Some(on_upgrade) = switched {
        if let Some(protocol) = upstream.headers().get(header::UPGRADE).cloned() {
            restore_upgrade(&mut response_headers, protocol);
        }
        tokio::spawn(async move {
            match tunnel(on_upgrade, upstream).await {
                Ok((sent, received)) => debug!(%url, sent, received, "upgraded connection closed"),
                Err(err) => warn!(%url, %err, "upgraded connection failed"),
            }
        });
        Body::empty()
    } else {
        Body::from_stream(upstream.bytes_stream())
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

/// Splice the client's upgraded connection to the container's.
///
/// Returns the bytes copied client to container and container to client.
async fn tunnel(on_upgrade: OnUpgrade, upstream: reqwest::Response) -> std::io::Result<(u64, u64)> {
    let client = on_upgrade.await.map_err(std::io::Error::other)?;
    let mut container = upstream.upgrade().await.map_err(std::io::Error::other)?;
    let mut client = TokioIo::new(client);
    tokio::io::copy_bidirectional(&mut client, &mut container).await
}
