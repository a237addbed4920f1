//! Static assets, fixed pages and rendered templates.
//!
//! # Endpoints
//!
//! - `GET /{path}` - File from the static directory
//! - `GET /statement`, `/privacy`, `/terms`, `/fediverse`, `/fedi-delete-request`
//! - `GET /cursor` - Cursor-recall status rendered into `cursor.html`
//! - `GET /data-status` - `data-status.html` with the API base URL filled in
//!
//! Anything that matches no route and no file gets `index.html` so the
//! client-side router can take over.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{Html, IntoResponse, Response};
use tracing::{error, info, instrument};

use super::util::{plain_get, serve_file, serve_from_dir};
use crate::error::{AppError, AppResult};
use crate::middleware::{ClientIp, SessionNumber};
use crate::services::{StaticPage, script_json};
use crate::state::AppState;

const CURSOR_TEMPLATE: &str = "cursor.html";
const DATA_STATUS_TEMPLATE: &str = "data-status.html";

/// Serve a file from the static directory.
///
/// Missing files and unsatisfiable ranges get the SPA entry document.
pub async fn static_asset(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    session: SessionNumber,
    req: Request<Body>,
) -> Response {
    let fallback = plain_get(&req);
    if let Some(response) = serve_from_dir(state.pages.static_dir(), req).await {
        return response;
    }
    serve_index(&state, &ip, &session, fallback).await
}

/// Router fallback: serve the SPA entry document.
pub async fn spa_fallback(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    session: SessionNumber,
    req: Request<Body>,
) -> Response {
    serve_index(&state, &ip, &session, plain_get(&req)).await
}

async fn serve_index(
    state: &AppState,
    ip: &str,
    session: &SessionNumber,
    req: Request<Body>,
) -> Response {
    info!("<< Incoming request: {ip} {session} | path: {}", req.uri().path());
    serve_file(&state.pages.index_path(), req).await
}

/// Serve one of the fixed legal/informational pages.
pub async fn serve_page(state: &AppState, page: StaticPage, req: Request<Body>) -> Response {
    serve_file(&state.pages.page_path(page), req).await
}

/// Render the cursor-recall status page.
///
/// A non-200 upstream answer is a 500 with `{"error": "Failed to fetch data"}`;
/// an unreachable upstream renders the page with `null` data. Upstream JSON
/// is escaped for the inline script it lands in.
#[instrument(skip(state))]
pub async fn cursor(State(state): State<AppState>) -> AppResult<Html<String>> {
    let data = match state.api_client.cursor_status().await {
        Ok(value) => script_json(&value),
        Err(e @ AppError::UpstreamUnavailable(_)) => return Err(e),
        Err(e) => {
            error!(error = %e, "Cursor data unavailable, rendering without data");
            "null".to_string()
        }
    };

    let html = state
        .pages
        .render(CURSOR_TEMPLATE, &[("data", data.as_str())])
        .await?;
    Ok(Html(html))
}

/// Render the data-status page with the upstream API base URL.
#[instrument(skip(state))]
pub async fn data_status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let endpoint = state.config.api_server_endpoint.as_str();
    let html = state
        .pages
        .render(DATA_STATUS_TEMPLATE, &[("api_server_endpoint", endpoint)])
        .await?;
    Ok(Html(html))
}
