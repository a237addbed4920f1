//! Shared utilities for handlers.

use std::path::Path;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

/// Serve one file with content type, conditional and range handling.
///
/// A missing file yields 404.
pub async fn serve_file(path: &Path, req: Request<Body>) -> Response {
    ServeFile::new(path)
        .oneshot(req)
        .await
        .unwrap_or_else(|never| match never {})
        .into_response()
}

/// Serve the request path from `dir`.
///
/// Returns `None` when the file does not exist or the requested range cannot
/// be satisfied, leaving the caller to pick a fallback document.
pub async fn serve_from_dir(dir: &Path, req: Request<Body>) -> Option<Response> {
    let response = ServeDir::new(dir)
        .append_index_html_on_directories(false)
        .oneshot(req)
        .await
        .unwrap_or_else(|never| match never {});

    match response.status() {
        StatusCode::NOT_FOUND | StatusCode::RANGE_NOT_SATISFIABLE => None,
        _ => Some(response.into_response()),
    }
}

/// Strip a request down to what a plain `GET` of a fallback document needs.
///
/// Range and conditional headers of the incoming request must not apply to
/// the fallback document.
pub fn plain_get(req: &Request<Body>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(req.uri().clone());
    if let Some(accept_encoding) = req.headers().get(axum::http::header::ACCEPT_ENCODING) {
        builder = builder.header(axum::http::header::ACCEPT_ENCODING, accept_encoding);
    }
    builder
        .body(Body::empty())
        .unwrap_or_else(|_| Request::new(Body::empty()))
}
