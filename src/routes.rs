//! Application routing configuration with middleware stack.
//!
//! # Global Middleware (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │  Host Redirect   │ ← 301 for the legacy hostname
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Session Number  │ ← Issues / reads the `session` cookie
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← Request span carrying the session number
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Body Limit     │
//! └────────┬─────────┘
//!          │
//!          ▼
//!        Route
//! ```
//!
//! # Per-Route Chains
//!
//! Gated routes run the rate limiter first, then the API-key gate, then the
//! handler, so a flood of bad keys is throttled before any authority lookup.
//!
//! | Route | Rate limit | Gate |
//! |---|---|---|
//! | `/status` | `STATUS_RATE_LIMIT` | - |
//! | `/api/v1/base/internal/status/process-status` | `GATED_RATE_LIMIT` | `UI` |
//! | `/api/v1/base/reporting/stats-cache/*` (4 routes) | `GATED_RATE_LIMIT` each | `UIPUSH` |
//! | `/api/v1/serve/lists/stats/{filename}` | `GATED_RATE_LIMIT` | - |
//! | `/api/v1/serve/lists/stats/status/{name}` | `GATED_RATE_LIMIT` | - |
//!
//! Every route owns its limiter; no two routes share a budget.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::Request;
use axum::routing::{MethodRouter, get, post};
use tower_http::trace::TraceLayer;
use tracing::{Span, info, info_span};

use crate::handlers;
use crate::middleware::{
    ApiKeyGate, HostRedirect, RateLimitError, RateLimitLayer, SessionLayer, SessionNumber,
    redirect_legacy_host,
};
use crate::models::KeyType;
use crate::services::{SnapshotKind, StaticPage};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// # Errors
///
/// Returns `RateLimitError` if a rate limit window cannot be built.
pub fn build_router(state: AppState) -> Result<Router, RateLimitError> {
    let config = state.config.clone();

    let ui_gate = ApiKeyGate::new(
        state.api_client.clone(),
        &config.api_environment,
        KeyType::Ui,
    );
    let push_gate = ApiKeyGate::new(
        state.api_client.clone(),
        &config.api_environment,
        KeyType::UiPush,
    );

    // =========================================================================
    // Routes
    // =========================================================================
    let mut router = Router::new()
        .route(
            "/status",
            rate_limited(get(handlers::status), config.status_rate_limit)?,
        )
        .route(
            "/api/v1/base/internal/status/process-status",
            rate_limited(
                get(handlers::process_status).layer(ui_gate),
                config.gated_rate_limit,
            )?,
        )
        .route(
            "/api/v1/serve/lists/stats/{filename}",
            rate_limited(
                get(handlers::serve_snapshot_file),
                config.gated_rate_limit,
            )?,
        )
        .route(
            "/api/v1/serve/lists/stats/status/{name}",
            rate_limited(
                get(handlers::serve_snapshot_timestamp),
                config.gated_rate_limit,
            )?,
        )
        .route("/cursor", get(handlers::cursor))
        .route("/data-status", get(handlers::data_status))
        .route("/{*path}", get(handlers::static_asset))
        .fallback(handlers::spa_fallback);

    for kind in SnapshotKind::ALL {
        let push = post(move |State(state): State<AppState>, body: Bytes| async move {
            handlers::push_snapshot(&state, kind, body).await
        })
        .layer(push_gate.clone());
        router = router.route(
            &kind.push_path(),
            rate_limited(push, config.gated_rate_limit)?,
        );
    }

    for page in StaticPage::ALL {
        router = router.route(
            page.route(),
            get(
                move |State(state): State<AppState>, req: Request<Body>| async move {
                    handlers::serve_page(&state, page, req).await
                },
            ),
        );
    }

    info!(
        status_rps = config.status_rate_limit,
        gated_rps = config.gated_rate_limit,
        environment = %config.api_environment,
        "Routes configured"
    );

    // =========================================================================
    // Global Middleware (order matters - last added runs first)
    // =========================================================================

    // 1. Request body size limit
    info!(
        max_size_mb = config.max_request_body_size / (1024 * 1024),
        "Request body size limit configured"
    );
    router = router.layer(DefaultBodyLimit::max(config.max_request_body_size));

    // 2. Tracing
    router = router.layer(TraceLayer::new_for_http().make_span_with(make_request_span));

    // 3. Session numbering
    router = router.layer(SessionLayer::new());

    // 4. Legacy host redirect
    let redirect = Arc::new(HostRedirect::new(
        config.legacy_host.clone(),
        config.canonical_host.clone(),
    ));
    router = router.layer(axum::middleware::from_fn_with_state(
        redirect,
        redirect_legacy_host,
    ));

    Ok(router.with_state(state))
}

/// Wrap a route in its own rate limiter. A limit of 0 leaves it unlimited.
fn rate_limited(
    route: MethodRouter<AppState>,
    per_second: u32,
) -> Result<MethodRouter<AppState>, RateLimitError> {
    if per_second == 0 {
        return Ok(route);
    }
    Ok(route.layer(RateLimitLayer::per_second(per_second)?))
}

/// Request span tagged with the session number set by [`SessionLayer`].
fn make_request_span(req: &Request<Body>) -> Span {
    let session = req
        .extensions()
        .get::<SessionNumber>()
        .map(SessionNumber::as_str)
        .unwrap_or_default();

    info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        session = %session
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_build_router_with_defaults() {
        let state = AppState::new(Config::default()).unwrap();
        assert!(build_router(state).is_ok());
    }

    #[test]
    fn test_build_router_with_limits_disabled() {
        let state = AppState::new(Config {
            status_rate_limit: 0,
            gated_rate_limit: 0,
            ..Config::default()
        })
        .unwrap();
        assert!(build_router(state).is_ok());
    }

    #[test]
    fn test_request_span_without_session() {
        let req = Request::builder().uri("/x").body(Body::empty()).unwrap();
        let _span = make_request_span(&req);
    }
}
