//! Permanent redirect from the legacy hostname to the canonical one.
//!
//! Requests whose `Host` header equals the legacy host (ASCII
//! case-insensitive, port included in the comparison) receive a 301 to the
//! same path and query on the canonical host. The scheme is taken from
//! `X-Forwarded-Proto` when a proxy sets it, else `http`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{HOST, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// Hostname pair for the redirect.
#[derive(Debug, Clone)]
pub struct HostRedirect {
    legacy_host: String,
    canonical_host: String,
}

impl HostRedirect {
    pub fn new(legacy_host: impl Into<String>, canonical_host: impl Into<String>) -> Self {
        Self {
            legacy_host: legacy_host.into(),
            canonical_host: canonical_host.into(),
        }
    }

    /// Redirect target for a request, or `None` when it is not for the legacy host.
    pub fn target_for<B>(&self, req: &axum::http::Request<B>) -> Option<String> {
        let host = req.headers().get(HOST)?.to_str().ok()?;
        if !host.eq_ignore_ascii_case(&self.legacy_host) {
            return None;
        }

        let scheme = req
            .headers()
            .get(FORWARDED_PROTO_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| *s == "http" || *s == "https")
            .unwrap_or("http");
        let path_and_query = req
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str());

        Some(format!(
            "{scheme}://{}{path_and_query}",
            self.canonical_host
        ))
    }
}

/// Middleware issuing the legacy-host redirect.
pub async fn redirect_legacy_host(
    State(redirect): State<Arc<HostRedirect>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(target) = redirect.target_for(&request) else {
        return next.run(request).await;
    };

    debug!(location = %target, "Redirecting legacy host");
    match HeaderValue::from_str(&target) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response(),
        Err(e) => {
            warn!(error = %e, "Redirect target is not a valid header value");
            next.run(request).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn redirect() -> HostRedirect {
        HostRedirect::new("bsky.thieflord.dev", "clearsky.app")
    }

    #[test]
    fn test_legacy_host_preserves_path_and_query() {
        let req = axum::http::Request::builder()
            .uri("/foo?x=1")
            .header("host", "bsky.thieflord.dev")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            redirect().target_for(&req).as_deref(),
            Some("http://clearsky.app/foo?x=1")
        );
    }

    #[test]
    fn test_forwarded_proto_is_honoured() {
        let req = axum::http::Request::builder()
            .uri("/")
            .header("host", "BSKY.thieflord.dev")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            redirect().target_for(&req).as_deref(),
            Some("https://clearsky.app/")
        );
    }

    #[test]
    fn test_other_hosts_pass_through() {
        let req = axum::http::Request::builder()
            .uri("/foo")
            .header("host", "clearsky.app")
            .body(Body::empty())
            .unwrap();

        assert!(redirect().target_for(&req).is_none());
    }

    #[test]
    fn test_missing_host_passes_through() {
        let req = axum::http::Request::builder()
            .uri("/foo")
            .body(Body::empty())
            .unwrap();

        assert!(redirect().target_for(&req).is_none());
    }
}
