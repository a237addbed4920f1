//! Session numbering for log correlation.
//!
//! Every request is tagged with an opaque session number. The first request
//! of a client gets a fresh UUIDv4 (simple hex form) delivered in a
//! `session` cookie; later requests that present a well-formed cookie reuse
//! it unchanged. The number is stored in request extensions, where the
//! request span picks it up so every log line of the request carries it.
//!
//! The number has no authorization meaning. A client that forges one only
//! mislabels its own log lines.

use std::convert::Infallible;
use std::fmt;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, HeaderValue, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, Response};
use tower::{Layer, Service};
use tracing::{debug, warn};
use uuid::Uuid;

/// Cookie carrying the session number.
pub const SESSION_COOKIE: &str = "session";

/// Length of a session number (UUID simple form).
const SESSION_NUMBER_LEN: usize = 32;

/// Per-client session number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNumber(pub String);

impl SessionNumber {
    /// Generate a new random session number.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S> FromRequestParts<S> for SessionNumber
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only missing when a handler runs outside SessionLayer
        Ok(parts
            .extensions
            .get::<SessionNumber>()
            .cloned()
            .unwrap_or_else(SessionNumber::generate))
    }
}

/// Check that a cookie value looks like a number we issued.
pub fn is_valid_session_number(value: &str) -> bool {
    value.len() == SESSION_NUMBER_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Find a well-formed session number among the request cookies.
pub fn session_from_cookies(headers: &HeaderMap) -> Option<SessionNumber> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && is_valid_session_number(value))
        .map(|(_, value)| SessionNumber(value.to_string()))
}

/// `Set-Cookie` value for a newly issued session number.
fn session_cookie(number: &SessionNumber) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={number}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .ok()
}

/// Session numbering layer for Tower middleware stack.
#[derive(Clone, Default)]
pub struct SessionLayer;

impl SessionLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService { inner }
    }
}

/// Session numbering service wrapper.
#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for SessionService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let (number, issued) = match session_from_cookies(req.headers()) {
            Some(existing) => (existing, false),
            None => (SessionNumber::generate(), true),
        };

        if issued {
            debug!(session = %number, "Issued new session number");
        }

        let set_cookie = issued.then(|| session_cookie(&number)).flatten();
        req.extensions_mut().insert(number);

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;

            if issued {
                match set_cookie {
                    Some(value) => {
                        response.headers_mut().append(SET_COOKIE, value);
                    }
                    None => warn!("Session cookie could not be encoded"),
                }
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::{ServiceExt, service_fn};

    #[test]
    fn test_generated_number_is_valid() {
        let number = SessionNumber::generate();
        assert!(is_valid_session_number(number.as_str()));
    }

    #[test]
    fn test_generated_numbers_differ() {
        assert_ne!(SessionNumber::generate(), SessionNumber::generate());
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        assert!(!is_valid_session_number(""));
        assert!(!is_valid_session_number("abc"));
        assert!(!is_valid_session_number(&"G".repeat(32)));
        assert!(!is_valid_session_number(&"A".repeat(32)));
        assert!(!is_valid_session_number(&"a".repeat(33)));
    }

    #[test]
    fn test_session_from_cookies_among_others() {
        let number = "0123456789abcdef0123456789abcdef";
        let req = Request::builder()
            .header("cookie", format!("theme=dark; session={number}; lang=en"))
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            session_from_cookies(req.headers()),
            Some(SessionNumber(number.to_string()))
        );
    }

    #[test]
    fn test_session_from_cookies_ignores_malformed() {
        let req = Request::builder()
            .header("cookie", "session=<script>")
            .body(Body::empty())
            .unwrap();

        assert!(session_from_cookies(req.headers()).is_none());
    }

    #[tokio::test]
    async fn test_layer_issues_cookie_once() {
        let svc = SessionLayer::new().layer(service_fn(|req: Request<Body>| async move {
            let number = req.extensions().get::<SessionNumber>().cloned().unwrap();
            Ok::<_, Infallible>(Response::new(Body::from(number.0)))
        }));

        let first = svc
            .clone()
            .oneshot(Request::new(Body::empty()))
            .await
            .unwrap();
        let cookie = first
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));

        let pair = cookie.split(';').next().unwrap().to_string();
        let second = svc
            .oneshot(
                Request::builder()
                    .header("cookie", pair.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(second.headers().get(SET_COOKIE).is_none());

        let body = axum::body::to_bytes(second.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(format!("session={}", String::from_utf8_lossy(&body)), pair);
    }
}
