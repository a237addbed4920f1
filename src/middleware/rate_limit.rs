//! Per-route rate limiting middleware.
//!
//! # Algorithm
//!
//! Each layer instance owns one unkeyed fixed window: a start instant and a
//! counter. The first request after the window has run out opens a new
//! window and resets the counter, so at most N requests are admitted in any
//! window of length D.
//!
//! Limiters are never shared: attach a fresh [`RateLimitLayer`] to every
//! route that needs one. Requests are not keyed by client IP.
//!
//! # Response
//!
//! On rejection (429):
//! - JSON body `{"error": "ratelimit exceeded", "message": ...}`
//! - `Retry-After`: seconds until the current window closes
//! - `X-RateLimit-Limit`: configured request count per window

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::Json;
use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::warn;

use super::ip::resolve_client_ip;
use crate::metrics;
use crate::models::RateLimitedResponse;

/// Description returned in the `message` field of a 429 body.
pub const RATE_LIMIT_DESCRIPTION: &str =
    "This user has exceeded an allotted request count. Try again later.";

/// Error type for rate limit layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// Request count cannot be zero.
    ZeroCount,
    /// Window length cannot be zero.
    ZeroPeriod,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::ZeroCount => write!(f, "rate limit count must be greater than 0"),
            RateLimitError::ZeroPeriod => write!(f, "rate limit window must be longer than 0"),
        }
    }
}

impl std::error::Error for RateLimitError {}

/// Counter state of the current window. No window is open until the first
/// request arrives.
#[derive(Debug, Default)]
struct WindowState {
    window_start: Option<Instant>,
    count: u32,
}

/// Fixed-window counter shared by all clones of one layer.
#[derive(Debug)]
struct FixedWindow {
    state: Mutex<WindowState>,
    limit: u32,
    period: Duration,
}

impl FixedWindow {
    fn new(limit: u32, period: Duration) -> Self {
        Self {
            state: Mutex::new(WindowState::default()),
            limit,
            period,
        }
    }

    /// Admit one request at `now`, or return how long until the window closes.
    fn check_at(&self, now: Instant) -> Result<(), Duration> {
        // The state stays consistent even if a holder panicked
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let start = match state.window_start {
            Some(start) if now.saturating_duration_since(start) < self.period => start,
            _ => {
                state.window_start = Some(now);
                state.count = 0;
                now
            }
        };

        if state.count < self.limit {
            state.count += 1;
            Ok(())
        } else {
            let opened = now.saturating_duration_since(start);
            Err(self.period.saturating_sub(opened))
        }
    }

    fn check(&self) -> Result<(), Duration> {
        self.check_at(Instant::now())
    }
}

/// Rate limiting layer for a single route.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new().route(
///     "/status",
///     get(handler).layer(RateLimitLayer::per_second(10)?),
/// );
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    window: Arc<FixedWindow>,
}

impl RateLimitLayer {
    /// Allow `count` requests per `period`.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroCount` if `count` is 0, and
    /// `RateLimitError::ZeroPeriod` if `period` is zero.
    pub fn new(count: u32, period: Duration) -> Result<Self, RateLimitError> {
        if count == 0 {
            return Err(RateLimitError::ZeroCount);
        }
        if period.is_zero() {
            return Err(RateLimitError::ZeroPeriod);
        }

        Ok(Self {
            window: Arc::new(FixedWindow::new(count, period)),
        })
    }

    /// Allow `count` requests per second.
    pub fn per_second(count: u32) -> Result<Self, RateLimitError> {
        Self::new(count, Duration::from_secs(1))
    }

    /// Requests allowed per window.
    pub fn limit(&self) -> u32 {
        self.window.limit
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            window: self.window.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    window: Arc<FixedWindow>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let window = self.window.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match window.check() {
                Ok(()) => inner.call(req).await,
                Err(wait_time) => {
                    let retry_after = wait_time.as_secs_f64().ceil().max(1.0) as u64;
                    let route = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map_or_else(|| req.uri().path().to_string(), |p| p.as_str().to_string());

                    warn!(
                        client_ip = %resolve_client_ip(&req),
                        route = %route,
                        retry_after_secs = retry_after,
                        "Rate limit exceeded"
                    );
                    metrics::record_rate_limited(&route);

                    Ok(rate_limited_response(window.limit, retry_after))
                }
            }
        })
    }
}

/// Build the 429 response.
fn rate_limited_response(limit: u32, retry_after: u64) -> Response<Body> {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [
            ("Retry-After", retry_after.to_string()),
            ("X-RateLimit-Limit", limit.to_string()),
        ],
        Json(RateLimitedResponse {
            error: "ratelimit exceeded".to_string(),
            message: RATE_LIMIT_DESCRIPTION.to_string(),
        }),
    )
        .into_response()
}
