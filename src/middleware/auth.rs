//! Remote API-key gate.
//!
//! Gated routes require an `X-API-Key` header. On every request the key is
//! looked up at the authorization service together with the deployment's
//! environment tag and the route's [`KeyType`]. The request passes only if
//! the service returns a record whose key equals the provided one and whose
//! status contains `valid`.
//!
//! Nothing is cached: each gated request costs one round trip, and an
//! authorization outage denies every gated route until it recovers.
//!
//! # Usage
//!
//! ```rust,ignore
//! let gate = ApiKeyGate::new(client, "prod", KeyType::UiPush);
//! router.route("/push", post(handler).layer(gate));
//! ```

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use subtle::ConstantTimeEq;
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use super::ip::resolve_client_ip;
use crate::api_client::{API_KEY_HEADER, ApiClient};
use crate::error::AppError;
use crate::metrics;
use crate::models::{ApiKeyRecord, KeyType};

/// Marker the record's status must contain.
const VALID_STATUS_MARKER: &str = "valid";

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allow,
    Deny(DenyReason),
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No usable `X-API-Key` header
    MissingKey,
    /// Lookup failed (transport, non-200, bad body)
    AuthorityUnavailable,
    /// Lookup succeeded without a record
    NoRecord,
    /// Record key differs from the provided key
    KeyMismatch,
    /// Record status lacks the `valid` marker
    InactiveKey,
}

impl DenyReason {
    /// Metric / log label.
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::MissingKey => "missing_key",
            DenyReason::AuthorityUnavailable => "authority_unavailable",
            DenyReason::NoRecord => "no_record",
            DenyReason::KeyMismatch => "key_mismatch",
            DenyReason::InactiveKey => "inactive_key",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Judge a fetched record against the key the caller provided.
pub fn evaluate(record: Option<&ApiKeyRecord>, provided_key: &str) -> Authorization {
    let Some(record) = record else {
        return Authorization::Deny(DenyReason::NoRecord);
    };

    let matches = record
        .api_key
        .as_deref()
        .is_some_and(|expected| constant_time_eq(expected, provided_key));
    if !matches {
        return Authorization::Deny(DenyReason::KeyMismatch);
    }

    let active = record
        .api_status
        .as_deref()
        .is_some_and(|status| status.contains(VALID_STATUS_MARKER));
    if !active {
        return Authorization::Deny(DenyReason::InactiveKey);
    }

    Authorization::Allow
}

/// Authorize `provided_key` for `key_type` against the remote authority.
///
/// A missing or empty key is denied without a lookup.
pub async fn authorize(
    client: &ApiClient,
    environment: &str,
    key_type: KeyType,
    provided_key: Option<&str>,
) -> Authorization {
    let Some(key) = provided_key.filter(|k| !k.is_empty()) else {
        error!(key_type = %key_type, "No API key provided");
        return Authorization::Deny(DenyReason::MissingKey);
    };

    let started = Instant::now();
    let lookup = client.fetch_api_key(environment, key_type, key).await;
    let elapsed = started.elapsed().as_secs_f64();

    match lookup {
        Ok(record) => {
            metrics::record_authority_lookup("ok", elapsed);
            evaluate(record.as_ref(), key)
        }
        Err(e) => {
            metrics::record_authority_lookup("error", elapsed);
            debug!(error = %e, "Authority lookup failed");
            Authorization::Deny(DenyReason::AuthorityUnavailable)
        }
    }
}

/// API-key gate layer for one credential class.
#[derive(Clone)]
pub struct ApiKeyGate {
    client: ApiClient,
    environment: Arc<str>,
    key_type: KeyType,
}

impl ApiKeyGate {
    pub fn new(client: ApiClient, environment: &str, key_type: KeyType) -> Self {
        Self {
            client,
            environment: Arc::from(environment),
            key_type,
        }
    }
}

impl<S> Layer<S> for ApiKeyGate {
    type Service = ApiKeyGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiKeyGateService {
            inner,
            client: self.client.clone(),
            environment: self.environment.clone(),
            key_type: self.key_type,
        }
    }
}

/// API-key gate service wrapper.
#[derive(Clone)]
pub struct ApiKeyGateService<S> {
    inner: S,
    client: ApiClient,
    environment: Arc<str>,
    key_type: KeyType,
}

impl<S> Service<Request<Body>> for ApiKeyGateService<S>
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
        let client = self.client.clone();
        let environment = self.environment.clone();
        let key_type = self.key_type;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let provided_key = extract_api_key(&req);
            let decision =
                authorize(&client, &environment, key_type, provided_key.as_deref()).await;

            match decision {
                Authorization::Allow => {
                    metrics::record_auth_decision(key_type, "allow");
                    debug!(key_type = %key_type, "API key authorized");
                    inner.call(req).await
                }
                Authorization::Deny(reason) => {
                    metrics::record_auth_decision(key_type, reason.as_str());
                    match reason {
                        DenyReason::KeyMismatch => {
                            warn!(
                                client_ip = %resolve_client_ip(&req),
                                path = %req.uri().path(),
                                "<< Unauthorized API access"
                            );
                        }
                        DenyReason::MissingKey
                        | DenyReason::AuthorityUnavailable
                        | DenyReason::NoRecord => {
                            error!(reason = %reason, "API verification failed");
                        }
                        DenyReason::InactiveKey => {
                            debug!(reason = %reason, "API key is not active");
                        }
                    }
                    Ok(AppError::Unauthorized(reason.to_string()).into_response())
                }
            }
        })
    }
}

/// Extract the API key from the `X-API-Key` header.
fn extract_api_key<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Perform constant-time comparison of two strings.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
