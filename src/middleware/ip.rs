//! Client IP resolution for audit logging.
//!
//! The resolved address is only ever written to logs. It plays no part in
//! authorization and rate limiting is keyed by route, not by IP, so a
//! spoofed `X-Forwarded-For` can only make a log line lie.
//!
//! # Resolution Order
//!
//! 1. First entry of `X-Forwarded-For`, trimmed
//! 2. Transport peer address from axum's `ConnectInfo<SocketAddr>`
//! 3. [`UNKNOWN_IP`]
//!
//! `ConnectInfo` is only present when the server is started with
//! `into_make_service_with_connect_info::<SocketAddr>()`.

use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request};

/// Fallback IP value when no client IP can be determined.
pub const UNKNOWN_IP: &str = "unknown";

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// First address listed in `X-Forwarded-For`, if the header is present.
#[inline]
fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(FORWARDED_FOR_HEADER)?.to_str().ok()?;
    value.split(',').next().map(str::trim)
}

/// Resolve a client IP from headers and an optional peer address.
///
/// Returns `Cow<'static, str>`: borrowed for the "unknown" fallback, owned otherwise.
#[inline]
pub fn client_ip_from_parts(headers: &HeaderMap, remote: Option<SocketAddr>) -> Cow<'static, str> {
    if let Some(ip) = forwarded_for(headers) {
        return Cow::Owned(ip.to_string());
    }

    match remote {
        Some(addr) => Cow::Owned(addr.ip().to_string()),
        None => Cow::Borrowed(UNKNOWN_IP),
    }
}

/// Resolve the client IP of a request.
#[inline]
pub fn resolve_client_ip<B>(req: &Request<B>) -> Cow<'static, str> {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip_from_parts(req.headers(), remote)
}

/// Extractor yielding the resolved client IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(
            client_ip_from_parts(&parts.headers, remote).into_owned(),
        ))
    }
}
