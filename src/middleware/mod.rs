//! HTTP middleware for request gating and log correlation.
//!
//! - **Host Redirect**: 301 from the legacy hostname to the canonical one
//! - **Session**: per-client session number for log correlation
//! - **Rate Limiting**: per-route GCRA limiter, one bucket per route
//! - **API Key Gate**: remote key verification on every gated request
//! - **Client IP**: `X-Forwarded-For` / peer address resolution for audit logs
//!
//! # Architecture
//!
//! ```text
//! Request → Host Redirect → Session → Trace → [Rate Limit → API Key Gate] → Handler
//!               ↓                                  ↓             ↓
//!           301 Moved                          429 JSON      401 Unauth
//! ```
//!
//! The bracketed layers are attached per route; the others wrap the router.

pub mod auth;
pub mod host_redirect;
pub mod ip;
pub mod rate_limit;
pub mod session;

pub use auth::{ApiKeyGate, Authorization, DenyReason, authorize, evaluate};
pub use host_redirect::{HostRedirect, redirect_legacy_host};
pub use ip::{ClientIp, UNKNOWN_IP, client_ip_from_parts, resolve_client_ip};
pub use rate_limit::{RATE_LIMIT_DESCRIPTION, RateLimitError, RateLimitLayer};
pub use session::{SESSION_COOKIE, SessionLayer, SessionNumber};
