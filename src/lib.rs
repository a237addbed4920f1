//! # ClearSky UI Server
//!
//! HTTP backend of the ClearSky web UI. It serves the single-page app and
//! its static assets, accepts stats snapshots pushed by the backend
//! pipeline and serves them back, and proxies a few upstream status calls.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Global: Host Redirect → Session Number → Trace → Body Limit│
//! ├─────────────────────────────────────────────────────────────┤
//! │  Per route: Rate Limit → API-Key Gate                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (status, snapshots, pages)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Services (SnapshotStore, Pages)  │  ApiClient              │
//! ├───────────────────────────────────┼─────────────────────────┤
//! │  Static directory on disk         │  ClearSky API           │
//! └───────────────────────────────────┴─────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clearsky_ui_server::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config)?;
//!     let app = build_router(state)?;
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Gated Routes
//!
//! Push and internal status routes require an `X-API-Key` header that the
//! ClearSky authorization service confirms on every request:
//! ```bash
//! curl -X POST -H 'X-API-Key: ...' -d '{"count": 42}' \
//!     http://localhost:5000/api/v1/base/reporting/stats-cache/total-users
//! ```

pub mod api_client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use api_client::ApiClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
