//! Shared application state for Axum handlers.
//!
//! Everything here is cheap to clone: the configuration and directories sit
//! behind `Arc`, and the API client shares one connection pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api_client::ApiClient;
use crate::config::Config;
use crate::error::AppResult;
use crate::services::{Pages, SnapshotStore};

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Client for the authorization service and upstream API
    pub api_client: ApiClient,
    /// Snapshot files in the static directory
    pub snapshots: SnapshotStore,
    /// Static pages and templates
    pub pages: Pages,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Config) -> AppResult<Self> {
        let api_client = ApiClient::new(&config)?;
        let snapshots = SnapshotStore::new(&config.static_dir, config.atomic_snapshot_writes);
        let pages = Pages::new(&config.static_dir, &config.template_dir);

        Ok(Self {
            api_client,
            snapshots,
            pages,
            started_at: Instant::now(),
            config: Arc::new(config),
        })
    }

    /// Time since the process started serving.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_state_uses_configured_directories() {
        let config = Config {
            static_dir: "assets".into(),
            template_dir: "tpl".into(),
            ..Config::default()
        };
        let state = AppState::new(config).unwrap();

        assert!(
            state
                .snapshots
                .data_path(crate::services::SnapshotKind::TotalUsers)
                .starts_with("assets")
        );
        assert_eq!(state.pages.static_dir(), std::path::Path::new("assets"));
        assert!(state.uptime() < Duration::from_secs(5));
    }
}
