//! Outbound HTTP client for the ClearSky API.
//!
//! Two calls leave this process:
//!
//! - the API-key lookup used by the gate on every gated request
//! - the cursor-recall status used to render `/cursor`
//!
//! Neither call is retried or cached. Unless `OUTBOUND_TIMEOUT_SECS` is set
//! the client has no deadline, so a hung upstream stalls the request.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{ApiKeyRecord, KeyType};

/// Header carrying API keys, inbound and outbound.
pub const API_KEY_HEADER: &str = "x-api-key";

const API_CHECK_PATH: &str = "/api/v1/auth/base/internal/api-check";
const CURSOR_STATUS_PATH: &str = "/api/v1/anon/cursor-recall/status";

/// Cheaply clonable client for the authorization service and upstream API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    service_key: Option<Arc<str>>,
}

impl ApiClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the underlying HTTP client cannot
    /// be constructed (e.g. TLS backend initialization fails).
    pub fn new(config: &Config) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("clearsky-ui-server/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.outbound_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: Arc::from(config.api_server_endpoint.trim_end_matches('/')),
            service_key: config.service_api_key.as_deref().map(Arc::from),
        })
    }

    /// Base URL of the upstream API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up the key record for `key_value` from the authorization service.
    ///
    /// Returns `Ok(None)` when the service answers 200 without a record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UpstreamUnavailable` on transport errors, non-200
    /// statuses, or an undecodable body.
    pub async fn fetch_api_key(
        &self,
        environment: &str,
        key_type: KeyType,
        key_value: &str,
    ) -> AppResult<Option<ApiKeyRecord>> {
        info!(
            environment,
            key_type = %key_type,
            "Fetching API key record"
        );

        let url = format!("{}{API_CHECK_PATH}", self.base_url);
        let mut request = self.http.get(&url).query(&[
            ("api_environment", environment),
            ("key_type", key_type.as_str()),
            ("key_value", key_value),
        ]);
        if let Some(service_key) = &self.service_key {
            request = request.header(API_KEY_HEADER, service_key.as_ref());
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "API key lookup request failed");
            AppError::UpstreamUnavailable(format!("api-check: {e}"))
        })?;

        if response.status() != StatusCode::OK {
            error!(status = %response.status(), url = %url, "Failed to fetch API key record");
            return Err(AppError::UpstreamUnavailable(format!(
                "api-check returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!(error = %e, "API key lookup returned an undecodable body");
            AppError::UpstreamUnavailable(format!("api-check body: {e}"))
        })?;

        Ok(record_from_value(body))
    }

    /// Fetch the cursor-recall status document.
    ///
    /// # Errors
    ///
    /// - `AppError::UpstreamUnavailable` when the upstream answers non-200
    /// - `AppError::Internal` on transport or decode failures, which the
    ///   `/cursor` handler renders as "no data"
    pub async fn cursor_status(&self) -> AppResult<Value> {
        let url = format!("{}{CURSOR_STATUS_PATH}", self.base_url);
        info!(endpoint = %self.base_url, "Fetching cursor data");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("cursor status request: {e}")))?;

        if response.status() != StatusCode::OK {
            error!(status = %response.status(), url = %url, "Failed to fetch cursor data");
            return Err(AppError::UpstreamUnavailable(format!(
                "cursor status returned {}",
                response.status()
            )));
        }

        let data = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("cursor status body: {e}")))?;
        debug!("Cursor data received");
        Ok(data)
    }
}

/// Interpret an api-check body. Anything but a JSON object is "no record".
fn record_from_value(body: Value) -> Option<ApiKeyRecord> {
    if !body.is_object() {
        return None;
    }
    serde_json::from_value(body).ok()
}
