//! Liveness and process status endpoints.
//!
//! - `GET /status` - Always `OK` while the process serves requests
//! - `GET /api/v1/base/internal/status/process-status` - Version, uptime and
//!   wall-clock time (behind the `UI` key gate)

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use tracing::info;

use crate::api_client::API_KEY_HEADER;
use crate::middleware::{ClientIp, SessionNumber};
use crate::models::ProcessStatusResponse;
use crate::state::AppState;
use crate::utils::{format_current_time, format_uptime};

/// Liveness probe.
pub async fn status() -> &'static str {
    "OK"
}

/// Report version, uptime and current time.
pub async fn process_status(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    session: SessionNumber,
    headers: HeaderMap,
) -> Json<ProcessStatusResponse> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    info!("<< System status API called: {ip} - {api_key} - {session}");

    let response = ProcessStatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: format_uptime(state.uptime()),
        current_time: format_current_time(),
    };

    info!(
        "System status result: {ip} - {api_key} - {session} | uptime: {}",
        response.uptime
    );

    Json(response)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_status_is_ok() {
        assert_eq!(status().await, "OK");
    }

    #[tokio::test]
    async fn test_process_status_body() {
        let state = AppState::new(Config::default()).unwrap();
        let Json(body) = process_status(
            State(state),
            ClientIp("203.0.113.9".to_string()),
            SessionNumber::generate(),
            HeaderMap::new(),
        )
        .await;

        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
        assert!(body.uptime.starts_with("0:00:0"));

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("clearsky UI version").is_some());
        assert!(json.get("current time").is_some());
    }
}
