//! Stats snapshot ingestion and serving.
//!
//! # Endpoints
//!
//! - `POST /api/v1/base/reporting/stats-cache/{segment}` - Replace a snapshot
//!   (one route per [`SnapshotKind`], behind the `UIPUSH` key gate)
//! - `GET /api/v1/serve/lists/stats/{filename}` - Read a file from the static directory
//! - `GET /api/v1/serve/lists/stats/status/{name}` - Read a snapshot's timestamp file

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::Request;
use axum::response::Response;
use tracing::{debug, info, instrument};

use super::util::serve_file;
use crate::error::AppResult;
use crate::metrics;
use crate::models::MessageResponse;
use crate::services::SnapshotKind;
use crate::state::AppState;

/// Store a pushed snapshot.
///
/// The body must be JSON; it is stored exactly as received.
#[instrument(skip(state, body), fields(snapshot = kind.route_segment()))]
pub async fn push_snapshot(
    state: &AppState,
    kind: SnapshotKind,
    body: Bytes,
) -> AppResult<Json<MessageResponse>> {
    match state.snapshots.push(kind, &body).await {
        Ok(_) => {
            metrics::record_snapshot_push(kind.route_segment(), "success");
        }
        Err(e) => {
            metrics::record_snapshot_push(kind.route_segment(), "error");
            return Err(e);
        }
    }

    info!(bytes = body.len(), "{} data received", kind.route_segment());
    debug!(data = %String::from_utf8_lossy(&body), "Snapshot body");

    Ok(Json(MessageResponse::new("Data received successfully")))
}

/// Serve a file from the stats directory.
pub async fn serve_snapshot_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    req: Request<Body>,
) -> AppResult<Response> {
    let path = state.snapshots.resolve_file(&filename)?;
    Ok(serve_file(&path, req).await)
}

/// Serve the timestamp file of a snapshot by its lookup name.
pub async fn serve_snapshot_timestamp(
    State(state): State<AppState>,
    Path(name): Path<String>,
    req: Request<Body>,
) -> AppResult<Response> {
    let path = state.snapshots.resolve_timestamp(&name)?;
    Ok(serve_file(&path, req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::AppError;

    fn state_in(dir: &std::path::Path) -> AppState {
        AppState::new(Config {
            static_dir: dir.to_path_buf(),
            ..Config::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_push_snapshot_acknowledges() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let Json(body) = push_snapshot(
            &state,
            SnapshotKind::TotalUsers,
            Bytes::from_static(br#"{"count": 42}"#),
        )
        .await
        .unwrap();

        assert_eq!(body.message, "Data received successfully");
        assert_eq!(
            std::fs::read(dir.path().join("total_users_data.json")).unwrap(),
            br#"{"count": 42}"#
        );
    }

    #[tokio::test]
    async fn test_push_snapshot_rejects_non_json() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let result = push_snapshot(&state, SnapshotKind::BlockStats, Bytes::from_static(b"{")).await;
        assert!(matches!(result, Err(AppError::SerializationError(_))));
    }
}
