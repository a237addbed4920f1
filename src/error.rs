use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error types with appropriate HTTP status codes.
///
/// Every failure degrades to a plain status code with a minimal JSON body.
/// Nothing in this crate retries on error.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Full detail stays in the server log; clients get the short form
        match &self {
            AppError::Unauthorized(_)
            | AppError::NotFound(_)
            | AppError::SerializationError(_) => {
                tracing::debug!(error = %self, "Request rejected");
            }
            _ => tracing::error!(error = %self, "Request failed"),
        }

        let (status, error_type, message) = match &self {
            AppError::Unauthorized(_) => {
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "API-Key")],
                    axum::Json(ErrorResponse {
                        error: "unauthorized".to_string(),
                        message: "Unauthorized".to_string(),
                    }),
                )
                    .into_response();
            }
            AppError::UpstreamUnavailable(_) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({ "error": "Failed to fetch data" })),
                )
                    .into_response();
            }
            AppError::Io(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred.".to_string(),
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Service configuration error.".to_string(),
            ),
            AppError::SerializationError(e) => (
                StatusCode::BAD_REQUEST,
                "serialization_error",
                sanitize_serde_error(e),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Sanitize serde error messages before they reach a client.
///
/// Pushed snapshots are schemaless, so the only interesting failures are
/// syntax errors and empty bodies.
fn sanitize_serde_error(e: &serde_json::Error) -> String {
    if e.is_eof() {
        return "Request body is empty or truncated".to_string();
    }

    if e.is_syntax() {
        return format!("Malformed JSON in request body at line {}", e.line());
    }

    "Invalid request format".to_string()
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
