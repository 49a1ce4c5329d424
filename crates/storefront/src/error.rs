//! Unified error handling with Sentry integration.
//!
//! Gateway handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; clients get a JSON `{ "error": ... }`
//! body without internal detail.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type for the gateway.
#[derive(Debug, Error)]
pub enum AppError {
    /// The backend could not be reached or did not answer in time.
    #[error("Backend unreachable: {0}")]
    Upstream(#[from] reqwest::Error),

    /// A forwarded URL could not be built.
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Upstream(_) | Self::Url(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Url(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Upstream(err) if err.is_timeout() => "Backend request timed out".to_string(),
            Self::Upstream(_) => "Backend unavailable".to_string(),
            Self::Url(_) => "Internal server error".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[tokio::test]
    async fn test_bad_request_body_is_json_error() {
        let response = AppError::BadRequest("Body is too large".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Body is too large");
    }

    #[tokio::test]
    async fn test_internal_detail_is_hidden() {
        let response = AppError::Url(url::ParseError::EmptyHost).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Internal server error");
    }
}
