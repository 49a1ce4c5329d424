//! Backend API errors.

use reqwest::StatusCode;
use thiserror::Error;

/// Longest slice of a raw error body kept in an error message.
const MAX_BODY_EXCERPT: usize = 200;

/// Errors that can occur when calling the QuickCommerce backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The backend did not answer within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Backend-provided message, or the raw body.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response lacked something the contract requires.
    #[error("Response is missing {0}")]
    MissingField(&'static str),

    /// An endpoint path could not be joined onto the base URL.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

impl ApiError {
    /// Build a status error from a non-2xx response body.
    ///
    /// Uses the body's `message` (or `error`) field when it is JSON, the raw
    /// text otherwise, and the status reason when the body is empty.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let from_json = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["message", "error"].iter().find_map(|key| {
                    value
                        .get(key)
                        .and_then(serde_json::Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                })
            });

        let message = from_json.unwrap_or_else(|| {
            let raw = body.trim();
            if raw.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                raw.chars().take(MAX_BODY_EXCERPT).collect()
            }
        });

        Self::Status { status, message }
    }

    /// Response status, for status errors.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message safe to show to a shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout => "The request timed out. Please try again.".to_string(),
            Self::Http(_) => {
                "Could not reach the store. Please check your connection.".to_string()
            }
            Self::Status { message, .. } => message.clone(),
            Self::Parse(_) | Self::MissingField(_) | Self::Url(_) => {
                "Unexpected response from the store. Please try again.".to_string()
            }
        }
    }
}
