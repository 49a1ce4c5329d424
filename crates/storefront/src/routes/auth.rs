//! Sign-in and sign-out with the mirrored `authToken` cookie.

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};

use super::proxy::{self, MAX_BODY_BYTES};
use crate::auth::cookie::{auth_cookie, expired_auth_cookie};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Gateway-only fields of the sign-in body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInOptions {
    #[serde(default)]
    remember_me: bool,
}

/// `POST /api/auth/signin`: forward, then mirror the token into a cookie.
///
/// # Errors
///
/// Returns an error if the backend cannot be reached.
pub async fn sign_in(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::BadRequest("Request body too large".to_string()))?;
    let options: SignInOptions = serde_json::from_slice(&body).unwrap_or_default();

    let upstream = proxy::send(&state, Request::from_parts(parts, Body::from(body))).await?;
    if !upstream.status.is_success() {
        return Ok(upstream.into_response());
    }

    let token = upstream
        .json()
        .as_ref()
        .and_then(|value| value.get("accessToken"))
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(|token| SecretString::from(token.to_owned()));

    let mut response = upstream.into_response();
    match token {
        Some(token) => {
            let cookie = auth_cookie(&token, options.remember_me, state.secure_cookies());
            if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
                response.headers_mut().append(SET_COOKIE, value);
            }
            tracing::info!(remember_me = options.remember_me, "Signed in");
        }
        None => tracing::warn!("Sign-in succeeded without an access token"),
    }
    Ok(response)
}

/// `POST /api/auth/signout`: expire the cookie.
pub async fn sign_out() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(SET_COOKIE, expired_auth_cookie().to_string())],
        Json(json!({ "success": true })),
    )
}
