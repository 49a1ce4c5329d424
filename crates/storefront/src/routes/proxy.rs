//! Backend forwarding.
//!
//! Requests are replayed against the backend with the `authToken` cookie
//! promoted to a bearer token. Status, JSON body and `Set-Cookie` come back
//! unchanged, so the backend's guest-session cookie reaches the browser.

use axum::{
    body::{Bytes, to_bytes},
    extract::{Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::instrument;

use crate::auth::cookie::token_from_headers;
use crate::error::{AppError, Result};
use crate::middleware::REQUEST_ID_HEADER;
use crate::state::AppState;

/// Largest request body the gateway forwards.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const FORWARDED_HEADERS: [HeaderName; 4] = [
    ACCEPT,
    CONTENT_TYPE,
    COOKIE,
    HeaderName::from_static(REQUEST_ID_HEADER),
];

/// A backend answer, ready to be relayed or inspected.
pub struct Upstream {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Upstream {
    /// Body as JSON, if it is JSON.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Relay with a replacement body.
    #[must_use]
    pub fn with_json(mut self, value: &Value) -> Self {
        self.body = Bytes::from(value.to_string());
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }
}

impl IntoResponse for Upstream {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        let headers = response.headers_mut();
        headers.remove(CONTENT_TYPE);
        if let Some(content_type) = self.headers.get(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, content_type.clone());
        }
        for cookie in self.headers.get_all(SET_COOKIE) {
            headers.append(SET_COOKIE, cookie.clone());
        }
        response
    }
}

/// Replay `request` against the backend.
///
/// # Errors
///
/// [`AppError::Upstream`] when the backend cannot be reached,
/// [`AppError::BadRequest`] when the body is too large.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn send(state: &AppState, request: Request) -> Result<Upstream> {
    let (parts, body) = request.into_parts();

    let mut url = state
        .backend_url()
        .join(parts.uri.path().trim_start_matches('/'))?;
    url.set_query(parts.uri.query());

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::BadRequest("Request body too large".to_string()))?;

    let mut outgoing = state.backend().request(parts.method, url);
    for name in &FORWARDED_HEADERS {
        for value in parts.headers.get_all(name) {
            outgoing = outgoing.header(name, value);
        }
    }
    // An explicit Authorization header wins over the cookie.
    if let Some(authorization) = parts.headers.get(AUTHORIZATION) {
        outgoing = outgoing.header(AUTHORIZATION, authorization);
    } else if let Some(token) = token_from_headers(&parts.headers) {
        outgoing = outgoing.bearer_auth(token.expose_secret());
    }
    if !body.is_empty() {
        outgoing = outgoing.body(body);
    }

    let response = outgoing.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    tracing::debug!(status = %status, bytes = body.len(), "Backend answered");

    Ok(Upstream {
        status,
        headers,
        body,
    })
}

/// Forward any request unchanged.
///
/// # Errors
///
/// See [`send`].
pub async fn forward(State(state): State<AppState>, request: Request) -> Result<Upstream> {
    send(&state, request).await
}

/// `GET /api/addresses`: a bare array is wrapped as `{ "addresses": [...] }`.
///
/// # Errors
///
/// See [`send`].
pub async fn list_addresses(State(state): State<AppState>, request: Request) -> Result<Upstream> {
    let upstream = send(&state, request).await?;
    if !upstream.status.is_success() {
        return Ok(upstream);
    }
    match upstream.json() {
        Some(Value::Array(addresses)) => {
            let wrapped = json!({ "addresses": addresses });
            Ok(upstream.with_json(&wrapped))
        }
        _ => Ok(upstream),
    }
}
