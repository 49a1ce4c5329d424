//! QuickCommerce REST backend client.
//!
//! # Architecture
//!
//! - One `reqwest` client per process with a base URL, per-request timeout
//!   and a cookie store, so the backend's guest session cookie
//!   (`qc_session_id`) survives between calls
//! - The bearer token is read from the Auth Gate's `watch` channel on every
//!   request; nothing here stores credentials
//! - Product reads are cached via `moka` (5 minute TTL); cart, address and
//!   order reads always go to the backend
//!
//! Endpoint groups live in submodules as further `impl ApiClient` blocks.

mod addresses;
mod auth;
mod cache;
mod cart;
mod error;
mod orders;
mod products;

pub use auth::{SignInRequest, SignInResponse, SignUpRequest};
pub use error::ApiError;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::debug;
use url::Url;

use crate::auth::AuthState;
use crate::config::ApiConfig;

use cache::{CacheKey, CacheValue};

/// Name of the idempotency header sent with order creation.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the QuickCommerce REST backend.
///
/// Cheap to clone; clones share the connection pool, cookie jar and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: watch::Receiver<AuthState>,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client bound to an Auth Gate session channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ApiConfig, session: watch::Receiver<AuthState>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .cookie_store(true)
            .user_agent(concat!("quickcommerce-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                session,
                cache,
            }),
        })
    }

    /// Backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve an endpoint path (no leading slash) against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Start a request with JSON accept and, when signed in, the bearer token.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .inner
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");

        match &*self.inner.session.borrow() {
            AuthState::Authenticated(session) => {
                builder.bearer_auth(session.token().expose_secret())
            }
            _ => builder,
        }
    }

    /// Send a request and return the body, or `None` for 204 / empty bodies.
    async fn execute(&self, builder: RequestBuilder) -> Result<Option<String>, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(ApiError::from_status(status, &body));
        }

        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            debug!(status = %status, "Empty response body");
            return Ok(None);
        }

        Ok(Some(body))
    }

    /// Send a request and decode a required JSON body.
    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let body = self
            .execute(builder)
            .await?
            .ok_or(ApiError::MissingField("response body"))?;
        decode(&body)
    }

    /// Send a request and decode the JSON body if there is one.
    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        self.execute(builder)
            .await?
            .map(|body| decode(&body))
            .transpose()
    }
}

/// Decode a JSON body, logging the excerpt on failure.
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        ApiError::Parse(e)
    })
}
