//! Application state shared across gateway handlers.

use std::sync::Arc;

use url::Url;

use crate::config::StorefrontConfig;

/// Errors creating the gateway state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// Cheap to clone via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: reqwest::Client,
}

impl AppState {
    /// Create the state and its backend HTTP client.
    ///
    /// The client keeps no cookie jar: the gateway forwards each browser's
    /// own cookies, so sessions never leak between shoppers.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let backend = reqwest::Client::builder()
            .timeout(config.api.timeout)
            .user_agent(concat!("quickcommerce-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, backend }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Client used to forward requests to the backend.
    #[must_use]
    pub fn backend(&self) -> &reqwest::Client {
        &self.inner.backend
    }

    /// Backend base URL, always ending in `/`.
    #[must_use]
    pub fn backend_url(&self) -> &Url {
        &self.inner.config.api.base_url
    }

    /// Whether cookies set by the gateway carry the `Secure` flag.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.inner.config.secure_cookies
    }
}
