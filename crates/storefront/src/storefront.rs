//! The shopper-side client, wired together.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::auth::{self, AuthGate};
use crate::cart::{CartStore, GuestCartFile};
use crate::checkout::CheckoutSession;
use crate::config::{ApiConfig, StorefrontConfig};

/// API client, auth gate and cart store sharing one auth channel.
///
/// Must be created inside a tokio runtime; the cart store's task is spawned
/// on it.
#[derive(Clone)]
pub struct Storefront {
    api: ApiClient,
    auth: AuthGate,
    cart: CartStore,
}

impl Storefront {
    /// Wire a client against `api`, keeping the guest cart in `guest_cart`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api: &ApiConfig, guest_cart: GuestCartFile) -> Result<Self, ApiError> {
        let (sender, receiver) = auth::channel();
        let client = ApiClient::new(api, receiver)?;
        let auth = AuthGate::new(client.clone(), sender);
        let cart = CartStore::spawn(Arc::new(client.clone()), guest_cart, auth.subscribe());

        Ok(Self {
            api: client,
            auth,
            cart,
        })
    }

    /// Wire a client from the storefront configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, ApiError> {
        Self::new(&config.api, GuestCartFile::new(&config.guest_cart_path))
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthGate {
        &self.auth
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// Begin checkout on the address step with saved addresses loaded.
    pub async fn checkout(&self) -> CheckoutSession {
        CheckoutSession::start(self.api.clone(), self.cart.clone()).await
    }
}
