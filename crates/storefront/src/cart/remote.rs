//! The cart store's view of the backend.

use async_trait::async_trait;
use quickcommerce_core::{Cart, MergeLine, ProductId};

use crate::api::{ApiClient, ApiError};

/// Server-side cart operations the store reconciles against.
///
/// Every mutation returns the server's cart after the change.
#[async_trait]
pub trait CartRemote: Send + Sync {
    /// Current server cart.
    async fn fetch(&self) -> Result<Cart, ApiError>;

    /// Add `quantity` units of a product.
    async fn add(&self, product_id: ProductId, quantity: u32) -> Result<Cart, ApiError>;

    /// Overwrite a line's quantity.
    async fn update(&self, product_id: ProductId, quantity: u32) -> Result<Cart, ApiError>;

    /// Remove a line.
    async fn remove(&self, product_id: ProductId) -> Result<Cart, ApiError>;

    /// Empty the cart.
    async fn clear(&self) -> Result<Cart, ApiError>;

    /// Fold the guest lines into the signed-in cart.
    async fn merge(&self, lines: &[MergeLine]) -> Result<Cart, ApiError>;

    /// Replace the cart with the lines of a past order.
    async fn reorder(&self, order_id: &str) -> Result<Cart, ApiError>;
}

#[async_trait]
impl CartRemote for ApiClient {
    async fn fetch(&self) -> Result<Cart, ApiError> {
        self.get_cart().await
    }

    async fn add(&self, product_id: ProductId, quantity: u32) -> Result<Cart, ApiError> {
        self.add_cart_item(product_id, quantity).await
    }

    async fn update(&self, product_id: ProductId, quantity: u32) -> Result<Cart, ApiError> {
        self.update_cart_item(product_id, quantity).await
    }

    async fn remove(&self, product_id: ProductId) -> Result<Cart, ApiError> {
        self.remove_cart_item(product_id).await
    }

    async fn clear(&self) -> Result<Cart, ApiError> {
        self.clear_cart().await
    }

    async fn merge(&self, lines: &[MergeLine]) -> Result<Cart, ApiError> {
        self.merge_cart(lines).await
    }

    async fn reorder(&self, order_id: &str) -> Result<Cart, ApiError> {
        ApiClient::reorder(self, order_id).await
    }
}
