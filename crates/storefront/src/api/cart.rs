//! Cart endpoints.

use quickcommerce_core::{Cart, MergeLine, ProductId};
use reqwest::Method;
use serde::Serialize;
use tracing::instrument;

use super::{ApiClient, ApiError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddItemBody {
    product_id: ProductId,
    quantity: u32,
}

#[derive(Serialize)]
struct QuantityBody {
    quantity: u32,
}

#[derive(Serialize)]
struct MergeBody<'a> {
    items: &'a [MergeLine],
}

impl ApiClient {
    /// `GET /api/cart`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a cart.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Result<Cart, ApiError> {
        let url = self.endpoint("api/cart")?;
        self.fetch(self.request(Method::GET, url)).await
    }

    /// `POST /api/cart/items`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a cart.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_cart_item(&self, product_id: ProductId, quantity: u32) -> Result<Cart, ApiError> {
        let url = self.endpoint("api/cart/items")?;
        let request = self
            .request(Method::POST, url)
            .json(&AddItemBody {
                product_id,
                quantity,
            });
        self.fetch(request).await
    }

    /// `PUT /api/cart/items/{productId}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a cart.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_cart_item(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let url = self.endpoint(&format!("api/cart/items/{product_id}"))?;
        let request = self
            .request(Method::PUT, url)
            .json(&QuantityBody { quantity });
        self.fetch(request).await
    }

    /// `DELETE /api/cart/items/{productId}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a cart.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_cart_item(&self, product_id: ProductId) -> Result<Cart, ApiError> {
        let url = self.endpoint(&format!("api/cart/items/{product_id}"))?;
        self.fetch(self.request(Method::DELETE, url)).await
    }

    /// `DELETE /api/cart`. A 204 or empty body means an empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a body is present but invalid.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<Cart, ApiError> {
        let url = self.endpoint("api/cart")?;
        Ok(self
            .fetch_optional(self.request(Method::DELETE, url))
            .await?
            .unwrap_or_default())
    }

    /// `POST /api/cart/merge` with the guest lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a cart.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn merge_cart(&self, lines: &[MergeLine]) -> Result<Cart, ApiError> {
        let url = self.endpoint("api/cart/merge")?;
        let request = self
            .request(Method::POST, url)
            .json(&MergeBody { items: lines });
        self.fetch(request).await
    }
}
