//! Order and payment-method endpoints.

use quickcommerce_core::order::placed_order_id;
use quickcommerce_core::{Cart, CreateOrderRequest, OrderDetails, Page, PaymentMethod};
use reqwest::Method;
use tracing::instrument;
use uuid::Uuid;

use super::{ApiClient, ApiError, IDEMPOTENCY_KEY_HEADER};

impl ApiClient {
    /// `POST /api/orders`. Returns the new order's id as the backend spells it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response carries neither
    /// `orderId` nor `id`.
    #[instrument(skip(self, order), fields(idempotency_key = %idempotency_key))]
    pub async fn create_order(
        &self,
        order: &CreateOrderRequest,
        idempotency_key: Uuid,
    ) -> Result<String, ApiError> {
        let url = self.endpoint("api/orders")?;
        let request = self
            .request(Method::POST, url)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key.to_string())
            .json(order);
        let body: serde_json::Value = self.fetch(request).await?;
        placed_order_id(&body).map_err(|_| ApiError::MissingField("orderId"))
    }

    /// `GET /api/orders/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not an order.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: &str) -> Result<OrderDetails, ApiError> {
        let url = self.endpoint(&format!("api/orders/{}", urlencoding::encode(order_id)))?;
        self.fetch(self.request(Method::GET, url)).await
    }

    /// `GET /api/orders/{id}/tracking`: the order with its delivery
    /// milestones filled in.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not an order.
    #[instrument(skip(self))]
    pub async fn get_order_tracking(&self, order_id: &str) -> Result<OrderDetails, ApiError> {
        let url = self.endpoint(&format!(
            "api/orders/{}/tracking",
            urlencoding::encode(order_id)
        ))?;
        self.fetch(self.request(Method::GET, url)).await
    }

    /// `POST /api/orders/{id}/reorder`. The backend replaces the cart with
    /// the order's lines and returns it.
    ///
    /// Use [`crate::cart::CartStore::reorder`] so the store picks up the
    /// new cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a cart.
    #[instrument(skip(self))]
    pub async fn reorder(&self, order_id: &str) -> Result<Cart, ApiError> {
        let url = self.endpoint(&format!(
            "api/orders/{}/reorder",
            urlencoding::encode(order_id)
        ))?;
        self.fetch(self.request(Method::POST, url)).await
    }

    /// `GET /api/orders?page&size` - the signed-in customer's order history.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a page.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, page: u32, size: u32) -> Result<Page<OrderDetails>, ApiError> {
        let mut url = self.endpoint("api/orders")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("size", &size.to_string());
        self.fetch(self.request(Method::GET, url)).await
    }

    /// `POST /api/orders/{id}/cancel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not an order.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<OrderDetails, ApiError> {
        let url = self.endpoint(&format!(
            "api/orders/{}/cancel",
            urlencoding::encode(order_id)
        ))?;
        self.fetch(self.request(Method::POST, url)).await
    }

    /// `GET /api/payment-methods`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, ApiError> {
        let url = self.endpoint("api/payment-methods")?;
        Ok(self
            .fetch_optional(self.request(Method::GET, url))
            .await?
            .unwrap_or_default())
    }
}
