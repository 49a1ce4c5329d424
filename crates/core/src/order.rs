//! Order creation requests and order records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::address::AddressDetails;
use crate::payment::PaymentMethod;
use crate::types::{OrderId, OrderStatus, Price, ProductId};

/// Errors interpreting an order-creation response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The response had neither `orderId` nor `id`.
    #[error("Order was created but no order id was returned")]
    MissingId,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_address: AddressDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<AddressDetails>,
    pub use_shipping_address_for_billing: bool,
    pub payment_method_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
}

impl CreateOrderRequest {
    /// An order shipped and billed to one address.
    #[must_use]
    pub fn new(shipping_address: AddressDetails, payment_method_id: impl Into<String>) -> Self {
        Self {
            shipping_address,
            billing_address: None,
            use_shipping_address_for_billing: true,
            payment_method_id: payment_method_id.into(),
            notes: None,
            delivery_instructions: None,
            promo_code: None,
        }
    }
}

/// Pull the order identifier out of a creation response.
///
/// Accepts `orderId` or `id`, as a number or a string.
///
/// # Errors
///
/// [`OrderError::MissingId`] when neither field holds a usable value.
pub fn placed_order_id(body: &serde_json::Value) -> Result<String, OrderError> {
    ["orderId", "id"]
        .iter()
        .filter_map(|key| body.get(key))
        .find_map(|value| match value {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            _ => None,
        })
        .ok_or(OrderError::MissingId)
}

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_image: Option<String>,
    pub price: Price,
    pub quantity: u32,
}

impl OrderLine {
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// An order as returned by `GET /api/orders/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub subtotal: Price,
    #[serde(default)]
    pub tax: Price,
    #[serde(default)]
    pub shipping_cost: Price,
    #[serde(default)]
    pub discount: Price,
    #[serde(default)]
    pub total: Price,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub shipping_address: Option<AddressDetails>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub delivery_instructions: Option<String>,
    #[serde(default)]
    pub order_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub processed_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub shipped_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub delivered_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub cancelled_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub is_paid: Option<bool>,
}

/// A delivery step the order has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub status: OrderStatus,
    /// When the step was reached, if the backend recorded it.
    pub at: Option<NaiveDateTime>,
}

impl OrderDetails {
    /// Order number when assigned, else the numeric id.
    #[must_use]
    pub fn reference(&self) -> String {
        self.order_number
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Steps reached so far, oldest first. A cancelled order ends in
    /// `Cancelled` after the steps it reached before.
    #[must_use]
    pub fn timeline(&self) -> Vec<Milestone> {
        let steps = [
            (OrderStatus::Pending, self.order_date),
            (OrderStatus::Processing, self.processed_date),
            (OrderStatus::InTransit, self.shipped_date),
            (OrderStatus::Delivered, self.delivered_date),
        ];
        let reached = match self.status {
            OrderStatus::Pending => 1,
            OrderStatus::Processing => 2,
            OrderStatus::InTransit => 3,
            OrderStatus::Delivered => 4,
            // Dates say how far it got before cancellation.
            OrderStatus::Cancelled => {
                1 + steps.iter().skip(1).filter(|(_, at)| at.is_some()).count()
            }
        };

        let mut timeline: Vec<Milestone> = steps
            .iter()
            .take(reached)
            .map(|&(status, at)| Milestone { status, at })
            .collect();
        if self.status == OrderStatus::Cancelled {
            timeline.push(Milestone {
                status: OrderStatus::Cancelled,
                at: self.cancelled_date,
            });
        }
        timeline
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_placed_order_id_variants() {
        assert_eq!(placed_order_id(&json!({"orderId": 42})).unwrap(), "42");
        assert_eq!(placed_order_id(&json!({"id": "ord-7"})).unwrap(), "ord-7");
        assert_eq!(
            placed_order_id(&json!({"orderId": null, "id": 9})).unwrap(),
            "9"
        );
        assert_eq!(
            placed_order_id(&json!({"status": "PENDING"})),
            Err(OrderError::MissingId)
        );
        assert_eq!(placed_order_id(&json!({"id": ""})), Err(OrderError::MissingId));
    }

    #[test]
    fn test_create_order_request_wire_shape() {
        let request = CreateOrderRequest::new(AddressDetails::default(), "mock-payment-method-id");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["useShippingAddressForBilling"], true);
        assert_eq!(body["paymentMethodId"], "mock-payment-method-id");
        assert!(body.get("billingAddress").is_none());
        assert!(body.get("shippingAddress").is_some());
    }

    #[test]
    fn test_order_details_from_backend() {
        let order: OrderDetails = serde_json::from_value(json!({
            "id": 77,
            "orderNumber": "QC-0077",
            "status": "PROCESSING",
            "subtotal": 6.47,
            "tax": "0.52",
            "total": 6.99,
            "items": [
                {"productId": 1, "productName": "Bananas", "price": 1.99, "quantity": 2},
                {"productId": 2, "productName": "Milk", "price": 2.49, "quantity": 1}
            ],
            "orderDate": "2025-03-04T10:15:30",
            "isPaid": true
        }))
        .unwrap();

        assert_eq!(order.reference(), "QC-0077");
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.unit_count(), 3);
        assert_eq!(order.items[0].subtotal(), Price::from_cents(398));
        assert!(order.order_date.is_some());
    }

    #[test]
    fn test_timeline_follows_status() {
        let order: OrderDetails = serde_json::from_value(json!({
            "id": 5,
            "status": "IN_TRANSIT",
            "orderDate": "2025-03-04T10:15:30",
            "processedDate": "2025-03-04T10:20:00",
            "shippedDate": "2025-03-04T10:40:00"
        }))
        .unwrap();

        let steps: Vec<OrderStatus> = order.timeline().iter().map(|m| m.status).collect();
        assert_eq!(
            steps,
            vec![OrderStatus::Pending, OrderStatus::Processing, OrderStatus::InTransit]
        );
        assert!(order.timeline().iter().all(|m| m.at.is_some()));
    }

    #[test]
    fn test_cancelled_timeline_ends_in_cancelled() {
        let order: OrderDetails = serde_json::from_value(json!({
            "id": 6,
            "status": "CANCELLED",
            "orderDate": "2025-03-04T10:15:30",
            "cancelledDate": "2025-03-04T10:16:00"
        }))
        .unwrap();

        let timeline = order.timeline();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].status, OrderStatus::Pending);
        assert_eq!(timeline[1].status, OrderStatus::Cancelled);
        assert!(timeline[1].at.is_some());
    }
}
