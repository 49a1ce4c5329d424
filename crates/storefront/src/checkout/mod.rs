//! Checkout: address, payment and summary steps, then order placement.
//!
//! [`CheckoutState`] is the pure step machine. [`CheckoutSession`] drives it
//! against the backend and the cart store and guards order submission.

mod machine;
mod session;

pub use machine::{CheckoutState, CheckoutStep, TransitionError};
pub use session::{
    CheckoutSession, OrderConfirmation, OrderSummary, PreparedOrder, TAX_LABEL,
    confirmation_location,
};

use quickcommerce_core::AddressErrors;
use thiserror::Error;

use crate::api::ApiError;

/// Form-level message when saving a new address fails.
pub const ADDRESS_SAVE_FAILED: &str = "Failed to save address. Please try again.";

/// Fallback message when placing an order fails without a backend message.
pub const ORDER_FAILED: &str = "Failed to place order. Please try again.";

/// Errors from checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The new-address form has missing fields; nothing was sent.
    #[error(transparent)]
    InvalidAddress(#[from] AddressErrors),

    #[error("Address save failed: {0}")]
    AddressSave(#[source] ApiError),

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Your order is already being placed")]
    OrderInFlight,

    #[error("Order {0} has already been placed")]
    AlreadyPlaced(String),

    #[error("No order has been placed yet")]
    NotPlaced,

    #[error("Order failed: {0}")]
    Order(#[source] ApiError),
}

impl CheckoutError {
    /// Message safe to show to a shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Order(ApiError::MissingField(_)) => "Order ID missing in response".to_string(),
            Self::Order(ApiError::Status { message, .. }) if !message.is_empty() => {
                message.clone()
            }
            Self::Order(_) => ORDER_FAILED.to_string(),
            Self::AddressSave(_) => ADDRESS_SAVE_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}
