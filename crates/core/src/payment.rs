//! Payment methods offered at checkout.

use serde::{Deserialize, Serialize};

use crate::types::{PaymentMethodRecordId, PaymentType};

/// Identifier the backend accepts for the built-in example card.
pub const EXAMPLE_PAYMENT_METHOD_ID: &str = "mock-payment-method-id";

/// A payment method the customer can pay with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PaymentMethodRecordId>,
    #[serde(rename = "type", default)]
    pub kind: PaymentType,
    #[serde(default)]
    pub card_brand: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub expiry_month: Option<u8>,
    #[serde(default)]
    pub expiry_year: Option<u16>,
    pub payment_method_id: String,
    #[serde(default)]
    pub is_default: bool,
}

impl PaymentMethod {
    /// The stubbed card offered when the customer has nothing saved.
    #[must_use]
    pub fn example_card() -> Self {
        Self {
            id: None,
            kind: PaymentType::CreditCard,
            card_brand: Some("Visa".to_owned()),
            last4: Some("4242".to_owned()),
            expiry_month: Some(12),
            expiry_year: Some(2026),
            payment_method_id: EXAMPLE_PAYMENT_METHOD_ID.to_owned(),
            is_default: false,
        }
    }

    /// `Visa •••• 4242`, or the method kind for wallets.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.card_brand, &self.last4) {
            (Some(brand), Some(last4)) => format!("{brand} •••• {last4}"),
            (None, Some(last4)) => format!("Card •••• {last4}"),
            _ => match self.kind {
                PaymentType::CreditCard => "Card".to_owned(),
                PaymentType::Paypal => "PayPal".to_owned(),
                PaymentType::ApplePay => "Apple Pay".to_owned(),
                PaymentType::GooglePay => "Google Pay".to_owned(),
                PaymentType::Other => "Other".to_owned(),
            },
        }
    }

    /// `MM/YY`, when the method has an expiry.
    #[must_use]
    pub fn expiry(&self) -> Option<String> {
        let month = self.expiry_month?;
        let year = self.expiry_year?;
        Some(format!("{month:02}/{:02}", year % 100))
    }
}
