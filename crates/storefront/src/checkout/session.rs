//! One shopper's pass through checkout.

use quickcommerce_core::address::preselect;
use quickcommerce_core::payment::EXAMPLE_PAYMENT_METHOD_ID;
use quickcommerce_core::{
    Address, AddressForm, AddressId, CartItem, CreateOrderRequest, OrderDetails, PaymentMethod,
    Price,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{CheckoutError, CheckoutState, CheckoutStep, TransitionError};
use crate::api::{ApiClient, ApiError};
use crate::cart::CartStore;

/// Tax line shown on the summary; pricing is settled by the backend.
pub const TAX_LABEL: &str = "Calculated at checkout";

/// Where the shopper goes after a successful order.
#[must_use]
pub fn confirmation_location(order_id: &str) -> String {
    format!(
        "/order-confirmation?orderId={}",
        urlencoding::encode(order_id)
    )
}

/// Read-only composition shown on the summary step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub address: Address,
    pub payment: PaymentMethod,
    pub lines: Vec<CartItem>,
    pub item_count: u64,
    pub subtotal: Price,
    pub tax_label: &'static str,
    pub total: Price,
}

/// An order submission that has been started but not yet answered.
#[derive(Debug, Clone)]
pub struct PreparedOrder {
    pub request: CreateOrderRequest,
    pub idempotency_key: Uuid,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub order_id: String,
    /// `/order-confirmation?orderId=...`
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    Idle,
    InFlight,
    Confirmed(String),
}

/// Returns an in-flight placement to idle when dropped, so a submission
/// abandoned mid-request can be retried.
struct InFlight<'a>(&'a mut Placement);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if *self.0 == Placement::InFlight {
            *self.0 = Placement::Idle;
        }
    }
}

/// Drives [`CheckoutState`] against the backend and the cart.
pub struct CheckoutSession {
    api: ApiClient,
    cart: CartStore,
    state: CheckoutState,
    addresses: Vec<Address>,
    payment_methods: Vec<PaymentMethod>,
    idempotency_key: Uuid,
    placement: Placement,
    error: Option<String>,
}

impl CheckoutSession {
    /// A session on the address step with nothing loaded.
    #[must_use]
    pub fn new(api: ApiClient, cart: CartStore) -> Self {
        Self {
            api,
            cart,
            state: CheckoutState::default(),
            addresses: Vec::new(),
            payment_methods: Vec::new(),
            idempotency_key: Uuid::new_v4(),
            placement: Placement::Idle,
            error: None,
        }
    }

    /// A session on the address step with saved addresses loaded.
    pub async fn start(api: ApiClient, cart: CartStore) -> Self {
        let mut session = Self::new(api, cart);
        session.load_addresses().await;
        session
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.state.step()
    }

    /// Saved addresses for the address step.
    #[must_use]
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Methods offered on the payment step: saved ones, then the example card.
    #[must_use]
    pub fn payment_options(&self) -> Vec<PaymentMethod> {
        let mut options = self.payment_methods.clone();
        options.push(PaymentMethod::example_card());
        options
    }

    /// Inline error from the last failed order attempt.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Key sent with every order attempt in this session.
    #[must_use]
    pub const fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    #[must_use]
    pub fn is_placing_order(&self) -> bool {
        self.placement == Placement::InFlight
    }

    /// Id of the confirmed order, once placed.
    #[must_use]
    pub fn confirmed_order_id(&self) -> Option<&str> {
        match &self.placement {
            Placement::Confirmed(id) => Some(id),
            _ => None,
        }
    }

    // =========================================================================
    // Address step
    // =========================================================================

    /// Refetch saved addresses. A failure leaves the list empty.
    ///
    /// The current selection is kept if it is still listed; otherwise the
    /// default address, or the first one, is selected.
    #[instrument(skip(self))]
    pub async fn load_addresses(&mut self) {
        self.addresses = match self.api.list_addresses().await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(error = %e, "Could not load saved addresses");
                Vec::new()
            }
        };

        let current = self
            .state
            .selected_address_id()
            .filter(|id| self.addresses.iter().any(|address| address.id == *id));
        if let Some(id) = current.or_else(|| preselect(&self.addresses)) {
            // Only fails off the address step, where there is nothing to select.
            let _ = self.state.select_address(id);
        }
    }

    /// Highlight a saved address.
    ///
    /// # Errors
    ///
    /// Fails off the address step.
    pub fn select_address(&mut self, id: AddressId) -> Result<(), CheckoutError> {
        Ok(self.state.select_address(id)?)
    }

    /// Validate and save a new address, then refresh the list.
    ///
    /// Stays on the address step; the shopper still has to pick an address.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::InvalidAddress`] with every missing field (nothing is
    /// sent), or [`CheckoutError::AddressSave`] if the backend call fails.
    #[instrument(skip(self, form))]
    pub async fn save_address(&mut self, form: &AddressForm) -> Result<(), CheckoutError> {
        if self.step() != CheckoutStep::Address {
            return Err(TransitionError::WrongStep(self.step()).into());
        }
        let details = form.validate()?;

        self.api
            .create_address(&details)
            .await
            .map_err(CheckoutError::AddressSave)?;

        self.load_addresses().await;
        Ok(())
    }

    /// Move to the payment step with the highlighted address.
    ///
    /// Saved payment methods are loaded on the way; a failure just offers the
    /// example card.
    ///
    /// # Errors
    ///
    /// Fails when no listed address is highlighted.
    pub async fn advance_to_payment(&mut self) -> Result<(), CheckoutError> {
        self.state.advance_to_payment(&self.addresses)?;

        self.payment_methods = match self.api.list_payment_methods().await {
            Ok(methods) => methods,
            Err(e) => {
                warn!(error = %e, "Could not load payment methods");
                Vec::new()
            }
        };
        Ok(())
    }

    // =========================================================================
    // Payment step
    // =========================================================================

    /// Choose a payment method.
    ///
    /// # Errors
    ///
    /// Fails off the payment step.
    pub fn select_payment(&mut self, method: PaymentMethod) -> Result<(), CheckoutError> {
        Ok(self.state.select_payment(method)?)
    }

    /// Move to the summary step.
    ///
    /// # Errors
    ///
    /// Fails when no payment method is chosen.
    pub fn advance_to_summary(&mut self) -> Result<(), CheckoutError> {
        Ok(self.state.advance_to_summary()?)
    }

    /// Go back one step. Returning to the address step refetches addresses.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::OrderInFlight`] while an order is being placed, or a
    /// transition error on the first step.
    pub async fn back(&mut self) -> Result<(), CheckoutError> {
        if self.is_placing_order() {
            return Err(CheckoutError::OrderInFlight);
        }
        self.state.back()?;
        self.error = None;
        if self.step() == CheckoutStep::Address {
            self.load_addresses().await;
        }
        Ok(())
    }

    // =========================================================================
    // Summary step
    // =========================================================================

    /// The summary for the current cart, on the summary step.
    #[must_use]
    pub fn summary(&self) -> Option<OrderSummary> {
        let CheckoutState::Summary { address, payment } = &self.state else {
            return None;
        };
        let cart = self.cart.snapshot().cart;
        let subtotal = cart.total();

        Some(OrderSummary {
            address: address.clone(),
            payment: payment.clone(),
            item_count: cart.item_count(),
            lines: cart.items().to_vec(),
            subtotal,
            tax_label: TAX_LABEL,
            total: subtotal,
        })
    }

    /// Start an order submission.
    ///
    /// Marks the session as placing an order until [`Self::complete_order`]
    /// is called with the outcome.
    ///
    /// # Errors
    ///
    /// Rejected while another submission is in flight, after an order was
    /// confirmed, off the summary step, or when the cart is empty.
    pub fn prepare_order(&mut self) -> Result<PreparedOrder, CheckoutError> {
        match &self.placement {
            Placement::InFlight => return Err(CheckoutError::OrderInFlight),
            Placement::Confirmed(id) => return Err(CheckoutError::AlreadyPlaced(id.clone())),
            Placement::Idle => {}
        }
        let CheckoutState::Summary { address, payment } = &self.state else {
            return Err(TransitionError::WrongStep(self.step()).into());
        };
        if self.cart.snapshot().cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let payment_method_id = if payment.payment_method_id.trim().is_empty() {
            EXAMPLE_PAYMENT_METHOD_ID.to_owned()
        } else {
            payment.payment_method_id.clone()
        };
        let request = CreateOrderRequest::new(address.details.clone(), payment_method_id);

        self.placement = Placement::InFlight;
        self.error = None;
        Ok(PreparedOrder {
            request,
            idempotency_key: self.idempotency_key,
        })
    }

    /// Record the outcome of a prepared submission.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::Order`] when the submission failed; the session stays
    /// on the summary step with an inline error and can be retried with the
    /// same idempotency key.
    pub fn complete_order(
        &mut self,
        outcome: Result<String, ApiError>,
    ) -> Result<OrderConfirmation, CheckoutError> {
        match outcome {
            Ok(order_id) => {
                info!(order_id = %order_id, "Order placed");
                self.placement = Placement::Confirmed(order_id.clone());
                Ok(OrderConfirmation {
                    location: confirmation_location(&order_id),
                    order_id,
                })
            }
            Err(e) => {
                let err = CheckoutError::Order(e);
                warn!(error = %err, "Order placement failed");
                self.placement = Placement::Idle;
                self.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Submit the order.
    ///
    /// On success the cart store is refreshed, since the backend empties the
    /// cart it turned into an order. Cancel-safe: dropping the future while
    /// the request is pending leaves the session ready to retry with the same
    /// idempotency key.
    ///
    /// # Errors
    ///
    /// See [`Self::prepare_order`] and [`Self::complete_order`].
    #[instrument(skip(self), fields(idempotency_key = %self.idempotency_key))]
    pub async fn place_order(&mut self) -> Result<OrderConfirmation, CheckoutError> {
        let prepared = self.prepare_order()?;
        let outcome = {
            let _in_flight = InFlight(&mut self.placement);
            self.api
                .create_order(&prepared.request, prepared.idempotency_key)
                .await
        };
        let confirmation = self.complete_order(outcome)?;

        if let Err(e) = self.cart.refresh().await {
            warn!(error = %e, "Could not refresh cart after order");
        }
        Ok(confirmation)
    }

    /// Load the confirmed order for the confirmation view.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::NotPlaced`] before confirmation, or the API error.
    pub async fn confirmed_order(&self) -> Result<OrderDetails, CheckoutError> {
        let order_id = self.confirmed_order_id().ok_or(CheckoutError::NotPlaced)?;
        self.api
            .get_order(order_id)
            .await
            .map_err(CheckoutError::Order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use quickcommerce_core::{AddressDetails, AddressField, Product, ProductId};
    use reqwest::StatusCode;

    use super::*;
    use crate::auth::{self, AuthState};
    use crate::cart::GuestCartFile;
    use crate::config::ApiConfig;

    // Nothing listens on this port; any request fails fast.
    fn offline_api() -> ApiClient {
        let (_tx, rx) = auth::channel();
        ApiClient::new(&ApiConfig::new("http://127.0.0.1:9").unwrap(), rx).unwrap()
    }

    fn guest_store(api: &ApiClient) -> CartStore {
        let (_tx, rx) = tokio::sync::watch::channel(AuthState::Anonymous);
        let path = std::env::temp_dir()
            .join(format!("qc-checkout-{}", Uuid::new_v4()))
            .join("guest-cart.json");
        CartStore::spawn(Arc::new(api.clone()), GuestCartFile::new(path), rx)
    }

    fn product(id: i64, name: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.into(),
            description: None,
            price: Price::from_cents(cents),
            stock_quantity: 10,
            image_url: None,
            category: None,
        }
    }

    fn saved_address(id: i64, is_default: bool) -> Address {
        Address {
            id: AddressId::new(id),
            details: AddressDetails {
                full_name: "Jane Doe".into(),
                street: "1 Main St".into(),
                city: "Springfield".into(),
                state: "IL".into(),
                zip_code: "62701".into(),
                country: "US".into(),
                phone: "555-0100".into(),
                is_default,
                ..AddressDetails::default()
            },
        }
    }

    async fn at_summary() -> CheckoutSession {
        at_summary_with(offline_api()).await
    }

    async fn at_summary_with(api: ApiClient) -> CheckoutSession {
        let cart = guest_store(&api);
        cart.add_item(&product(1, "Bananas", 199), 2).await.unwrap();
        cart.add_item(&product(2, "Milk", 249), 1).await.unwrap();

        let mut session = CheckoutSession::new(api, cart);
        session.addresses = vec![saved_address(1, false), saved_address(2, true)];
        session.select_address(AddressId::new(2)).unwrap();
        session.advance_to_payment().await.unwrap();
        session.select_payment(PaymentMethod::example_card()).unwrap();
        session.advance_to_summary().unwrap();
        session
    }

    #[tokio::test]
    async fn test_address_load_failure_is_empty_list() {
        let api = offline_api();
        let cart = guest_store(&api);
        let session = CheckoutSession::start(api, cart).await;
        assert!(session.addresses().is_empty());
        assert_eq!(session.state().selected_address_id(), None);
    }

    #[tokio::test]
    async fn test_invalid_address_form_lists_missing_fields() {
        let api = offline_api();
        let cart = guest_store(&api);
        let mut session = CheckoutSession::new(api, cart);

        let form = AddressForm {
            full_name: "Jane".into(),
            street: "   ".into(),
            ..AddressForm::default()
        };
        let Err(CheckoutError::InvalidAddress(errors)) = session.save_address(&form).await else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.fields().len(), 6);
        assert_eq!(
            errors.message_for(AddressField::Street),
            Some("Street is required")
        );
        assert_eq!(errors.message_for(AddressField::FullName), None);
    }

    #[tokio::test]
    async fn test_failed_address_save_has_form_message() {
        let api = offline_api();
        let cart = guest_store(&api);
        let mut session = CheckoutSession::new(api, cart);

        let form = AddressForm {
            full_name: "Jane Doe".into(),
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip_code: "62701".into(),
            country: "US".into(),
            phone: "555-0100".into(),
            ..AddressForm::default()
        };
        let err = session.save_address(&form).await.unwrap_err();
        assert!(matches!(err, CheckoutError::AddressSave(_)));
        assert_eq!(err.user_message(), "Failed to save address. Please try again.");
    }

    #[tokio::test]
    async fn test_summary_totals() {
        let session = at_summary().await;
        let summary = session.summary().unwrap();

        assert_eq!(summary.address.id, AddressId::new(2));
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal.to_string(), "$6.47");
        assert_eq!(summary.tax_label, "Calculated at checkout");
        assert_eq!(summary.total, summary.subtotal);
    }

    #[tokio::test]
    async fn test_example_card_is_always_offered() {
        let session = at_summary().await;
        let options = session.payment_options();
        assert_eq!(
            options.last().unwrap().payment_method_id,
            EXAMPLE_PAYMENT_METHOD_ID
        );
    }

    #[tokio::test]
    async fn test_submission_guard_and_key_reuse() {
        let mut session = at_summary().await;
        let key = session.idempotency_key();

        let first = session.prepare_order().unwrap();
        assert_eq!(first.idempotency_key, key);
        assert!(first.request.use_shipping_address_for_billing);
        assert_eq!(first.request.payment_method_id, "mock-payment-method-id");
        assert!(matches!(
            session.prepare_order(),
            Err(CheckoutError::OrderInFlight)
        ));
        assert!(matches!(
            session.back().await,
            Err(CheckoutError::OrderInFlight)
        ));

        let failure = ApiError::from_status(StatusCode::CONFLICT, r#"{"message":"Out of stock"}"#);
        session.complete_order(Err(failure)).unwrap_err();
        assert_eq!(session.error(), Some("Out of stock"));
        assert_eq!(session.step(), CheckoutStep::Summary);

        let retry = session.prepare_order().unwrap();
        assert_eq!(retry.idempotency_key, key);
        assert_eq!(session.error(), None);

        let confirmation = session.complete_order(Ok("42".into())).unwrap();
        assert_eq!(confirmation.location, "/order-confirmation?orderId=42");
        assert!(matches!(
            session.prepare_order(),
            Err(CheckoutError::AlreadyPlaced(id)) if id == "42"
        ));
    }

    #[tokio::test]
    async fn test_abandoned_placement_can_be_retried() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (_tx, rx) = auth::channel();
        let api = ApiClient::new(&ApiConfig::new(&url).unwrap(), rx).unwrap();
        let mut session = at_summary_with(api).await;
        let key = session.idempotency_key();

        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(200), session.place_order()).await;
        assert!(abandoned.is_err());

        assert!(!session.is_placing_order());
        assert_eq!(session.step(), CheckoutStep::Summary);
        let retry = session.prepare_order().unwrap();
        assert_eq!(retry.idempotency_key, key);
        drop(listener);
    }

    #[tokio::test]
    async fn test_missing_order_id_message() {
        let mut session = at_summary().await;
        session.prepare_order().unwrap();
        let err = session
            .complete_order(Err(ApiError::MissingField("orderId")))
            .unwrap_err();
        assert_eq!(err.user_message(), "Order ID missing in response");
        assert_eq!(session.error(), Some("Order ID missing in response"));
    }

    #[tokio::test]
    async fn test_cannot_place_before_summary() {
        let api = offline_api();
        let cart = guest_store(&api);
        let mut session = CheckoutSession::new(api, cart);
        assert!(matches!(
            session.prepare_order(),
            Err(CheckoutError::Transition(TransitionError::WrongStep(
                CheckoutStep::Address
            )))
        ));
    }

    #[test]
    fn test_confirmation_location_encodes_id() {
        assert_eq!(
            confirmation_location("ORD 7"),
            "/order-confirmation?orderId=ORD%207"
        );
    }
}
