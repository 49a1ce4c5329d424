//! Integration tests for the QuickCommerce storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p quickcommerce-integration-tests
//! ```
//!
//! Nothing external is needed: [`FakeBackend`] serves the REST contract from
//! memory on an ephemeral port, with switches to inject failures and
//! counters to assert on.
//!
//! # Test Categories
//!
//! - `cart_sync` - Cart store against the backend: refetch, merge
//! - `checkout_flow` - Checkout session: addresses, order placement
//! - `gateway` - Route guard and API forwarding
//! - `account` - Catalog browsing, order history, address book

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use quickcommerce_storefront::cart::{CartSnapshot, GuestCartFile, SyncMode};
use quickcommerce_storefront::config::ApiConfig;
use quickcommerce_storefront::{Storefront, api::IDEMPOTENCY_KEY_HEADER};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};

/// Password the fake backend rejects.
pub const WRONG_PASSWORD: &str = "wrong-password";

/// Catalog served by the fake backend: id, name, price.
pub const CATALOG: [(i64, &str, &str); 3] = [
    (1, "Bananas", "1.99"),
    (2, "Milk", "2.49"),
    (3, "Bread", "3.25"),
];

/// First order id handed out.
pub const FIRST_ORDER_ID: i64 = 1001;

// =============================================================================
// Backend state
// =============================================================================

#[derive(Default)]
struct Store {
    cart: Vec<(i64, u32)>,
    addresses: Vec<Value>,
    orders: HashMap<String, i64>,
    placed: Vec<(i64, Value)>,
    next_id: i64,
}

/// Shared state of a [`FakeBackend`].
#[derive(Default)]
pub struct BackendState {
    store: Mutex<Store>,
    /// Answer the next `POST /api/cart/items` with a 500.
    pub fail_next_add: AtomicBool,
    /// Answer the next `POST /api/orders` with a 500.
    pub fail_next_order: AtomicBool,
    /// Answer the next `POST /api/addresses` with a 500.
    pub fail_next_address: AtomicBool,
    pub cart_fetches: AtomicUsize,
    pub merges: AtomicUsize,
    pub address_posts: AtomicUsize,
    pub order_posts: AtomicUsize,
    pub product_lists: AtomicUsize,
    order_keys: Mutex<Vec<String>>,
    authorizations: Mutex<Vec<Option<String>>>,
}

impl BackendState {
    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    /// `Idempotency-Key` of every order POST, in arrival order.
    pub fn order_keys(&self) -> Vec<String> {
        self.order_keys.lock().unwrap().clone()
    }

    /// `Authorization` header of every cart request, in arrival order.
    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.authorizations.lock().unwrap().clone()
    }

    /// `(product id, quantity)` lines of the server cart.
    pub fn cart_lines(&self) -> Vec<(i64, u32)> {
        self.store().cart.clone()
    }

    /// Put a line straight into the server cart.
    pub fn seed_cart_line(&self, product_id: i64, quantity: u32) {
        self.store().cart.push((product_id, quantity));
    }

    /// Save an address as if the shopper had created it earlier.
    pub fn seed_address(&self, full_name: &str, is_default: bool) -> i64 {
        let mut store = self.store();
        store.next_id += 1;
        let id = store.next_id;
        store.addresses.push(address_json(id, full_name, is_default));
        id
    }

    fn cart_json(&self) -> Value {
        let items: Vec<Value> = self
            .store()
            .cart
            .iter()
            .map(|(product_id, quantity)| {
                let (_, name, price) = product(*product_id);
                json!({
                    "id": product_id * 100,
                    "productId": product_id,
                    "productName": name,
                    "price": price,
                    "quantity": quantity,
                })
            })
            .collect();
        json!({ "id": 1, "items": items })
    }
}

fn product(id: i64) -> (i64, &'static str, &'static str) {
    CATALOG
        .iter()
        .copied()
        .find(|(product_id, _, _)| *product_id == id)
        .unwrap_or((id, "Unknown", "1.00"))
}

fn address_json(id: i64, full_name: &str, is_default: bool) -> Value {
    json!({
        "id": id,
        "fullName": full_name,
        "street": "1 Main St",
        "city": "Springfield",
        "state": "IL",
        "zipCode": "62701",
        "country": "US",
        "phone": "555-0100",
        "isDefault": is_default,
    })
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = State<Arc<BackendState>>;

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}

/// Cart routes require a bearer token and record it.
fn authorize(state: &BackendState, headers: &HeaderMap) -> Result<(), Response> {
    let authorization = bearer(headers);
    state.authorizations.lock().unwrap().push(authorization.clone());
    match authorization {
        Some(value) if value.starts_with("Bearer ") => Ok(()),
        _ => Err(error(StatusCode::UNAUTHORIZED, "Unauthorized")),
    }
}

#[derive(Deserialize)]
struct SignIn {
    email: String,
    password: String,
}

async fn sign_in_handler(Json(body): Json<SignIn>) -> Response {
    if body.password == WRONG_PASSWORD {
        return error(StatusCode::UNAUTHORIZED, "Bad credentials");
    }
    Json(json!({ "accessToken": format!("token-for-{}", body.email), "tokenType": "Bearer" }))
        .into_response()
}

async fn sign_up() -> Response {
    (
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    )
        .into_response()
}

async fn get_cart(State(state): Shared, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    state.cart_fetches.fetch_add(1, Ordering::SeqCst);
    Json(state.cart_json()).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItem {
    product_id: i64,
    quantity: u32,
}

async fn add_item(State(state): Shared, headers: HeaderMap, Json(body): Json<AddItem>) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    if state.fail_next_add.swap(false, Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Inventory service unavailable");
    }
    {
        let mut store = state.store();
        match store.cart.iter_mut().find(|(id, _)| *id == body.product_id) {
            Some(line) => line.1 += body.quantity,
            None => store.cart.push((body.product_id, body.quantity)),
        }
    }
    Json(state.cart_json()).into_response()
}

#[derive(Deserialize)]
struct Quantity {
    quantity: u32,
}

async fn update_item(
    State(state): Shared,
    Path(product_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Quantity>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    {
        let mut store = state.store();
        let Some(line) = store.cart.iter_mut().find(|(id, _)| *id == product_id) else {
            return error(StatusCode::NOT_FOUND, "Item not in cart");
        };
        line.1 = body.quantity;
    }
    Json(state.cart_json()).into_response()
}

async fn remove_item(State(state): Shared, Path(product_id): Path<i64>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    state.store().cart.retain(|(id, _)| *id != product_id);
    Json(state.cart_json()).into_response()
}

async fn clear_cart(State(state): Shared, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    state.store().cart.clear();
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct Merge {
    #[serde(default)]
    items: Vec<AddItem>,
}

async fn merge_cart(State(state): Shared, headers: HeaderMap, Json(body): Json<Merge>) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    state.merges.fetch_add(1, Ordering::SeqCst);
    {
        let mut store = state.store();
        for item in body.items {
            match store.cart.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some(line) => line.1 += item.quantity,
                None => store.cart.push((item.product_id, item.quantity)),
            }
        }
    }
    Json(state.cart_json()).into_response()
}

async fn list_addresses(State(state): Shared) -> Response {
    Json(Value::Array(state.store().addresses.clone())).into_response()
}

async fn create_address(State(state): Shared, Json(mut body): Json<Value>) -> Response {
    state.address_posts.fetch_add(1, Ordering::SeqCst);
    if state.fail_next_address.swap(false, Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Address service down");
    }
    let mut store = state.store();
    store.next_id += 1;
    body["id"] = json!(store.next_id);
    store.addresses.push(body.clone());
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn delete_address(State(state): Shared, Path(id): Path<i64>) -> StatusCode {
    state
        .store()
        .addresses
        .retain(|address| address["id"].as_i64() != Some(id));
    StatusCode::NO_CONTENT
}

async fn create_order(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.order_posts.fetch_add(1, Ordering::SeqCst);
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.order_keys.lock().unwrap().push(key.clone());

    if state.fail_next_order.swap(false, Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Payment declined");
    }

    let mut store = state.store();
    if let Some(id) = store.orders.get(&key) {
        return Json(json!({ "orderId": id })).into_response();
    }
    let id = FIRST_ORDER_ID + i64::try_from(store.placed.len()).unwrap();
    let items: Vec<Value> = store
        .cart
        .iter()
        .map(|(product_id, quantity)| {
            let (_, name, price) = product(*product_id);
            json!({ "productId": product_id, "productName": name, "price": price, "quantity": quantity })
        })
        .collect();
    store.cart.clear();
    store.orders.insert(key, id);
    store.placed.push((
        id,
        json!({
            "id": id,
            "status": "PENDING",
            "orderDate": "2025-03-04T10:15:30",
            "items": items,
            "shippingAddress": body["shippingAddress"],
        }),
    ));
    (StatusCode::CREATED, Json(json!({ "orderId": id }))).into_response()
}

async fn get_order(State(state): Shared, Path(id): Path<i64>) -> Response {
    state
        .store()
        .placed
        .iter()
        .find(|(order_id, _)| *order_id == id)
        .map_or_else(
            || error(StatusCode::NOT_FOUND, "Order not found"),
            |(_, order)| Json(order.clone()).into_response(),
        )
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_size")]
    size: usize,
    #[serde(default)]
    query: Option<String>,
}

const fn default_size() -> usize {
    20
}

/// Spring-style page over `items`.
fn page_json(items: &[Value], paging: &Paging) -> Value {
    let size = paging.size.max(1);
    let content: Vec<Value> = items
        .iter()
        .skip(paging.page * size)
        .take(size)
        .cloned()
        .collect();
    json!({
        "content": content,
        "totalElements": items.len(),
        "totalPages": items.len().div_ceil(size),
        "number": paging.page,
        "size": size,
    })
}

async fn list_orders(State(state): Shared, headers: HeaderMap, Query(paging): Query<Paging>) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let orders: Vec<Value> = state
        .store()
        .placed
        .iter()
        .rev()
        .map(|(_, order)| order.clone())
        .collect();
    Json(page_json(&orders, &paging)).into_response()
}

async fn cancel_order(State(state): Shared, Path(id): Path<i64>) -> Response {
    let mut store = state.store();
    let Some((_, order)) = store.placed.iter_mut().find(|(order_id, _)| *order_id == id) else {
        return error(StatusCode::NOT_FOUND, "Order not found");
    };
    if order["status"] != "PENDING" {
        return error(StatusCode::CONFLICT, "Order can no longer be cancelled");
    }
    order["status"] = json!("CANCELLED");
    Json(order.clone()).into_response()
}

async fn track_order(State(state): Shared, Path(id): Path<i64>) -> Response {
    let store = state.store();
    let Some((_, order)) = store.placed.iter().find(|(order_id, _)| *order_id == id) else {
        return error(StatusCode::NOT_FOUND, "Order not found");
    };
    let mut tracked = order.clone();
    if tracked["status"] == "PENDING" {
        tracked["status"] = json!("PROCESSING");
        tracked["processedDate"] = json!("2025-03-04T10:20:00");
    }
    Json(tracked).into_response()
}

/// Replace the cart with a past order's lines.
async fn reorder(State(state): Shared, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    {
        let mut store = state.store();
        let Some(lines) = store
            .placed
            .iter()
            .find(|(order_id, _)| *order_id == id)
            .map(|(_, order)| {
                order["items"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|line| {
                        (
                            line["productId"].as_i64().unwrap(),
                            u32::try_from(line["quantity"].as_u64().unwrap()).unwrap(),
                        )
                    })
                    .collect::<Vec<_>>()
            })
        else {
            return error(StatusCode::NOT_FOUND, "Order not found");
        };
        store.cart = lines;
    }
    Json(state.cart_json()).into_response()
}

async fn list_payment_methods() -> Json<Value> {
    Json(json!([]))
}

fn product_json((id, name, price): (i64, &str, &str)) -> Value {
    json!({ "id": id, "name": name, "price": price, "stockQuantity": 25 })
}

async fn list_products(State(state): Shared, Query(paging): Query<Paging>) -> Json<Value> {
    state.product_lists.fetch_add(1, Ordering::SeqCst);
    let needle = paging.query.as_deref().unwrap_or_default().to_lowercase();
    let products: Vec<Value> = CATALOG
        .iter()
        .copied()
        .filter(|(_, name, _)| name.to_lowercase().contains(&needle))
        .map(product_json)
        .collect();
    Json(page_json(&products, &paging))
}

async fn get_product(Path(id): Path<i64>) -> Response {
    Json(product_json(product(id))).into_response()
}

fn router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/api/auth/signin", post(sign_in_handler))
        .route("/api/auth/signup", post(sign_up))
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_item))
        .route("/api/cart/items/{id}", put(update_item).delete(remove_item))
        .route("/api/cart/merge", post(merge_cart))
        .route("/api/addresses", get(list_addresses).post(create_address))
        .route("/api/addresses/{id}", axum::routing::delete(delete_address))
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/cancel", post(cancel_order))
        .route("/api/orders/{id}/tracking", get(track_order))
        .route("/api/orders/{id}/reorder", post(reorder))
        .route("/api/payment-methods", get(list_payment_methods))
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
        .with_state(state)
}

// =============================================================================
// Harness
// =============================================================================

/// The QuickCommerce REST contract served from memory.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
}

impl FakeBackend {
    /// Bind to an ephemeral port and serve in the background.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    /// `http://127.0.0.1:<port>/`
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(&self.base_url())
            .unwrap()
            .with_timeout(Duration::from_secs(5))
    }

    pub fn state(&self) -> &BackendState {
        &self.state
    }

    /// A storefront client against this backend with an empty guest cart.
    pub fn storefront(&self) -> Storefront {
        Storefront::new(&self.api_config(), scratch_guest_cart()).unwrap()
    }
}

/// A guest cart file in a fresh temporary directory.
pub fn scratch_guest_cart() -> GuestCartFile {
    GuestCartFile::new(scratch_dir("guest").join("guest-cart.json"))
}

/// A fresh temporary directory.
pub fn scratch_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("qc-{prefix}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Sign `storefront` in and wait for the cart store to finish syncing.
pub async fn sign_in(storefront: &Storefront) -> CartSnapshot {
    storefront
        .auth()
        .sign_in(
            "jane@example.com",
            SecretString::from("correct-horse"),
            false,
        )
        .await
        .unwrap();
    settled(storefront, SyncMode::Synced).await
}

/// Wait until the cart store is in `mode` and idle.
pub async fn settled(storefront: &Storefront, mode: SyncMode) -> CartSnapshot {
    let mut snapshots = storefront.cart().subscribe();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.mode == mode && !s.is_loading),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    snapshot
}
