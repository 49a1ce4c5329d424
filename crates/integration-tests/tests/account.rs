//! Catalog browsing, order history, tracking, reorder and the address book.

use std::sync::atomic::Ordering;

use quickcommerce_core::{AddressDetails, AddressId, CreateOrderRequest, OrderStatus, ProductQuery};
use quickcommerce_integration_tests::{FIRST_ORDER_ID, FakeBackend, sign_in};
use quickcommerce_storefront::api::ApiError;
use quickcommerce_storefront::cart::SyncMode;
use reqwest::StatusCode;
use uuid::Uuid;

#[tokio::test]
async fn test_product_pages_are_cached_but_searches_are_not() {
    let backend = FakeBackend::start().await;
    let api = backend.storefront().api().clone();

    let first = api.list_products(&ProductQuery::default()).await.unwrap();
    assert_eq!(first.content.len(), 3);
    assert_eq!(first.total_elements, 3);
    assert!(!first.has_next());

    api.list_products(&ProductQuery::default()).await.unwrap();
    assert_eq!(backend.state().product_lists.load(Ordering::SeqCst), 1);

    let search = ProductQuery {
        query: Some("milk".into()),
        ..ProductQuery::default()
    };
    let found = api.list_products(&search).await.unwrap();
    assert_eq!(found.content.len(), 1);
    assert_eq!(found.content[0].name, "Milk");
    api.list_products(&search).await.unwrap();
    assert_eq!(backend.state().product_lists.load(Ordering::SeqCst), 3);

    api.invalidate_products();
    api.list_products(&ProductQuery::default()).await.unwrap();
    assert_eq!(backend.state().product_lists.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_second_page_of_products() {
    let backend = FakeBackend::start().await;
    let api = backend.storefront().api().clone();

    let query = ProductQuery {
        page: 1,
        size: 2,
        query: None,
    };
    let page = api.list_products(&query).await.unwrap();
    assert_eq!(page.number, 1);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].name, "Bread");
}

#[tokio::test]
async fn test_order_history_and_cancellation() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    sign_in(&storefront).await;
    let api = storefront.api();

    backend.state().seed_cart_line(1, 2);
    let order = CreateOrderRequest::new(AddressDetails::default(), "mock-payment-method-id");
    let first = api.create_order(&order, Uuid::new_v4()).await.unwrap();
    backend.state().seed_cart_line(3, 1);
    let second = api.create_order(&order, Uuid::new_v4()).await.unwrap();
    assert_eq!(first, FIRST_ORDER_ID.to_string());

    let history = api.list_orders(0, 10).await.unwrap();
    let ids: Vec<String> = history.content.iter().map(|o| o.id.to_string()).collect();
    assert_eq!(ids, vec![second, first.clone()]);
    assert_eq!(history.content[1].unit_count(), 2);

    let cancelled = api.cancel_order(&first).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(!cancelled.status.is_cancellable());

    let again = api.cancel_order(&first).await.unwrap_err();
    assert!(matches!(again, ApiError::Status { status: StatusCode::CONFLICT, .. }));
    assert_eq!(again.user_message(), "Order can no longer be cancelled");
}

#[tokio::test]
async fn test_tracking_reports_delivery_progress() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    sign_in(&storefront).await;
    let api = storefront.api();

    backend.state().seed_cart_line(2, 1);
    let order = CreateOrderRequest::new(AddressDetails::default(), "mock-payment-method-id");
    let id = api.create_order(&order, Uuid::new_v4()).await.unwrap();

    let tracked = api.get_order_tracking(&id).await.unwrap();
    assert_eq!(tracked.status, OrderStatus::Processing);
    let steps: Vec<OrderStatus> = tracked.timeline().iter().map(|m| m.status).collect();
    assert_eq!(steps, vec![OrderStatus::Pending, OrderStatus::Processing]);

    let missing = api.get_order_tracking("999").await.unwrap_err();
    assert!(matches!(missing, ApiError::Status { status: StatusCode::NOT_FOUND, .. }));
}

#[tokio::test]
async fn test_reorder_refills_cart_store() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    sign_in(&storefront).await;

    backend.state().seed_cart_line(1, 2);
    backend.state().seed_cart_line(3, 1);
    let order = CreateOrderRequest::new(AddressDetails::default(), "mock-payment-method-id");
    let id = storefront.api().create_order(&order, Uuid::new_v4()).await.unwrap();
    storefront.cart().refresh().await.unwrap();
    assert!(storefront.cart().snapshot().cart.is_empty());

    let snapshot = storefront.cart().reorder(&id).await.unwrap();
    assert_eq!(snapshot.mode, SyncMode::Synced);
    assert_eq!(snapshot.cart.item_count(), 3);
    assert_eq!(backend.state().cart_lines(), vec![(1, 2), (3, 1)]);
}

#[tokio::test]
async fn test_order_history_requires_sign_in() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();

    let err = storefront.api().list_orders(0, 10).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: StatusCode::UNAUTHORIZED, .. }));
}

#[tokio::test]
async fn test_deleted_address_leaves_the_book() {
    let backend = FakeBackend::start().await;
    let home = backend.state().seed_address("Home", true);
    let work = backend.state().seed_address("Work", false);
    let api = backend.storefront().api().clone();

    api.delete_address(AddressId::new(home)).await.unwrap();

    let remaining = api.list_addresses().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, AddressId::new(work));
}
