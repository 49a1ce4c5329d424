//! Cart Store: the single source of truth for the active cart.
//!
//! # Architecture
//!
//! - One actor task owns the cart and processes commands strictly in the
//!   order they were submitted; [`CartStore`] handles are cheap clones
//! - Every state change publishes a [`CartSnapshot`] on a `watch` channel
//! - Mutations apply locally first, then (when signed in) go to the backend.
//!   The server cart returned by the call, or a full refetch after a failure,
//!   replaces local state, unless a newer command was submitted in the
//!   meantime; that command reconciles instead
//! - Signed out, the cart is local only and persisted by [`GuestCartFile`];
//!   signing in merges it into the server cart once

mod actor;
mod guest;
mod remote;

pub use guest::{GuestCartError, GuestCartFile};
pub use remote::CartRemote;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use quickcommerce_core::{Cart, CartError, CartItem, Product, ProductId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::auth::AuthState;

use actor::{CartActor, Command, Envelope, Mutation};

/// Errors returned by cart operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartStoreError {
    /// The mutation was invalid locally; nothing changed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The backend call failed. Local state was refreshed from the server,
    /// either right away or once the last queued command finished.
    #[error("{0}")]
    Sync(String),

    /// Merging and reordering need a signed-in shopper.
    #[error("Sign in to use your saved cart")]
    NotSignedIn,

    /// The store's task has stopped.
    #[error("Cart store is not running")]
    Closed,
}

/// Whether the cart is mirrored to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Anonymous; local and persisted to the guest file.
    #[default]
    Guest,
    /// Signed in; the server cart is authoritative.
    Synced,
}

/// Immutable copy of the store's state, published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartSnapshot {
    pub cart: Cart,
    pub is_loading: bool,
    /// User-facing message from the last failed operation.
    pub error: Option<String>,
    pub mode: SyncMode,
    /// Bumped on every published change.
    pub version: u64,
}

/// Handle to the cart store.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
    snapshots: watch::Receiver<CartSnapshot>,
}

struct CartStoreInner {
    // Held while numbering and enqueueing so queue order matches numbering.
    commands: Mutex<mpsc::UnboundedSender<Envelope>>,
    submitted: Arc<AtomicU64>,
}

impl CartStore {
    /// Spawn the store's actor on the current tokio runtime.
    ///
    /// The store starts in guest mode with the persisted guest cart, or in
    /// synced mode with the server cart if `auth` is already authenticated.
    #[must_use]
    pub fn spawn(
        remote: Arc<dyn CartRemote>,
        guest: GuestCartFile,
        auth: watch::Receiver<AuthState>,
    ) -> Self {
        let (commands, queue) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots) = watch::channel(CartSnapshot {
            is_loading: true,
            ..CartSnapshot::default()
        });
        let submitted = Arc::new(AtomicU64::new(0));

        let actor = CartActor::new(remote, guest, auth, snapshots_tx, Arc::clone(&submitted));
        tokio::spawn(actor.run(queue));

        Self {
            inner: Arc::new(CartStoreInner {
                commands: Mutex::new(commands),
                submitted,
            }),
            snapshots,
        }
    }

    /// Latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver of every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.snapshots.clone()
    }

    /// Add `quantity` units of a product, merging into an existing line.
    ///
    /// # Errors
    ///
    /// `CartStoreError::Cart` for a zero quantity, `CartStoreError::Sync` if
    /// the backend call failed.
    pub async fn add_item(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<CartSnapshot, CartStoreError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity.into());
        }
        let item = CartItem::from_product(product, quantity);
        self.submit(|reply| Command::Mutate {
            mutation: Mutation::Add(item),
            reply,
        })
        .await
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// `CartStoreError::Cart` if the product is not in the cart,
    /// `CartStoreError::Sync` if the backend call failed.
    pub async fn update_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, CartStoreError> {
        if quantity == 0 {
            return self.remove_item(product_id).await;
        }
        self.submit(|reply| Command::Mutate {
            mutation: Mutation::Update {
                product_id,
                quantity,
            },
            reply,
        })
        .await
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// `CartStoreError::Cart` if the product is not in the cart,
    /// `CartStoreError::Sync` if the backend call failed.
    pub async fn remove_item(&self, product_id: ProductId) -> Result<CartSnapshot, CartStoreError> {
        self.submit(|reply| Command::Mutate {
            mutation: Mutation::Remove(product_id),
            reply,
        })
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// `CartStoreError::Sync` if the backend call failed.
    pub async fn clear(&self) -> Result<CartSnapshot, CartStoreError> {
        self.submit(|reply| Command::Mutate {
            mutation: Mutation::Clear,
            reply,
        })
        .await
    }

    /// Fold the persisted guest cart into the signed-in cart.
    ///
    /// Runs automatically once when the shopper signs in.
    ///
    /// # Errors
    ///
    /// `CartStoreError::NotSignedIn` in guest mode, `CartStoreError::Sync` if
    /// the backend call failed.
    pub async fn merge_guest_cart(&self) -> Result<CartSnapshot, CartStoreError> {
        self.submit(|reply| Command::Merge { reply }).await
    }

    /// Replace the cart with the lines of a past order.
    ///
    /// The backend rebuilds the cart from the order; the cart it returns
    /// becomes local state like any other server answer.
    ///
    /// # Errors
    ///
    /// `CartStoreError::NotSignedIn` in guest mode, `CartStoreError::Sync` if
    /// the backend call failed (the server cart is refetched).
    pub async fn reorder(&self, order_id: &str) -> Result<CartSnapshot, CartStoreError> {
        let order_id = order_id.to_owned();
        self.submit(|reply| Command::Reorder { order_id, reply }).await
    }

    /// Replace local state with the authoritative cart: the server cart when
    /// signed in, the guest file otherwise.
    ///
    /// # Errors
    ///
    /// `CartStoreError::Sync` if the backend call failed.
    pub async fn refresh(&self) -> Result<CartSnapshot, CartStoreError> {
        self.submit(|reply| Command::Refresh { reply }).await
    }

    async fn submit<F>(&self, command: F) -> Result<CartSnapshot, CartStoreError>
    where
        F: FnOnce(oneshot::Sender<Result<CartSnapshot, CartStoreError>>) -> Command,
    {
        let (reply, outcome) = oneshot::channel();
        {
            let commands = self
                .inner
                .commands
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let seq = self.inner.submitted.fetch_add(1, Ordering::SeqCst) + 1;
            commands
                .send(Envelope {
                    seq,
                    command: command(reply),
                })
                .map_err(|_| CartStoreError::Closed)?;
        }
        outcome.await.map_err(|_| CartStoreError::Closed)?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use async_trait::async_trait;
    use quickcommerce_core::{MergeLine, Price};
    use reqwest::StatusCode;
    use secrecy::SecretString;
    use tokio::sync::Notify;

    use super::*;
    use crate::api::ApiError;
    use crate::auth::AuthSession;

    /// In-memory backend cart with failure injection.
    #[derive(Default)]
    struct FakeRemote {
        server: Mutex<Cart>,
        failing: AtomicBool,
        fail_next: AtomicBool,
        pause_next: AtomicBool,
        entered: Notify,
        release: Notify,
        fetches: AtomicUsize,
        merges: Mutex<Vec<Vec<MergeLine>>>,
    }

    impl FakeRemote {
        fn server(&self) -> std::sync::MutexGuard<'_, Cart> {
            self.server.lock().unwrap()
        }

        async fn gate(&self) -> Result<(), ApiError> {
            if self.pause_next.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            if self.failing.load(Ordering::SeqCst) || self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(ApiError::from_status(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    r#"{"message":"Cart service unavailable"}"#,
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CartRemote for FakeRemote {
        async fn fetch(&self) -> Result<Cart, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.server().clone())
        }

        async fn add(&self, product_id: ProductId, quantity: u32) -> Result<Cart, ApiError> {
            self.gate().await?;
            let mut server = self.server();
            server.add(item(product_id.as_i64(), quantity)).unwrap();
            Ok(server.clone())
        }

        async fn update(&self, product_id: ProductId, quantity: u32) -> Result<Cart, ApiError> {
            self.gate().await?;
            let mut server = self.server();
            server.set_quantity(product_id, quantity).unwrap();
            Ok(server.clone())
        }

        async fn remove(&self, product_id: ProductId) -> Result<Cart, ApiError> {
            self.gate().await?;
            let mut server = self.server();
            server.remove(product_id).unwrap();
            Ok(server.clone())
        }

        async fn clear(&self) -> Result<Cart, ApiError> {
            self.gate().await?;
            let mut server = self.server();
            server.clear();
            Ok(server.clone())
        }

        async fn merge(&self, lines: &[MergeLine]) -> Result<Cart, ApiError> {
            self.gate().await?;
            self.merges.lock().unwrap().push(lines.to_vec());
            let mut server = self.server();
            for line in lines {
                server.add(item(line.product_id.as_i64(), line.quantity)).unwrap();
            }
            Ok(server.clone())
        }

        async fn reorder(&self, order_id: &str) -> Result<Cart, ApiError> {
            self.gate().await?;
            let past: i64 = order_id.parse().unwrap();
            let mut server = self.server();
            server.clear();
            server.add(item(past, 2)).unwrap();
            Ok(server.clone())
        }
    }

    fn item(id: i64, quantity: u32) -> CartItem {
        CartItem {
            id: None,
            product_id: ProductId::new(id),
            product_name: format!("Product {id}"),
            price: Price::from_cents(250),
            quantity,
            image_url: None,
        }
    }

    fn product(id: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: None,
            price: Price::from_cents(250),
            stock_quantity: 10,
            image_url: None,
            category: None,
        }
    }

    fn scratch_file() -> GuestCartFile {
        let dir = std::env::temp_dir().join(format!("qc-store-{}", uuid::Uuid::new_v4()));
        GuestCartFile::new(dir.join("guest-cart.json"))
    }

    fn signed_in() -> AuthState {
        AuthState::Authenticated(AuthSession::new(SecretString::from("tok"), None, false))
    }

    async fn ready(store: &CartStore) -> CartSnapshot {
        store
            .subscribe()
            .wait_for(|s| !s.is_loading)
            .await
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn test_guest_mutations_persist_locally() {
        let remote = Arc::new(FakeRemote::default());
        let guest = scratch_file();
        let (_auth_tx, auth_rx) = watch::channel(AuthState::Anonymous);
        let store = CartStore::spawn(remote.clone(), guest.clone(), auth_rx);

        let snapshot = store.add_item(&product(1), 2).await.unwrap();
        assert_eq!(snapshot.mode, SyncMode::Guest);
        assert_eq!(snapshot.cart.item_count(), 2);

        store.add_item(&product(1), 1).await.unwrap();
        let snapshot = store.update_quantity(ProductId::new(1), 4).await.unwrap();
        assert_eq!(snapshot.cart.total(), Price::from_cents(1000));

        assert_eq!(guest.load().await, snapshot.cart);
        assert!(remote.server().is_empty());
    }

    #[tokio::test]
    async fn test_zero_quantity_update_removes_line() {
        let remote = Arc::new(FakeRemote::default());
        let (_auth_tx, auth_rx) = watch::channel(AuthState::Anonymous);
        let store = CartStore::spawn(remote, scratch_file(), auth_rx);

        store.add_item(&product(1), 1).await.unwrap();
        let snapshot = store.update_quantity(ProductId::new(1), 0).await.unwrap();
        assert!(snapshot.cart.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_mutation_changes_nothing() {
        let remote = Arc::new(FakeRemote::default());
        let (_auth_tx, auth_rx) = watch::channel(AuthState::Anonymous);
        let store = CartStore::spawn(remote, scratch_file(), auth_rx);
        let before = ready(&store).await;

        let err = store.remove_item(ProductId::new(9)).await.unwrap_err();
        assert_eq!(err, CartStoreError::Cart(CartError::NotInCart(ProductId::new(9))));
        assert_eq!(
            store.add_item(&product(1), 0).await.unwrap_err(),
            CartStoreError::Cart(CartError::InvalidQuantity)
        );
        assert_eq!(store.snapshot().version, before.version);
    }

    #[tokio::test]
    async fn test_synced_failure_refetches_server_cart() {
        let remote = Arc::new(FakeRemote::default());
        remote.server().add(item(7, 1)).unwrap();
        let (_auth_tx, auth_rx) = watch::channel(signed_in());
        let store = CartStore::spawn(remote.clone(), scratch_file(), auth_rx);
        assert_eq!(ready(&store).await.mode, SyncMode::Synced);

        remote.failing.store(true, Ordering::SeqCst);
        let err = store.add_item(&product(1), 3).await.unwrap_err();
        assert_eq!(err, CartStoreError::Sync("Cart service unavailable".into()));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.error.as_deref(), Some("Cart service unavailable"));
        assert!(!snapshot.is_loading);
        // The optimistic line is gone; only the server's line remains.
        assert!(snapshot.cart.get(ProductId::new(1)).is_none());
        assert_eq!(snapshot.cart.item_count(), 1);
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_failure_skips_refetch() {
        let remote = Arc::new(FakeRemote::default());
        let (_auth_tx, auth_rx) = watch::channel(signed_in());
        let store = CartStore::spawn(remote.clone(), scratch_file(), auth_rx);
        ready(&store).await;
        let fetches = remote.fetches.load(Ordering::SeqCst);

        remote.fail_next.store(true, Ordering::SeqCst);
        remote.pause_next.store(true, Ordering::SeqCst);
        let first = tokio::spawn({
            let store = store.clone();
            async move { store.add_item(&product(1), 1).await }
        });
        remote.entered.notified().await;

        let second = tokio::spawn({
            let store = store.clone();
            async move { store.add_item(&product(2), 1).await }
        });
        while store.inner.submitted.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        // The first call fails with the second already queued.
        remote.release.notify_one();
        assert!(matches!(
            first.await.unwrap(),
            Err(CartStoreError::Sync(_))
        ));
        assert_eq!(remote.fetches.load(Ordering::SeqCst), fetches);

        let snapshot = second.await.unwrap().unwrap();
        assert_eq!(snapshot.cart, remote.server().clone());
        assert_eq!(remote.fetches.load(Ordering::SeqCst), fetches);
    }

    #[tokio::test]
    async fn test_stale_failure_settled_when_follow_up_is_rejected() {
        let remote = Arc::new(FakeRemote::default());
        let (_auth_tx, auth_rx) = watch::channel(signed_in());
        let store = CartStore::spawn(remote.clone(), scratch_file(), auth_rx);
        ready(&store).await;

        remote.fail_next.store(true, Ordering::SeqCst);
        remote.pause_next.store(true, Ordering::SeqCst);
        let first = tokio::spawn({
            let store = store.clone();
            async move { store.add_item(&product(1), 1).await }
        });
        remote.entered.notified().await;

        let second = tokio::spawn({
            let store = store.clone();
            async move { store.remove_item(ProductId::new(9)).await }
        });
        while store.inner.submitted.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        remote.release.notify_one();
        assert!(matches!(first.await.unwrap(), Err(CartStoreError::Sync(_))));
        assert_eq!(
            second.await.unwrap().unwrap_err(),
            CartStoreError::Cart(CartError::NotInCart(ProductId::new(9)))
        );

        // The rejected add must not survive: the server never took it.
        let snapshot = store.snapshot();
        assert!(snapshot.cart.get(ProductId::new(1)).is_none());
        assert_eq!(snapshot.cart, remote.server().clone());
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn test_reauthenticating_keeps_synced_cart() {
        let remote = Arc::new(FakeRemote::default());
        remote.server().add(item(5, 1)).unwrap();
        let guest = scratch_file();
        let (auth_tx, auth_rx) = watch::channel(signed_in());
        let store = CartStore::spawn(remote.clone(), guest.clone(), auth_rx);
        ready(&store).await;

        auth_tx.send_replace(AuthState::Authenticating);
        let snapshot = store.add_item(&product(6), 1).await.unwrap();
        assert_eq!(snapshot.mode, SyncMode::Synced);
        assert_eq!(snapshot.cart, remote.server().clone());
        assert_eq!(snapshot.cart.item_count(), 2);

        let before = store.snapshot().version;
        auth_tx.send_replace(signed_in());
        let snapshot = store
            .subscribe()
            .wait_for(|s| s.version >= before + 2 && !s.is_loading)
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.mode, SyncMode::Synced);
        assert_eq!(snapshot.cart.item_count(), 2);
        assert!(remote.merges.lock().unwrap().is_empty());
        assert!(guest.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_merges_guest_cart_once() {
        let remote = Arc::new(FakeRemote::default());
        let guest = scratch_file();
        let (auth_tx, auth_rx) = watch::channel(AuthState::Anonymous);
        let store = CartStore::spawn(remote.clone(), guest.clone(), auth_rx);

        store.add_item(&product(1), 2).await.unwrap();
        store.add_item(&product(2), 1).await.unwrap();

        auth_tx.send_replace(signed_in());
        let snapshot = store
            .subscribe()
            .wait_for(|s| s.mode == SyncMode::Synced && !s.is_loading)
            .await
            .unwrap()
            .clone();

        assert_eq!(snapshot.cart.item_count(), 3);
        assert_eq!(remote.merges.lock().unwrap().len(), 1);
        assert!(guest.load().await.is_empty());

        store.refresh().await.unwrap();
        store.add_item(&product(3), 1).await.unwrap();
        assert_eq!(remote.merges.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_returns_to_guest_cart() {
        let remote = Arc::new(FakeRemote::default());
        let (auth_tx, auth_rx) = watch::channel(signed_in());
        let store = CartStore::spawn(remote, scratch_file(), auth_rx);
        store.add_item(&product(1), 1).await.unwrap();

        auth_tx.send_replace(AuthState::Anonymous);
        let snapshot = store
            .subscribe()
            .wait_for(|s| s.mode == SyncMode::Guest)
            .await
            .unwrap()
            .clone();
        assert!(snapshot.cart.is_empty());
    }

    #[tokio::test]
    async fn test_merge_requires_sign_in() {
        let remote = Arc::new(FakeRemote::default());
        let (_auth_tx, auth_rx) = watch::channel(AuthState::Anonymous);
        let store = CartStore::spawn(remote, scratch_file(), auth_rx);
        assert_eq!(
            store.merge_guest_cart().await.unwrap_err(),
            CartStoreError::NotSignedIn
        );
    }

    #[tokio::test]
    async fn test_reorder_replaces_cart_with_order_lines() {
        let remote = Arc::new(FakeRemote::default());
        remote.server().add(item(4, 1)).unwrap();
        let (_auth_tx, auth_rx) = watch::channel(signed_in());
        let store = CartStore::spawn(remote.clone(), scratch_file(), auth_rx);
        ready(&store).await;

        let snapshot = store.reorder("8").await.unwrap();
        assert!(snapshot.cart.get(ProductId::new(4)).is_none());
        assert_eq!(snapshot.cart.get(ProductId::new(8)).unwrap().quantity, 2);

        remote.fail_next.store(true, Ordering::SeqCst);
        let err = store.reorder("9").await.unwrap_err();
        assert_eq!(err, CartStoreError::Sync("Cart service unavailable".into()));
        assert_eq!(store.snapshot().cart, remote.server().clone());
    }

    #[tokio::test]
    async fn test_reorder_requires_sign_in() {
        let remote = Arc::new(FakeRemote::default());
        let (_auth_tx, auth_rx) = watch::channel(AuthState::Anonymous);
        let store = CartStore::spawn(remote, scratch_file(), auth_rx);
        assert_eq!(store.reorder("8").await.unwrap_err(), CartStoreError::NotSignedIn);
    }

    #[tokio::test]
    async fn test_synced_clear_empties_server_cart() {
        let remote = Arc::new(FakeRemote::default());
        remote.server().add(item(4, 2)).unwrap();
        let (_auth_tx, auth_rx) = watch::channel(signed_in());
        let store = CartStore::spawn(remote.clone(), scratch_file(), auth_rx);
        ready(&store).await;

        let snapshot = store.clear().await.unwrap();
        assert!(snapshot.cart.is_empty());
        assert!(remote.server().is_empty());
    }
}
