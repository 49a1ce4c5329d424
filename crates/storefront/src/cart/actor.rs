//! The task that owns the cart.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use quickcommerce_core::{Cart, CartError, CartItem, ProductId};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, instrument, warn};

use super::{CartRemote, CartSnapshot, CartStoreError, GuestCartFile, SyncMode};
use crate::api::ApiError;
use crate::auth::AuthState;

type Reply = oneshot::Sender<Result<CartSnapshot, CartStoreError>>;

/// A local change that is mirrored to the backend when signed in.
#[derive(Debug, Clone)]
pub(super) enum Mutation {
    Add(CartItem),
    Update { product_id: ProductId, quantity: u32 },
    Remove(ProductId),
    Clear,
}

impl Mutation {
    fn apply(&self, cart: &mut Cart) -> Result<(), CartError> {
        match self {
            Self::Add(item) => cart.add(item.clone()),
            Self::Update {
                product_id,
                quantity,
            } => cart.set_quantity(*product_id, *quantity),
            Self::Remove(product_id) => cart.remove(*product_id),
            Self::Clear => {
                cart.clear();
                Ok(())
            }
        }
    }

    async fn send(&self, remote: &dyn CartRemote) -> Result<Cart, ApiError> {
        match self {
            Self::Add(item) => remote.add(item.product_id, item.quantity).await,
            Self::Update {
                product_id,
                quantity,
            } => remote.update(*product_id, *quantity).await,
            Self::Remove(product_id) => remote.remove(*product_id).await,
            Self::Clear => remote.clear().await,
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Update { .. } => "update",
            Self::Remove(_) => "remove",
            Self::Clear => "clear",
        }
    }
}

pub(super) enum Command {
    Mutate { mutation: Mutation, reply: Reply },
    Merge { reply: Reply },
    Reorder { order_id: String, reply: Reply },
    Refresh { reply: Reply },
}

/// A command with its submission number.
pub(super) struct Envelope {
    pub(super) seq: u64,
    pub(super) command: Command,
}

pub(super) struct CartActor {
    remote: Arc<dyn CartRemote>,
    guest: GuestCartFile,
    auth: watch::Receiver<AuthState>,
    snapshots: watch::Sender<CartSnapshot>,
    submitted: Arc<AtomicU64>,
    state: CartSnapshot,
    /// A reconciliation was skipped for a newer command that has not yet
    /// replaced local state with the server's.
    owed: bool,
}

impl CartActor {
    pub(super) fn new(
        remote: Arc<dyn CartRemote>,
        guest: GuestCartFile,
        auth: watch::Receiver<AuthState>,
        snapshots: watch::Sender<CartSnapshot>,
        submitted: Arc<AtomicU64>,
    ) -> Self {
        let state = snapshots.borrow().clone();
        Self {
            remote,
            guest,
            auth,
            snapshots,
            submitted,
            state,
            owed: false,
        }
    }

    pub(super) async fn run(mut self, mut queue: mpsc::UnboundedReceiver<Envelope>) {
        self.start().await;

        let mut auth_open = true;
        loop {
            tokio::select! {
                biased;
                changed = self.auth.changed(), if auth_open => match changed {
                    Ok(()) => self.on_auth_change().await,
                    Err(_) => auth_open = false,
                },
                envelope = queue.recv() => match envelope {
                    Some(envelope) => self.handle(envelope).await,
                    None => break,
                },
            }
        }

        debug!("Cart store stopped");
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    async fn start(&mut self) {
        let authenticated = self.auth.borrow_and_update().is_authenticated();
        if authenticated {
            self.state.mode = SyncMode::Synced;
            let seq = self.latest();
            let _ = self.reload_remote(seq).await;
        } else {
            self.state.mode = SyncMode::Guest;
            self.state.cart = self.guest.load().await;
            self.state.is_loading = false;
            self.publish();
        }
    }

    async fn on_auth_change(&mut self) {
        let (authenticated, anonymous) = {
            let auth = self.auth.borrow_and_update();
            (auth.is_authenticated(), matches!(*auth, AuthState::Anonymous))
        };
        match self.state.mode {
            SyncMode::Guest if authenticated => {
                debug!("Signed in, merging guest cart");
                self.state.mode = SyncMode::Synced;
                let seq = self.latest();
                let _ = self.merge_guest(seq).await;
            }
            // A new session replaced the old one; the server cart may differ.
            SyncMode::Synced if authenticated => {
                debug!("Session changed, reloading server cart");
                let seq = self.latest();
                let _ = self.reload_remote(seq).await;
            }
            SyncMode::Synced if anonymous => {
                debug!("Signed out, back to guest cart");
                self.state.mode = SyncMode::Guest;
                self.state.cart = self.guest.load().await;
                self.state.error = None;
                self.state.is_loading = false;
                self.owed = false;
                self.publish();
            }
            // Authenticating keeps the current cart until the outcome is known.
            _ => {}
        }
    }

    async fn handle(&mut self, envelope: Envelope) {
        let Envelope { seq, command } = envelope;
        let (outcome, reply) = match command {
            Command::Mutate { mutation, reply } => (self.mutate(seq, mutation).await, reply),
            Command::Merge { reply } => {
                let outcome = match self.state.mode {
                    SyncMode::Guest => Err(CartStoreError::NotSignedIn),
                    SyncMode::Synced => self.merge_guest(seq).await,
                };
                (outcome, reply)
            }
            Command::Reorder { order_id, reply } => {
                let outcome = match self.state.mode {
                    SyncMode::Guest => Err(CartStoreError::NotSignedIn),
                    SyncMode::Synced => self.reorder(seq, &order_id).await,
                };
                (outcome, reply)
            }
            Command::Refresh { reply } => {
                let outcome = match self.state.mode {
                    SyncMode::Guest => {
                        self.state.cart = self.guest.load().await;
                        self.state.error = None;
                        self.publish();
                        Ok(self.state.clone())
                    }
                    SyncMode::Synced => self.reload_remote(seq).await,
                };
                (outcome, reply)
            }
        };
        self.settle(seq).await;
        // The caller may have stopped waiting.
        let _ = reply.send(outcome);
    }

    // =========================================================================
    // Operations
    // =========================================================================

    #[instrument(skip(self, mutation), fields(op = mutation.name()))]
    async fn mutate(&mut self, seq: u64, mutation: Mutation) -> Result<CartSnapshot, CartStoreError> {
        mutation.apply(&mut self.state.cart)?;
        self.state.error = None;

        if self.state.mode == SyncMode::Guest {
            self.publish();
            self.persist_guest().await;
            return Ok(self.state.clone());
        }

        self.state.is_loading = true;
        self.publish();

        match mutation.send(self.remote.as_ref()).await {
            Ok(cart) => {
                self.reconcile(seq, cart);
                self.state.is_loading = false;
                self.publish();
                Ok(self.state.clone())
            }
            Err(err) => Err(self.fail(seq, &err).await),
        }
    }

    #[instrument(skip(self))]
    async fn merge_guest(&mut self, seq: u64) -> Result<CartSnapshot, CartStoreError> {
        let guest_cart = self.guest.load().await;
        self.state.is_loading = true;
        self.state.error = None;
        self.publish();

        match self.remote.merge(&guest_cart.merge_lines()).await {
            Ok(cart) => {
                if let Err(e) = self.guest.clear().await {
                    warn!(error = %e, "Could not clear guest cart after merge");
                }
                self.reconcile(seq, cart);
                self.state.is_loading = false;
                self.publish();
                Ok(self.state.clone())
            }
            Err(err) => Err(self.fail(seq, &err).await),
        }
    }

    #[instrument(skip(self))]
    async fn reorder(&mut self, seq: u64, order_id: &str) -> Result<CartSnapshot, CartStoreError> {
        self.state.is_loading = true;
        self.state.error = None;
        self.publish();

        match self.remote.reorder(order_id).await {
            Ok(cart) => {
                self.reconcile(seq, cart);
                self.state.is_loading = false;
                self.publish();
                Ok(self.state.clone())
            }
            Err(err) => Err(self.fail(seq, &err).await),
        }
    }

    async fn reload_remote(&mut self, seq: u64) -> Result<CartSnapshot, CartStoreError> {
        self.state.is_loading = true;
        self.publish();

        match self.remote.fetch().await {
            Ok(cart) => {
                self.reconcile(seq, cart);
                self.state.error = None;
                self.state.is_loading = false;
                self.publish();
                Ok(self.state.clone())
            }
            Err(err) => {
                let message = err.user_message();
                warn!(error = %err, "Cart refresh failed");
                self.state.error = Some(message.clone());
                self.state.is_loading = false;
                self.publish();
                Err(CartStoreError::Sync(message))
            }
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Highest submitted command number.
    fn latest(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Replace local state with `cart` if nothing newer was submitted.
    fn reconcile(&mut self, seq: u64, cart: Cart) {
        if self.latest() == seq {
            self.state.cart = cart;
            self.owed = false;
        } else {
            debug!(seq, latest = self.latest(), "Newer command queued, skipping reconciliation");
            self.owed = true;
        }
    }

    /// Refetch if the last queued command finished without settling a
    /// reconciliation that older commands skipped.
    async fn settle(&mut self, seq: u64) {
        if self.owed && self.state.mode == SyncMode::Synced && self.latest() == seq {
            debug!(seq, "Reconciliation still owed, refetching");
            let _ = self.reload_remote(seq).await;
        }
    }

    /// Record a failed remote call and recover by refetching.
    async fn fail(&mut self, seq: u64, err: &ApiError) -> CartStoreError {
        let message = err.user_message();
        warn!(error = %err, "Cart sync failed, refetching");
        self.state.error = Some(message.clone());

        if self.latest() == seq {
            match self.remote.fetch().await {
                Ok(cart) => self.reconcile(seq, cart),
                Err(refetch) => warn!(error = %refetch, "Cart refetch failed"),
            }
        } else {
            debug!(seq, latest = self.latest(), "Newer command queued, skipping refetch");
            self.owed = true;
        }

        self.state.is_loading = false;
        self.publish();
        CartStoreError::Sync(message)
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn publish(&mut self) {
        self.state.version += 1;
        self.snapshots.send_replace(self.state.clone());
    }

    async fn persist_guest(&self) {
        if let Err(e) = self.guest.save(&self.state.cart).await {
            warn!(path = %self.guest.path().display(), error = %e, "Could not persist guest cart");
        }
    }
}
