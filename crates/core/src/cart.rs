//! Cart lines and the cart aggregate.
//!
//! A [`Cart`] is an insertion-ordered list of [`CartItem`]s, unique by product.
//! Line subtotals, the item count and the cart total are always computed from
//! price and quantity; totals sent by the backend are never stored.

use serde::{Deserialize, Serialize};

use crate::product::Product;
use crate::types::{CartId, CartItemId, Price, ProductId};

/// Errors from local cart mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Added quantities must be at least one.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    /// No line exists for the product.
    #[error("Product {0} is not in the cart")]
    NotInCart(ProductId),
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Server-side line id. Guest lines have none.
    #[serde(default)]
    pub id: Option<CartItemId>,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    pub price: Price,
    pub quantity: u32,
    #[serde(default, alias = "productImage")]
    pub image_url: Option<String>,
}

impl CartItem {
    /// Build a guest line for `quantity` units of a product.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            id: None,
            product_id: product.id,
            product_name: product.name.clone(),
            price: product.price,
            quantity,
            image_url: product.image_url.clone(),
        }
    }

    /// `price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// Cart body as the backend sends it.
///
/// `total`, `itemCount` and per-line `subtotal` may be present on the wire;
/// they are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartPayload {
    #[serde(default)]
    id: Option<CartId>,
    #[serde(default)]
    items: Vec<CartItem>,
}

/// The active cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CartPayload")]
pub struct Cart {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<CartId>,
    items: Vec<CartItem>,
}

impl From<CartPayload> for Cart {
    fn from(payload: CartPayload) -> Self {
        let mut cart = Self {
            id: payload.id,
            items: Vec::with_capacity(payload.items.len()),
        };
        // Collapse duplicate products and drop empty lines so the
        // uniqueness invariant holds for whatever the server sends.
        for item in payload.items {
            if item.quantity == 0 {
                continue;
            }
            match cart.line_mut(item.product_id) {
                Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
                None => cart.items.push(item),
            }
        }
        cart
    }
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            id: None,
            items: Vec::new(),
        }
    }

    /// Parse a backend cart body.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the body is not a cart.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Server-side cart id, if the cart came from the backend.
    #[must_use]
    pub const fn id(&self) -> Option<CartId> {
        self.id
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Line for a product.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of all line subtotals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Merge a line into the cart: sums quantity into an existing line for the
    /// same product, otherwise appends.
    ///
    /// # Errors
    ///
    /// [`CartError::InvalidQuantity`] if the line's quantity is zero.
    pub fn add(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        match self.line_mut(item.product_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }
        Ok(())
    }

    /// Overwrite a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// [`CartError::NotInCart`] if no line exists for the product.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        let line = self
            .line_mut(product_id)
            .ok_or(CartError::NotInCart(product_id))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// [`CartError::NotInCart`] if no line exists for the product.
    pub fn remove(&mut self, product_id: ProductId) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        if self.items.len() == before {
            return Err(CartError::NotInCart(product_id));
        }
        Ok(())
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// `{productId, quantity}` pairs for the merge request.
    #[must_use]
    pub fn merge_lines(&self) -> Vec<MergeLine> {
        self.items
            .iter()
            .map(|item| MergeLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect()
    }
}

/// One guest line sent to `POST /api/cart/merge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeLine {
    pub product_id: ProductId,
    pub quantity: u32,
}
