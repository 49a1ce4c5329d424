//! QuickCommerce Core - Shared storefront domain types.
//!
//! This crate holds the types every QuickCommerce client surface agrees on:
//! cart lines and totals, addresses and the address form, orders, products,
//! and payment methods, plus the value types they are built from.
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no async. Anything that talks to the backend lives in
//! `quickcommerce-storefront`.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, and statuses
//! - [`cart`] - Cart aggregate with derived totals
//! - [`address`] - Saved addresses and form validation
//! - [`order`] - Order creation and order records
//! - [`product`] - Catalog products and paged listings
//! - [`payment`] - Payment methods

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod cart;
pub mod order;
pub mod payment;
pub mod product;
pub mod types;

pub use address::{Address, AddressDetails, AddressErrors, AddressField, AddressForm, AddressList};
pub use cart::{Cart, CartError, CartItem, MergeLine};
pub use order::{CreateOrderRequest, Milestone, OrderDetails, OrderError, OrderLine};
pub use payment::PaymentMethod;
pub use product::{Page, Product, ProductQuery};
pub use types::*;
