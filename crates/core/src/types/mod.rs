//! Core value types for QuickCommerce.
//!
//! Type-safe wrappers for ids, money, emails and backend status enums.

pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::Price;
pub use status::*;
