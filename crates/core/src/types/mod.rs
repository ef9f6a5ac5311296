//! Core types for ShopLink.
//!
//! This module provides type-safe wrappers for common storefront concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod notification;
pub mod price;
pub mod signal;
pub mod status;

pub use cart::{CartItem, subtotal};
pub use email::{Email, EmailError};
pub use id::*;
pub use notification::{NotificationEntry, NotificationItem};
pub use price::{CurrencyCode, Price};
pub use signal::{TabSignal, UnknownSignal};
pub use status::*;
