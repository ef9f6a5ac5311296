//! ShopLink Core - Shared storefront domain types.
//!
//! This crate provides the types shared by every ShopLink component:
//! - `storefront` - Client synchronization layer (cart, notifications, push, checkout)
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure arithmetic - no I/O, no HTTP
//! clients, no async runtime. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, emails, statuses, cart lines, notifications,
//!   cross-tab signals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
