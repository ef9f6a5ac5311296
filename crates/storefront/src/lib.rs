//! ShopLink Storefront - client synchronization layer.
//!
//! Keeps a signed-in shopper's cart, checkout, and notifications consistent
//! across every open browsing context and with the backend.
//!
//! # Architecture
//!
//! - [`state::Storefront`] is one browsing context. It owns the session,
//!   the API client, the navigator, and builds the components below.
//! - [`bus`] carries `logout` and `cart-updated` between contexts.
//! - [`push`] keeps an auto-reconnecting hub connection per logical channel.
//! - [`cart`], [`notifications`], [`checkout`], [`returns`], [`account`]
//!   and [`chat`] are the components; each re-reads the session on use.
//!
//! Cross-context consistency is achieved only through bus signals followed by
//! a re-fetch. No component shares memory with another context.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod api;
pub mod bus;
pub mod cart;
pub mod chat;
pub mod checkout;
pub mod config;
pub mod error;
pub mod navigation;
pub mod notifications;
pub mod push;
pub mod returns;
pub mod session;
pub mod state;
pub mod storage;

pub use error::{ClientError, Result};
pub use state::Storefront;
