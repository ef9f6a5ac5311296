//! Command implementations.
//!
//! Each command builds the components it needs from one [`Storefront`] and
//! prints a plain-text result.

pub mod cart;
pub mod live;
pub mod orders;
pub mod session;

use thiserror::Error;

use shoplink_storefront::Storefront;
use shoplink_storefront::config::ClientConfig;
use shoplink_storefront::error::ClientError;
use shoplink_storefront::state::StateError;
use shoplink_storefront::storage::StorageError;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    State(#[from] StateError),

    #[error("{}", .0.user_message())]
    Client(#[from] ClientError),

    #[error("{0}")]
    Storage(#[from] StorageError),
}

/// Open the storefront context for this invocation.
///
/// # Errors
///
/// Returns an error if the state directory or HTTP client cannot be set up.
pub fn open(config: ClientConfig) -> Result<Storefront, CommandError> {
    Ok(Storefront::new(config)?)
}
