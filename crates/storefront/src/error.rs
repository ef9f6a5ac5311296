//! Unified error handling with Sentry integration.
//!
//! Every user-initiated operation returns `Result<T, ClientError>`. The
//! variants follow the storefront's error taxonomy so a front end can decide
//! between an inline message, a toast, or a redirect without inspecting
//! transport details.

use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Generic toast text for failures the user cannot act on.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Component-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No session token: the request was never sent.
    #[error("Not signed in")]
    Unauthenticated,

    /// Client-side validation failed: nothing was sent.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The backend answered with `status: false`.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// Network failure, timeout, non-2xx status, or undecodable body.
    #[error("Transport error: {0}")]
    Transport(ApiError),

    /// Checkout needs a shipping address before an order can be placed.
    #[error("A shipping address is required")]
    AddressRequired,

    /// No checkout or return session is in progress.
    #[error("No active {0} session")]
    NoActiveSession(&'static str),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected(message) => Self::Rejected(message),
            other => Self::Transport(other),
        }
    }
}

impl ClientError {
    /// Text for the toast shown to the user.
    ///
    /// Server rejections are shown verbatim; transport details are not.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please sign in to continue.".to_string(),
            Self::Validation(msg) | Self::Rejected(msg) => msg.clone(),
            Self::AddressRequired => "Please add a shipping address first.".to_string(),
            Self::NoActiveSession(what) => format!("Your {what} session has expired."),
            Self::Transport(_) | Self::Storage(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// Log the error and capture unexpected failures to Sentry.
    ///
    /// Call at the point where an operation is abandoned; expected outcomes
    /// (rejections, validation, missing session) are only logged.
    pub fn report(&self, operation: &str) {
        if matches!(self, Self::Transport(_) | Self::Storage(_)) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                operation,
                error = %self,
                sentry_event_id = %event_id,
                "Storefront operation failed"
            );
        } else {
            tracing::info!(operation, error = %self, "Storefront operation not completed");
        }
    }

    /// [`report`](Self::report), then hand the error back for propagation.
    #[must_use]
    pub fn reported(self, operation: &str) -> Self {
        self.report(operation);
        self
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context after sign-in.
pub fn set_sentry_user(account_id: &impl ToString, user_name: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(account_id.to_string()),
            username: Some(user_name.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Changed quantity", Some(&[("variant_id", "12"), ("delta", "-1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
