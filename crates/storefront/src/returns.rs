//! Return flow.
//!
//! Same lifecycle as checkout: a return session is opened for chosen order
//! lines, stored locally, and consumed exactly once by the final submission.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use shoplink_core::{Email, OrderId};

use crate::api::{
    ApiClient, ReturnCheckoutRequest, ReturnCheckoutSession, ReturnSelection, ReturnSubmission,
    ReturnableItem,
};
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::navigation::{Navigation, Navigator};
use crate::storage::{KeyValueStore, load_json, save_json};

/// Storage key of the in-progress return session.
pub const RETURN_SESSION_KEY: &str = "returnCheckoutSession";

const RETURNS_PATH: &str = "/returns";

/// Drives one browsing context through a return request.
#[derive(Clone)]
pub struct ReturnFlow {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    navigator: Navigator,
    storage: Arc<dyn KeyValueStore>,
}

impl ReturnFlow {
    #[must_use]
    pub fn new(api: ApiClient, navigator: Navigator, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                navigator,
                storage,
            }),
        }
    }

    /// Lines of an order that can still be returned.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` when signed out, or the API failure.
    pub async fn returnable_items(&self, order_id: OrderId) -> Result<Vec<ReturnableItem>> {
        let identity = self
            .inner
            .api
            .session()
            .require(&self.inner.navigator, RETURNS_PATH)?;
        self.inner
            .api
            .returnable_items(order_id, identity.account_id)
            .await
            .map_err(|e| ClientError::from(e).reported("returns.items"))
    }

    /// Open a return session for the chosen lines and store it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty selection or a non-positive quantity,
    /// `Unauthenticated`, or the API/storage failure.
    #[instrument(skip_all, fields(order_id = %order_id, lines = selections.len()))]
    pub async fn begin(
        &self,
        order_id: OrderId,
        selections: &[ReturnSelection],
    ) -> Result<ReturnCheckoutSession> {
        if selections.is_empty() {
            return Err(ClientError::Validation(
                "Please select at least one item to return.".to_string(),
            ));
        }
        if selections.iter().any(|s| s.quantity <= 0) {
            return Err(ClientError::Validation(
                "Return quantities must be at least 1.".to_string(),
            ));
        }
        let identity = self
            .inner
            .api
            .session()
            .require(&self.inner.navigator, RETURNS_PATH)?;
        add_breadcrumb(
            "returns",
            "Started return",
            Some(&[("order_id", order_id.to_string().as_str())]),
        );

        let request = ReturnCheckoutRequest {
            account_id: identity.account_id,
            order_id,
            selected_items: selections.to_vec(),
        };
        let session = self
            .inner
            .api
            .create_return_checkout(&request)
            .await
            .map_err(|e| ClientError::from(e).reported("returns.begin"))?;

        save_json(self.inner.storage.as_ref(), RETURN_SESSION_KEY, &session)?;
        debug!(session = %session.return_checkout_session_id, "Return session stored");
        Ok(session)
    }

    /// The stored session, if one is in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or holds invalid JSON.
    pub fn current(&self) -> Result<Option<ReturnCheckoutSession>> {
        Ok(load_json(self.inner.storage.as_ref(), RETURN_SESSION_KEY)?)
    }

    /// Validate and submit the return, consuming the stored session.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveSession` when nothing is in progress (including after
    /// a successful submit), `Validation` for bad fields, `Unauthenticated`,
    /// or the API failure. The session survives every failure.
    #[instrument(skip_all, fields(option = submission.return_option.as_str(), media = submission.media.len()))]
    pub async fn submit(&self, submission: &ReturnSubmission) -> Result<()> {
        let session = self
            .current()?
            .ok_or(ClientError::NoActiveSession("return"))?;
        let email = validate(&session, submission)?;
        self.inner
            .api
            .session()
            .require(&self.inner.navigator, RETURNS_PATH)?;
        add_breadcrumb(
            "returns",
            "Submitted return",
            Some(&[("refund_method", submission.refund_method.as_str())]),
        );

        self.inner
            .api
            .submit_return_request(&session.return_checkout_session_id, &email, submission)
            .await
            .map_err(|e| ClientError::from(e).reported("returns.submit"))?;

        if let Err(e) = self.inner.storage.remove(RETURN_SESSION_KEY) {
            warn!(error = %e, "Return submitted but session could not be cleared");
        }
        info!(order_id = %session.order_id, "Return request submitted");
        self.inner.navigator.go(Navigation::ReturnConfirmation);
        Ok(())
    }

    /// Forget the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn abandon(&self) -> Result<()> {
        self.inner.storage.remove(RETURN_SESSION_KEY)?;
        Ok(())
    }
}

fn validate(session: &ReturnCheckoutSession, submission: &ReturnSubmission) -> Result<Email> {
    let email = Email::parse(&submission.email)
        .map_err(|e| ClientError::Validation(e.to_string()))?;

    if submission.return_reason.trim().is_empty() {
        return Err(ClientError::Validation(
            "Please tell us why you are returning these items.".to_string(),
        ));
    }

    if !session.refund_methods.is_empty()
        && !session.refund_methods.contains(&submission.refund_method)
    {
        return Err(ClientError::Validation(
            "This refund method is not available for this order.".to_string(),
        ));
    }

    if submission.refund_method.needs_bank_details() {
        let blank = |field: &Option<String>| field.as_deref().is_none_or(|v| v.trim().is_empty());
        if blank(&submission.bank_name)
            || blank(&submission.bank_account_number)
            || blank(&submission.bank_account_name)
        {
            return Err(ClientError::Validation(
                "Please enter your bank name, account number and account holder.".to_string(),
            ));
        }
    }

    Ok(email)
}

impl std::fmt::Debug for ReturnFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReturnFlow").finish_non_exhaustive()
    }
}
