//! Typed client for the storefront REST API.
//!
//! Every endpoint except checkout creation answers with the envelope
//! `{data, status, message}`. The envelope is validated here, at the
//! boundary, into an [`ApiOutcome`]; components only ever see typed data or
//! an [`ApiError`].
//!
//! Endpoint groups live in submodules, each adding an `impl ApiClient` block.

mod account;
mod cart;
mod checkout;
mod notifications;
mod returns;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::session::SessionStore;

pub use account::{AddressInput, CustomerProfile, PreferredStyle, ProfileUpdate, ShippingAddress};
pub use cart::AddToCartRequest;
pub use checkout::{
    CheckoutSession, OrderDetails, OrderLine, OrderSummary, PlaceOrderRequest, PlaceOrderResponse,
};
pub use returns::{
    MediaAttachment, ReturnCheckoutRequest, ReturnCheckoutSession, ReturnSelection,
    ReturnSubmission, ReturnableItem,
};

/// Longest response body excerpt kept in errors and logs.
const BODY_EXCERPT_CHARS: usize = 500;

/// Errors that can occur when calling the REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status code.
    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },

    /// API answered with `status: false`.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

// =============================================================================
// Envelope
// =============================================================================

/// The `{data, status, message}` wrapper around most responses.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub status: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// A validated envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome<T> {
    Ok { data: T },
    Err { message: String },
}

impl<T> Envelope<T> {
    /// Validate the `status` flag.
    ///
    /// A rejection without a message gets a generic one so the user is never
    /// shown an empty toast.
    #[must_use]
    pub fn into_outcome(self) -> ApiOutcome<Option<T>> {
        if self.status {
            ApiOutcome::Ok { data: self.data }
        } else {
            ApiOutcome::Err {
                message: self
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Request was rejected".to_string()),
            }
        }
    }
}

impl<T> ApiOutcome<T> {
    /// Convert to a `Result`, turning `Err` into [`ApiError::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` with the server message.
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Self::Ok { data } => Ok(data),
            Self::Err { message } => Err(ApiError::Rejected(message)),
        }
    }
}

/// Require a payload that the envelope marked optional.
fn required<T>(data: Option<T>, what: &str) -> Result<T, ApiError> {
    data.ok_or_else(|| ApiError::Decode(format!("missing data in {what} response")))
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront REST API.
///
/// Cheaply cloneable. The bearer token is read from the [`SessionStore`] on
/// every request, never cached.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    notifications_base_url: Url,
    session: SessionStore,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig, session: SessionStore) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("shoplink/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_base_url.clone(),
                notifications_base_url: config.notifications_base_url.clone(),
                session,
            }),
        })
    }

    /// The session whose token authorizes requests.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Resolve a path against the API base URL.
    fn url(&self, path: &str) -> Result<Url, ApiError> {
        join(&self.inner.base_url, path)
    }

    /// Resolve a path against the notifications base URL.
    fn notifications_url(&self, path: &str) -> Result<Url, ApiError> {
        join(&self.inner.notifications_base_url, path)
    }

    /// Start a request with the current bearer token attached, if any.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.inner.client.request(method, url);
        match self.inner.session.token() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and decode the raw (non-enveloped) JSON body.
    async fn send_raw<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();

        // Read the body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let body = excerpt(&body);
            tracing::warn!(%url, status = %status, %body, "API returned non-success status");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                %url,
                error = %e,
                body = %excerpt(&body),
                "Failed to decode API response"
            );
            ApiError::Decode(e.to_string())
        })
    }

    /// Send a request and validate the envelope.
    async fn send_enveloped<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let envelope: Envelope<T> = self.send_raw(request).await?;
        let outcome = envelope.into_outcome();
        if let ApiOutcome::Err { message } = &outcome {
            debug!(%message, "API rejected request");
        }
        outcome.into_result()
    }

    /// Send a request whose envelope carries no useful data.
    async fn send_unit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.send_enveloped::<serde_json::Value>(request)
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("notifications_base_url", &self.inner.notifications_base_url.as_str())
            .finish_non_exhaustive()
    }
}

fn join(base: &Url, path: &str) -> Result<Url, ApiError> {
    base.join(path)
        .map_err(|e| ApiError::InvalidUrl(format!("{base} + {path}: {e}")))
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::session::SessionIdentity;
    use crate::storage::MemoryStore;
    use shoplink_core::AccountId;

    pub(super) fn client_for(server: &MockServer) -> ApiClient {
        let base = Url::parse(&server.url("/api/")).unwrap();
        let config = ClientConfig::for_base_url(base);
        let session = SessionStore::new(Arc::new(MemoryStore::new()), config.session_ttl);
        ApiClient::new(&config, session).unwrap()
    }

    pub(super) fn signed_in_client(server: &MockServer) -> ApiClient {
        let client = client_for(server);
        client
            .session()
            .sign_in(&SessionIdentity::new("tok-7", AccountId::new(7), "An"))
            .unwrap();
        client
    }

    #[test]
    fn test_envelope_rejection_keeps_message() {
        let envelope: Envelope<Vec<i64>> =
            serde_json::from_value(json!({"data": null, "status": false, "message": "Hết hàng"}))
                .unwrap();
        assert_eq!(
            envelope.into_outcome(),
            ApiOutcome::Err {
                message: "Hết hàng".to_string()
            }
        );
    }

    #[test]
    fn test_envelope_rejection_without_message() {
        let envelope: Envelope<()> =
            serde_json::from_value(json!({"status": false, "message": "  "})).unwrap();
        assert!(matches!(
            envelope.into_outcome().into_result(),
            Err(ApiError::Rejected(m)) if m == "Request was rejected"
        ));
    }

    #[test]
    fn test_envelope_success_without_data() {
        let envelope: Envelope<Vec<i64>> =
            serde_json::from_value(json!({"status": true, "message": "ok"})).unwrap();
        assert_eq!(envelope.into_outcome(), ApiOutcome::Ok { data: None });
    }

    #[test]
    fn test_envelope_data_needs_no_default() {
        #[derive(Debug, Deserialize)]
        struct Placed {
            order_id: i64,
        }

        let empty: Envelope<Placed> =
            serde_json::from_value(json!({"status": true})).unwrap();
        assert!(empty.data.is_none());

        let placed: Envelope<Placed> =
            serde_json::from_value(json!({"data": {"order_id": 501}, "status": true})).unwrap();
        assert_eq!(placed.data.unwrap().order_id, 501);
    }

    #[tokio::test]
    async fn test_bearer_token_attached_when_signed_in() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/cart/7")
                    .header("authorization", "Bearer tok-7");
                then.status(200)
                    .json_body(json!({"data": [], "status": true, "message": ""}));
            })
            .await;

        let client = signed_in_client(&server);
        let items = client.get_cart(AccountId::new(7)).await.unwrap();
        assert!(items.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cart/7");
                then.status(503).body("maintenance");
            })
            .await;

        let client = signed_in_client(&server);
        let err = client.get_cart(AccountId::new(7)).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 503, ref body } if body == "maintenance"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cart/7");
                then.status(200).body("<html>oops</html>");
            })
            .await;

        let client = signed_in_client(&server);
        let err = client.get_cart(AccountId::new(7)).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
