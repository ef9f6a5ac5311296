//! Account pages: orders, profile, preferred styles and shipping addresses.
//!
//! Thin session-checked wrappers over the API. Every call re-reads the
//! session so a logout in another context takes effect immediately.

use tracing::instrument;

use shoplink_core::{AccountId, AddressId, OrderId, OrderStatus, StyleId};

use crate::api::{
    AddressInput, ApiClient, CustomerProfile, OrderDetails, OrderSummary, PreferredStyle,
    ProfileUpdate, ShippingAddress,
};
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::navigation::Navigator;

const ACCOUNT_PATH: &str = "/account";

#[derive(Debug, Clone)]
pub struct AccountService {
    api: ApiClient,
    navigator: Navigator,
}

impl AccountService {
    #[must_use]
    pub const fn new(api: ApiClient, navigator: Navigator) -> Self {
        Self { api, navigator }
    }

    fn account(&self) -> Result<AccountId> {
        Ok(self
            .api
            .session()
            .require(&self.navigator, ACCOUNT_PATH)?
            .account_id)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Order history, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` when signed out, or the API failure.
    pub async fn orders(&self, status: Option<OrderStatus>) -> Result<Vec<OrderSummary>> {
        let account_id = self.account()?;
        self.api
            .list_orders(account_id, status)
            .await
            .map_err(|e| ClientError::from(e).reported("account.orders"))
    }

    /// One order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` when signed out, or the API failure.
    pub async fn order_details(&self, order_id: OrderId) -> Result<OrderDetails> {
        self.account()?;
        self.api
            .order_details(order_id)
            .await
            .map_err(|e| ClientError::from(e).reported("account.order_details"))
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// # Errors
    ///
    /// Returns `Unauthenticated` when signed out, or the API failure.
    pub async fn profile(&self) -> Result<CustomerProfile> {
        let account_id = self.account()?;
        self.api
            .profile(account_id)
            .await
            .map_err(|e| ClientError::from(e).reported("account.profile"))
    }

    /// Save profile edits.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank name, `Unauthenticated`, or the API
    /// failure.
    #[instrument(skip_all)]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<()> {
        if update.full_name.trim().is_empty() {
            return Err(ClientError::Validation("Please enter your full name.".to_string()));
        }
        let account_id = self.account()?;
        add_breadcrumb("account", "Updated profile", None);
        self.api
            .update_profile(account_id, update)
            .await
            .map_err(|e| ClientError::from(e).reported("account.update_profile"))
    }

    // =========================================================================
    // Preferred styles
    // =========================================================================

    /// # Errors
    ///
    /// Returns `Unauthenticated` when signed out, or the API failure.
    pub async fn preferred_styles(&self) -> Result<Vec<PreferredStyle>> {
        let account_id = self.account()?;
        self.api
            .preferred_styles(account_id)
            .await
            .map_err(|e| ClientError::from(e).reported("account.styles"))
    }

    /// Replace the chosen styles with `style_ids`.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` when signed out, or the API failure.
    pub async fn replace_preferred_styles(&self, style_ids: &[StyleId]) -> Result<()> {
        let account_id = self.account()?;
        add_breadcrumb("account", "Changed preferred styles", None);
        self.api
            .replace_preferred_styles(account_id, style_ids)
            .await
            .map_err(|e| ClientError::from(e).reported("account.replace_styles"))
    }

    // =========================================================================
    // Shipping addresses
    // =========================================================================

    /// # Errors
    ///
    /// Returns `Unauthenticated` when signed out, or the API failure.
    pub async fn shipping_addresses(&self) -> Result<Vec<ShippingAddress>> {
        let account_id = self.account()?;
        self.api
            .shipping_addresses(account_id)
            .await
            .map_err(|e| ClientError::from(e).reported("account.addresses"))
    }

    /// Save a new address for the signed-in account.
    ///
    /// `input.account_id` is overwritten with the session's account.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for missing recipient or street fields,
    /// `Unauthenticated`, or the API failure.
    pub async fn create_shipping_address(
        &self,
        mut input: AddressInput,
    ) -> Result<Option<ShippingAddress>> {
        validate_address(&input)?;
        input.account_id = self.account()?;
        add_breadcrumb("account", "Added shipping address", None);
        self.api
            .create_shipping_address(&input)
            .await
            .map_err(|e| ClientError::from(e).reported("account.create_address"))
    }

    /// # Errors
    ///
    /// Returns `Validation`, `Unauthenticated`, or the API failure.
    pub async fn update_shipping_address(
        &self,
        address_id: AddressId,
        mut input: AddressInput,
    ) -> Result<()> {
        validate_address(&input)?;
        input.account_id = self.account()?;
        self.api
            .update_shipping_address(address_id, &input)
            .await
            .map_err(|e| ClientError::from(e).reported("account.update_address"))
    }

    /// # Errors
    ///
    /// Returns `Unauthenticated` when signed out, or the API failure.
    pub async fn delete_shipping_address(&self, address_id: AddressId) -> Result<()> {
        self.account()?;
        add_breadcrumb(
            "account",
            "Deleted shipping address",
            Some(&[("address_id", address_id.to_string().as_str())]),
        );
        self.api
            .delete_shipping_address(address_id)
            .await
            .map_err(|e| ClientError::from(e).reported("account.delete_address"))
    }
}

fn validate_address(input: &AddressInput) -> Result<()> {
    let required = [
        &input.recipient_name,
        &input.recipient_phone,
        &input.address,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(ClientError::Validation(
            "Please fill in the recipient, phone number and street address.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::config::ClientConfig;
    use crate::navigation::Navigation;
    use crate::session::{SessionIdentity, SessionStore};
    use crate::storage::MemoryStore;

    fn service(server: &MockServer, signed_in: bool) -> (AccountService, Navigator) {
        let config = ClientConfig::for_base_url(Url::parse(&server.url("/api/")).unwrap());
        let session = SessionStore::new(Arc::new(MemoryStore::new()), config.session_ttl);
        if signed_in {
            session
                .sign_in(&SessionIdentity::new("tok", AccountId::new(7), "An"))
                .unwrap();
        }
        let navigator = Navigator::new();
        (
            AccountService::new(ApiClient::new(&config, session).unwrap(), navigator.clone()),
            navigator,
        )
    }

    fn input() -> AddressInput {
        AddressInput {
            account_id: AccountId::new(0),
            recipient_name: "An".to_string(),
            recipient_phone: "0900000000".to_string(),
            address: "12 Lê Lợi".to_string(),
            ward: "Bến Nghé".to_string(),
            district: "Quận 1".to_string(),
            city: "Hồ Chí Minh".to_string(),
            is_default: true,
        }
    }

    #[tokio::test]
    async fn test_anonymous_calls_redirect_without_request() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;
        let (service, navigator) = service(&server, false);

        assert!(matches!(service.orders(None).await, Err(ClientError::Unauthenticated)));
        assert!(matches!(service.profile().await, Err(ClientError::Unauthenticated)));
        assert!(matches!(
            service.delete_shipping_address(AddressId::new(1)).await,
            Err(ClientError::Unauthenticated)
        ));
        assert_eq!(any.hits_async().await, 0);
        assert_eq!(navigator.current(), Navigation::login_returning_to(ACCOUNT_PATH));
    }

    #[tokio::test]
    async fn test_create_address_uses_session_account() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/shippingaddresses")
                    .json_body_partial(r#"{"accountId": 7, "isDefault": true}"#);
                then.status(200).json_body(json!({"status": true, "message": ""}));
            })
            .await;
        let (service, _) = service(&server, true);

        assert_eq!(service.create_shipping_address(input()).await.unwrap(), None);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_blank_fields_are_rejected_locally() {
        let server = MockServer::start_async().await;
        let (service, _) = service(&server, true);

        let blank = AddressInput {
            recipient_phone: " ".to_string(),
            ..input()
        };
        assert!(matches!(
            service.create_shipping_address(blank).await,
            Err(ClientError::Validation(_))
        ));

        let update = ProfileUpdate {
            full_name: String::new(),
            email: shoplink_core::Email::parse("an@example.com").unwrap(),
            phone_number: None,
            gender: None,
            birthday: None,
        };
        assert!(matches!(
            service.update_profile(&update).await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_orders_filtered_by_status() {
        let server = MockServer::start_async().await;
        let list = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/orders")
                    .query_param("accountId", "7")
                    .query_param("status", "DELIVERED");
                then.status(200).json_body(json!({
                    "data": [{"orderId": 5, "status": "DELIVERED", "totalAmount": 280_000.0}],
                    "status": true,
                    "message": ""
                }));
            })
            .await;
        let (service, _) = service(&server, true);

        let orders = service.orders(Some(OrderStatus::Delivered)).await.unwrap();
        list.assert_async().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders.first().unwrap().order_id, OrderId::new(5));
    }
}
