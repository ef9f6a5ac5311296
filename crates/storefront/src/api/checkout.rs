//! Checkout and order endpoints.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shoplink_core::{
    AccountId, AddressId, CartItem, OrderId, OrderItemId, OrderStatus, PaymentMethod, Price,
    StoreId, VariantId,
};

use super::{ApiClient, ApiError, ShippingAddress, required};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutRequest<'a> {
    account_id: AccountId,
    selected_product_variant_ids: &'a [VariantId],
}

/// Server-issued checkout session.
///
/// Returned bare by `POST checkout`, not wrapped in an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub check_out_session_id: String,
    #[serde(default)]
    pub selected_items: Vec<CartItem>,
    #[serde(default)]
    pub shipping_addresses: Vec<ShippingAddress>,
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethod>,
    pub sub_total: Price,
    #[serde(default)]
    pub shipping_cost: Price,
}

impl CheckoutSession {
    /// Subtotal plus shipping.
    #[must_use]
    pub fn total(&self) -> Price {
        self.sub_total + self.shipping_cost
    }

    /// The address marked default, else the first one.
    #[must_use]
    pub fn default_address(&self) -> Option<&ShippingAddress> {
        self.shipping_addresses
            .iter()
            .find(|a| a.is_default)
            .or_else(|| self.shipping_addresses.first())
    }
}

/// Body of `POST orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub account_id: AccountId,
    pub check_out_session_id: String,
    pub shipping_address_id: AddressId,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<StoreId>,
}

/// Result of placing an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub payment_url: Option<String>,
}

/// One row of the order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub total_amount: Price,
    #[serde(default)]
    pub order_date: Option<String>,
    #[serde(default)]
    pub item_count: Option<i32>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// One purchased line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub order_item_id: OrderItemId,
    #[serde(default)]
    pub product_variant_id: Option<VariantId>,
    pub product_name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub color: String,
    pub quantity: i32,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Full order with lines and delivery details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub order_id: OrderId,
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub sub_total: Price,
    #[serde(default)]
    pub shipping_cost: Price,
    pub total_amount: Price,
    #[serde(default)]
    pub order_date: Option<String>,
}

impl ApiClient {
    /// Open a checkout session for the selected cart lines.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the session cannot be decoded.
    #[instrument(skip_all, fields(account_id = %account_id, lines = variant_ids.len()))]
    pub async fn create_checkout(
        &self,
        account_id: AccountId,
        variant_ids: &[VariantId],
    ) -> Result<CheckoutSession, ApiError> {
        let url = self.url("checkout")?;
        let body = CheckoutRequest {
            account_id,
            selected_product_variant_ids: variant_ids,
        };
        self.send_raw(self.request(Method::POST, url).json(&body))
            .await
    }

    /// Place an order from a checkout session.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(
        account_id = %request.account_id,
        session = %request.check_out_session_id,
        payment_method = %request.payment_method,
    ))]
    pub async fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, ApiError> {
        let url = self.url("orders")?;
        let response: Option<PlaceOrderResponse> = self
            .send_enveloped(self.request(Method::POST, url).json(request))
            .await?;
        Ok(response.unwrap_or_default())
    }

    /// List orders, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id, status = ?status))]
    pub async fn list_orders(
        &self,
        account_id: AccountId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderSummary>, ApiError> {
        let mut url = self.url("orders")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("accountId", &account_id.to_string());
            if let Some(status) = status {
                query.append_pair("status", status.as_str());
            }
        }
        let orders: Option<Vec<OrderSummary>> =
            self.send_enveloped(self.request(Method::GET, url)).await?;
        Ok(orders.unwrap_or_default())
    }

    /// Fetch one order with its lines.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, is rejected, or carries no order.
    #[instrument(skip_all, fields(order_id = %order_id))]
    pub async fn order_details(&self, order_id: OrderId) -> Result<OrderDetails, ApiError> {
        let url = self.url(&format!("orders/{order_id}/details"))?;
        let details = self.send_enveloped(self.request(Method::GET, url)).await?;
        required(details, "order details")
    }
}
