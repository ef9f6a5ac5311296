//! Cart endpoints.

use reqwest::Method;
use serde::Serialize;
use tracing::instrument;

use shoplink_core::{AccountId, CartItem, Price, ProductId, VariantId};

use super::{ApiClient, ApiError};

/// Body of `POST cart/{accountId}/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub size: String,
    pub color: String,
    pub quantity: i32,
    pub price: Price,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangeQuantityRequest {
    product_variant_id: VariantId,
    quantity_change: i32,
}

impl ApiClient {
    /// Fetch the full cart of an account.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn get_cart(&self, account_id: AccountId) -> Result<Vec<CartItem>, ApiError> {
        let url = self.url(&format!("cart/{account_id}"))?;
        let items: Option<Vec<CartItem>> =
            self.send_enveloped(self.request(Method::GET, url)).await?;
        Ok(items.unwrap_or_default())
    }

    /// Add a product variant to the cart.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id, product_id = %request.product_id))]
    pub async fn add_to_cart(
        &self,
        account_id: AccountId,
        request: &AddToCartRequest,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("cart/{account_id}/add"))?;
        self.send_unit(self.request(Method::POST, url).json(request))
            .await
    }

    /// Change a line's quantity by a signed delta.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id, variant_id = %variant_id, delta = delta))]
    pub async fn change_quantity(
        &self,
        account_id: AccountId,
        variant_id: VariantId,
        delta: i32,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("cart/{account_id}/change-quantity"))?;
        let body = ChangeQuantityRequest {
            product_variant_id: variant_id,
            quantity_change: delta,
        };
        self.send_unit(self.request(Method::POST, url).json(&body))
            .await
    }

    /// Remove one line from the cart.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id, variant_id = %variant_id))]
    pub async fn remove_from_cart(
        &self,
        account_id: AccountId,
        variant_id: VariantId,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("cart/{account_id}/remove/{variant_id}"))?;
        self.send_unit(self.request(Method::DELETE, url)).await
    }

    /// Remove every line from the cart.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn clear_cart(&self, account_id: AccountId) -> Result<(), ApiError> {
        let url = self.url(&format!("cart/{account_id}/clear"))?;
        self.send_unit(self.request(Method::DELETE, url)).await
    }
}
