//! Profile, preferred style and shipping address endpoints.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shoplink_core::{AccountId, AddressId, Email, StyleId};

use super::{ApiClient, ApiError, required};

/// A saved delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub address_id: AddressId,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub address: String,
    #[serde(default)]
    pub ward: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub is_default: bool,
}

impl ShippingAddress {
    /// One-line form for display.
    #[must_use]
    pub fn one_line(&self) -> String {
        [&self.address, &self.ward, &self.district, &self.city]
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Fields for creating or replacing a shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub account_id: AccountId,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub address: String,
    pub ward: String,
    pub district: String,
    pub city: String,
    pub is_default: bool,
}

/// Customer profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    #[serde(default)]
    pub account_id: Option<AccountId>,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Body of `PUT customer/profile-edit/{accountId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: String,
    pub email: Email,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
}

/// A style the customer likes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredStyle {
    pub style_id: StyleId,
    pub style_name: String,
    #[serde(default)]
    pub is_selected: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreferredStylesUpdate<'a> {
    style_ids: &'a [StyleId],
}

impl ApiClient {
    // =========================================================================
    // Profile
    // =========================================================================

    /// Fetch the customer profile.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, is rejected, or carries no profile.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn profile(&self, account_id: AccountId) -> Result<CustomerProfile, ApiError> {
        let url = self.url(&format!("customer/profile/{account_id}"))?;
        let profile = self.send_enveloped(self.request(Method::GET, url)).await?;
        required(profile, "profile")
    }

    /// Replace the editable profile fields.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn update_profile(
        &self,
        account_id: AccountId,
        update: &ProfileUpdate,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("customer/profile-edit/{account_id}"))?;
        self.send_unit(self.request(Method::PUT, url).json(update))
            .await
    }

    // =========================================================================
    // Preferred styles
    // =========================================================================

    /// Fetch the styles offered, flagged with the customer's choices.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn preferred_styles(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<PreferredStyle>, ApiError> {
        let url = self.url(&format!("customer/preferred-styles/{account_id}"))?;
        let styles: Option<Vec<PreferredStyle>> =
            self.send_enveloped(self.request(Method::GET, url)).await?;
        Ok(styles.unwrap_or_default())
    }

    /// Replace the customer's chosen styles.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id, count = style_ids.len()))]
    pub async fn replace_preferred_styles(
        &self,
        account_id: AccountId,
        style_ids: &[StyleId],
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("customer/preferred-styles/{account_id}"))?;
        let body = PreferredStylesUpdate { style_ids };
        self.send_unit(self.request(Method::PUT, url).json(&body))
            .await
    }

    // =========================================================================
    // Shipping addresses
    // =========================================================================

    /// List the account's saved addresses.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn shipping_addresses(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<ShippingAddress>, ApiError> {
        let url = self.url(&format!("shippingaddresses/account/{account_id}"))?;
        let addresses: Option<Vec<ShippingAddress>> =
            self.send_enveloped(self.request(Method::GET, url)).await?;
        Ok(addresses.unwrap_or_default())
    }

    /// Create an address. Returns the stored address when the server echoes it.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(account_id = %input.account_id))]
    pub async fn create_shipping_address(
        &self,
        input: &AddressInput,
    ) -> Result<Option<ShippingAddress>, ApiError> {
        let url = self.url("shippingaddresses")?;
        self.send_enveloped(self.request(Method::POST, url).json(input))
            .await
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(address_id = %address_id))]
    pub async fn update_shipping_address(
        &self,
        address_id: AddressId,
        input: &AddressInput,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("shippingaddresses/{address_id}"))?;
        self.send_unit(self.request(Method::PUT, url).json(input))
            .await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip_all, fields(address_id = %address_id))]
    pub async fn delete_shipping_address(&self, address_id: AddressId) -> Result<(), ApiError> {
        let url = self.url(&format!("shippingaddresses/{address_id}"))?;
        self.send_unit(self.request(Method::DELETE, url)).await
    }
}
