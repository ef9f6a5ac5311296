//! Cart line items.

use serde::{Deserialize, Serialize};

use crate::types::id::{ProductId, VariantId};
use crate::types::price::Price;

/// One product-variant selection in a cart.
///
/// `product_variant_id` is unique within a cart. `is_selected` is a purely
/// local checkbox state: it is never sent to or read from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_variant_id: VariantId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub product_name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub color: String,
    pub quantity: i32,
    pub unit_price: Price,
    #[serde(default)]
    pub discounted_price: Option<Price>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(skip)]
    pub is_selected: bool,
}

impl CartItem {
    /// Price charged per unit: the discounted price when there is one.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        self.discounted_price
            .filter(Price::is_positive)
            .unwrap_or(self.unit_price)
    }

    /// Effective price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.effective_price() * self.quantity
    }
}

/// Sum of line totals.
#[must_use]
pub fn subtotal<'a>(items: impl IntoIterator<Item = &'a CartItem>) -> Price {
    items.into_iter().map(CartItem::line_total).sum()
}
