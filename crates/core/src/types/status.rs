//! Status and method enums shared by orders, checkout and returns.

use serde::{Deserialize, Serialize};

/// Order lifecycle status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipping,
    Delivered,
    Completed,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Wire name used in query strings (`status=DELIVERED`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Shipping => "SHIPPING",
            Self::Delivered => "DELIVERED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Returned => "RETURNED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "SHIPPING" => Ok(Self::Shipping),
            "DELIVERED" => Ok(Self::Delivered),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            "RETURNED" => Ok(Self::Returned),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// How an order is paid.
///
/// `PAYOS` orders come back with an external payment URL the browser must be
/// sent to; `COD` orders go straight to the confirmation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "COD")]
    CashOnDelivery,
    #[serde(rename = "PAYOS")]
    PayOs,
}

impl PaymentMethod {
    /// Whether the method redirects to an external payment page.
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::PayOs)
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "COD",
            Self::PayOs => "PAYOS",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COD" => Ok(Self::CashOnDelivery),
            "PAYOS" => Ok(Self::PayOs),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// How a return is refunded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundMethod {
    BankTransfer,
    StoreCredit,
}

impl RefundMethod {
    /// Whether the refund needs bank account details.
    #[must_use]
    pub const fn needs_bank_details(&self) -> bool {
        matches!(self, Self::BankTransfer)
    }

    /// Wire name used in multipart submissions.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BankTransfer => "BANK_TRANSFER",
            Self::StoreCredit => "STORE_CREDIT",
        }
    }
}

/// What the customer wants in exchange for the returned items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnOption {
    Refund,
    Exchange,
}

impl ReturnOption {
    /// Wire name used in multipart submissions.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Refund => "REFUND",
            Self::Exchange => "EXCHANGE",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap(),
            "\"COD\""
        );
        assert_eq!(
            serde_json::from_str::<PaymentMethod>("\"PAYOS\"").unwrap(),
            PaymentMethod::PayOs
        );
        assert_eq!("cod".parse::<PaymentMethod>().unwrap(), PaymentMethod::CashOnDelivery);
        assert!(PaymentMethod::PayOs.is_redirect());
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!("delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!("lost".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::Cancelled.to_string(), "CANCELLED");
    }
}
