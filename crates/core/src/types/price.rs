//! Monetary amounts using decimal arithmetic.
//!
//! The backend sends prices as bare JSON numbers (e.g. `100000` for
//! 100.000 VND). [`Price`] keeps them as [`Decimal`] so subtotals never pick
//! up floating point drift, while still serializing back as numbers.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-negative amount in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of currency units.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Price multiplied by a line quantity. Negative quantities count as zero.
    #[must_use]
    pub fn times(self, quantity: i32) -> Self {
        Self(self.0 * Decimal::from(quantity.max(0)))
    }

    /// Format for display in the given currency (e.g. `250.000 ₫`).
    #[must_use]
    pub fn display(&self, currency: CurrencyCode) -> String {
        let rounded = self.0.round_dp(currency.minor_units());
        let text = rounded.to_string();
        let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
        let grouped = group_thousands(whole, currency.group_separator());
        if fraction.is_empty() {
            format!("{grouped} {}", currency.symbol())
        } else {
            format!("{grouped}{}{fraction} {}", currency.decimal_separator(), currency.symbol())
        }
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<i32> for Price {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        self.times(rhs)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currencies the storefront can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    VND,
    USD,
}

impl CurrencyCode {
    const fn minor_units(self) -> u32 {
        match self {
            Self::VND => 0,
            Self::USD => 2,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::VND => "₫",
            Self::USD => "$",
        }
    }

    const fn group_separator(self) -> char {
        match self {
            Self::VND => '.',
            Self::USD => ',',
        }
    }

    const fn decimal_separator(self) -> char {
        match self {
            Self::VND => ',',
            Self::USD => '.',
        }
    }
}

fn group_thousands(whole: &str, separator: char) -> String {
    let (sign, digits) = whole
        .strip_prefix('-')
        .map_or(("", whole), |rest| ("-", rest));
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    format!("{sign}{out}")
}
