//! Newtype IDs for type-safe entity references.
//!
//! Backend identifiers are plain integers on the wire; the `define_id!` macro
//! wraps them so an account id can never be passed where a variant id is
//! expected.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>`, `Into<i64>`, `Display` and `FromStr`
///
/// # Example
///
/// ```rust
/// use shoplink_core::{AccountId, VariantId};
///
/// let variant = VariantId::new(1);
/// let parsed: AccountId = "42".parse().unwrap();
/// assert_eq!(parsed.as_i64(), 42);
///
/// // These are different types, so this won't compile:
/// // let _: AccountId = variant;
/// # let _ = variant;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Storefront entity IDs
define_id!(AccountId);
define_id!(ProductId);
define_id!(VariantId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(AddressId);
define_id!(StoreId);
define_id!(StyleId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_transparent_on_the_wire() {
        let json = serde_json::to_string(&VariantId::new(17)).unwrap();
        assert_eq!(json, "17");
        let back: AccountId = serde_json::from_str("7").unwrap();
        assert_eq!(back, AccountId::new(7));
    }

    #[test]
    fn test_parse_trims_input() {
        let id: OrderId = " 1024 ".parse().unwrap();
        assert_eq!(i64::from(id), 1024);
        assert!("abc".parse::<OrderId>().is_err());
    }
}
