//! Signals exchanged between browsing contexts.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// A fire-and-forget cross-tab signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TabSignal {
    /// The session was cleared; every context must drop user state.
    #[serde(rename = "logout")]
    Logout,
    /// The server-side cart changed; every context should re-fetch it.
    #[serde(rename = "cart-updated")]
    CartUpdated,
}

impl TabSignal {
    /// Wire name of the signal.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::CartUpdated => "cart-updated",
        }
    }
}

impl fmt::Display for TabSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signal name that is not `logout` or `cart-updated`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tab signal: {0}")]
pub struct UnknownSignal(pub String);

impl FromStr for TabSignal {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logout" => Ok(Self::Logout),
            "cart-updated" => Ok(Self::CartUpdated),
            other => Err(UnknownSignal(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_display_and_serde() {
        for signal in [TabSignal::Logout, TabSignal::CartUpdated] {
            let json = serde_json::to_string(&signal).unwrap();
            assert_eq!(json, format!("\"{signal}\""));
            assert_eq!(signal.as_str().parse::<TabSignal>().unwrap(), signal);
        }
        assert_eq!(
            "cart_updated".parse::<TabSignal>(),
            Err(UnknownSignal("cart_updated".to_string()))
        );
    }
}
