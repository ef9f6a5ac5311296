//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPLINK_API_BASE_URL` - Base URL of the storefront REST API
//!
//! ## Optional
//! - `SHOPLINK_NOTIFICATIONS_BASE_URL` - Base URL for the notification history
//!   endpoint (default: origin of the API base URL)
//! - `SHOPLINK_NOTIFICATION_HUB_URL` - Notification hub (default: `{origin}/notificationHub`)
//! - `SHOPLINK_CHAT_HUB_URL` - Chat bot hub (default: `{origin}/chatHub`)
//! - `SHOPLINK_RECONNECT_DELAY_SECS` - Push reconnect backoff (default: 5)
//! - `SHOPLINK_TOAST_TTL_SECS` - Lifetime of toast notifications (default: 60)
//! - `SHOPLINK_SESSION_TTL_HOURS` - Session cookie lifetime (default: 24)
//! - `SHOPLINK_REQUEST_TIMEOUT_SECS` - REST request timeout (default: 30)
//! - `SHOPLINK_STATE_DIR` - Directory for persisted session/checkout state
//!   (default: in-memory only)
//! - `SHOPLINK_TAB_CHANNEL` - Name of the cross-tab channel (default: shoplink)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API (always ends with `/`)
    pub api_base_url: Url,
    /// Base URL the notification history path is resolved against
    pub notifications_base_url: Url,
    /// Notification push hub endpoint
    pub notification_hub_url: Url,
    /// Chat bot push hub endpoint
    pub chat_hub_url: Url,
    /// Fixed delay between push connection attempts
    pub reconnect_delay: Duration,
    /// How long a toast notification stays in the transient list
    pub toast_ttl: Duration,
    /// Lifetime of a signed-in session
    pub session_ttl: chrono::Duration,
    /// Timeout for a single REST request
    pub request_timeout: Duration,
    /// Directory for persisted state, in-memory when `None`
    pub state_dir: Option<PathBuf>,
    /// Name of the cross-tab channel
    pub tab_channel: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Lookup(lookup);

        let api_base_url = with_trailing_slash(env.required_url("SHOPLINK_API_BASE_URL")?);
        let origin = origin_of(&api_base_url);

        let notifications_base_url = env
            .optional_url("SHOPLINK_NOTIFICATIONS_BASE_URL")?
            .map_or_else(|| origin.clone(), with_trailing_slash);
        let notification_hub_url = match env.optional_url("SHOPLINK_NOTIFICATION_HUB_URL")? {
            Some(url) => url,
            None => join_or_invalid(&origin, "notificationHub", "SHOPLINK_NOTIFICATION_HUB_URL")?,
        };
        let chat_hub_url = match env.optional_url("SHOPLINK_CHAT_HUB_URL")? {
            Some(url) => url,
            None => join_or_invalid(&origin, "chatHub", "SHOPLINK_CHAT_HUB_URL")?,
        };

        let reconnect_delay =
            Duration::from_secs(env.parsed_or("SHOPLINK_RECONNECT_DELAY_SECS", 5_u64)?);
        let toast_ttl = Duration::from_secs(env.parsed_or("SHOPLINK_TOAST_TTL_SECS", 60_u64)?);
        let session_ttl = chrono::Duration::hours(env.parsed_or("SHOPLINK_SESSION_TTL_HOURS", 24_i64)?);
        let request_timeout =
            Duration::from_secs(env.parsed_or("SHOPLINK_REQUEST_TIMEOUT_SECS", 30_u64)?);

        Ok(Self {
            api_base_url,
            notifications_base_url,
            notification_hub_url,
            chat_hub_url,
            reconnect_delay,
            toast_ttl,
            session_ttl,
            request_timeout,
            state_dir: env.optional("SHOPLINK_STATE_DIR").map(PathBuf::from),
            tab_channel: env.or_default("SHOPLINK_TAB_CHANNEL", "shoplink"),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration pointing every endpoint at one base URL, with defaults
    /// for everything else. Used by tests and local tooling.
    #[must_use]
    pub fn for_base_url(api_base_url: Url) -> Self {
        let api_base_url = with_trailing_slash(api_base_url);
        let origin = origin_of(&api_base_url);
        Self {
            notifications_base_url: origin.clone(),
            notification_hub_url: origin.join("notificationHub").unwrap_or_else(|_| origin.clone()),
            chat_hub_url: origin.join("chatHub").unwrap_or_else(|_| origin.clone()),
            api_base_url,
            reconnect_delay: Duration::from_secs(5),
            toast_ttl: Duration::from_secs(60),
            session_ttl: chrono::Duration::hours(24),
            request_timeout: Duration::from_secs(30),
            state_dir: None,
            tab_channel: "shoplink".to_string(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Lookup<F>(F);

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn required_url(&self, key: &str) -> Result<Url, ConfigError> {
        let raw = self
            .optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
        parse_url(key, &raw)
    }

    fn optional_url(&self, key: &str) -> Result<Option<Url>, ConfigError> {
        self.optional(key).map(|raw| parse_url(key, &raw)).transpose()
    }

    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn join_or_invalid(base: &Url, path: &str, key: &str) -> Result<Url, ConfigError> {
    base.join(path)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Relative joins only append to a base whose path ends with `/`.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn origin_of(url: &Url) -> Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}
