//! Session identity and authorization.
//!
//! [`SessionStore`] is the only writer of the `{token, accountId, userName}`
//! triple. Components never cache it: they call [`SessionStore::current`] at
//! the point of use, because another context may sign out at any moment.
//!
//! Values are kept under the same keys the browser uses for its cookies,
//! plus an expiry stamp that emulates the cookie max-age.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use shoplink_core::AccountId;

use crate::error::{ClientError, clear_sentry_user, set_sentry_user};
use crate::navigation::{Navigation, Navigator};
use crate::storage::{KeyValueStore, StorageError};

/// Storage keys for the session triple.
pub mod keys {
    /// Bearer credential.
    pub const TOKEN: &str = "token";
    /// Numeric account id.
    pub const ACCOUNT_ID: &str = "accountId";
    /// Display name.
    pub const USER_NAME: &str = "userName";
    /// RFC 3339 instant after which the triple is ignored.
    pub const EXPIRES_AT: &str = "sessionExpiresAt";
}

/// The signed-in identity.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct SessionIdentity {
    pub token: SecretString,
    pub account_id: AccountId,
    pub user_name: String,
}

impl SessionIdentity {
    /// Build an identity from login response fields.
    #[must_use]
    pub fn new(token: impl Into<String>, account_id: AccountId, user_name: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            account_id,
            user_name: user_name.into(),
        }
    }
}

impl std::fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("token", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("user_name", &self.user_name)
            .finish()
    }
}

/// Reads and writes the session identity.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    ttl: chrono::Duration,
}

impl SessionStore {
    /// Create a session store over shared storage.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, ttl: chrono::Duration) -> Self {
        Self { storage, ttl }
    }

    /// Persist a freshly signed-in identity with a full expiry window.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn sign_in(&self, identity: &SessionIdentity) -> Result<(), StorageError> {
        let expires_at = Utc::now() + self.ttl;
        self.storage
            .set(keys::TOKEN, identity.token.expose_secret())?;
        self.storage
            .set(keys::ACCOUNT_ID, &identity.account_id.to_string())?;
        self.storage.set(keys::USER_NAME, &identity.user_name)?;
        self.storage
            .set(keys::EXPIRES_AT, &expires_at.to_rfc3339())?;

        set_sentry_user(&identity.account_id, &identity.user_name);
        info!(account_id = %identity.account_id, %expires_at, "Signed in");
        Ok(())
    }

    /// Delete the whole triple.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn sign_out(&self) -> Result<(), StorageError> {
        for key in [keys::TOKEN, keys::ACCOUNT_ID, keys::USER_NAME, keys::EXPIRES_AT] {
            self.storage.remove(key)?;
        }
        clear_sentry_user();
        info!("Signed out");
        Ok(())
    }

    /// The current identity, or `None` when anonymous or expired.
    ///
    /// Storage failures and malformed values are treated as anonymous.
    #[must_use]
    pub fn current(&self) -> Option<SessionIdentity> {
        match self.read() {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Session storage unreadable, treating as anonymous");
                None
            }
        }
    }

    /// The current bearer token, if signed in.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.current().map(|identity| identity.token)
    }

    /// The current account id, if signed in.
    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        self.current().map(|identity| identity.account_id)
    }

    /// Whether a valid session exists.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// The current identity, or redirect to login.
    ///
    /// On failure the navigator is sent to the login view with `return_to`
    /// preserved, and `ClientError::Unauthenticated` is returned so the caller
    /// skips its API call.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Unauthenticated` when no valid session exists.
    pub fn require(
        &self,
        navigator: &Navigator,
        return_to: &str,
    ) -> Result<SessionIdentity, ClientError> {
        self.current().ok_or_else(|| {
            debug!(return_to, "Unauthenticated, redirecting to login");
            navigator.go(Navigation::login_returning_to(return_to));
            ClientError::Unauthenticated
        })
    }

    fn read(&self) -> Result<Option<SessionIdentity>, StorageError> {
        let Some(token) = self.storage.get(keys::TOKEN)?.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let expires_at = self
            .storage
            .get(keys::EXPIRES_AT)?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|at| at.with_timezone(&Utc));
        if expires_at.is_none_or(|at| at <= Utc::now()) {
            debug!("Session expired");
            return Ok(None);
        }

        let Some(account_id) = self
            .storage
            .get(keys::ACCOUNT_ID)?
            .and_then(|raw| raw.parse::<AccountId>().ok())
        else {
            return Ok(None);
        };
        let user_name = self.storage.get(keys::USER_NAME)?.unwrap_or_default();

        Ok(Some(SessionIdentity {
            token: SecretString::from(token),
            account_id,
            user_name,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (Arc<MemoryStore>, SessionStore) {
        let storage = Arc::new(MemoryStore::new());
        let session = SessionStore::new(storage.clone(), chrono::Duration::hours(24));
        (storage, session)
    }

    #[test]
    fn test_sign_in_then_out() {
        let (storage, session) = store();
        assert!(!session.is_authenticated());

        session
            .sign_in(&SessionIdentity::new("tok-123", AccountId::new(7), "An Nguyen"))
            .unwrap();
        let identity = session.current().unwrap();
        assert_eq!(identity.account_id, AccountId::new(7));
        assert_eq!(identity.user_name, "An Nguyen");
        assert_eq!(identity.token.expose_secret(), "tok-123");
        assert_eq!(storage.get(keys::ACCOUNT_ID).unwrap().as_deref(), Some("7"));

        session.sign_out().unwrap();
        assert!(session.current().is_none());
        assert_eq!(storage.get(keys::TOKEN).unwrap(), None);
    }

    #[test]
    fn test_expired_session_is_anonymous() {
        let (storage, session) = store();
        session
            .sign_in(&SessionIdentity::new("tok", AccountId::new(1), "A"))
            .unwrap();
        let past = (Utc::now() - chrono::Duration::minutes(1)).to_rfc3339();
        storage.set(keys::EXPIRES_AT, &past).unwrap();
        assert!(session.token().is_none());
    }

    #[test]
    fn test_missing_token_is_anonymous_even_with_account() {
        let (storage, session) = store();
        storage.set(keys::ACCOUNT_ID, "7").unwrap();
        assert!(session.account_id().is_none());
    }

    #[test]
    fn test_require_redirects_to_login() {
        let (_storage, session) = store();
        let navigator = Navigator::new();
        let err = session.require(&navigator, "/cart").unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
        assert_eq!(navigator.current(), Navigation::login_returning_to("/cart"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let identity = SessionIdentity::new("super-secret-token", AccountId::new(3), "B");
        let debug = format!("{identity:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-token"));
    }
}
