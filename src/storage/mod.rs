//! Session persistence
//!
//! Tokens, the signed-in user and the demo flag live in a small string-only
//! key-value store. `KeyValueStore` is the seam: the CLI persists to a JSON
//! file, tests and one-off clients use `MemoryStore`.

mod file;
mod memory;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::data::User;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage key for the short-lived bearer token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the long-lived refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the serialized user profile
pub const USER_KEY: &str = "user";
/// Storage key for the demo-mode flag (`"true"` when active)
pub const IS_DEMO_KEY: &str = "is_demo";

/// Errors raised while persisting session values
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not a JSON object of strings
    #[error("session storage is corrupt: {0}")]
    Format(#[from] serde_json::Error),
}

/// Synchronous string key-value persistence
pub trait KeyValueStore: Send + Sync {
    /// Returns the value for `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed view over the session keys of a `KeyValueStore`
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("has_access_token", &self.access_token().is_some())
            .field("has_refresh_token", &self.refresh_token().is_some())
            .field("is_demo", &self.is_demo())
            .finish()
    }
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// A session backed by a fresh `MemoryStore`
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Current access token; an empty string counts as absent
    pub fn access_token(&self) -> Option<String> {
        self.store.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Current refresh token; an empty string counts as absent
    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.store.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StorageError> {
        self.store.set(ACCESS_TOKEN_KEY, access)?;
        self.store.set(REFRESH_TOKEN_KEY, refresh)
    }

    /// Removes both tokens, leaving the user profile and demo flag alone
    ///
    /// Both removals are attempted even if the first fails; the first error
    /// is returned.
    pub fn clear_tokens(&self) -> Result<(), StorageError> {
        self.remove_all(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
    }

    /// The stored user profile, if present and well-formed
    pub fn user(&self) -> Option<User> {
        let raw = self.store.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "ignoring unreadable stored user");
                None
            }
        }
    }

    pub fn set_user(&self, user: &User) -> Result<(), StorageError> {
        let raw = serde_json::to_string(user)?;
        self.store.set(USER_KEY, &raw)
    }

    /// True only when the flag holds the exact string `"true"`
    pub fn is_demo(&self) -> bool {
        self.store.get(IS_DEMO_KEY).as_deref() == Some("true")
    }

    pub fn set_demo(&self, demo: bool) -> Result<(), StorageError> {
        if demo {
            self.store.set(IS_DEMO_KEY, "true")
        } else {
            self.store.remove(IS_DEMO_KEY)
        }
    }

    /// Removes every session key (full logout)
    pub fn clear_all(&self) -> Result<(), StorageError> {
        self.remove_all(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, IS_DEMO_KEY])
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.store.remove(key) {
                debug!(key = *key, error = %e, "failed to remove session key");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Direct access to the underlying store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testing::LockedKeysStore;

    fn sample_user() -> User {
        User {
            id: "42".to_string(),
            email: "analyst@example.com".to_string(),
            subscription_tier: "pro".to_string(),
            created_at: None,
            mfa_enabled: false,
        }
    }

    #[test]
    fn test_empty_tokens_count_as_absent() {
        let session = Session::in_memory();
        session.set_tokens("", "").unwrap();

        assert!(session.access_token().is_none());
        assert!(session.refresh_token().is_none());
    }

    #[test]
    fn test_clear_tokens_keeps_user() {
        let session = Session::in_memory();
        session.set_tokens("access", "refresh").unwrap();
        session.set_user(&sample_user()).unwrap();

        session.clear_tokens().unwrap();

        assert!(session.access_token().is_none());
        assert!(session.refresh_token().is_none());
        assert_eq!(session.user(), Some(sample_user()));
    }

    #[test]
    fn test_is_demo_requires_exact_true() {
        let session = Session::in_memory();
        assert!(!session.is_demo());

        session.store().set(IS_DEMO_KEY, "yes").unwrap();
        assert!(!session.is_demo());

        session.set_demo(true).unwrap();
        assert!(session.is_demo());

        session.set_demo(false).unwrap();
        assert!(session.store().get(IS_DEMO_KEY).is_none());
    }

    #[test]
    fn test_clear_all_removes_every_key() {
        let session = Session::in_memory();
        session.set_tokens("a", "r").unwrap();
        session.set_user(&sample_user()).unwrap();
        session.set_demo(true).unwrap();

        session.clear_all().unwrap();

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, IS_DEMO_KEY] {
            assert!(session.store().get(key).is_none(), "{} should be removed", key);
        }
    }

    #[test]
    fn test_corrupt_user_is_ignored() {
        let session = Session::in_memory();
        session.store().set(USER_KEY, "not json").unwrap();
        assert!(session.user().is_none());
    }

    #[test]
    fn test_clear_tokens_removes_refresh_even_if_access_fails() {
        let store = LockedKeysStore::new(&[ACCESS_TOKEN_KEY]);
        store.inner.set(ACCESS_TOKEN_KEY, "a").unwrap();
        store.inner.set(REFRESH_TOKEN_KEY, "r").unwrap();
        let session = Session::new(Arc::new(store));

        let err = session.clear_tokens().unwrap_err();

        assert!(matches!(err, StorageError::Io(_)));
        assert!(session.refresh_token().is_none());
        assert_eq!(session.access_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_clear_all_continues_past_failures() {
        let store = LockedKeysStore::new(&[REFRESH_TOKEN_KEY]);
        store.inner.set(ACCESS_TOKEN_KEY, "a").unwrap();
        store.inner.set(REFRESH_TOKEN_KEY, "r").unwrap();
        store.inner.set(IS_DEMO_KEY, "true").unwrap();
        let session = Session::new(Arc::new(store));

        assert!(session.clear_all().is_err());
        assert!(session.access_token().is_none());
        assert!(!session.is_demo());
    }
}
