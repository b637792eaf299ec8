//! Store doubles for unit tests

use std::io::{Error, ErrorKind};

use super::{KeyValueStore, MemoryStore, StorageError};

/// A `MemoryStore` whose writes to the listed keys fail
///
/// Reads still work, so values seeded through `inner` stay visible.
#[derive(Debug, Default)]
pub(crate) struct LockedKeysStore {
    pub inner: MemoryStore,
    locked: Vec<&'static str>,
}

impl LockedKeysStore {
    pub fn new(locked: &[&'static str]) -> Self {
        Self {
            inner: MemoryStore::new(),
            locked: locked.to_vec(),
        }
    }

    fn check(&self, key: &str) -> Result<(), StorageError> {
        if self.locked.iter().any(|locked| *locked == key) {
            return Err(Error::new(ErrorKind::PermissionDenied, format!("{} is read-only", key)).into());
        }
        Ok(())
    }
}

impl KeyValueStore for LockedKeysStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check(key)?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check(key)?;
        self.inner.remove(key)
    }
}
