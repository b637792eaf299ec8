//! In-memory response cache with a fixed time-to-live
//!
//! Provides a `ResponseCache` that maps a request key (path plus a stable query
//! string) to the raw body of a successful GET. Entries are never swept in the
//! background; an entry found to be expired on read is deleted on the spot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use super::clock::{Clock, SystemClock};

/// Default time-to-live for cached responses in minutes
pub const DEFAULT_TTL_MINUTES: i64 = 5;

/// A single cached payload
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Raw response body exactly as received
    payload: String,
    /// When the payload was stored
    stored_at: DateTime<Utc>,
}

/// Time-bounded map of response bodies keyed by request
///
/// One instance is owned by each `ApiClient`, so separate clients (and separate
/// tests) never see each other's entries. The map is guarded by a mutex that
/// is never held across an await point.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    /// Maximum number of entries; `None` keeps every distinct key
    capacity: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    /// Creates an unbounded cache with the default five minute TTL
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_TTL_MINUTES))
    }

    /// Creates an unbounded cache with a custom TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source (tests use a `ManualClock`)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bounds the number of entries; inserting past the bound evicts the
    /// entry that was stored longest ago
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    /// Builds the cache key for a request path and its encoded query string
    ///
    /// A request without parameters is keyed by its path alone, so
    /// `/threats/` and `/threats/?severity=critical` never collide.
    pub fn key(path: &str, query: &str) -> String {
        if query.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, query)
        }
    }

    /// Returns the TTL applied to entries
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reads a live entry
    ///
    /// # Returns
    /// * `Some(payload)` if an entry exists and is younger than the TTL
    /// * `None` if there is no entry, or the entry expired (it is removed)
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if now - entry.stored_at < self.ttl => Some(entry.payload.clone()),
            Some(_) => {
                trace!(key, "evicting expired cache entry");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores a payload, overwriting any previous entry for the key
    pub fn insert(&self, key: &str, payload: &str) {
        let stored_at = self.clock.now();
        let mut entries = self.lock();

        if let Some(capacity) = self.capacity {
            if !entries.contains_key(key) && entries.len() >= capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    trace!(key = %oldest, "cache full, evicting oldest entry");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                payload: payload.to_string(),
                stored_at,
            },
        );
    }

    /// Returns true if an entry (live or not yet evicted) exists for the key
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of stored entries, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every entry
    pub fn clear(&self) {
        self.lock().clear();
    }
}
