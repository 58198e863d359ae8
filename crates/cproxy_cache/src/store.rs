use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use http::HeaderMap;
use tracing::debug;

use crate::entry::CacheEntry;
use crate::freshness;
use crate::key::CacheKey;

/// In-memory cache shared by every request of one proxy instance.
///
/// A single `RwLock` guards the whole map. Each operation holds it for its
/// full duration, so readers only ever see whole entries.
#[derive(Debug)]
pub struct CacheStore {
    inner: RwLock<HashMap<CacheKey, CacheEntry>>,
    default_ttl: Duration,
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Snapshot of the entry for `key`.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.read().get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        debug!(target: "cproxy::cache", cache_key = %key, "Storing entry");
        self.write().insert(key, entry);
    }

    /// Updates only the timestamps of an existing entry.
    ///
    /// Returns `false` when the key vanished in the meantime (e.g. the cache
    /// was cleared while the origin was being asked).
    pub fn refresh_expiry(&self, key: &CacheKey, stored_at: SystemTime, expires_at: SystemTime) -> bool {
        let mut map = self.write();
        match map.get_mut(key) {
            Some(entry) => {
                entry.stored_at = stored_at;
                entry.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&self) {
        let mut map = self.write();
        let dropped = map.len();
        *map = HashMap::new();
        debug!(target: "cproxy::cache", dropped, "Cache cleared");
    }

    pub fn is_fresh(&self, entry: &CacheEntry, now: SystemTime) -> bool {
        entry.is_fresh(now)
    }

    pub fn compute_expiry(&self, headers: &HeaderMap, reference: SystemTime) -> SystemTime {
        freshness::compute_expiry(headers, reference, self.default_ttl)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Writers replace whole entries, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(crate::policy::CachePolicy::default_ttl())
    }
}
