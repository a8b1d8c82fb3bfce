//! In-memory key-value backend
//!
//! A process-local store implementing the full [`AtomicStore`] contract.
//! Used as the deterministic backend in tests and as a fallback when no
//! shared cache server is configured. Entries expire lazily: an expired
//! entry is treated as absent by every read path and physically removed the
//! next time it is touched.
//!
//! The store is clock-generic so TTL behavior can be exercised with
//! [`MockClock`](crate::time::MockClock) without real waiting.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::{AtomicStore, KeyValueStore, StoreError, StoreResult};
use crate::time::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Thread-safe in-memory store with per-entry TTL
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use keystash::store::{KeyValueStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.set("greeting", "hello", Some(Duration::from_secs(60))).unwrap();
/// assert_eq!(store.get("greeting").unwrap(), Some("hello".to_string()));
/// ```
#[derive(Debug)]
pub struct MemoryStore<C = SystemClock>
where
    C: Clock,
{
    entries: RwLock<HashMap<String, Entry>>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    /// Create an empty store using the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MemoryStore<C>
where
    C: Clock,
{
    /// Create an empty store with a custom clock (useful for testing)
    pub fn with_clock(clock: C) -> Self {
        Self { entries: RwLock::new(HashMap::new()), clock }
    }

    /// Number of physical entries, including not-yet-purged expired ones
    ///
    /// Diagnostic accessor; tests use it to observe orphaned entries that
    /// are awaiting TTL expiry.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check whether the store holds no physical entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a live (unexpired) entry exists under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .read()
            .map(|e| e.get(key).is_some_and(|entry| !entry.is_expired(now)))
            .unwrap_or(false)
    }

    fn expires_at(&self, ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|ttl| self.clock.now() + ttl)
    }
}

impl<C> KeyValueStore for MemoryStore<C>
where
    C: Clock,
{
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now();
        let mut entries =
            self.entries.write().map_err(|_| StoreError::Poisoned { operation: "get" })?;

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let expires_at = self.expires_at(ttl);
        let mut entries =
            self.entries.write().map_err(|_| StoreError::Poisoned { operation: "set" })?;

        entries.insert(key.to_string(), Entry { value: value.to_string(), expires_at });
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = self.clock.now();
        let mut entries =
            self.entries.write().map_err(|_| StoreError::Poisoned { operation: "delete" })?;

        match entries.remove(key) {
            Some(entry) => Ok(!entry.is_expired(now)),
            None => Ok(false),
        }
    }

    fn get_many(&self, keys: &[String]) -> StoreResult<HashMap<String, String>> {
        let now = self.clock.now();
        let mut entries =
            self.entries.write().map_err(|_| StoreError::Poisoned { operation: "get_many" })?;

        let mut found = HashMap::new();
        for key in keys {
            match entries.get(key) {
                Some(entry) if entry.is_expired(now) => {
                    entries.remove(key);
                }
                Some(entry) => {
                    found.insert(key.clone(), entry.value.clone());
                }
                None => {}
            }
        }
        Ok(found)
    }
}

impl<C> AtomicStore for MemoryStore<C>
where
    C: Clock,
{
    fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<bool> {
        let now = self.clock.now();
        let expires_at = self.expires_at(ttl);
        let mut entries =
            self.entries.write().map_err(|_| StoreError::Poisoned { operation: "add" })?;

        // An expired entry counts as absent for test-and-set purposes.
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(false);
            }
        }

        entries.insert(key.to_string(), Entry { value: value.to_string(), expires_at });
        Ok(true)
    }

    fn incr(&self, key: &str) -> StoreResult<Option<u64>> {
        let now = self.clock.now();
        let mut entries =
            self.entries.write().map_err(|_| StoreError::Poisoned { operation: "incr" })?;

        let Some(entry) = entries.get_mut(key) else {
            return Ok(None);
        };
        if entry.is_expired(now) {
            entries.remove(key);
            return Ok(None);
        }

        let current: u64 = entry
            .value
            .parse()
            .map_err(|_| StoreError::NonNumeric { key: key.to_string() })?;
        let next = current.wrapping_add(1);
        entry.value = next.to_string();
        Ok(Some(next))
    }
}
