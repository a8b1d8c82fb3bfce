//! Keyed compute-cache with namespace invalidation
//!
//! [`Stash`] wraps the get-or-compute pattern around a key-value store:
//! look a logical key up, and on a miss run the caller's compute closure,
//! store its result, and hand it back. Values are any serde-serializable
//! type, stored as JSON text.
//!
//! # Namespaces
//!
//! A logical key may be scoped to a namespace. Each namespace owns a random
//! generation token, itself cached long-term, and the token is embedded in
//! every physical key of that namespace. Invalidating the namespace replaces
//! the token, which changes every physical key at once: the old entries are
//! never touched again and simply age out via their own TTLs. Invalidation
//! is O(1) at the cost of stale entries lingering until expiry.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use keystash::stash::{Stash, TtlPolicy};
//! use keystash::store::{MemoryStore, StoreHandle};
//!
//! let stash = Stash::new(StoreHandle::atomic(Arc::new(MemoryStore::new())));
//!
//! let value: u32 = stash
//!     .get_or_compute("answer", || 42, &TtlPolicy::Fixed(Duration::from_secs(60)), None)
//!     .unwrap();
//! assert_eq!(value, 42);
//! ```
//!
//! Compute closures are trusted domain code: their panics propagate
//! unchanged, and no retry or fallback value is attempted on their behalf.

mod ttl;

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

pub use ttl::TtlPolicy;

use crate::store::{StoreError, StoreHandle};
use crate::time::{Clock, SystemClock};

/// Lifetime of a namespace generation token entry
const NAMESPACE_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 10);

/// Exclusive upper bound of the random token space
///
/// Two generations of one namespace collide only if the same token is drawn
/// twice, at odds bounded by this space (~2e9).
const NAMESPACE_TOKEN_SPACE: u64 = 2_000_000_000;

/// Stash error type
#[derive(Debug, Error)]
pub enum StashError {
    /// Failure in the backing store
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Value failed to serialize or deserialize
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Stash result type
pub type StashResult<T> = Result<T, StashError>;

/// Memoizing cache over a key-value store
///
/// Thread safety is inherited from the backend; the stash itself holds no
/// mutable state.
pub struct Stash<C = SystemClock>
where
    C: Clock,
{
    handle: StoreHandle,
    key_prefix: String,
    clock: C,
}

impl Stash<SystemClock> {
    /// Create a stash over the given backend with an empty key prefix
    pub fn new(handle: StoreHandle) -> Self {
        Self::with_clock(handle, SystemClock)
    }

    /// Create a stash whose physical keys all start with `prefix`
    pub fn with_prefix(handle: StoreHandle, prefix: impl Into<String>) -> Self {
        let mut stash = Self::new(handle);
        stash.key_prefix = prefix.into();
        stash
    }
}

impl<C> Stash<C>
where
    C: Clock,
{
    /// Create a stash with a custom clock (useful for testing)
    pub fn with_clock(handle: StoreHandle, clock: C) -> Self {
        Self { handle, key_prefix: String::new(), clock }
    }

    /// Set the physical key prefix, builder-style
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Fetch the value cached under `key`, if any
    pub fn get<T>(&self, key: &str, namespace: Option<&str>) -> StashResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let physical = self.physical_key(key, namespace)?;
        match self.handle.get(&physical)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`
    pub fn set<T>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        namespace: Option<&str>,
    ) -> StashResult<()>
    where
        T: Serialize,
    {
        let physical = self.physical_key(key, namespace)?;
        let raw = serde_json::to_string(value)?;
        self.handle.set(&physical, &raw, ttl)?;
        Ok(())
    }

    /// Remove the entry under `key`, reporting whether one existed
    pub fn delete(&self, key: &str, namespace: Option<&str>) -> StashResult<bool> {
        let physical = self.physical_key(key, namespace)?;
        Ok(self.handle.delete(&physical)?)
    }

    /// Fetch several logical keys in one round trip
    ///
    /// Returns a map from logical key to value; absent keys are simply
    /// missing.
    pub fn get_many<T>(
        &self,
        keys: &[String],
        namespace: Option<&str>,
    ) -> StashResult<HashMap<String, T>>
    where
        T: DeserializeOwned,
    {
        let mapping = self.physical_mapping(keys, namespace)?;
        let physical_keys: Vec<String> = mapping.keys().cloned().collect();
        let raw = self.handle.get_many(&physical_keys)?;

        let mut found = HashMap::new();
        for (physical, value) in raw {
            if let Some(logical) = mapping.get(&physical) {
                found.insert(logical.clone(), serde_json::from_str(&value)?);
            }
        }
        Ok(found)
    }

    /// Invalidate every key in the named namespace at once
    ///
    /// Replaces the namespace's generation token: incremented atomically
    /// when the backend supports it, deleted otherwise (a fresh token is
    /// minted on next access). Entries stamped with the old token are
    /// orphaned, not deleted, and expire via their own TTLs.
    pub fn invalidate_namespace(&self, name: &str) -> StashResult<()> {
        let token_key = self.namespace_token_key(name);

        if let Some(store) = self.handle.as_atomic() {
            match store.incr(&token_key) {
                Ok(Some(generation)) => {
                    debug!(namespace = name, generation, "namespace invalidated via incr");
                }
                Ok(None) => {
                    trace!(namespace = name, "no namespace token to invalidate");
                }
                // A token that is missing or unexpectedly non-numeric will be
                // re-minted on next access; nothing to invalidate.
                Err(StoreError::NonNumeric { .. }) => {
                    trace!(namespace = name, "namespace token not numeric; skipping incr");
                }
                Err(other) => return Err(other.into()),
            }
        } else {
            self.handle.delete(&token_key)?;
            debug!(namespace = name, "namespace invalidated via token delete");
        }
        Ok(())
    }

    /// Fetch the value under `key`, computing and storing it on a miss
    ///
    /// `compute` runs at most once per call and only on a miss. When `ttl`
    /// is [`TtlPolicy::Computed`], the closure's wall-clock latency is
    /// measured and fed to the policy to pick the stored lifetime.
    pub fn get_or_compute<T, F>(
        &self,
        key: &str,
        compute: F,
        ttl: &TtlPolicy,
        namespace: Option<&str>,
    ) -> StashResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let physical = self.physical_key(key, namespace)?;

        if let Some(raw) = self.handle.get(&physical)? {
            trace!(key, "stash hit");
            return Ok(serde_json::from_str(&raw)?);
        }

        trace!(key, "stash miss; computing");
        let start = self.clock.now();
        let value = compute();
        let elapsed = self.clock.now().duration_since(start);

        let raw = serde_json::to_string(&value)?;
        self.handle.set(&physical, &raw, ttl.resolve(elapsed))?;
        Ok(value)
    }

    /// Batch form of [`Stash::get_or_compute`]
    ///
    /// Resolves all logical keys, performs one multi-get, and invokes
    /// `compute` exactly once with the keys still missing (skipping it
    /// entirely when everything was cached). `compute` must return a value
    /// for each key it was given; each is stored individually and merged
    /// with the cached values into one logical-key-to-value map.
    pub fn get_or_compute_many<T, F>(
        &self,
        keys: &[String],
        compute: F,
        ttl: &TtlPolicy,
        namespace: Option<&str>,
    ) -> StashResult<HashMap<String, T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&[String]) -> HashMap<String, T>,
    {
        let mapping = self.physical_mapping(keys, namespace)?;
        let inverse: HashMap<&String, &String> =
            mapping.iter().map(|(physical, logical)| (logical, physical)).collect();

        let physical_keys: Vec<String> = mapping.keys().cloned().collect();
        let raw = self.handle.get_many(&physical_keys)?;

        let mut found: HashMap<String, T> = HashMap::new();
        for (physical, value) in &raw {
            if let Some(logical) = mapping.get(physical) {
                found.insert(logical.clone(), serde_json::from_str(value)?);
            }
        }

        // Preserve caller order for the keys handed to the compute closure,
        // deduplicating repeated input keys.
        let mut missing: Vec<String> = Vec::new();
        for key in keys {
            if !found.contains_key(key) && !missing.contains(key) {
                missing.push(key.clone());
            }
        }

        if !missing.is_empty() {
            trace!(misses = missing.len(), "stash batch miss; computing");
            let start = self.clock.now();
            let computed = compute(&missing);
            let elapsed = self.clock.now().duration_since(start);
            let resolved_ttl = ttl.resolve(elapsed);

            for (logical, value) in computed {
                if let Some(physical) = inverse.get(&logical) {
                    let raw = serde_json::to_string(&value)?;
                    self.handle.set(physical, &raw, resolved_ttl)?;
                }
                found.insert(logical, value);
            }
        }

        Ok(found)
    }

    /// Translate a logical key into its physical store key
    ///
    /// `<prefix><namespace-segment>:<key>`; the namespace segment is empty
    /// when no namespace is given.
    fn physical_key(&self, key: &str, namespace: Option<&str>) -> StashResult<String> {
        let segment = match namespace {
            Some(name) => self.namespace_segment(name)?,
            None => String::new(),
        };
        Ok(format!("{}{}:{}", self.key_prefix, segment, key))
    }

    /// Map physical keys to their logical keys, deduplicating the input
    fn physical_mapping(
        &self,
        keys: &[String],
        namespace: Option<&str>,
    ) -> StashResult<HashMap<String, String>> {
        let mut mapping = HashMap::new();
        for key in keys {
            let physical = self.physical_key(key, namespace)?;
            mapping.insert(physical, key.clone());
        }
        Ok(mapping)
    }

    /// Current segment for the named namespace, minting a token on first use
    fn namespace_segment(&self, name: &str) -> StashResult<String> {
        let token_key = self.namespace_token_key(name);

        let token = match self.handle.get(&token_key)? {
            Some(token) => token,
            None => {
                let token =
                    rand::thread_rng().gen_range(0..NAMESPACE_TOKEN_SPACE).to_string();
                self.handle.set(&token_key, &token, Some(NAMESPACE_TOKEN_TTL))?;
                debug!(namespace = name, token = %token, "minted namespace token");
                token
            }
        };

        Ok(format!("ns:{}:{}", name, token))
    }

    fn namespace_token_key(&self, name: &str) -> String {
        format!("{}namespace:{}", self.key_prefix, name)
    }
}
