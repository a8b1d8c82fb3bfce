//! Key-value backend abstraction
//!
//! Every component in this crate talks to its backing store through the
//! traits defined here. Two capability tiers exist:
//!
//! - [`KeyValueStore`]: plain get/set/delete plus batch lookup — the minimum
//!   any backend provides.
//! - [`AtomicStore`]: adds atomic store-if-absent ([`AtomicStore::add`]) and
//!   atomic increment ([`AtomicStore::incr`]), the primitives advisory
//!   locking and O(1) namespace invalidation are built on.
//!
//! Which tier a backend supports is declared up front by wrapping it in a
//! [`StoreHandle`] variant at construction time. Components inspect the
//! variant, never the backend itself, so a backend's capabilities are part of
//! its wiring rather than something discovered at runtime.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use keystash::store::{MemoryStore, StoreHandle};
//!
//! let handle = StoreHandle::atomic(Arc::new(MemoryStore::new()));
//! assert!(handle.as_atomic().is_some());
//! ```
//!
//! All values are UTF-8 strings. Callers that need structured values (the
//! stash) serialize above this layer. Time-to-live is enforced by the
//! backend; an expired entry behaves exactly like an absent one on every
//! read path.

mod error;
mod memory;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

/// Basic key-value store contract
///
/// Implementations must be safe for concurrent use; neither the lock nor the
/// stash add synchronization of their own.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if present and unexpired
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any existing entry
    ///
    /// A `ttl` of `None` means the entry never expires (or uses the
    /// backend's default lifetime, for backends that impose one).
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Remove the entry under `key`, reporting whether one existed
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Fetch several keys in one round trip
    ///
    /// Absent and expired keys are simply missing from the returned map.
    fn get_many(&self, keys: &[String]) -> StoreResult<HashMap<String, String>>;
}

/// Key-value store with atomic primitives
///
/// The additional operations must be indivisible with respect to all other
/// operations on the same backend, including those issued by other
/// processes.
pub trait AtomicStore: KeyValueStore {
    /// Store `value` under `key` only if the key is currently absent
    ///
    /// Returns `true` when the entry was created. This is the test-and-set
    /// primitive advisory locking relies on.
    fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<bool>;

    /// Atomically increment the unsigned integer stored under `key`
    ///
    /// Returns the new value, or `None` when the key is absent. Fails with
    /// [`StoreError::NonNumeric`] when a value exists but does not parse as
    /// an unsigned integer.
    fn incr(&self, key: &str) -> StoreResult<Option<u64>>;
}

/// A backend together with its declared capability tier
///
/// Chosen once at construction: wrap a backend in [`StoreHandle::basic`] or
/// [`StoreHandle::atomic`] and hand the handle to the components. A handle is
/// cheap to clone and clones share the underlying backend.
#[derive(Clone)]
pub enum StoreHandle {
    /// Backend offering only the basic [`KeyValueStore`] operations
    Basic(Arc<dyn KeyValueStore>),
    /// Backend offering the full [`AtomicStore`] contract
    Atomic(Arc<dyn AtomicStore>),
}

impl StoreHandle {
    /// Wrap a basic backend
    pub fn basic(store: Arc<dyn KeyValueStore>) -> Self {
        Self::Basic(store)
    }

    /// Wrap a backend with atomic primitives
    pub fn atomic(store: Arc<dyn AtomicStore>) -> Self {
        Self::Atomic(store)
    }

    /// Access the backend through the basic contract
    pub fn base(&self) -> &dyn KeyValueStore {
        match self {
            Self::Basic(store) => store.as_ref(),
            Self::Atomic(store) => store.as_ref(),
        }
    }

    /// Access the atomic contract, if this handle declares it
    pub fn as_atomic(&self) -> Option<&dyn AtomicStore> {
        match self {
            Self::Basic(_) => None,
            Self::Atomic(store) => Some(store.as_ref()),
        }
    }

    /// Fetch the value stored under `key`
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.base().get(key)
    }

    /// Store `value` under `key`
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.base().set(key, value, ttl)
    }

    /// Remove the entry under `key`
    pub fn delete(&self, key: &str) -> StoreResult<bool> {
        self.base().delete(key)
    }

    /// Fetch several keys in one round trip
    pub fn get_many(&self, keys: &[String]) -> StoreResult<HashMap<String, String>> {
        self.base().get_many(keys)
    }
}
