//! Distributed advisory locking
//!
//! Cooperative mutual exclusion across independent processes sharing one
//! key-value store, built entirely on the store's atomic store-if-absent
//! primitive. A lock named `n` is held by whichever process managed to `add`
//! the entry `<key_prefix>:<n>` with its own owner token as the value; the
//! entry's TTL is the safety net that frees locks whose holders crashed.
//!
//! # Degraded mode
//!
//! A lock constructed from a [`StoreHandle::Basic`] backend has no
//! store-if-absent to build on. Rather than failing, every operation becomes
//! a safe no-op and acquisition always reports success — an explicit
//! availability-over-safety policy callers opt into by wiring a basic
//! backend. The downgrade is logged once at construction.
//!
//! # Blocking behavior
//!
//! [`DistributedLock::acquire`] blocks the calling thread, sleeping between
//! attempts. With no timeout it retries indefinitely; callers that rely on
//! "wait forever" semantics get exactly that.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use keystash::lock::{DistributedLock, LockConfig};
//! use keystash::store::{MemoryStore, StoreHandle};
//!
//! let handle = StoreHandle::atomic(Arc::new(MemoryStore::new()));
//! let lock = DistributedLock::new(handle, LockConfig::default());
//!
//! if lock.acquire("nightly-report", None).unwrap() {
//!     // ... critical section ...
//!     lock.release("nightly-report").unwrap();
//! }
//! ```

mod config;

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, trace, warn};

pub use config::{LockConfig, LockConfigBuilder};

use crate::store::{StoreHandle, StoreResult};
use crate::time::{Clock, SystemClock};

/// Store-backed advisory lock manager
///
/// One instance manages any number of named locks against one backend. The
/// instance tracks which names it currently holds and releases them
/// best-effort when dropped. Non-reentrant: a second `acquire` of a held
/// name from the same instance fails like any other contender.
pub struct DistributedLock<C = SystemClock>
where
    C: Clock,
{
    handle: StoreHandle,
    config: LockConfig,
    held: Mutex<HashSet<String>>,
    clock: C,
}

impl DistributedLock<SystemClock> {
    /// Create a lock manager over the given backend
    ///
    /// A [`StoreHandle::Basic`] backend selects degraded no-lock mode.
    pub fn new(handle: StoreHandle, config: LockConfig) -> Self {
        Self::with_clock(handle, config, SystemClock)
    }
}

impl<C> DistributedLock<C>
where
    C: Clock,
{
    /// Create a lock manager with a custom clock (useful for testing)
    pub fn with_clock(handle: StoreHandle, config: LockConfig, clock: C) -> Self {
        if handle.as_atomic().is_none() {
            warn!(
                key_prefix = %config.key_prefix,
                "backend lacks atomic add; locking degrades to always-succeed no-ops"
            );
        }
        Self { handle, config, held: Mutex::new(HashSet::new()), clock }
    }

    /// Whether this manager actually enforces exclusion
    ///
    /// `false` in degraded mode, where every `acquire` reports success
    /// without locking anything.
    pub fn is_enforcing(&self) -> bool {
        self.handle.as_atomic().is_some()
    }

    /// The owner token this instance writes into lock entries
    pub fn owner_token(&self) -> &str {
        &self.config.owner_token
    }

    /// Attempt to acquire the named lock
    ///
    /// Tries an atomic add of the lock entry; on contention sleeps
    /// `poll_interval` and retries until the add succeeds or `timeout`
    /// elapses. `timeout: None` retries indefinitely. Returns `Ok(true)` on
    /// acquisition and `Ok(false)` when the timeout expired first —
    /// contention is a normal outcome callers branch on, never an error.
    /// Store failures propagate.
    pub fn acquire(&self, name: &str, timeout: Option<Duration>) -> StoreResult<bool> {
        let Some(store) = self.handle.as_atomic() else {
            trace!(name, "degraded mode: reporting acquisition without locking");
            return Ok(true);
        };

        let key = self.key(name);
        let start = self.clock.now();

        loop {
            if store.add(&key, &self.config.owner_token, Some(self.config.ttl))? {
                debug!(name, key = %key, "lock acquired");
                self.remember_held(name);
                return Ok(true);
            }

            if let Some(timeout) = timeout {
                if self.clock.now().duration_since(start) >= timeout {
                    debug!(name, key = %key, ?timeout, "lock acquisition timed out");
                    return Ok(false);
                }
            }

            std::thread::sleep(self.config.poll_interval);
        }
    }

    /// Release the named lock
    ///
    /// Deletes the store entry only when its value is still this instance's
    /// owner token, so a lock that expired and was re-acquired by someone
    /// else is left alone. Releasing a lock we do not hold is a no-op, not
    /// an error. The name is always dropped from the held-set.
    pub fn release(&self, name: &str) -> StoreResult<()> {
        self.forget_held(name);

        if self.handle.as_atomic().is_none() {
            return Ok(());
        }

        let key = self.key(name);
        match self.handle.get(&key)? {
            Some(value) if value == self.config.owner_token => {
                self.handle.delete(&key)?;
                debug!(name, key = %key, "lock released");
            }
            Some(_) => {
                trace!(name, key = %key, "lock entry owned elsewhere; leaving it");
            }
            None => {}
        }
        Ok(())
    }

    /// Names this instance currently believes it holds
    pub fn held_names(&self) -> Vec<String> {
        self.held.lock().map(|held| held.iter().cloned().collect()).unwrap_or_default()
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.config.key_prefix, name)
    }

    fn remember_held(&self, name: &str) {
        if let Ok(mut held) = self.held.lock() {
            held.insert(name.to_string());
        }
    }

    fn forget_held(&self, name: &str) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(name);
        }
    }
}

impl<C> Drop for DistributedLock<C>
where
    C: Clock,
{
    /// Best-effort release of every still-held name
    ///
    /// A safety net, not a guarantee: if the process dies outright the
    /// entries simply expire via their TTLs.
    fn drop(&mut self) {
        let names = self.held_names();
        for name in names {
            if let Err(error) = self.release(&name) {
                warn!(name, %error, "failed to release lock during teardown");
            }
        }
    }
}
