//! Store-backed coordination and caching utilities.
//!
//! Small building blocks for applications that share one key-value cache
//! store across processes:
//!
//! - [`lock`]: cooperative distributed locking built on the store's atomic
//!   store-if-absent primitive, with TTL-bounded ownership and best-effort
//!   release on teardown.
//! - [`stash`]: a memoizing compute-cache with namespace-scoped O(1) bulk
//!   invalidation, batch lookup, and latency-derived TTL policies.
//! - [`deferred`]: an explicitly-scoped deferred-call queue flushed at the
//!   end of a unit of work.
//! - [`store`]: the key-value backend abstraction everything above plugs
//!   into, with capability tiers declared at construction, plus an
//!   in-memory implementation.
//! - [`time`]: the clock abstraction that keeps TTL and latency behavior
//!   deterministic under test.
//!
//! The lock and the stash are independent of each other; both block the
//! calling thread and add no synchronization beyond what the backend itself
//! provides.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod deferred;
pub mod lock;
pub mod stash;
pub mod store;
pub mod time;

// Re-export commonly used types for convenience
// ------------------------------
pub use deferred::DeferredQueue;
pub use lock::{DistributedLock, LockConfig, LockConfigBuilder};
pub use stash::{Stash, StashError, StashResult, TtlPolicy};
pub use store::{
    AtomicStore, KeyValueStore, MemoryStore, StoreError, StoreHandle, StoreResult,
};
pub use time::{Clock, MockClock, SystemClock};
