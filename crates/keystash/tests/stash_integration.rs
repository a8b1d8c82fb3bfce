//! Integration tests for the stash
//!
//! Exercises memoization, TTL-driven recomputation, namespace invalidation,
//! batch lookup, and latency-derived TTL policies through the public API,
//! with time driven by a shared mock clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keystash::stash::{Stash, StashResult, TtlPolicy};
use keystash::store::{MemoryStore, StoreHandle};
use keystash::time::MockClock;
use serde::{Deserialize, Serialize};

fn mock_stash() -> (MockClock, Arc<MemoryStore<MockClock>>, Stash<MockClock>) {
    let clock = MockClock::new();
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let stash = Stash::with_clock(StoreHandle::atomic(store.clone()), clock.clone());
    (clock, store, stash)
}

/// Verifies that a computation runs once and is then served from cache
/// until its stored TTL expires.
///
/// # Test Steps
/// 1. `get_or_compute` a key with a 60s TTL — the closure runs
/// 2. Repeat before expiry — the closure does not run
/// 3. Advance the clock past the TTL and repeat — the closure runs again
#[test]
fn test_compute_once_then_recompute_after_expiry() -> StashResult<()> {
    let (clock, _store, stash) = mock_stash();
    let calls = Arc::new(AtomicU32::new(0));
    let ttl = TtlPolicy::Fixed(Duration::from_secs(60));

    let compute = || {
        let calls = Arc::clone(&calls);
        move || -> u32 {
            calls.fetch_add(1, Ordering::SeqCst);
            42
        }
    };

    assert_eq!(stash.get_or_compute("k", compute(), &ttl, None)?, 42);
    assert_eq!(stash.get_or_compute("k", compute(), &ttl, None)?, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(61));

    assert_eq!(stash.get_or_compute("k", compute(), &ttl, None)?, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

/// Verifies that namespace invalidation orphans entries instead of
/// deleting them.
///
/// After invalidation every lookup in the namespace misses, yet the old
/// physical entries still sit in the raw backend awaiting TTL expiry.
///
/// # Test Steps
/// 1. Store two keys in namespace `users` (backend holds 2 entries plus
///    the namespace token)
/// 2. Invalidate `users`
/// 3. Both keys now miss
/// 4. The backend still physically holds the orphaned entries
#[test]
fn test_invalidation_orphans_physical_entries() -> StashResult<()> {
    let (_clock, store, stash) = mock_stash();

    stash.set("alice", &1u32, Some(Duration::from_secs(300)), Some("users"))?;
    stash.set("bob", &2u32, Some(Duration::from_secs(300)), Some("users"))?;
    assert_eq!(stash.get::<u32>("alice", Some("users"))?, Some(1));

    // Two value entries plus the namespace token entry.
    assert_eq!(store.len(), 3);

    stash.invalidate_namespace("users")?;

    assert_eq!(stash.get::<u32>("alice", Some("users"))?, None);
    assert_eq!(stash.get::<u32>("bob", Some("users"))?, None);

    // The old entries were orphaned, not deleted.
    assert_eq!(store.len(), 3);
    Ok(())
}

/// Verifies that values stored after an invalidation live under the new
/// generation and are found again.
///
/// # Test Steps
/// 1. Store and invalidate a namespaced key
/// 2. Store it again and read it back — hit
/// 3. The backend now holds both generations of the entry
#[test]
fn test_new_generation_after_invalidation() -> StashResult<()> {
    let (_clock, store, stash) = mock_stash();

    stash.set("k", &1u32, Some(Duration::from_secs(300)), Some("posts"))?;
    stash.invalidate_namespace("posts")?;

    stash.set("k", &2u32, Some(Duration::from_secs(300)), Some("posts"))?;
    assert_eq!(stash.get::<u32>("k", Some("posts"))?, Some(2));

    // Old generation's entry, new generation's entry, namespace token.
    assert_eq!(store.len(), 3);
    Ok(())
}

/// Verifies the batch form computes only the missing keys and merges.
///
/// # Test Steps
/// 1. Pre-populate `a`
/// 2. `get_or_compute_many` over `{a, b}`
/// 3. The compute closure receives exactly `[b]`
/// 4. The returned map contains both values
#[test]
fn test_batch_computes_only_missing_keys() -> StashResult<()> {
    let (_clock, _store, stash) = mock_stash();
    let ttl = TtlPolicy::Fixed(Duration::from_secs(60));

    stash.set("a", &10u32, None, None)?;

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_in_compute = Arc::clone(&seen);

    let keys = vec!["a".to_string(), "b".to_string()];
    let values = stash.get_or_compute_many(
        &keys,
        move |missing| {
            seen_in_compute.lock().unwrap().extend(missing.iter().cloned());
            missing.iter().map(|k| (k.clone(), 20u32)).collect()
        },
        &ttl,
        None,
    )?;

    assert_eq!(*seen.lock().unwrap(), vec!["b".to_string()]);
    assert_eq!(values.get("a"), Some(&10));
    assert_eq!(values.get("b"), Some(&20));
    assert_eq!(values.len(), 2);

    // b is now cached; a fully warm batch never invokes the closure.
    let values: HashMap<String, u32> =
        stash.get_or_compute_many(&keys, |_| panic!("all keys were cached"), &ttl, None)?;
    assert_eq!(values.len(), 2);
    Ok(())
}

/// Verifies the latency-derived TTL policy end to end.
///
/// Fast computations get a 10s lifetime, slow ones (>= 1s) a 1s lifetime.
/// Compute latency is simulated by advancing the shared mock clock inside
/// the closure.
///
/// # Test Steps
/// 1. Fast compute on `fast` — entry survives a 5s advance, dies by 11s
/// 2. Slow compute on `slow` (clock advanced 2s inside the closure) —
///    entry is gone after a further 2s advance
#[test]
fn test_dynamic_ttl_tracks_compute_latency() -> StashResult<()> {
    let (clock, _store, stash) = mock_stash();
    let ttl = TtlPolicy::computed(|elapsed| {
        if elapsed < Duration::from_secs(1) {
            Duration::from_secs(10)
        } else {
            Duration::from_secs(1)
        }
    });

    // Fast compute: stored with the long lifetime.
    assert_eq!(stash.get_or_compute("fast", || 1u32, &ttl, None)?, 1);
    clock.advance(Duration::from_secs(5));
    assert_eq!(stash.get::<u32>("fast", None)?, Some(1));
    clock.advance(Duration::from_secs(6));
    assert_eq!(stash.get::<u32>("fast", None)?, None);

    // Slow compute: stored with the short lifetime.
    let slow_clock = clock.clone();
    let value = stash.get_or_compute(
        "slow",
        move || {
            slow_clock.advance(Duration::from_secs(2));
            2u32
        },
        &ttl,
        None,
    )?;
    assert_eq!(value, 2);
    assert_eq!(stash.get::<u32>("slow", None)?, Some(2));
    clock.advance(Duration::from_secs(2));
    assert_eq!(stash.get::<u32>("slow", None)?, None);
    Ok(())
}

/// Verifies structured values survive the JSON round trip.
///
/// # Test Steps
/// 1. Store a struct under a namespaced key
/// 2. Read it back and compare field-for-field
#[test]
fn test_structured_values_round_trip() -> StashResult<()> {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u64,
    }

    let (_clock, _store, stash) = mock_stash();

    let profile = Profile { name: "alice".to_string(), visits: 7 };
    stash.set("alice", &profile, None, Some("profiles"))?;

    let loaded: Option<Profile> = stash.get("alice", Some("profiles"))?;
    assert_eq!(loaded, Some(profile));
    Ok(())
}

/// Verifies that a key prefix isolates two stashes sharing one backend.
///
/// # Test Steps
/// 1. Two prefixed stashes store the same logical key
/// 2. Each reads back its own value
#[test]
fn test_prefixes_partition_one_backend() -> StashResult<()> {
    let store = Arc::new(MemoryStore::new());
    let app_a = Stash::with_prefix(StoreHandle::atomic(store.clone()), "a-");
    let app_b = Stash::with_prefix(StoreHandle::atomic(store), "b-");

    app_a.set("k", &1u32, None, None)?;
    app_b.set("k", &2u32, None, None)?;

    assert_eq!(app_a.get::<u32>("k", None)?, Some(1));
    assert_eq!(app_b.get::<u32>("k", None)?, Some(2));
    Ok(())
}
