//! Deferred-call queue scoped to one unit of work
//!
//! Collects callbacks keyed by a dedupe string and runs them all at a point
//! the owner chooses — typically the end of a request or job. The queue is
//! an explicit context object: the caller creates it, threads it through the
//! work, and flushes it when the unit of work completes. Nothing is global
//! and nothing flushes implicitly.
//!
//! Re-pushing an existing key replaces the callback but keeps the key's
//! original position, so flush order is always first-insertion order.
//!
//! # Examples
//!
//! ```
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! use keystash::deferred::DeferredQueue;
//!
//! let counter = Arc::new(AtomicU32::new(0));
//! let mut queue = DeferredQueue::new();
//!
//! let c = Arc::clone(&counter);
//! queue.push("bump", move || {
//!     c.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! // Same key: replaces the callback, does not add a second call.
//! let c = Arc::clone(&counter);
//! queue.push("bump", move || {
//!     c.fetch_add(10, Ordering::SeqCst);
//! });
//!
//! queue.flush();
//! assert_eq!(counter.load(Ordering::SeqCst), 10);
//! ```

type Callback = Box<dyn FnOnce() + Send>;

/// Ordered, deduplicating queue of deferred callbacks
#[derive(Default)]
pub struct DeferredQueue {
    entries: Vec<(String, Callback)>,
}

impl DeferredQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `key`
    ///
    /// If `key` is already queued, its callback is replaced in place and
    /// its flush position is unchanged.
    pub fn push<F>(&mut self, key: impl Into<String>, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = Box::new(callback),
            None => self.entries.push((key, Box::new(callback))),
        }
    }

    /// Register a callback under `key` only if the key is not queued yet
    ///
    /// `init` is evaluated lazily: it runs only when the key is absent, so
    /// building an expensive callback costs nothing on repeat pushes.
    pub fn push_lazy<I, F>(&mut self, key: impl Into<String>, init: I)
    where
        I: FnOnce() -> F,
        F: FnOnce() + Send + 'static,
    {
        let key = key.into();
        if !self.contains(&key) {
            self.entries.push((key, Box::new(init())));
        }
    }

    /// Run every queued callback in first-insertion order and empty the
    /// queue
    pub fn flush(&mut self) {
        for (_, callback) in self.entries.drain(..) {
            callback();
        }
    }

    /// Discard all queued callbacks without running them
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether a callback is queued under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of queued callbacks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
