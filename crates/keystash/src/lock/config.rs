//! Lock configuration types and builder
//!
//! Configuration for [`DistributedLock`](super::DistributedLock): key prefix,
//! entry time-to-live, polling cadence, and the owner token that proves
//! ownership at release time.

use std::time::Duration;

use once_cell::sync::Lazy;
use uuid::Uuid;

/// Owner token shared by every lock instance in this process
///
/// Uniquely identifies the process instance for its lifetime, so a lock
/// released here never removes an entry written by a different process.
static PROCESS_OWNER: Lazy<String> =
    Lazy::new(|| format!("{}:{}", std::process::id(), Uuid::new_v4()));

/// Configuration for distributed lock behavior
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Prefix for physical lock keys; a lock named `n` lives at
    /// `<key_prefix>:<n>`
    pub key_prefix: String,

    /// Time-to-live of the store entry backing each held lock
    ///
    /// The store enforces this; it is the safety net against holders that
    /// crash without releasing.
    pub ttl: Duration,

    /// How long to sleep between acquisition attempts while the lock is
    /// contended
    pub poll_interval: Duration,

    /// Token written as the lock entry's value to prove ownership
    pub owner_token: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_prefix: "lock".to_string(),
            ttl: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            owner_token: PROCESS_OWNER.clone(),
        }
    }
}

impl LockConfig {
    /// Create a new configuration builder
    pub fn builder() -> LockConfigBuilder {
        LockConfigBuilder::default()
    }
}

/// Builder for [`LockConfig`] with fluent API
#[derive(Debug, Default)]
pub struct LockConfigBuilder {
    config: LockConfig,
}

impl LockConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the physical key prefix
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Set the lock entry time-to-live
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Set the polling interval used while waiting on a contended lock
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Override the owner token (primarily for tests simulating several
    /// distinct owners inside one process)
    pub fn owner_token(mut self, token: impl Into<String>) -> Self {
        self.config.owner_token = token.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> LockConfig {
        self.config
    }
}
