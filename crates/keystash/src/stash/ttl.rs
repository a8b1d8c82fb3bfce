//! Time-to-live policies for stored computations
//!
//! A computed value's lifetime is either fixed, left to the backend, or
//! derived from how long the computation took — e.g. giving cheap values a
//! long lifetime and expensive ones a short one, or the reverse.

use std::fmt;
use std::time::Duration;

/// How long a computed value should live in the store
pub enum TtlPolicy {
    /// No explicit expiry; the backend's default lifetime applies
    Default,

    /// A fixed lifetime
    Fixed(Duration),

    /// A lifetime computed from the measured compute latency
    ///
    /// The function receives the wall-clock duration the compute closure
    /// took and returns the TTL to store the value with.
    Computed(Box<dyn Fn(Duration) -> Duration + Send + Sync>),
}

impl TtlPolicy {
    /// Build a [`TtlPolicy::Computed`] from a closure
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(Duration) -> Duration + Send + Sync + 'static,
    {
        Self::Computed(Box::new(f))
    }

    /// Whether resolving this policy requires measuring compute latency
    pub fn needs_timing(&self) -> bool {
        matches!(self, Self::Computed(_))
    }

    /// Resolve the policy into the TTL to store with
    pub fn resolve(&self, elapsed: Duration) -> Option<Duration> {
        match self {
            Self::Default => None,
            Self::Fixed(ttl) => Some(*ttl),
            Self::Computed(f) => Some(f(elapsed)),
        }
    }
}

impl fmt::Debug for TtlPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "TtlPolicy::Default"),
            Self::Fixed(ttl) => write!(f, "TtlPolicy::Fixed({:?})", ttl),
            Self::Computed(_) => write!(f, "TtlPolicy::Computed(..)"),
        }
    }
}

impl From<Duration> for TtlPolicy {
    fn from(ttl: Duration) -> Self {
        Self::Fixed(ttl)
    }
}
