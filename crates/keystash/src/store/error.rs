//! Store error types
//!
//! Errors surfaced by key-value backends. Components built on top of a store
//! (the lock, the stash) propagate these unchanged; they have no domain
//! knowledge with which to recover.

use thiserror::Error;

/// Key-value store error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend connectivity or protocol failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Atomic increment attempted on a value that is not an unsigned integer
    #[error("Value at '{key}' is not numeric")]
    NonNumeric { key: String },

    /// Internal synchronization failure (e.g. a poisoned lock in an
    /// in-process backend)
    #[error("Store lock poisoned during '{operation}'")]
    Poisoned { operation: &'static str },
}

/// Key-value store result type
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    //! Unit tests for store::error.
    use super::*;

    /// Validates `StoreError` display formatting for each variant.
    ///
    /// Assertions:
    /// - Confirms each variant renders its context into the message.
    #[test]
    fn test_store_error_display() {
        let backend = StoreError::Backend("connection refused".to_string());
        assert_eq!(backend.to_string(), "Backend error: connection refused");

        let non_numeric = StoreError::NonNumeric { key: "ns:users".to_string() };
        assert_eq!(non_numeric.to_string(), "Value at 'ns:users' is not numeric");

        let poisoned = StoreError::Poisoned { operation: "get" };
        assert_eq!(poisoned.to_string(), "Store lock poisoned during 'get'");
    }
}
