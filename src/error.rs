// ABOUTME: Defines all error types for the coord library using thiserror.
// ABOUTME: Each submodule has its own error type, unified under CoordError.

use std::sync::Arc;
use std::time::Duration;

/// Top-level error type for the coord library.
#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Timeout error: {0}")]
    Timeout(#[from] TimeoutError),
}

/// Errors from file lock operations.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out acquiring lock on '{resource_id}' after {waited_ms}ms")]
    AcquireTimeout { resource_id: String, waited_ms: u64 },
}

/// Errors from resource pool operations.
///
/// Cloneable because a single factory failure is delivered to every
/// concurrent waiter on the same key.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    #[error("factory failed: {0}")]
    Factory(Arc<anyhow::Error>),
}

/// Error raised when a deadline race loses to the clock.
///
/// Distinct from the raced operation's own failures so callers can branch
/// on timeout vs. underlying error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TimeoutError {
    /// The deadline that elapsed, in milliseconds.
    pub timeout_ms: u64,
    /// Human-readable description of what timed out.
    pub message: String,
}

impl TimeoutError {
    /// Create a timeout error with the default message.
    pub fn new(timeout: Duration) -> Self {
        let timeout_ms = timeout.as_millis() as u64;
        Self {
            timeout_ms,
            message: format!("Operation timed out after {}ms", timeout_ms),
        }
    }

    /// Create a timeout error with a custom message.
    pub fn with_message(timeout: Duration, message: impl Into<String>) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            message: message.into(),
        }
    }

    /// The elapsed deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
