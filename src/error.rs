//! # Error Handling
//!
//! Error types that cross the public API boundary of this crate. Per the
//! pool's propagation policy, reset and release hook failures never reach
//! the caller — they are logged and the affected instance is downgraded to
//! `Disposed` instead. Only argument errors and a capped validation-retry
//! failure surface here; a user factory's own error type propagates
//! through `acquire` untouched.

use thiserror::Error;

/// Result type alias used throughout the pool for operations that cannot
/// fail through a user-supplied factory.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can be returned directly by pool operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A configuration argument was out of range, e.g. `max_size < 1`.
    #[error("invalid argument '{parameter}': {reason}")]
    InvalidArgument {
        parameter: &'static str,
        reason: String,
    },

    /// `acquire` gave up after repeatedly drawing instances that fail
    /// outbound validation, rather than spinning forever.
    #[error("acquire failed: {attempts} consecutive instances failed outbound validation")]
    ValidationRetriesExceeded { attempts: u32 },

    /// The eviction scheduler backing this pool has been disposed and can
    /// no longer accept new scheduling requests.
    #[error("eviction scheduler has been disposed")]
    SchedulerDisposed,
}

impl PoolError {
    pub fn invalid_argument<S: Into<String>>(parameter: &'static str, reason: S) -> Self {
        Self::InvalidArgument {
            parameter,
            reason: reason.into(),
        }
    }
}
