//! Engine-level errors.
//!
//! Failures of the caller's computation are not represented here: they are
//! cached and handed back inside [`Lookup`](crate::Lookup) so that every
//! caller sharing an entry sees the same error.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors raised by the cache itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache has been closed and no longer accepts operations.
    #[error("cache is closed")]
    Closed,

    /// The supplied configuration cannot be used.
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// The cache was built outside of a tokio runtime, so the sweeper could
    /// not be started.
    #[error("no tokio runtime available to run the sweeper")]
    NoRuntime,

    /// Waiting on an in-flight computation took longer than allowed.
    #[error("timed out after {0:?} waiting for an in-flight computation")]
    Timeout(Duration),

    /// The caller computing the entry went away before publishing a result.
    #[error("in-flight computation was abandoned before completing")]
    Abandoned,
}
