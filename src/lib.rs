//! An in-memory result cache with single-flight loading and periodic expiry
//!
//! This crate provides a `Cache` that sits in front of an expensive keyed
//! computation. Concurrent lookups for the same key share one execution of
//! that computation, and a background sweeper removes entries once their
//! lifetime has passed.
//!
//! ```
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! use flightcache::Cache;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), flightcache::CacheError> {
//! let cache = Cache::new(
//!     |key: String| async move { Ok::<_, Infallible>(key.len()) },
//!     Duration::from_secs(60),
//! )?;
//!
//! let first = cache.get("hello", Duration::from_secs(10)).await?;
//! assert_eq!(first.result, Ok(5));
//! assert!(!first.coalesced);
//!
//! let second = cache.get("hello", Duration::from_secs(10)).await?;
//! assert!(second.coalesced);
//!
//! cache.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;

mod entry;
mod store;
mod sweeper;

pub use cache::{Cache, Lookup};
pub use config::{CacheConfig, ExpiryPolicy};
pub use error::{CacheError, Result};
