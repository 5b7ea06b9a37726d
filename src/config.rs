//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// How entries past their deadline are treated on lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Expiry is best-effort and enforced only by the periodic sweep. A
    /// lookup may join an entry whose deadline has passed if the sweeper has
    /// not collected it yet, so staleness is bounded by the sweep interval.
    #[default]
    Sweep,
    /// Lookups also check the deadline. A completed entry past its deadline
    /// is replaced by a fresh computation. An entry still being computed is
    /// joined regardless, so a key never has two computations in flight.
    Strict,
}

/// Configuration for a [`Cache`](crate::Cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Period of the background sweep
    pub sweep_interval: Duration,
    /// Deadline handling on lookup
    pub expiry: ExpiryPolicy,
    /// Default limit on how long `get` waits for someone else's computation
    pub wait_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            expiry: ExpiryPolicy::Sweep,
            wait_timeout: None,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with the given sweep interval and defaults
    /// for everything else.
    pub fn new(sweep_interval: Duration) -> Self {
        Self {
            sweep_interval,
            ..Self::default()
        }
    }

    /// Sets the expiry policy.
    pub fn with_expiry(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    /// Bounds how long `get` waits on an in-flight computation.
    pub fn with_wait_timeout(mut self, limit: Duration) -> Self {
        self.wait_timeout = Some(limit);
        self
    }

    /// Checks that the configuration can drive a cache.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be positive".to_string(),
            ));
        }
        if self.wait_timeout.is_some_and(|limit| limit.is_zero()) {
            return Err(CacheError::InvalidConfig(
                "wait timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
