use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, timeout};
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::store::{Claim, Store};
use crate::sweeper;

/// The outcome of a [`Cache::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<V, E> {
    /// What the computation returned. Errors are shared between every
    /// caller of the same entry.
    pub result: std::result::Result<V, Arc<E>>,
    /// `true` when this call attached to an entry created by someone else,
    /// `false` when this call ran the computation itself.
    pub coalesced: bool,
}

impl<V, E> Lookup<V, E> {
    /// Gets the value if the computation succeeded
    pub fn value(&self) -> Option<&V> {
        self.result.as_ref().ok()
    }

    /// Discards the coalesced flag
    pub fn into_result(self) -> std::result::Result<V, Arc<E>> {
        self.result
    }
}

/// An in-memory cache that runs at most one computation per key at a time
/// and shares its result with every concurrent caller.
///
/// Entries live until their deadline passes and the background sweeper
/// collects them, or until they are deleted. The sweeper is owned by the
/// cache: it stops on [`Cache::close`] or when the cache is dropped.
pub struct Cache<V, E, F> {
    store: Arc<Store<V, E>>,
    load: F,
    config: CacheConfig,
    shutdown: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<V, E, F, Fut> Cache<V, E, F>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = std::result::Result<V, E>>,
{
    /// Creates a new cache with the given computation, sweeping expired
    /// entries every `sweep_interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(load: F, sweep_interval: Duration) -> Result<Self> {
        Self::with_config(load, CacheConfig::new(sweep_interval))
    }

    /// Creates a new cache from a full configuration.
    pub fn with_config(load: F, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let store = Arc::new(Store::new());
        let (shutdown, signal) = watch::channel(false);
        let handle = sweeper::spawn(
            &runtime,
            Arc::downgrade(&store),
            config.sweep_interval,
            signal,
        );

        Ok(Self {
            store,
            load,
            config,
            shutdown,
            sweeper: Mutex::new(Some(handle)),
        })
    }

    /// Gets the result for `key`, computing it if no entry exists.
    ///
    /// `ttl` only applies when this call creates the entry. If another
    /// caller is already computing the key, this waits for its result, up
    /// to the configured wait timeout.
    pub async fn get(&self, key: &str, ttl: Duration) -> Result<Lookup<V, E>> {
        self.lookup(key, ttl, self.config.wait_timeout).await
    }

    /// Like [`Cache::get`], but gives up waiting on someone else's
    /// computation after `limit`.
    pub async fn get_within(
        &self,
        key: &str,
        ttl: Duration,
        limit: Duration,
    ) -> Result<Lookup<V, E>> {
        self.lookup(key, ttl, Some(limit)).await
    }

    async fn lookup(
        &self,
        key: &str,
        ttl: Duration,
        limit: Option<Duration>,
    ) -> Result<Lookup<V, E>> {
        match self.store.claim(key, Instant::now(), ttl, self.config.expiry)? {
            Claim::Join(entry) => {
                trace!(key, "joining existing entry");
                let outcome = match limit {
                    Some(limit) => timeout(limit, entry.wait())
                        .await
                        .map_err(|_| CacheError::Timeout(limit))?,
                    None => entry.wait().await,
                };
                let result = outcome.ok_or(CacheError::Abandoned)?;
                Ok(Lookup {
                    result,
                    coalesced: true,
                })
            }
            Claim::Compute(publisher) => {
                trace!(key, "computing new entry");
                // Declared after the publisher so it drops first: the entry
                // leaves the map before waiters learn it was abandoned.
                let guard = AbandonGuard {
                    store: &self.store,
                    key,
                    epoch: publisher.epoch(),
                    armed: true,
                };
                let result = (self.load)(key.to_owned()).await.map_err(Arc::new);
                guard.disarm();
                publisher.publish(result.clone());
                Ok(Lookup {
                    result,
                    coalesced: false,
                })
            }
        }
    }

    /// Deletes an entry from the cache.
    ///
    /// An in-flight computation for the key still completes and wakes its
    /// waiters; later lookups start a new entry.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key)
    }

    /// Clears all entries from the cache
    pub fn delete_all(&self) -> Result<()> {
        self.store.clear()
    }

    /// Stops the sweeper, erases every entry and marks the cache closed.
    ///
    /// Every later operation, including a second `close`, fails with
    /// [`CacheError::Closed`].
    pub async fn close(&self) -> Result<()> {
        let erased = self.store.close()?;
        self.shutdown.send_replace(true);

        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            resume_sweeper_panic(handle.await);
        }

        debug!(erased, "cache closed");
        Ok(())
    }

    /// Gets the number of entries, including ones still being computed
    pub fn size(&self) -> usize {
        self.store.len()
    }

    /// Returns whether [`Cache::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }

    /// Gets the configuration the cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

/// Re-raises a panic from the sweeper on the closing caller. A cancelled
/// sweeper only happens when the runtime shuts down and has nothing to report.
fn resume_sweeper_panic(joined: std::result::Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            std::panic::resume_unwind(err.into_panic());
        }
    }
}

/// Removes an entry whose creator went away before publishing, so the next
/// lookup recomputes instead of joining a dead entry.
struct AbandonGuard<'a, V, E> {
    store: &'a Store<V, E>,
    key: &'a str,
    epoch: u64,
    armed: bool,
}

impl<V, E> AbandonGuard<'_, V, E> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<V, E> Drop for AbandonGuard<'_, V, E> {
    fn drop(&mut self) {
        if self.armed && self.store.remove_epoch(self.key, self.epoch) {
            debug!(key = self.key, "removed abandoned entry");
        }
    }
}
