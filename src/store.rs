use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::ExpiryPolicy;
use crate::entry::{Entry, Publisher, deadline_after};
use crate::error::{CacheError, Result};

/// Result of claiming a key under the map lock.
pub(crate) enum Claim<V, E> {
    /// Another caller owns the computation; wait on its entry.
    Join(Entry<V, E>),
    /// This caller created the entry and must compute and publish it.
    Compute(Publisher<V, E>),
}

struct State<V, E> {
    entries: HashMap<String, Entry<V, E>>,
    next_epoch: u64,
    closed: bool,
}

/// The key to entry map shared between callers and the sweeper.
///
/// Every mutation goes through the one lock, which is only held for
/// bookkeeping and never across a computation.
pub(crate) struct Store<V, E> {
    state: Mutex<State<V, E>>,
}

impl<V, E> Store<V, E> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                next_epoch: 0,
                closed: false,
            }),
        }
    }

    /// Joins the live entry for `key`, or inserts a new one that expires
    /// `ttl` after `now`.
    pub(crate) fn claim(
        &self,
        key: &str,
        now: Instant,
        ttl: Duration,
        expiry: ExpiryPolicy,
    ) -> Result<Claim<V, E>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CacheError::Closed);
        }

        if let Some(entry) = state.entries.get(key) {
            let stale = expiry == ExpiryPolicy::Strict && entry.is_expired(now) && entry.is_ready();
            if !stale {
                return Ok(Claim::Join(entry.clone()));
            }
        }

        state.next_epoch += 1;
        let (entry, publisher) = Entry::new(state.next_epoch, deadline_after(now, ttl));
        state.entries.insert(key.to_owned(), entry);
        Ok(Claim::Compute(publisher))
    }

    /// Removes `key` only if it still holds the entry from `epoch`.
    pub(crate) fn remove_epoch(&self, key: &str, epoch: u64) -> bool {
        let mut state = self.state.lock();
        if state.entries.get(key).is_some_and(|entry| entry.epoch() == epoch) {
            state.entries.remove(key);
            return true;
        }
        false
    }

    pub(crate) fn remove(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CacheError::Closed);
        }
        state.entries.remove(key);
        Ok(())
    }

    pub(crate) fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CacheError::Closed);
        }
        state.entries.clear();
        Ok(())
    }

    /// Erases everything and refuses further operations.
    pub(crate) fn close(&self) -> Result<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CacheError::Closed);
        }
        state.closed = true;
        let erased = state.entries.len();
        state.entries.clear();
        Ok(erased)
    }

    /// Drops every entry whose deadline is at or before `now`, returning
    /// how many were removed.
    pub(crate) fn sweep(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        before - state.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
