use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// What a computation produced, as handed to every caller of an epoch.
pub(crate) type Outcome<V, E> = Result<V, Arc<E>>;

type Slot<V, E> = Option<Outcome<V, E>>;

// Roughly 30 years, used when `now + ttl` would overflow.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Computes the deadline for an entry created at `now` that lives for `ttl`.
pub(crate) fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl).unwrap_or(now + FAR_FUTURE)
}

/// One load epoch for a key: created by the caller that wins the map lock,
/// resolved exactly once when its computation finishes.
pub(crate) struct Entry<V, E> {
    epoch: u64,
    deadline: Instant,
    ready: watch::Receiver<Slot<V, E>>,
}

// Derived `Clone` would demand `V: Clone` and `E: Clone`.
impl<V, E> Clone for Entry<V, E> {
    fn clone(&self) -> Self {
        Self {
            epoch: self.epoch,
            deadline: self.deadline,
            ready: self.ready.clone(),
        }
    }
}

impl<V, E> Entry<V, E> {
    /// Creates an unresolved entry along with the only handle able to
    /// resolve it.
    pub(crate) fn new(epoch: u64, deadline: Instant) -> (Self, Publisher<V, E>) {
        let (tx, rx) = watch::channel(None);
        let entry = Self {
            epoch,
            deadline,
            ready: rx,
        };
        (entry, Publisher { epoch, tx })
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.deadline <= now
    }

    /// Whether the computation has published its result.
    pub(crate) fn is_ready(&self) -> bool {
        self.ready.borrow().is_some()
    }
}

impl<V: Clone, E> Entry<V, E> {
    /// Waits until the entry is resolved and returns its outcome, or `None`
    /// if the publisher was dropped without resolving it.
    pub(crate) async fn wait(mut self) -> Option<Outcome<V, E>> {
        if let Ok(slot) = self.ready.wait_for(Option::is_some).await {
            return slot.clone();
        }
        // The sender may have published right before going away.
        self.ready.borrow().clone()
    }
}

/// Write half of an entry's one-shot signal.
///
/// Dropping it without calling [`Publisher::publish`] closes the channel,
/// which waiters observe as an abandoned computation.
pub(crate) struct Publisher<V, E> {
    epoch: u64,
    tx: watch::Sender<Slot<V, E>>,
}

impl<V, E> Publisher<V, E> {
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Stores the outcome and wakes every waiter. The value is written
    /// before the version bump that releases them.
    pub(crate) fn publish(self, outcome: Outcome<V, E>) {
        self.tx.send_replace(Some(outcome));
    }
}
