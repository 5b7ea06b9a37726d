//! Background expiry sweep.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace};

use crate::entry::deadline_after;
use crate::store::Store;

/// Starts the sweeper for `store` on `runtime`.
///
/// The task stops once `shutdown` is signalled or its sender dropped, or
/// once the store itself is gone.
pub(crate) fn spawn<V, E>(
    runtime: &Handle,
    store: Weak<Store<V, E>>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let start = deadline_after(Instant::now(), period);
    runtime.spawn(run(store, start, period, shutdown))
}

async fn run<V, E>(
    store: Weak<Store<V, E>>,
    start: Instant,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.sweep(Instant::now());
                if removed > 0 {
                    debug!(removed, "swept expired entries");
                } else {
                    trace!("sweep found nothing to remove");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!("sweeper stopped");
}
