//! Fleet cap and background pruning, grounded on `core/stall/stall_pool.go`.
//!
//! A staller registers once, is tracked until it deregisters itself
//! (natural termination) or the pool evicts it (fleet over capacity).
//! Two background tasks do the work the original ran as two
//! goroutines: draining the deregister channel, and pruning once a
//! second when the fleet exceeds 90% of its cap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::{StallError, Staller, StallerCollection, StallerHandle};

#[derive(Debug, Clone, Copy)]
pub struct StallerPoolOptions {
    pub maximum_connections: usize,
    /// Per-group cap (spec.md section 4.4's `groupLimit`): a single
    /// group can exhaust this long before the fleet cap, keeping one
    /// abusive peer from crowding out everyone else.
    pub group_limit: usize,
    pub prune_interval: Duration,
    pub prune_target_ratio: f64,
}

impl Default for StallerPoolOptions {
    fn default() -> Self {
        Self {
            maximum_connections: 1024,
            group_limit: 64,
            prune_interval: Duration::from_secs(1),
            prune_target_ratio: 0.9,
        }
    }
}

pub struct StallerPool {
    collection: Arc<StallerCollection>,
    deregister_tx: UnboundedSender<StallerHandle>,
    deregister_rx: tokio::sync::Mutex<Option<UnboundedReceiver<StallerHandle>>>,
    options: StallerPoolOptions,
}

impl StallerPool {
    pub fn new(options: StallerPoolOptions) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            collection: Arc::new(StallerCollection::new(options.group_limit)),
            deregister_tx: tx,
            deregister_rx: tokio::sync::Mutex::new(Some(rx)),
            options,
        })
    }

    pub fn deregister_sender(&self) -> UnboundedSender<StallerHandle> {
        self.deregister_tx.clone()
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Registers a staller with the pool. Fails with `PoolFull` if the
    /// fleet is already at capacity, or `GroupFull` if the staller's
    /// own group already has `group_limit` members -- callers are
    /// expected to refuse the connection (or close it immediately) on
    /// error, matching the original's `Register`.
    pub fn register(&self, staller: StallerHandle) -> Result<(), StallError> {
        if self.collection.len() >= self.options.maximum_connections {
            tracing::warn!("maximum connections reached, cannot register staller");
            return Err(StallError::PoolFull);
        }
        self.collection.add(staller)
    }

    /// Closes every staller in `group`. Matches the original's
    /// `StopByIdentifier`, used to drop an entire abusive group at
    /// once instead of waiting for the prune ticker.
    pub fn stop_by_identifier(&self, group: &str) {
        self.collection.close_group(group);
    }

    /// Spawns the deregistration watcher and the prune ticker.
    /// `shutdown` is a broadcast receiver shared with the rest of the
    /// node; either background task exits when it fires.
    pub fn start(self: &Arc<Self>, shutdown: broadcast::Sender<()>) -> (JoinHandle<()>, JoinHandle<()>) {
        let dereg_handle = {
            let pool = self.clone();
            let mut shutdown_rx = shutdown.subscribe();
            let mut guard = pool.deregister_rx.try_lock().expect("staller pool start() called more than once");
            let mut rx = guard.take().expect("staller pool start() called more than once");
            drop(guard);

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(staller) = rx.recv() => {
                            pool.collection.delete(staller.group_identifier(), staller.identifier());
                        }
                        _ = shutdown_rx.recv() => return,
                        else => return,
                    }
                }
            })
        };

        let prune_handle = {
            let pool = self.clone();
            let mut shutdown_rx = shutdown.subscribe();
            let interval = self.options.prune_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => pool.prune(),
                        _ = shutdown_rx.recv() => return,
                    }
                }
            })
        };

        (dereg_handle, prune_handle)
    }

    /// Closes every staller in the fleet. Call once, before dropping
    /// the pool, so in-flight connections are not silently abandoned.
    pub fn stop(&self) {
        tracing::warn!("stopping staller pool");
        self.collection.close_all();
    }

    fn prune(&self) {
        let target = (self.options.maximum_connections as f64 * self.options.prune_target_ratio) as usize;
        let length = self.collection.len();
        if length > target {
            self.collection.prune_n(length - target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeStaller {
        group: String,
        id: u64,
        closed: AtomicBool,
    }

    impl crate::Staller for FakeStaller {
        fn group_identifier(&self) -> &str {
            &self.group
        }
        fn identifier(&self) -> u64 {
            self.id
        }
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn fake(group: &str, id: u64) -> StallerHandle {
        Arc::new(FakeStaller {
            group: group.to_string(),
            id,
            closed: AtomicBool::new(false),
        })
    }

    #[test]
    fn register_rejects_once_at_capacity() {
        let pool = StallerPool::new(StallerPoolOptions {
            maximum_connections: 2,
            ..StallerPoolOptions::default()
        });
        assert!(pool.register(fake("a", 1)).is_ok());
        assert!(pool.register(fake("a", 2)).is_ok());
        assert!(matches!(pool.register(fake("a", 3)), Err(StallError::PoolFull)));
    }

    #[test]
    fn register_rejects_once_a_group_is_at_its_limit_even_with_fleet_headroom() {
        let pool = StallerPool::new(StallerPoolOptions {
            maximum_connections: 100,
            group_limit: 10,
            ..StallerPoolOptions::default()
        });
        for i in 0..10 {
            pool.register(fake("heavy", i)).unwrap();
        }
        assert!(matches!(pool.register(fake("heavy", 10)), Err(StallError::GroupFull)));
        assert!(pool.register(fake("light", 0)).is_ok());
    }

    #[test]
    fn stop_by_identifier_closes_only_the_named_group() {
        let pool = StallerPool::new(StallerPoolOptions::default());
        pool.register(fake("x", 1)).unwrap();
        pool.register(fake("y", 2)).unwrap();

        pool.stop_by_identifier("x");

        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn prune_ticker_shrinks_an_over_capacity_fleet() {
        let pool = StallerPool::new(StallerPoolOptions {
            maximum_connections: 10,
            group_limit: 10,
            prune_interval: Duration::from_millis(5),
            prune_target_ratio: 0.5,
        });
        for i in 0..10 {
            pool.register(fake("crowded", i)).unwrap();
        }

        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        let (dereg, prune) = pool.start(shutdown_tx.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pool.len() <= 5);

        let _ = shutdown_tx.send(());
        dereg.abort();
        prune.abort();
    }
}
