//! Per-client FTP throttle (spec.md section 4.8 / C11), grounded on
//! `protocol/ftp/throttle/ftp_throttle.go`: every pending operation
//! waits on its own channel, and a single ticker releases at most one
//! waiter per client per tick, so one client queuing many operations
//! never starves the release rate of every other client.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    #[error("too many pending operations for this client")]
    TooManyPending,
    #[error("throttle closed while operation was still queued")]
    ThrottleEnded,
}

struct State {
    waiters: HashMap<u64, VecDeque<oneshot::Sender<bool>>>,
}

/// Shared across every connection of a single FTP server instance.
/// `throttle` is called before each storage-backend operation;
/// `release_all` is called once a client disconnects.
pub struct FtpThrottle {
    state: Mutex<State>,
    max_pending_operations: usize,
}

impl FtpThrottle {
    pub fn new(max_pending_operations: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State { waiters: HashMap::new() }),
            max_pending_operations,
        })
    }

    /// Queues the caller behind `client_id`'s other pending operations
    /// and waits for the release ticker to let it through. Fails
    /// immediately, without queuing, if that client already has
    /// `max_pending_operations` operations waiting.
    pub async fn throttle(&self, client_id: u64) -> Result<(), ThrottleError> {
        let rx = {
            let mut state = self.state.lock().expect("throttle mutex poisoned");
            let queue = state.waiters.entry(client_id).or_default();
            if queue.len() >= self.max_pending_operations {
                return Err(ThrottleError::TooManyPending);
            }
            let (tx, rx) = oneshot::channel();
            queue.push_back(tx);
            rx
        };

        match rx.await {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(ThrottleError::ThrottleEnded),
        }
    }

    /// Releases the head-of-line waiter for every client that has one
    /// queued. Called once per tick by the background loop spawned
    /// from [`FtpThrottle::start`].
    fn release_one_per_client(&self) {
        let mut state = self.state.lock().expect("throttle mutex poisoned");
        for queue in state.waiters.values_mut() {
            if let Some(tx) = queue.pop_front() {
                let _ = tx.send(true);
            }
        }
    }

    /// Cancels and drops every operation still queued for one client.
    /// Called when that client disconnects so its waiters do not leak
    /// until the next release tick (or forever, if it never comes).
    pub fn release_all(&self, client_id: u64) {
        let mut state = self.state.lock().expect("throttle mutex poisoned");
        if let Some(queue) = state.waiters.remove(&client_id) {
            for tx in queue {
                let _ = tx.send(false);
            }
        }
    }

    fn close(&self) {
        let mut state = self.state.lock().expect("throttle mutex poisoned");
        for (_, queue) in state.waiters.drain() {
            for tx in queue {
                let _ = tx.send(false);
            }
        }
    }

    /// Spawns the release ticker. Every queued operation across every
    /// client is cancelled once `shutdown` fires.
    pub fn start(self: &Arc<Self>, wait_time: Duration, shutdown: broadcast::Sender<()>) -> JoinHandle<()> {
        let this = self.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(wait_time);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.release_one_per_client(),
                    _ = shutdown_rx.recv() => {
                        this.close();
                        return;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn throttle_releases_one_waiter_per_client_per_tick() {
        let throttle = FtpThrottle::new(8);
        let (shutdown_tx, _rx) = broadcast::channel(1);
        let handle = throttle.start(Duration::from_millis(5), shutdown_tx.clone());

        let a = tokio::time::timeout(Duration::from_secs(1), throttle.throttle(1));
        let b = tokio::time::timeout(Duration::from_secs(1), throttle.throttle(2));
        let (a, b) = tokio::join!(a, b);
        assert!(a.unwrap().is_ok());
        assert!(b.unwrap().is_ok());

        let _ = shutdown_tx.send(());
        handle.abort();
    }

    #[tokio::test]
    async fn queue_rejects_once_full() {
        let throttle = FtpThrottle::new(1);
        let _first = tokio::spawn({
            let throttle = throttle.clone();
            async move { throttle.throttle(1).await }
        });
        // Give the spawned task a chance to actually queue before
        // nobody ticks the release timer.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = throttle.throttle(1).await;
        assert!(matches!(second, Err(ThrottleError::TooManyPending)));
    }

    #[tokio::test]
    async fn release_all_cancels_pending_waiters_for_that_client() {
        let throttle = FtpThrottle::new(4);
        let waiter = tokio::spawn({
            let throttle = throttle.clone();
            async move { throttle.throttle(7).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        throttle.release_all(7);
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ThrottleError::ThrottleEnded)));
    }
}
