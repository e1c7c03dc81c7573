//! Tarpit Timeout -- adaptive per-peer timeout learning (spec.md
//! section 4.5), grounded on `http/metrics/timeout.go`'s
//! `TimeoutWatcher`.
//!
//! The watcher owns two caches: a *hot* cache of in-progress learners
//! (one [`ring::TimeoutForIp`] per peer, still climbing the step
//! function) and a *cold* cache of peers whose timeout has converged
//! and is now served directly. Once a peer is cold, it stays cold
//! until its TTL lapses -- there is no demotion path.

mod ring;
mod ttl_cache;

pub use ring::ConvergenceOutcome;

use std::sync::Arc;
use std::time::Duration;

use tarpit_protocol::Era;
use ring::TimeoutForIp;
use ttl_cache::TtlCache;

/// Propagates a newly-converged cold-cache entry to the rest of the
/// cluster. Implemented by `tarpit-gossip`; kept as a trait here so
/// this crate has no dependency on the gossip transport, breaking
/// what would otherwise be a cycle (gossip needs to call back into
/// the timeout watcher to record what it hears, and the watcher needs
/// to call out to gossip to announce what it learns).
pub trait ColdCachePublisher: Send + Sync {
    fn publish_cold_ip(&self, peer: &str, timeout: Duration);
}

/// Used when the node has no cluster configured, or failed to join
/// one -- the watcher still learns and serves timeouts locally, it
/// just never tells anyone else what it found.
pub struct NullPublisher;

impl ColdCachePublisher for NullPublisher {
    fn publish_cold_ip(&self, _peer: &str, _timeout: Duration) {}
}

pub struct TimeoutWatcher {
    era: Era,
    hot_cache: TtlCache<String, Arc<TimeoutForIp>>,
    cold_cache: TtlCache<String, Duration>,
    publisher: Arc<dyn ColdCachePublisher>,
}

impl TimeoutWatcher {
    pub fn new(era: Era, publisher: Arc<dyn ColdCachePublisher>) -> Self {
        Self {
            era,
            hot_cache: TtlCache::new(era.hot_cache_ttl()),
            cold_cache: TtlCache::new(era.cold_cache_ttl()),
            publisher,
        }
    }

    pub fn with_null_publisher(era: Era) -> Self {
        Self::new(era, Arc::new(NullPublisher))
    }

    /// Spec.md section 4.5 `GetTimeout`: cold cache first, else
    /// fetch-or-create the hot-cache learner and step it forward.
    pub fn get_timeout(&self, peer: &str) -> Duration {
        if let Some(committed) = self.cold_cache.get(&peer.to_string()) {
            return committed;
        }

        let learner = match self.hot_cache.get(&peer.to_string()) {
            Some(existing) => existing,
            None => {
                let fresh = Arc::new(TimeoutForIp::new(self.era));
                self.hot_cache.insert(peer.to_string(), fresh.clone());
                fresh
            }
        };

        learner.next_timeout()
    }

    /// Spec.md section 4.5 `RecordResponse`: append the observation to
    /// the peer's learner and commit to the cold cache (broadcasting
    /// the new fact) if the instant-commit or convergence rule fires.
    ///
    /// `actual` is the *actually elapsed* stall duration, not the
    /// duration that was granted -- the instant-commit check in the
    /// original reads the same value it was just passed for recording,
    /// so a peer that is slow to hang up still trips the threshold
    /// even if it was granted a shorter timeout.
    pub fn record_response(&self, peer: &str, actual: Duration, was_closed_by_peer: bool) {
        let learner = match self.hot_cache.get(&peer.to_string()) {
            Some(existing) => existing,
            None => {
                let fresh = Arc::new(TimeoutForIp::new(self.era));
                self.hot_cache.insert(peer.to_string(), fresh.clone());
                fresh
            }
        };

        match learner.record(actual, was_closed_by_peer) {
            ConvergenceOutcome::InstantCommit(d) | ConvergenceOutcome::Converged(d) => {
                self.commit_to_cold_cache_with_broadcast(peer, d);
            }
            ConvergenceOutcome::KeepLearning => {}
        }
    }

    pub fn has_cold_cache_timeout(&self, peer: &str) -> bool {
        self.cold_cache.contains(&peer.to_string())
    }

    /// Commits without telling anyone else -- used by the local
    /// learner committing its own observation's rebroadcast (which
    /// goes through `commit_to_cold_cache_with_broadcast` instead) and
    /// by the gossip receiver absorbing an already-known fact.
    ///
    /// Deletes the peer's hot-cache entry: once committed, the peer is
    /// served straight from the cold cache, and a stale hot learner
    /// left behind would otherwise re-converge on the next observation
    /// and broadcast the same fact again.
    pub fn commit_to_cold_cache(&self, peer: &str, timeout: Duration) {
        self.cold_cache.insert(peer.to_string(), timeout);
        self.hot_cache.remove(&peer.to_string());
    }

    pub fn commit_to_cold_cache_with_broadcast(&self, peer: &str, timeout: Duration) {
        self.commit_to_cold_cache(peer, timeout);
        self.publisher.publish_cold_ip(peer, timeout);
    }

    /// Periodic housekeeping: clears lapsed hot and cold entries. Run
    /// from a background task alongside the rest of the node's tickers.
    pub fn sweep(&self) {
        self.hot_cache.sweep_expired();
        self.cold_cache.sweep_expired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tarpit_protocol::ERA_0;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, Duration)>>,
    }

    impl ColdCachePublisher for RecordingPublisher {
        fn publish_cold_ip(&self, peer: &str, timeout: Duration) {
            self.published.lock().unwrap().push((peer.to_string(), timeout));
        }
    }

    #[test]
    fn cold_cache_short_circuits_hot_learning() {
        let watcher = TimeoutWatcher::with_null_publisher(ERA_0);
        watcher.commit_to_cold_cache("1.2.3.4", Duration::from_secs(42));
        assert_eq!(watcher.get_timeout("1.2.3.4"), Duration::from_secs(42));
    }

    #[test]
    fn lookups_within_the_grace_period_stay_flat() {
        let watcher = TimeoutWatcher::with_null_publisher(ERA_0);
        let first = watcher.get_timeout("5.5.5.5");
        let second = watcher.get_timeout("5.5.5.5");
        assert_eq!(first, ERA_0.grace_timeout());
        assert_eq!(second, ERA_0.grace_timeout());
    }

    #[test]
    fn instant_commit_broadcasts_the_longest_timeout() {
        let publisher = Arc::new(RecordingPublisher::default());
        let watcher = TimeoutWatcher::new(ERA_0, publisher.clone());

        watcher.record_response("9.9.9.9", ERA_0.instant_commit_threshold() + Duration::from_secs(1), false);

        assert!(watcher.has_cold_cache_timeout("9.9.9.9"));
        assert_eq!(watcher.get_timeout("9.9.9.9"), ERA_0.longest_timeout());
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[test]
    fn committing_to_cold_cache_deletes_the_hot_cache_entry() {
        let watcher = TimeoutWatcher::with_null_publisher(ERA_0);
        watcher.get_timeout("7.7.7.7");
        assert!(watcher.hot_cache.get(&"7.7.7.7".to_string()).is_some());

        watcher.commit_to_cold_cache("7.7.7.7", Duration::from_secs(5));

        assert!(watcher.hot_cache.get(&"7.7.7.7".to_string()).is_none());
    }

    #[test]
    fn absorbing_a_known_fact_does_not_rebroadcast() {
        let publisher = Arc::new(RecordingPublisher::default());
        let watcher = TimeoutWatcher::new(ERA_0, publisher.clone());

        watcher.commit_to_cold_cache("8.8.8.8", Duration::from_secs(3));
        assert!(watcher.has_cold_cache_timeout("8.8.8.8"));
        assert!(publisher.published.lock().unwrap().is_empty());
    }
}
