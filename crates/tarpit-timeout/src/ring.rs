//! Per-peer learning state, grounded on `http/metrics/timeout.go`'s
//! `TimeoutForIp`: a request counter plus two capped rings (valid and
//! invalid observed durations) that `RecordResponse` appends to and
//! `GetStandardDeviation`/`GetAverageTimeoutInSample` read from.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tarpit_protocol::Era;

pub struct TimeoutForIp {
    inner: Mutex<Inner>,
    era: Era,
}

struct Inner {
    requests: u32,
    last_performed_timeout: Duration,
    valid_timeouts: VecDeque<Duration>,
    invalid_timeouts: VecDeque<Duration>,
}

impl TimeoutForIp {
    pub fn new(era: Era) -> Self {
        Self {
            inner: Mutex::new(Inner {
                requests: 0,
                last_performed_timeout: Duration::ZERO,
                valid_timeouts: VecDeque::with_capacity(era.sample_size),
                invalid_timeouts: VecDeque::with_capacity(era.sample_size),
            }),
            era,
        }
    }

    /// Computes the next timeout to grant as a monotone step function
    /// of the last one granted, then advances `requests` and
    /// `lastPerformedTimeout` by that amount -- spec.md section 4.5
    /// step 2-3.
    pub fn next_timeout(&self) -> Duration {
        let mut inner = self.inner.lock().expect("timeout-for-ip lock poisoned");

        let next = if inner.requests < self.era.grace_requests {
            self.era.grace_timeout()
        } else if inner.last_performed_timeout < Duration::from_secs(10) {
            inner.last_performed_timeout + Duration::from_secs(self.era.sub_ten_increment_secs)
        } else if inner.last_performed_timeout < Duration::from_secs(30) {
            inner.last_performed_timeout + Duration::from_secs(self.era.sub_thirty_increment_secs)
        } else if inner.last_performed_timeout < self.era.upper_timeout_bound() {
            inner.last_performed_timeout + Duration::from_secs(self.era.over_thirty_increment_secs)
        } else {
            self.era.longest_timeout()
        };

        inner.requests += 1;
        inner.last_performed_timeout = next;
        next
    }

    /// Appends `actual` to the valid or invalid ring (capped at
    /// `sampleSize`, oldest evicted first) and returns whether the
    /// invalid ring is now full and stable enough to commit, per the
    /// convergence rule.
    pub fn record(&self, actual: Duration, was_closed_by_peer: bool) -> ConvergenceOutcome {
        let mut inner = self.inner.lock().expect("timeout-for-ip lock poisoned");

        if !was_closed_by_peer && actual > self.era.instant_commit_threshold() {
            return ConvergenceOutcome::InstantCommit(self.era.longest_timeout());
        }

        let ring = if was_closed_by_peer {
            &mut inner.valid_timeouts
        } else {
            &mut inner.invalid_timeouts
        };

        if ring.len() >= self.era.sample_size {
            ring.pop_front();
        }
        ring.push_back(actual);

        if !was_closed_by_peer && inner.invalid_timeouts.len() >= self.era.sample_size {
            let (mean, stddev) = sample_stats(&inner.invalid_timeouts);
            if stddev <= self.era.sample_deviation() {
                let commit = mean
                    .checked_sub(stddev * 2)
                    .unwrap_or(Duration::ZERO)
                    .max(self.era.lower_timeout_bound());
                return ConvergenceOutcome::Converged(commit);
            }
        }

        ConvergenceOutcome::KeepLearning
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceOutcome {
    InstantCommit(Duration),
    Converged(Duration),
    KeepLearning,
}

fn sample_stats(samples: &VecDeque<Duration>) -> (Duration, Duration) {
    let count = samples.len() as f64;
    let mean_secs = samples.iter().map(Duration::as_secs_f64).sum::<f64>() / count;
    let variance = samples
        .iter()
        .map(|d| {
            let diff = d.as_secs_f64() - mean_secs;
            diff * diff
        })
        .sum::<f64>()
        / count;
    let stddev_secs = variance.sqrt();
    (Duration::from_secs_f64(mean_secs.max(0.0)), Duration::from_secs_f64(stddev_secs.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarpit_protocol::ERA_0;

    #[test]
    fn grace_requests_get_the_grace_timeout() {
        let record = TimeoutForIp::new(ERA_0);
        for _ in 0..ERA_0.grace_requests {
            assert_eq!(record.next_timeout(), ERA_0.grace_timeout());
        }
        assert_ne!(record.next_timeout(), ERA_0.grace_timeout());
    }

    #[test]
    fn step_function_climbs_through_each_band() {
        let record = TimeoutForIp::new(ERA_0);
        for _ in 0..ERA_0.grace_requests {
            record.next_timeout();
        }
        // first post-grace call starts from last_performed_timeout = grace_timeout (100ms),
        // which is < 10s, so it steps by sub_ten_increment.
        let first = record.next_timeout();
        assert_eq!(first, ERA_0.grace_timeout() + Duration::from_secs(ERA_0.sub_ten_increment_secs));
    }

    #[test]
    fn instant_commit_fires_above_threshold_when_peer_did_not_close() {
        let record = TimeoutForIp::new(ERA_0);
        let outcome = record.record(ERA_0.instant_commit_threshold() + Duration::from_secs(1), false);
        assert_eq!(outcome, ConvergenceOutcome::InstantCommit(ERA_0.longest_timeout()));
    }

    #[test]
    fn instant_commit_does_not_fire_when_peer_closed_the_connection() {
        let record = TimeoutForIp::new(ERA_0);
        let outcome = record.record(ERA_0.instant_commit_threshold() + Duration::from_secs(1), true);
        assert_eq!(outcome, ConvergenceOutcome::KeepLearning);
    }

    #[test]
    fn converges_once_invalid_sample_is_full_and_stable() {
        let record = TimeoutForIp::new(ERA_0);
        assert_eq!(record.record(Duration::from_secs(5), false), ConvergenceOutcome::KeepLearning);
        assert_eq!(record.record(Duration::from_secs(5), false), ConvergenceOutcome::KeepLearning);
        match record.record(Duration::from_secs(5), false) {
            ConvergenceOutcome::Converged(d) => assert!(d <= Duration::from_secs(5)),
            other => panic!("expected convergence, got {other:?}"),
        }
    }

    #[test]
    fn does_not_converge_while_samples_are_too_spread_out() {
        let record = TimeoutForIp::new(ERA_0);
        record.record(Duration::from_secs(1), false);
        record.record(Duration::from_secs(20), false);
        assert_eq!(record.record(Duration::from_secs(40), false), ConvergenceOutcome::KeepLearning);
    }
}
