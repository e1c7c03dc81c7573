//! Tuning constants shared across crates -- mirrors the teacher's
//! "protocol era" pattern (a single named, versioned set of timing
//! parameters) so every default in the system traces to one place.
//!
//! Unlike the teacher's era, these are not a wire-negotiated contract
//! between peers -- they are node-local defaults that `tarpit-config`
//! overlays with file/env/CLI values. They still live here, not in
//! `tarpit-config`, so that crates which have no reason to depend on
//! config (e.g. `tarpit-stall`) can fall back to a sane default without
//! a circular dependency.

use std::time::Duration;

/// A named set of tuning defaults. Only one exists today (`ERA_0`); the
/// shape exists so a future behavioural generation can be introduced
/// without changing every call site's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Era {
    pub id: u16,

    // -- Timeout watcher (spec.md 4.5) --
    pub grace_requests: u32,
    pub grace_timeout_ms: u64,
    pub sub_ten_increment_secs: u64,
    pub sub_thirty_increment_secs: u64,
    pub over_thirty_increment_secs: u64,
    pub upper_timeout_bound_secs: u64,
    pub lower_timeout_bound_secs: u64,
    pub longest_timeout_secs: u64,
    pub instant_commit_threshold_secs: u64,
    pub sample_size: usize,
    pub sample_deviation_ms: u64,
    pub hot_cache_ttl_secs: u64,
    pub cold_cache_ttl_secs: u64,

    // -- Staller (spec.md 4.3) --
    pub default_transfer_rate_ms: u64,
    pub staller_report_interval_secs: u64,

    // -- Staller pool (spec.md 4.4) --
    pub pool_prune_interval_secs: u64,
    pub pool_prune_target_ratio: f64,

    // -- Protocol detector (spec.md 4.7) --
    pub initial_read_timeout_secs: u64,
    pub detect_read_timeout_secs: u64,
    pub probe_interval_ms: u64,
    pub rewind_buffer_size: usize,
    pub fallback_write_interval_secs: u64,

    // -- FTP throttle (spec.md 4.8 / 3) --
    pub ftp_wait_time_ms: u64,

    // -- Recast (spec.md 4.9) --
    pub time_wasted_ratio: f64,
}

impl Era {
    pub const fn grace_timeout(&self) -> Duration {
        Duration::from_millis(self.grace_timeout_ms)
    }

    pub const fn longest_timeout(&self) -> Duration {
        Duration::from_secs(self.longest_timeout_secs)
    }

    pub const fn lower_timeout_bound(&self) -> Duration {
        Duration::from_secs(self.lower_timeout_bound_secs)
    }

    pub const fn upper_timeout_bound(&self) -> Duration {
        Duration::from_secs(self.upper_timeout_bound_secs)
    }

    pub const fn instant_commit_threshold(&self) -> Duration {
        Duration::from_secs(self.instant_commit_threshold_secs)
    }

    pub const fn sample_deviation(&self) -> Duration {
        Duration::from_millis(self.sample_deviation_ms)
    }

    pub const fn hot_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.hot_cache_ttl_secs)
    }

    pub const fn cold_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cold_cache_ttl_secs)
    }

    pub const fn default_transfer_rate(&self) -> Duration {
        Duration::from_millis(self.default_transfer_rate_ms)
    }

    pub const fn staller_report_interval(&self) -> Duration {
        Duration::from_secs(self.staller_report_interval_secs)
    }

    pub const fn initial_read_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_read_timeout_secs)
    }

    pub const fn detect_read_timeout(&self) -> Duration {
        Duration::from_secs(self.detect_read_timeout_secs)
    }

    pub const fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub const fn fallback_write_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_write_interval_secs)
    }

    pub const fn ftp_wait_time(&self) -> Duration {
        Duration::from_millis(self.ftp_wait_time_ms)
    }
}

/// Era 0: the defaults named throughout `spec.md`.
pub const ERA_0: Era = Era {
    id: 0,

    grace_requests: 3,
    grace_timeout_ms: 100,
    sub_ten_increment_secs: 2,
    sub_thirty_increment_secs: 5,
    over_thirty_increment_secs: 10,
    upper_timeout_bound_secs: 60,
    lower_timeout_bound_secs: 1,
    longest_timeout_secs: 7 * 24 * 3600,
    instant_commit_threshold_secs: 180,
    sample_size: 3,
    sample_deviation_ms: 1000,
    hot_cache_ttl_secs: 3600,
    cold_cache_ttl_secs: 48 * 3600,

    default_transfer_rate_ms: 75,
    staller_report_interval_secs: 30,

    pool_prune_interval_secs: 1,
    pool_prune_target_ratio: 0.9,

    initial_read_timeout_secs: 2,
    detect_read_timeout_secs: 6,
    probe_interval_ms: 500,
    rewind_buffer_size: 128,
    fallback_write_interval_secs: 2,

    ftp_wait_time_ms: 1000,

    time_wasted_ratio: 0.05,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_ordered() {
        assert!(ERA_0.lower_timeout_bound_secs < ERA_0.upper_timeout_bound_secs);
        assert!(ERA_0.upper_timeout_bound_secs < ERA_0.instant_commit_threshold_secs);
        assert!(ERA_0.instant_commit_threshold_secs < ERA_0.longest_timeout_secs);
    }

    #[test]
    fn pool_prune_target_shrinks_the_fleet() {
        assert!(ERA_0.pool_prune_target_ratio < 1.0);
    }
}
