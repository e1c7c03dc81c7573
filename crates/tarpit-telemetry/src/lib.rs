//! Telemetry facade (spec.md section 2, C13): "contract only" per the
//! spec's own framing -- metrics export to an external system is out
//! of scope, but the counters the rest of the node reports into are
//! not. `tarpit_stall::WastedTimeSink` and
//! `tarpit_generator::SecretsSink` are implemented here so neither
//! crate needs to depend on this one; `tarpit-recast` reads the
//! wasted-time counter back out to decide whether to signal shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tarpit_generator::SecretsSink;
use tarpit_stall::WastedTimeSink;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Counters {
    wasted_time_ms: AtomicU64,
    secrets_generated: AtomicU64,
}

/// The live counter set. One instance per process, shared via `Arc`
/// with every staller (as a `WastedTimeSink`), every content source
/// (as a `SecretsSink`), and the recast controller (as a reader).
pub struct Telemetry {
    counters: Counters,
}

impl Telemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { counters: Counters::default() })
    }

    pub fn secrets_generated(&self) -> u64 {
        self.counters.secrets_generated.load(Ordering::Relaxed)
    }

    /// Reads and resets the wasted-time accumulator. The recast
    /// controller calls this once per interval, so each read is
    /// exactly "wasted time since the last check", per spec.md
    /// section 4.9.
    pub fn take_wasted_time(&self) -> Duration {
        let millis = self.counters.wasted_time_ms.swap(0, Ordering::SeqCst);
        Duration::from_millis(millis)
    }

    /// Logs the current counters at `push_interval` until `shutdown`
    /// fires. Stands in for the real metrics-export push named in
    /// spec.md section 2 as deliberately out of scope -- this proves
    /// the counters are live without requiring an actual sink.
    pub fn start_push_loop(self: &Arc<Self>, push_interval: Duration, shutdown: broadcast::Sender<()>) -> JoinHandle<()> {
        let this = self.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(push_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracing::info!(
                            secrets_generated = this.secrets_generated(),
                            "telemetry push (no-op sink)"
                        );
                    }
                    _ = shutdown_rx.recv() => return,
                }
            }
        })
    }
}

impl WastedTimeSink for Telemetry {
    fn report_wasted_time(&self, duration: Duration) {
        self.counters.wasted_time_ms.fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }
}

impl SecretsSink for Telemetry {
    fn report_secrets_generated(&self, count: usize) {
        self.counters.secrets_generated.fetch_add(count as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wasted_time_accumulates_and_resets_on_read() {
        let telemetry = Telemetry::new();
        telemetry.report_wasted_time(Duration::from_millis(500));
        telemetry.report_wasted_time(Duration::from_millis(250));

        assert_eq!(telemetry.take_wasted_time(), Duration::from_millis(750));
        assert_eq!(telemetry.take_wasted_time(), Duration::ZERO);
    }

    #[test]
    fn secrets_generated_accumulates() {
        let telemetry = Telemetry::new();
        telemetry.report_secrets_generated(5);
        telemetry.report_secrets_generated(3);
        assert_eq!(telemetry.secrets_generated(), 8);
    }

    #[tokio::test]
    async fn push_loop_stops_on_shutdown() {
        let telemetry = Telemetry::new();
        let (shutdown_tx, _rx) = broadcast::channel(1);
        let handle = telemetry.start_push_loop(Duration::from_millis(5), shutdown_tx.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
