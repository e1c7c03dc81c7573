//! Recast controller (spec.md section 4.9, C12), grounded on
//! `core/metrics/recast.go`: periodically checks whether the node is
//! wasting enough attacker time to be worth keeping around, and signals
//! the rest of the process to shut down if not. Purely advisory -- no
//! graceful handoff is attempted, the surrounding orchestrator is
//! expected to reschedule onto a fresh address.

use std::sync::Arc;
use std::time::Duration;

use tarpit_rng::SeededRng;
use tarpit_telemetry::Telemetry;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub struct RecastOptions {
    pub minimum_recast_interval: Duration,
    pub maximum_recast_interval: Duration,
    pub time_wasted_ratio: f64,
}

pub struct RecastController {
    telemetry: Arc<Telemetry>,
    options: RecastOptions,
}

impl RecastController {
    pub fn new(telemetry: Arc<Telemetry>, options: RecastOptions) -> Arc<Self> {
        Arc::new(Self { telemetry, options })
    }

    /// Runs the check loop: sleeps for a random duration drawn from
    /// `[minimum_recast_interval, maximum_recast_interval]`, then
    /// compares wasted time accrued during that sleep against
    /// `interval * time_wasted_ratio`. If the node is underperforming
    /// it fires `shutdown` once and stops; otherwise it keeps looping
    /// until `shutdown` fires from elsewhere.
    pub fn start(self: Arc<Self>, shutdown: broadcast::Sender<()>) -> JoinHandle<()> {
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mut rng = SeededRng::from_time();

            loop {
                let interval = self.next_interval(&mut rng);
                tracing::debug!(?interval, "recast: waiting for next check");

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("recast: shutting down checker");
                        return;
                    }
                }

                let wasted = self.telemetry.take_wasted_time();
                let threshold = interval.as_secs_f64() * self.options.time_wasted_ratio;

                tracing::info!(
                    wasted_secs = wasted.as_secs_f64(),
                    threshold_secs = threshold,
                    "recast: checked wasted-time yield"
                );

                if wasted.as_secs_f64() < threshold {
                    tracing::warn!(
                        wasted_secs = wasted.as_secs_f64(),
                        threshold_secs = threshold,
                        "recast: yield too low, signalling shutdown"
                    );
                    let _ = shutdown.send(());
                    return;
                }
            }
        })
    }

    fn next_interval(&self, rng: &mut SeededRng) -> Duration {
        let min_secs = self.options.minimum_recast_interval.as_secs() as i64;
        let max_secs = self.options.maximum_recast_interval.as_secs() as i64;
        let secs = rng.int_range(min_secs, max_secs.max(min_secs + 1));
        Duration::from_secs(secs.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signals_shutdown_when_yield_is_low() {
        let telemetry = Telemetry::new();
        let controller = RecastController::new(
            telemetry,
            RecastOptions {
                minimum_recast_interval: Duration::from_millis(5),
                maximum_recast_interval: Duration::from_millis(6),
                time_wasted_ratio: 0.5,
            },
        );

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let handle = controller.start(shutdown_tx);

        tokio::time::timeout(Duration::from_secs(1), shutdown_rx.recv())
            .await
            .expect("controller did not signal shutdown in time")
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn does_not_signal_shutdown_when_yield_is_high() {
        let telemetry = Telemetry::new();
        // Report generously more wasted time than any plausible
        // threshold at these intervals.
        telemetry.report_wasted_time(Duration::from_secs(3600));

        let controller = RecastController::new(
            telemetry,
            RecastOptions {
                minimum_recast_interval: Duration::from_millis(5),
                maximum_recast_interval: Duration::from_millis(6),
                time_wasted_ratio: 0.05,
            },
        );

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let handle = controller.start(shutdown_tx.clone());

        let result = tokio::time::timeout(Duration::from_millis(50), shutdown_rx.recv()).await;
        assert!(result.is_err(), "controller should not have signalled shutdown");

        let _ = shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
