//! Real-time progress reporting
//!
//! A background task samples the phase counters on a fixed wall-clock tick
//! and logs throughput. It only reads the atomics.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::metrics::{throughput, PhaseCounters};

/// One emitted progress line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub elapsed: Duration,
    pub units: u64,
    pub errors: u64,
    pub batch_size: usize,
    pub throughput: f64,
}

/// Handle to a running progress task.
pub struct ProgressReporter {
    stop: watch::Sender<bool>,
    handle: JoinHandle<Vec<ProgressSample>>,
}

impl ProgressReporter {
    /// Starts sampling `counters` every `interval`, measuring from `started`.
    pub fn spawn(
        phase: String,
        counters: Arc<PhaseCounters>,
        interval: Duration,
        started: Instant,
    ) -> Self {
        let (stop, mut stop_rx) = watch::channel(false);
        let interval = interval.max(Duration::from_millis(10));

        let handle = tokio::spawn(async move {
            let mut samples = Vec::new();
            let mut ticker = tokio::time::interval_at(started + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_throughput = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let elapsed = started.elapsed();
                        let snapshot = counters.snapshot();
                        let current = throughput(snapshot.units, elapsed);

                        if last_throughput == Some(current) {
                            continue;
                        }
                        last_throughput = Some(current);

                        info!(
                            phase = %phase,
                            elapsed_secs = elapsed.as_secs(),
                            batch_size = snapshot.current_batch,
                            advisory_workers = snapshot.peak_workers,
                            units = snapshot.units,
                            errors = snapshot.errors,
                            "📊 Throughput: {:.1} ops/sec",
                            current
                        );
                        samples.push(ProgressSample {
                            elapsed,
                            units: snapshot.units,
                            errors: snapshot.errors,
                            batch_size: snapshot.current_batch,
                            throughput: current,
                        });
                    }
                    _ = stop_rx.changed() => break,
                }
            }

            samples
        });

        Self { stop, handle }
    }

    /// Stops the task and returns every sample it emitted.
    pub async fn stop(self) -> Vec<ProgressSample> {
        let _ = self.stop.send(true);
        match self.handle.await {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Progress reporter did not shut down cleanly: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_samples_are_monotonic() {
        let counters = Arc::new(PhaseCounters::new());
        let reporter = ProgressReporter::spawn(
            "insert".to_string(),
            Arc::clone(&counters),
            Duration::from_millis(20),
            Instant::now(),
        );

        for _ in 0..10 {
            counters.record_success(100);
            tokio::time::sleep(Duration::from_millis(15)).await;
        }

        let samples = reporter.stop().await;
        assert!(!samples.is_empty());
        assert!(samples.windows(2).all(|w| w[0].units <= w[1].units));
        assert!(samples.iter().all(|s| s.units <= 1_000));
    }

    #[tokio::test]
    async fn test_stop_before_first_tick() {
        let counters = Arc::new(PhaseCounters::new());
        let reporter = ProgressReporter::spawn(
            "search".to_string(),
            counters,
            Duration::from_secs(60),
            Instant::now(),
        );

        assert!(reporter.stop().await.is_empty());
    }
}
