//! Node load signal.
//!
//! A node is busy when its 1-minute load average per core exceeds the
//! configured threshold. Sampled periodically, read lock-free by the resolver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often /proc/loadavg is sampled.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

const LOADAVG_PATH: &str = "/proc/loadavg";

#[derive(Clone)]
pub struct LoadMonitor {
    busy: Arc<AtomicBool>,
    threshold: f64,
}

impl LoadMonitor {
    pub fn new(threshold: f64) -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            threshold,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    /// Update the busy flag from one load sample.
    fn record(&self, load_per_core: f64) {
        let busy = load_per_core > self.threshold;
        let was = self.busy.swap(busy, Ordering::Relaxed);
        if was != busy {
            tracing::info!(load_per_core, threshold = self.threshold, busy, "node load state changed");
        }
    }

    /// Sample the load average until the task is dropped.
    pub async fn run(self, period: Duration) {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1) as f64;
        let mut interval = tokio::time::interval(period);

        tracing::info!(cores, threshold = self.threshold, "load monitor starting");

        let mut read_failed = false;

        loop {
            interval.tick().await;

            match tokio::fs::read_to_string(LOADAVG_PATH).await {
                Ok(text) => match parse_loadavg(&text) {
                    Some(load) => self.record(load / cores),
                    None => tracing::warn!(text = text.trim(), "unparseable loadavg"),
                },
                // Without a load signal the node stays not-busy. Warn once.
                Err(e) if !read_failed => {
                    tracing::warn!(error = %e, "cannot read {}", LOADAVG_PATH);
                    read_failed = true;
                }
                Err(_) => {}
            }
        }
    }
}

/// First field of /proc/loadavg: the 1-minute load average.
fn parse_loadavg(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}
