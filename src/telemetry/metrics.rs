//! Metrics collection for engine monitoring.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Engine-owned metrics collector. Shared by `Arc` with every worker; no
/// file-scope statics.
#[derive(Debug)]
pub struct Metrics {
    pending: AtomicUsize,
    busy_workers: AtomicUsize,
    tasks_completed: AtomicU64,
    tasks_panicked: AtomicU64,
    tasks_cancelled: AtomicU64,
    tasks_stolen: AtomicU64,
    latency_histogram: RwLock<Histogram<u64>>,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        // 3 significant figures, max value of 1 hour in nanoseconds.
        let histogram =
            Histogram::new_with_max(3_600_000_000_000, 3).expect("histogram construction");

        Self {
            pending: AtomicUsize::new(0),
            busy_workers: AtomicUsize::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            tasks_cancelled: AtomicU64::new(0),
            tasks_stolen: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn on_submit(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Undo `on_submit` when admission fails.
    pub(crate) fn on_rejected(&self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn on_cancelled(&self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        self.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_stolen(&self) {
        self.tasks_stolen.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_busy(&self) {
        self.busy_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_idle(&self) {
        self.busy_workers.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn on_completed(&self, duration_ns: u64, panicked: bool) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(mut hist) = self.latency_histogram.try_write() {
            let _ = hist.record(duration_ns);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn busy_workers(&self) -> usize {
        self.busy_workers.load(Ordering::Relaxed)
    }

    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.latency_histogram.read();

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            pending: self.pending.load(Ordering::Relaxed),
            busy_workers: self.busy_workers.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            tasks_stolen: self.tasks_stolen.load(Ordering::Relaxed),
            avg_latency_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_latency_ns: histogram.value_at_quantile(0.50),
            p95_latency_ns: histogram.value_at_quantile(0.95),
            p99_latency_ns: histogram.value_at_quantile(0.99),
            max_latency_ns: histogram.max(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the engine's counters.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub pending: usize,
    pub busy_workers: usize,
    pub tasks_completed: u64,
    pub tasks_panicked: u64,
    pub tasks_cancelled: u64,
    pub tasks_stolen: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p95_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_complete_cycle() {
        let metrics = Metrics::new();
        metrics.on_submit();
        assert_eq!(metrics.pending(), 1);

        metrics.on_completed(1_000, false);
        assert_eq!(metrics.pending(), 0);
        assert_eq!(metrics.tasks_completed(), 1);
    }

    #[test]
    fn test_cancel_counts() {
        let metrics = Metrics::new();
        metrics.on_submit();
        metrics.on_cancelled();

        let snap = metrics.snapshot();
        assert_eq!(snap.pending, 0);
        assert_eq!(snap.tasks_cancelled, 1);
        assert_eq!(snap.tasks_completed, 0);
    }

    #[test]
    fn test_latency_quantiles() {
        let metrics = Metrics::new();
        for i in 1..=100u64 {
            metrics.on_submit();
            metrics.on_completed(i * 1_000, false);
        }

        let snap = metrics.snapshot();
        assert!(snap.p50_latency_ns >= 40_000);
        assert!(snap.p99_latency_ns >= snap.p50_latency_ns);
        assert!(snap.max_latency_ns >= snap.p99_latency_ns);
    }
}
