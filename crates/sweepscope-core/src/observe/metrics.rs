//! # Metrics Collection
//!
//! Prometheus-compatible metrics for the detection pipeline:
//!
//! - **Counters**: sweeps, detections, clustering passes, drops, failures
//! - **Gauges**: current noise floors, last selected epsilon
//! - **Histograms**: clustering pass duration
//!
//! ```rust
//! use sweepscope_core::observe::Metrics;
//!
//! let metrics = Metrics::new();
//! metrics.sweeps_completed.inc();
//! metrics.detections.inc_by(42);
//! metrics.record_epsilon(0.125);
//! metrics.record_floors(&[-50.0, -40.0, -30.0]);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.detections, 42);
//! assert_eq!(snapshot.floors_dbm, vec![-50.0, -40.0, -30.0]);
//! ```

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;

/// Monotonic atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Atomic gauge.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket histogram.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bucket bounds, exclusive
    boundaries: Vec<f64>,
    /// One count per boundary plus an overflow bucket
    buckets: Vec<AtomicU64>,
    /// Sum of observations, in thousandths
    sum_milli: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(boundaries: Vec<f64>) -> Self {
        let num_buckets = boundaries.len() + 1;
        Self {
            boundaries,
            buckets: (0..num_buckets).map(|_| AtomicU64::new(0)).collect(),
            sum_milli: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Buckets for clustering pass durations in milliseconds.
    pub fn pass_duration_ms() -> Self {
        Self::new(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0])
    }

    pub fn observe(&self, value: f64) {
        let idx = self
            .boundaries
            .iter()
            .position(|&b| value < b)
            .unwrap_or(self.boundaries.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.sum_milli
            .fetch_add((value.max(0.0) * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum_milli.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::pass_duration_ms()
    }
}

/// Pipeline metrics, shared between the producer and the clustering worker.
#[derive(Debug, Default)]
pub struct Metrics {
    // Producer side
    /// Sweeps finalized by the classifier
    pub sweeps_completed: Counter,
    /// Samples classified as detections
    pub detections: Counter,
    /// Finalized sweeps displaced from the hand-off queue
    pub handoffs_dropped: Counter,

    // Worker side
    /// Clustering passes that ran to completion
    pub clustering_passes: Counter,
    /// Passes skipped for too few feature points
    pub passes_skipped: Counter,
    /// Clusters found across all passes
    pub clusters_found: Counter,
    /// Last selected epsilon (× 1000)
    pub epsilon_x1000: Gauge,
    /// Clustering pass duration
    pub pass_duration_ms: Histogram,

    /// Failed publish calls on either topic
    pub publish_failures: Counter,

    /// Current tier floors in dBm, lowest tier first
    pub floors_dbm: RwLock<Vec<f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_floors(&self, floors: &[f64]) {
        if let Ok(mut f) = self.floors_dbm.write() {
            f.clear();
            f.extend_from_slice(floors);
        }
    }

    pub fn record_epsilon(&self, epsilon: f64) {
        self.epsilon_x1000.set((epsilon * 1000.0).round() as i64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sweeps_completed: self.sweeps_completed.get(),
            detections: self.detections.get(),
            handoffs_dropped: self.handoffs_dropped.get(),
            clustering_passes: self.clustering_passes.get(),
            passes_skipped: self.passes_skipped.get(),
            clusters_found: self.clusters_found.get(),
            epsilon: self.epsilon_x1000.get() as f64 / 1000.0,
            pass_count: self.pass_duration_ms.count(),
            pass_duration_sum_ms: self.pass_duration_ms.sum(),
            publish_failures: self.publish_failures.get(),
            floors_dbm: self
                .floors_dbm
                .read()
                .map(|f| f.clone())
                .unwrap_or_default(),
        }
    }

    /// Reset counters. Gauges and floors keep their last value.
    pub fn reset(&self) {
        self.sweeps_completed.reset();
        self.detections.reset();
        self.handoffs_dropped.reset();
        self.clustering_passes.reset();
        self.passes_skipped.reset();
        self.clusters_found.reset();
        self.publish_failures.reset();
    }

    /// Export in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut output = String::new();

        let counters = [
            ("sweeps_completed_total", "Sweeps finalized", s.sweeps_completed),
            ("detections_total", "Samples classified as detections", s.detections),
            (
                "handoffs_dropped_total",
                "Sweeps displaced from the hand-off queue",
                s.handoffs_dropped,
            ),
            ("clustering_passes_total", "Completed clustering passes", s.clustering_passes),
            (
                "clustering_passes_skipped_total",
                "Passes skipped for insufficient data",
                s.passes_skipped,
            ),
            ("clusters_found_total", "Clusters found across all passes", s.clusters_found),
            ("publish_failures_total", "Failed publish calls", s.publish_failures),
        ];
        for (name, help, value) in counters {
            output.push_str(&format!("# HELP sweepscope_{} {}\n", name, help));
            output.push_str(&format!("# TYPE sweepscope_{} counter\n", name));
            output.push_str(&format!("sweepscope_{} {}\n", name, value));
        }

        output.push_str("# HELP sweepscope_epsilon Last selected DBSCAN epsilon\n");
        output.push_str("# TYPE sweepscope_epsilon gauge\n");
        output.push_str(&format!("sweepscope_epsilon {}\n", s.epsilon));

        output.push_str("# HELP sweepscope_noise_floor_dbm Current tier noise floor\n");
        output.push_str("# TYPE sweepscope_noise_floor_dbm gauge\n");
        for (tier, floor) in s.floors_dbm.iter().enumerate() {
            output.push_str(&format!(
                "sweepscope_noise_floor_dbm{{tier=\"{}\"}} {}\n",
                tier, floor
            ));
        }

        output.push_str("# HELP sweepscope_pass_duration_ms Clustering pass duration\n");
        output.push_str("# TYPE sweepscope_pass_duration_ms summary\n");
        output.push_str(&format!("sweepscope_pass_duration_ms_sum {}\n", s.pass_duration_sum_ms));
        output.push_str(&format!("sweepscope_pass_duration_ms_count {}\n", s.pass_count));

        output
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub sweeps_completed: u64,
    pub detections: u64,
    pub handoffs_dropped: u64,
    pub clustering_passes: u64,
    pub passes_skipped: u64,
    pub clusters_found: u64,
    pub epsilon: f64,
    pub pass_count: u64,
    pub pass_duration_sum_ms: f64,
    pub publish_failures: u64,
    pub floors_dbm: Vec<f64>,
}

impl MetricsSnapshot {
    pub fn avg_pass_duration_ms(&self) -> f64 {
        if self.pass_count == 0 {
            0.0
        } else {
            self.pass_duration_sum_ms / self.pass_count as f64
        }
    }

    /// Share of attempted passes that were skipped.
    pub fn skip_rate(&self) -> f64 {
        let total = self.clustering_passes + self.passes_skipped;
        if total == 0 {
            0.0
        } else {
            self.passes_skipped as f64 / total as f64
        }
    }
}
