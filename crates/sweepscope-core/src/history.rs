//! Sliding window of recent sweeps
//!
//! Keeps the detections of the last `capacity` sweeps and flattens them into
//! feature points for clustering. Points carry their window position as
//! `sweep_age` (0 = oldest retained sweep), so the age of a given sweep shifts
//! down by one every time an older sweep is evicted.

use std::collections::VecDeque;

use crate::types::{FeaturePoint, SweepDetections, SweepError, SweepResult, HZ_PER_MHZ};

/// Default number of sweeps kept for clustering.
pub const DEFAULT_CLUSTER_HISTORY: usize = 60;

/// Clustering is only attempted with more points than this.
pub const DEFAULT_MIN_FEATURE_POINTS: usize = 12;

/// Bounded history of per-sweep detections.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    capacity: usize,
    sweeps: VecDeque<SweepDetections>,
}

impl HistoryWindow {
    /// Create a window holding at most `capacity` sweeps (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            sweeps: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append the newest sweep, evicting the oldest when over capacity.
    pub fn push(&mut self, detections: SweepDetections) {
        self.sweeps.push_back(detections);
        while self.sweeps.len() > self.capacity {
            self.sweeps.pop_front();
        }
    }

    /// Flatten the window into feature points, oldest sweep first.
    pub fn snapshot(&self) -> Vec<FeaturePoint> {
        let mut points = Vec::with_capacity(self.point_count());
        for (age, sweep) in self.sweeps.iter().enumerate() {
            for s in sweep.iter() {
                points.push(FeaturePoint::new(
                    s.frequency_hz as f64 / HZ_PER_MHZ,
                    s.power_dbm,
                    age,
                ));
            }
        }
        points
    }

    /// Snapshot, or `InsufficientData` unless it has more than `min_points` points.
    pub fn viable_snapshot(&self, min_points: usize) -> SweepResult<Vec<FeaturePoint>> {
        let actual = self.point_count();
        if actual <= min_points {
            return Err(SweepError::InsufficientData {
                required: min_points,
                actual,
            });
        }
        Ok(self.snapshot())
    }

    /// Total detections across retained sweeps.
    pub fn point_count(&self) -> usize {
        self.sweeps.iter().map(SweepDetections::len).sum()
    }

    /// Number of retained sweeps.
    pub fn len(&self) -> usize {
        self.sweeps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweeps.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.sweeps.clear();
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;

    fn sweep(freqs_hz: &[u64]) -> SweepDetections {
        let samples: Vec<Sample> = freqs_hz.iter().map(|&f| Sample::new(f, -40.0)).collect();
        SweepDetections::from_samples(&samples)
    }

    #[test]
    fn test_push_and_evict() {
        let mut w = HistoryWindow::new(2);
        w.push(sweep(&[100_000_000]));
        w.push(sweep(&[200_000_000]));
        w.push(sweep(&[300_000_000, 301_000_000]));
        assert_eq!(w.len(), 2);

        let points = w.snapshot();
        assert_eq!(points.len(), 3);
        // Oldest retained sweep is now the 200 MHz one, at age 0
        assert_eq!(points[0].frequency_mhz, 200.0);
        assert_eq!(points[0].sweep_age, 0);
        assert_eq!(points[1].frequency_mhz, 300.0);
        assert_eq!(points[1].sweep_age, 1);
        assert_eq!(points[2].frequency_mhz, 301.0);
    }

    #[test]
    fn test_snapshot_converts_to_mhz() {
        let mut w = HistoryWindow::new(4);
        w.push(sweep(&[433_920_000]));
        let p = w.snapshot()[0];
        assert!((p.frequency_mhz - 433.92).abs() < 1e-9);
        assert_eq!(p.power_dbm, -40.0);
    }

    #[test]
    fn test_empty_sweeps_still_age() {
        let mut w = HistoryWindow::new(3);
        w.push(SweepDetections::new());
        w.push(sweep(&[1_000_000]));
        assert_eq!(w.len(), 2);
        assert_eq!(w.snapshot()[0].sweep_age, 1);
    }

    #[test]
    fn test_viable_snapshot_threshold() {
        let mut w = HistoryWindow::new(60);
        let freqs: Vec<u64> = (0..12).map(|i| 1_000_000 + i).collect();
        w.push(sweep(&freqs));
        let err = w.viable_snapshot(DEFAULT_MIN_FEATURE_POINTS).unwrap_err();
        assert_eq!(
            err,
            SweepError::InsufficientData {
                required: 12,
                actual: 12
            }
        );

        w.push(sweep(&[5_000_000]));
        assert_eq!(w.viable_snapshot(DEFAULT_MIN_FEATURE_POINTS).unwrap().len(), 13);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut w = HistoryWindow::new(0);
        w.push(sweep(&[1]));
        w.push(sweep(&[2]));
        assert_eq!(w.capacity(), 1);
        assert_eq!(w.len(), 1);
    }
}
