//! Cluster → signal descriptor reduction
//!
//! | Field                  | Definition                                        |
//! |------------------------|---------------------------------------------------|
//! | `center_frequency_mhz` | mean member frequency                             |
//! | `bandwidth_mhz`        | max − min member frequency                        |
//! | `continuity_percent`   | distinct sweep ages / max sweep age × 100         |
//! | `power_spread_dbm`     | max − min member power                            |
//!
//! Continuity is measured against the oldest-to-newest span *present in the
//! cluster*, not the window length, and age 0 counts in the numerator: a
//! cluster seen in ages {0, 1} scores 200%, one seen only in {4, 8} scores 25%.
//! A cluster whose only age is 0 scores 0.

use std::collections::BTreeSet;

use crate::types::{FeaturePoint, SignalSummary};

/// Reduce one cluster to its summary.
pub fn summarize(cluster: &[FeaturePoint]) -> SignalSummary {
    if cluster.is_empty() {
        return SignalSummary {
            center_frequency_mhz: 0.0,
            bandwidth_mhz: 0.0,
            continuity_percent: 0.0,
            power_spread_dbm: 0.0,
        };
    }

    let mut freq_sum = 0.0;
    let mut freq_min = f64::INFINITY;
    let mut freq_max = f64::NEG_INFINITY;
    let mut power_min = f64::INFINITY;
    let mut power_max = f64::NEG_INFINITY;
    let mut ages = BTreeSet::new();

    for p in cluster {
        freq_sum += p.frequency_mhz;
        freq_min = freq_min.min(p.frequency_mhz);
        freq_max = freq_max.max(p.frequency_mhz);
        power_min = power_min.min(p.power_dbm);
        power_max = power_max.max(p.power_dbm);
        ages.insert(p.sweep_age);
    }

    let max_age = ages.iter().next_back().copied().unwrap_or(0);
    let continuity_percent = if max_age > 0 {
        ages.len() as f64 / max_age as f64 * 100.0
    } else {
        0.0
    };

    SignalSummary {
        center_frequency_mhz: freq_sum / cluster.len() as f64,
        bandwidth_mhz: freq_max - freq_min,
        continuity_percent,
        power_spread_dbm: power_max - power_min,
    }
}

/// Summarize every cluster, in cluster order.
pub fn summarize_all(clusters: &[Vec<FeaturePoint>]) -> Vec<SignalSummary> {
    clusters.iter().map(|c| summarize(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_summary() {
        let cluster = vec![
            FeaturePoint::new(433.00, -40.0, 0),
            FeaturePoint::new(433.01, -41.0, 0),
            FeaturePoint::new(433.005, -42.0, 1),
        ];
        let s = summarize(&cluster);
        assert_relative_eq!(s.center_frequency_mhz, 433.005, epsilon = 1e-9);
        assert_relative_eq!(s.bandwidth_mhz, 0.01, epsilon = 1e-9);
        assert_relative_eq!(s.power_spread_dbm, 2.0);
    }

    #[test]
    fn test_continuity_counts_age_zero_in_numerator() {
        // Ages {0, 1}: two distinct ages over a max age of 1. The ratio is kept
        // as defined even though it exceeds 100.
        let cluster = vec![FeaturePoint::new(1.0, -40.0, 0), FeaturePoint::new(1.0, -40.0, 1)];
        assert_relative_eq!(summarize(&cluster).continuity_percent, 200.0);
    }

    #[test]
    fn test_continuity_overstates_old_clusters() {
        // Present only in old sweeps 2..=4 of a 60-sweep window: still 75%
        let cluster: Vec<FeaturePoint> =
            (2..=4).map(|a| FeaturePoint::new(1.0, -40.0, a)).collect();
        assert_relative_eq!(summarize(&cluster).continuity_percent, 75.0);

        let sparse = vec![FeaturePoint::new(1.0, -40.0, 4), FeaturePoint::new(1.0, -40.0, 8)];
        assert_relative_eq!(summarize(&sparse).continuity_percent, 25.0);
    }

    #[test]
    fn test_continuity_zero_max_age() {
        let cluster: Vec<FeaturePoint> =
            (0..5).map(|i| FeaturePoint::new(100.0 + i as f64, -50.0, 0)).collect();
        assert_eq!(summarize(&cluster).continuity_percent, 0.0);
    }

    #[test]
    fn test_empty_cluster() {
        let s = summarize(&[]);
        assert_eq!(s.center_frequency_mhz, 0.0);
        assert_eq!(s.bandwidth_mhz, 0.0);
        assert_eq!(s.continuity_percent, 0.0);
        assert_eq!(s.power_spread_dbm, 0.0);
    }

    #[test]
    fn test_idempotent() {
        let cluster: Vec<FeaturePoint> = (0..7)
            .map(|i| FeaturePoint::new(915.0 + i as f64 * 0.1, -60.0 + i as f64, i % 3))
            .collect();
        assert_eq!(summarize(&cluster), summarize(&cluster));
        assert_eq!(
            summarize_all(&[cluster.clone(), cluster.clone()]),
            vec![summarize(&cluster); 2]
        );
    }
}
