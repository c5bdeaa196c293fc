//! Automatic DBSCAN radius selection
//!
//! Picks the clustering radius from the data itself, once per clustering pass,
//! using the knee of the sorted k-distance curve.
//!
//! ## Algorithm
//!
//! 1. For each point, the distance to its k-th nearest other point.
//! 2. Sort ascending. Points inside dense regions sit on the flat left part
//!    of the curve, isolated points on the steep right tail.
//! 3. Normalize both axes to `[0, 1]` and find the index where the curve
//!    falls furthest below the diagonal (Kneedle, convex/increasing form):
//!
//! ```text
//!   d_norm
//!   1 ┤                    ╭
//!     │                 ╱  │
//!     │              ╱     │
//!     │           ╱        │ ← steep tail (noise)
//!     │        ╱           │
//!     │     ╱      gap     │
//!     │  ╱    ───────────►╭╯
//!   0 ┼─────────────────●─── knee = max(i_norm - d_norm)
//!     0                     1  i_norm
//! ```
//!
//! 4. The un-normalized k-distance at the knee is epsilon.
//!
//! Normalization makes the knee index independent of the data's scale, so
//! scaling every coordinate by `c > 0` scales epsilon by exactly `c`.

use rayon::prelude::*;

use crate::types::{euclidean, FeaturePoint, SweepError, SweepResult};

/// Neighbor rank used for the k-distance curve (11 neighbors including self).
pub const DEFAULT_NEIGHBOR_K: usize = 10;

/// Distance from every point to its k-th nearest other point, sorted ascending.
///
/// Fails with `InsufficientData` when there are `k` or fewer points.
pub fn k_distance_curve(points: &[FeaturePoint], k: usize) -> SweepResult<Vec<f64>> {
    if k == 0 {
        return Err(SweepError::InvalidParameter(
            "neighbor rank k must be at least 1".to_string(),
        ));
    }
    if points.len() <= k {
        return Err(SweepError::InsufficientData {
            required: k,
            actual: points.len(),
        });
    }

    let coords: Vec<[f64; 3]> = points.iter().map(FeaturePoint::coords).collect();
    let mut curve: Vec<f64> = coords
        .par_iter()
        .enumerate()
        .map(|(i, a)| {
            let mut dists: Vec<f64> = coords
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, b)| euclidean(a, b))
                .collect();
            let (_, kth, _) = dists.select_nth_unstable_by(k - 1, f64::total_cmp);
            *kth
        })
        .collect();

    curve.sort_unstable_by(f64::total_cmp);
    Ok(curve)
}

/// Knee of an ascending curve: the index maximizing `i_norm - d_norm`.
///
/// Ties resolve to the lowest index. A flat curve has its knee at 0.
pub fn knee_index(curve: &[f64]) -> usize {
    let n = curve.len();
    if n < 2 {
        return 0;
    }

    let min = curve[0];
    let span = curve[n - 1] - min;
    if span <= 0.0 {
        return 0;
    }

    let last = (n - 1) as f64;
    let mut best = 0;
    let mut best_gap = f64::NEG_INFINITY;
    for (i, &d) in curve.iter().enumerate() {
        let gap = i as f64 / last - (d - min) / span;
        if gap > best_gap {
            best_gap = gap;
            best = i;
        }
    }
    best
}

/// Select epsilon for `points` from the knee of their k-distance curve.
pub fn select_epsilon(points: &[FeaturePoint], k: usize) -> SweepResult<f64> {
    let curve = k_distance_curve(points, k)?;
    Ok(curve[knee_index(&curve)])
}

/// Epsilon selector with a fixed neighbor rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpsilonSelector {
    k: usize,
}

impl EpsilonSelector {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn select(&self, points: &[FeaturePoint]) -> SweepResult<f64> {
        select_epsilon(points, self.k)
    }
}

impl Default for EpsilonSelector {
    fn default() -> Self {
        Self::new(DEFAULT_NEIGHBOR_K)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(n: usize) -> Vec<FeaturePoint> {
        (0..n).map(|i| FeaturePoint::new(i as f64, 0.0, 0)).collect()
    }

    fn blobs() -> Vec<FeaturePoint> {
        let mut pts = Vec::new();
        for age in 0..4 {
            for i in 0..6 {
                pts.push(FeaturePoint::new(433.0 + i as f64 * 0.002, -40.0 - (i % 3) as f64, age));
                pts.push(FeaturePoint::new(915.0 + i as f64 * 0.003, -55.0 + (i % 2) as f64, age));
            }
        }
        pts.push(FeaturePoint::new(100.0, -20.0, 1));
        pts.push(FeaturePoint::new(2400.0, -70.0, 3));
        pts
    }

    #[test]
    fn test_k_distance_curve() {
        let curve = k_distance_curve(&line(4), 2).unwrap();
        assert_eq!(curve, vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_insufficient_points() {
        let err = select_epsilon(&line(10), 10).unwrap_err();
        assert_eq!(
            err,
            SweepError::InsufficientData {
                required: 10,
                actual: 10
            }
        );
        assert!(select_epsilon(&line(11), 10).is_ok());
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(matches!(
            select_epsilon(&line(5), 0),
            Err(SweepError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_knee_of_convex_curve() {
        let curve = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 3.0, 10.0];
        assert_eq!(knee_index(&curve), 7);
    }

    #[test]
    fn test_knee_of_flat_curve() {
        assert_eq!(knee_index(&[2.5; 8]), 0);
        assert_eq!(knee_index(&[]), 0);
        assert_eq!(knee_index(&[4.0]), 0);
    }

    #[test]
    fn test_epsilon_separates_outliers() {
        let pts = blobs();
        let eps = select_epsilon(&pts, DEFAULT_NEIGHBOR_K).unwrap();
        // Well above the intra-blob spacing, far below the blob separation
        assert!(eps > 0.5, "eps = {}", eps);
        assert!(eps < 100.0, "eps = {}", eps);
    }

    #[test]
    fn test_scale_equivariance() {
        let pts = blobs();
        let scaled: Vec<FeaturePoint> = pts
            .iter()
            .map(|p| FeaturePoint::new(p.frequency_mhz * 2.0, p.power_dbm * 2.0, p.sweep_age * 2))
            .collect();
        let eps = select_epsilon(&pts, DEFAULT_NEIGHBOR_K).unwrap();
        let eps_scaled = select_epsilon(&scaled, DEFAULT_NEIGHBOR_K).unwrap();
        assert_relative_eq!(eps_scaled, 2.0 * eps, max_relative = 1e-12);
    }

    #[test]
    fn test_selector_wrapper() {
        let sel = EpsilonSelector::default();
        assert_eq!(sel.k(), 10);
        assert_eq!(sel.select(&blobs()).unwrap(), select_epsilon(&blobs(), 10).unwrap());
    }
}
