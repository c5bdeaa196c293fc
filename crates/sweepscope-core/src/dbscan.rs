//! DBSCAN density clustering
//!
//! Groups feature points into clusters of density-connected points.
//!
//! - **Core point**: at least `min_points` points (itself included) within
//!   `epsilon` (inclusive).
//! - **Cluster**: a maximal set of core points linked by chains of core points
//!   no further than `epsilon` apart, plus the border points attached to them.
//! - **Border point**: not core, but within `epsilon` of a core point. It joins
//!   the cluster of its nearest core neighbor (ties broken by coordinates), so
//!   the resulting partition does not depend on the order of the input.
//! - **Noise**: everything else. Noise is not a cluster.
//!
//! Cluster ids are numbered in order of each cluster's lowest point index.
//!
//! ## Example
//!
//! ```rust
//! use sweepscope_core::dbscan::DensityClusterer;
//! use sweepscope_core::types::FeaturePoint;
//!
//! let mut points: Vec<FeaturePoint> = (0..5)
//!     .map(|i| FeaturePoint::new(433.0 + i as f64 * 0.001, -40.0, 0))
//!     .collect();
//! points.push(FeaturePoint::new(900.0, -50.0, 0));
//!
//! let clustering = DensityClusterer::new(0.5, 3).fit(&points).unwrap();
//! assert_eq!(clustering.num_clusters(), 1);
//! assert_eq!(clustering.label(5), None);
//! ```

use std::cmp::Ordering;
use std::collections::VecDeque;

use rayon::prelude::*;

use crate::types::{FeaturePoint, SweepError, SweepResult};

/// Default minimum neighborhood size for a core point.
pub const DEFAULT_MIN_POINTS: usize = 10;

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityClusterer {
    epsilon: f64,
    min_points: usize,
}

/// Cluster assignment for each input point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clustering {
    labels: Vec<Option<usize>>,
    num_clusters: usize,
    core: Vec<bool>,
}

impl DensityClusterer {
    pub fn new(epsilon: f64, min_points: usize) -> Self {
        Self {
            epsilon,
            min_points,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn min_points(&self) -> usize {
        self.min_points
    }

    /// Cluster `points`.
    pub fn fit(&self, points: &[FeaturePoint]) -> SweepResult<Clustering> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(SweepError::InvalidParameter(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        if self.min_points == 0 {
            return Err(SweepError::InvalidParameter(
                "min_points must be at least 1".to_string(),
            ));
        }

        let neighbors = self.region_queries(points);
        let core: Vec<bool> = neighbors
            .iter()
            .map(|n| n.len() >= self.min_points)
            .collect();

        let mut labels: Vec<Option<usize>> = vec![None; points.len()];
        let mut num_clusters = 0;

        // Expand connected components of core points
        let mut queue = VecDeque::new();
        for seed in 0..points.len() {
            if !core[seed] || labels[seed].is_some() {
                continue;
            }
            let id = num_clusters;
            num_clusters += 1;

            labels[seed] = Some(id);
            queue.push_back(seed);
            while let Some(i) = queue.pop_front() {
                for &j in &neighbors[i] {
                    if core[j] && labels[j].is_none() {
                        labels[j] = Some(id);
                        queue.push_back(j);
                    }
                }
            }
        }

        // Attach border points to their nearest core neighbor
        for i in 0..points.len() {
            if core[i] {
                continue;
            }
            let nearest = neighbors[i]
                .iter()
                .copied()
                .filter(|&j| core[j])
                .min_by(|&a, &b| {
                    let da = points[i].distance(&points[a]);
                    let db = points[i].distance(&points[b]);
                    da.total_cmp(&db)
                        .then_with(|| cmp_coords(&points[a], &points[b]))
                });
            labels[i] = nearest.and_then(|j| labels[j]);
        }

        // Component ids follow the first core index; renumber by lowest member
        // index so border points preceding their core keep the ordering stable.
        let labels = renumber(labels, num_clusters);

        Ok(Clustering {
            labels,
            num_clusters,
            core,
        })
    }

    /// Indices within epsilon of each point, the point itself included.
    fn region_queries(&self, points: &[FeaturePoint]) -> Vec<Vec<usize>> {
        let eps = self.epsilon;
        points
            .par_iter()
            .map(|p| {
                points
                    .iter()
                    .enumerate()
                    .filter(|(_, q)| p.distance(q) <= eps)
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect()
    }
}

impl Default for DensityClusterer {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_MIN_POINTS)
    }
}

fn cmp_coords(a: &FeaturePoint, b: &FeaturePoint) -> Ordering {
    let (ca, cb) = (a.coords(), b.coords());
    ca[0].total_cmp(&cb[0])
        .then_with(|| ca[1].total_cmp(&cb[1]))
        .then_with(|| ca[2].total_cmp(&cb[2]))
}

fn renumber(labels: Vec<Option<usize>>, num_clusters: usize) -> Vec<Option<usize>> {
    let mut remap: Vec<Option<usize>> = vec![None; num_clusters];
    let mut next = 0;
    labels
        .into_iter()
        .map(|label| {
            label.map(|old| {
                *remap[old].get_or_insert_with(|| {
                    let id = next;
                    next += 1;
                    id
                })
            })
        })
        .collect()
}

impl Clustering {
    /// Cluster id of point `i`, `None` for noise.
    pub fn label(&self, i: usize) -> Option<usize> {
        self.labels[i]
    }

    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    /// Labels in the conventional integer form, `-1` for noise.
    pub fn labels_i64(&self) -> Vec<i64> {
        self.labels
            .iter()
            .map(|l| l.map_or(-1, |id| id as i64))
            .collect()
    }

    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    pub fn is_core(&self, i: usize) -> bool {
        self.core[i]
    }

    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_none()).count()
    }

    /// Group `points` by cluster, dropping noise. Index `c` holds cluster `c`.
    pub fn clusters(&self, points: &[FeaturePoint]) -> Vec<Vec<FeaturePoint>> {
        let mut out = vec![Vec::new(); self.num_clusters];
        for (p, label) in points.iter().zip(&self.labels) {
            if let Some(id) = label {
                out[*id].push(*p);
            }
        }
        out
    }
}
