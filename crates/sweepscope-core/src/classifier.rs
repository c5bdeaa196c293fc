//! Adaptive threshold classifier
//!
//! Separates signal from noise with a cascade of nested noise floors that
//! re-calibrate themselves once per sweep.
//!
//! ## How the tiers work
//!
//! ```text
//!   every sample ──► tier 0 mean            (≈ 50% floor)
//!        │ p > floor[0]
//!        ▼
//!   tier 1 mean                             (≈ 25% floor)
//!        │ p > floor[1]
//!        ▼
//!   tier 2 mean                             (≈ 12% floor)
//!        │ p > floor[2] + dbm_adjust
//!        ▼
//!   DETECTION
//! ```
//!
//! During a sweep each tier sums the powers it admits. At the sweep boundary
//! the floors are replaced by those means, and the new floors classify the
//! whole next sweep. A tier that admitted nothing keeps its old floor. The
//! floors never move mid-sweep.
//!
//! ## Example
//!
//! ```rust
//! use sweepscope_core::classifier::{AdaptiveThresholdClassifier, Verdict};
//! use sweepscope_core::types::Sample;
//!
//! let mut classifier = AdaptiveThresholdClassifier::with_defaults(0.0);
//!
//! // Default floors are -50 / -40 / -30 dBm until the first sweep completes
//! let ev = classifier.classify(Sample::new(433_920_000, -20.0), false);
//! assert_eq!(ev.verdict, Verdict::Detection);
//! assert!(ev.completed.is_none());
//!
//! let ev = classifier.classify(Sample::new(433_930_000, -45.0), false);
//! assert_eq!(ev.verdict, Verdict::Noise { passed_tiers: 1 });
//!
//! // Back at the start frequency: the sweep is finalized
//! let ev = classifier.classify(Sample::new(400_000_000, -70.0), true);
//! let sweep = ev.completed.unwrap();
//! assert_eq!(sweep.index, 0);
//! assert_eq!(sweep.detections.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::record::SweepRecord;
use crate::types::{Sample, SweepDetections};

/// Floors in force before the first sweep completes: 50%, 25% and 12% tiers.
pub const DEFAULT_FLOORS_DBM: [f64; 3] = [-50.0, -40.0, -30.0];

/// Ordered noise floors, most permissive first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseFloorTiers {
    floors_dbm: Vec<f64>,
}

impl NoiseFloorTiers {
    /// Create from explicit floors. At least one tier is required.
    pub fn new(floors_dbm: Vec<f64>) -> Self {
        assert!(!floors_dbm.is_empty(), "at least one noise floor tier is required");
        Self { floors_dbm }
    }

    /// Number of tiers.
    pub fn len(&self) -> usize {
        self.floors_dbm.len()
    }

    /// Always false; a tier set holds at least one floor.
    pub fn is_empty(&self) -> bool {
        self.floors_dbm.is_empty()
    }

    /// Floor of tier `i` in dBm.
    pub fn floor(&self, i: usize) -> f64 {
        self.floors_dbm[i]
    }

    pub fn floors(&self) -> &[f64] {
        &self.floors_dbm
    }

    /// The tightest floor (without any adjustment).
    pub fn last(&self) -> f64 {
        self.floors_dbm[self.floors_dbm.len() - 1]
    }
}

impl Default for NoiseFloorTiers {
    fn default() -> Self {
        Self::new(DEFAULT_FLOORS_DBM.to_vec())
    }
}

/// Running sum of the powers one tier admitted during the current sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct TierAccumulator {
    sum: f64,
    count: u64,
}

impl TierAccumulator {
    #[inline]
    fn admit(&mut self, power_dbm: f64) {
        self.sum += power_dbm;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.sum / self.count as f64)
        } else {
            None
        }
    }
}

/// Outcome for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Rejected after clearing `passed_tiers` floors.
    Noise { passed_tiers: usize },
    /// Cleared every floor, including the adjusted last one.
    Detection,
}

/// A finalized sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSweep {
    /// Monotonic sweep index, starting at 0
    pub index: u64,
    /// Detections in sweep order
    pub detections: SweepDetections,
    /// Floors computed from this sweep, in force for the next one
    pub floors: NoiseFloorTiers,
    /// Samples classified during this sweep
    pub samples_seen: u64,
    /// Samples admitted by each tier during this sweep
    pub tier_admissions: Vec<u64>,
}

/// Result of classifying one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierEvent {
    /// Classification of the sample itself
    pub verdict: Verdict,
    /// The sweep that ended just before this sample, if it opened a new one
    pub completed: Option<CompletedSweep>,
}

/// Per-sample classifier with self-calibrating nested noise floors.
#[derive(Debug, Clone)]
pub struct AdaptiveThresholdClassifier {
    floors: NoiseFloorTiers,
    dbm_adjust: f64,
    accumulators: Vec<TierAccumulator>,
    detections: SweepDetections,
    samples_seen: u64,
    next_index: u64,
}

impl AdaptiveThresholdClassifier {
    /// Create a classifier starting from `initial` floors.
    ///
    /// `dbm_adjust` is added to the last tier when deciding detections.
    pub fn new(initial: NoiseFloorTiers, dbm_adjust: f64) -> Self {
        let tiers = initial.len();
        Self {
            floors: initial,
            dbm_adjust,
            accumulators: vec![TierAccumulator::default(); tiers],
            detections: SweepDetections::new(),
            samples_seen: 0,
            next_index: 0,
        }
    }

    /// Three tiers at -50 / -40 / -30 dBm.
    pub fn with_defaults(dbm_adjust: f64) -> Self {
        Self::new(NoiseFloorTiers::default(), dbm_adjust)
    }

    /// Classify one sample.
    ///
    /// When `is_sweep_start` is set the sweep in progress is finalized first,
    /// and the sample is then classified as the first one of the next sweep.
    pub fn classify(&mut self, sample: Sample, is_sweep_start: bool) -> ClassifierEvent {
        let completed = if is_sweep_start {
            self.finish_sweep()
        } else {
            None
        };
        let verdict = self.admit(sample);
        ClassifierEvent { verdict, completed }
    }

    /// Classify every reading of a record.
    ///
    /// Only the first reading can open a sweep; returns the sweep it closed.
    pub fn classify_record(
        &mut self,
        record: &SweepRecord,
        sweep_start_hz: u64,
    ) -> Option<CompletedSweep> {
        let opens_sweep = record.is_sweep_start(sweep_start_hz);
        let mut completed = None;
        for (i, sample) in record.samples().into_iter().enumerate() {
            let event = self.classify(sample, opens_sweep && i == 0);
            if event.completed.is_some() {
                completed = event.completed;
            }
        }
        completed
    }

    fn admit(&mut self, sample: Sample) -> Verdict {
        let p = sample.power_dbm;
        self.samples_seen += 1;

        // -inf bins would drag every mean with them
        if !p.is_finite() {
            return Verdict::Noise { passed_tiers: 0 };
        }

        self.accumulators[0].admit(p);
        let tiers = self.floors.len();
        for i in 0..tiers {
            let mut threshold = self.floors.floor(i);
            if i + 1 == tiers {
                threshold += self.dbm_adjust;
            }
            if p <= threshold {
                return Verdict::Noise { passed_tiers: i };
            }
            if i + 1 < tiers {
                self.accumulators[i + 1].admit(p);
            }
        }

        self.detections.push(sample);
        Verdict::Detection
    }

    fn finish_sweep(&mut self) -> Option<CompletedSweep> {
        if self.samples_seen == 0 {
            return None;
        }

        let floors: Vec<f64> = self
            .floors
            .floors()
            .iter()
            .zip(&self.accumulators)
            .map(|(&old, acc)| acc.mean().unwrap_or(old))
            .collect();
        self.floors = NoiseFloorTiers::new(floors);

        let completed = CompletedSweep {
            index: self.next_index,
            detections: std::mem::take(&mut self.detections),
            floors: self.floors.clone(),
            samples_seen: self.samples_seen,
            tier_admissions: self.accumulators.iter().map(|a| a.count).collect(),
        };

        self.next_index += 1;
        self.samples_seen = 0;
        for acc in &mut self.accumulators {
            *acc = TierAccumulator::default();
        }

        Some(completed)
    }

    /// Floors currently used for classification.
    pub fn floors(&self) -> &NoiseFloorTiers {
        &self.floors
    }

    pub fn dbm_adjust(&self) -> f64 {
        self.dbm_adjust
    }

    /// Samples admitted by each tier so far in the current sweep.
    pub fn tier_admissions(&self) -> Vec<u64> {
        self.accumulators.iter().map(|a| a.count).collect()
    }

    /// Detections collected so far in the current sweep.
    pub fn pending_detections(&self) -> &SweepDetections {
        &self.detections
    }

    /// Index the next completed sweep will carry.
    pub fn next_sweep_index(&self) -> u64 {
        self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn feed(c: &mut AdaptiveThresholdClassifier, powers: &[f64]) -> Vec<Verdict> {
        powers
            .iter()
            .enumerate()
            .map(|(i, &p)| c.classify(Sample::new(1_000_000 + i as u64, p), false).verdict)
            .collect()
    }

    #[test]
    fn test_default_floors() {
        let c = AdaptiveThresholdClassifier::with_defaults(0.0);
        assert_eq!(c.floors().floors(), &[-50.0, -40.0, -30.0]);
    }

    #[test]
    fn test_tier_cascade() {
        let mut c = AdaptiveThresholdClassifier::with_defaults(0.0);
        let verdicts = feed(&mut c, &[-60.0, -45.0, -35.0, -25.0, -20.0]);
        assert_eq!(
            verdicts,
            vec![
                Verdict::Noise { passed_tiers: 0 },
                Verdict::Noise { passed_tiers: 1 },
                Verdict::Noise { passed_tiers: 2 },
                Verdict::Detection,
                Verdict::Detection,
            ]
        );
        assert_eq!(c.tier_admissions(), vec![5, 4, 3]);
        assert_eq!(c.pending_detections().powers_dbm(), &[-25.0, -20.0]);
    }

    #[test]
    fn test_tier_containment() {
        // Every sample above floor[i] that reached tier i is counted in tier i+1
        let mut c = AdaptiveThresholdClassifier::with_defaults(0.0);
        let powers: Vec<f64> = (0..200).map(|i| -80.0 + (i as f64 * 7.3) % 70.0).collect();
        feed(&mut c, &powers);

        let above_50 = powers.iter().filter(|&&p| p > -50.0).count() as u64;
        let above_40 = powers.iter().filter(|&&p| p > -50.0 && p > -40.0).count() as u64;
        let admissions = c.tier_admissions();
        assert_eq!(admissions[0], powers.len() as u64);
        assert_eq!(admissions[1], above_50);
        assert_eq!(admissions[2], above_40);
        assert!(admissions[0] >= admissions[1] && admissions[1] >= admissions[2]);
    }

    #[test]
    fn test_floors_recomputed_at_boundary() {
        let mut c = AdaptiveThresholdClassifier::with_defaults(0.0);
        feed(&mut c, &[-60.0, -45.0, -35.0, -25.0, -20.0]);

        // Floors do not move mid-sweep
        assert_eq!(c.floors().floors(), &[-50.0, -40.0, -30.0]);

        let ev = c.classify(Sample::new(1_000_000, -100.0), true);
        let sweep = ev.completed.unwrap();
        assert_eq!(sweep.index, 0);
        assert_eq!(sweep.samples_seen, 5);
        assert_eq!(sweep.tier_admissions, vec![5, 4, 3]);
        assert_relative_eq!(sweep.floors.floor(0), -37.0);
        assert_relative_eq!(sweep.floors.floor(1), -31.25);
        assert_relative_eq!(sweep.floors.floor(2), -80.0 / 3.0);
        assert_eq!(c.floors(), &sweep.floors);
    }

    #[test]
    fn test_floors_deterministic() {
        let powers = [-70.0, -52.0, -41.0, -33.0, -12.0, -48.0];
        let run = || {
            let mut c = AdaptiveThresholdClassifier::with_defaults(1.5);
            feed(&mut c, &powers);
            c.classify(Sample::new(0, -90.0), true).completed.unwrap().floors
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_zero_admissions_retain_floor() {
        let tiers = NoiseFloorTiers::new(vec![-50.0, -40.0, -30.0]);
        let mut c = AdaptiveThresholdClassifier::new(tiers, 0.0);
        // Nothing clears tier 0, so tiers 1 and 2 admit nothing
        feed(&mut c, &[-90.0, -80.0, -70.0]);
        let sweep = c.classify(Sample::new(0, -90.0), true).completed.unwrap();
        assert_relative_eq!(sweep.floors.floor(0), -80.0);
        assert_eq!(sweep.floors.floor(1), -40.0);
        assert_eq!(sweep.floors.floor(2), -30.0);
    }

    #[test]
    fn test_empty_sweep_retains_all_floors() {
        // Only non-finite readings: tier 0 admits nothing
        let mut c = AdaptiveThresholdClassifier::with_defaults(0.0);
        feed(&mut c, &[f64::NEG_INFINITY, f64::NEG_INFINITY]);
        let sweep = c.classify(Sample::new(0, -90.0), true).completed.unwrap();
        assert_eq!(sweep.floors.floors(), &[-50.0, -40.0, -30.0]);
        assert_eq!(sweep.tier_admissions, vec![0, 0, 0]);
    }

    #[test]
    fn test_accumulators_reset_each_sweep() {
        let mut c = AdaptiveThresholdClassifier::with_defaults(0.0);
        feed(&mut c, &[-20.0, -20.0]);
        let first = c.classify(Sample::new(0, -60.0), true).completed.unwrap();
        assert_eq!(first.detections.len(), 2);
        // The boundary sample already belongs to the new sweep
        assert_eq!(c.tier_admissions(), vec![1, 0, 0]);
        assert!(c.pending_detections().is_empty());

        let second = c.classify(Sample::new(0, -60.0), true).completed.unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.samples_seen, 1);
        assert!(second.detections.is_empty());
    }

    #[test]
    fn test_first_boundary_emits_nothing() {
        let mut c = AdaptiveThresholdClassifier::with_defaults(0.0);
        let ev = c.classify(Sample::new(0, -20.0), true);
        assert!(ev.completed.is_none());
        assert_eq!(c.next_sweep_index(), 0);
        assert_eq!(ev.verdict, Verdict::Detection);
    }

    #[test]
    fn test_dbm_adjust_raises_last_tier() {
        let mut c = AdaptiveThresholdClassifier::with_defaults(5.0);
        let verdicts = feed(&mut c, &[-28.0, -24.0]);
        assert_eq!(verdicts[0], Verdict::Noise { passed_tiers: 2 });
        assert_eq!(verdicts[1], Verdict::Detection);
        // Adjustment only applies at decision time, the floor itself is raw
        assert_eq!(c.floors().last(), -30.0);
    }

    #[test]
    fn test_two_tier_variant() {
        let mut c = AdaptiveThresholdClassifier::new(NoiseFloorTiers::new(vec![-50.0, -40.0]), 0.0);
        let verdicts = feed(&mut c, &[-45.0, -35.0]);
        assert_eq!(verdicts[0], Verdict::Noise { passed_tiers: 1 });
        assert_eq!(verdicts[1], Verdict::Detection);
        assert_eq!(c.tier_admissions(), vec![2, 2]);
    }

    #[test]
    fn test_record_readings_independent() {
        let line = "d, t, 400000000, 400500000, 100000.00, 20, -20.0, -90.0, -15.0, -90.0, -10.0";
        let record = SweepRecord::parse(line).unwrap();
        let mut c = AdaptiveThresholdClassifier::with_defaults(0.0);
        assert!(c.classify_record(&record, 400_000_000).is_none());
        assert_eq!(
            c.pending_detections().frequencies_hz(),
            &[400_000_000, 400_200_000, 400_400_000]
        );

        let completed = c.classify_record(&record, 400_000_000).unwrap();
        assert_eq!(completed.detections.len(), 3);
        assert_eq!(completed.samples_seen, 5);
    }
}
