//! Core types shared by every pipeline stage
//!
//! Samples come out of the sweep framing layer, detections are collected per
//! sweep by the classifier, and feature points are what the clustering stage
//! actually works on.
//!
//! ## Feature Space
//!
//! Clustering runs in three dimensions:
//!
//! ```text
//!   frequency (MHz)  ×  power (dBm)  ×  sweep age (window position)
//! ```
//!
//! Frequency is expressed in MHz rather than Hz so that one MHz of frequency
//! separation weighs about as much as one dB of power difference or one sweep
//! of age. In Hz the frequency axis would dominate every distance.

use serde::{Deserialize, Serialize};

/// Hz per MHz, used when projecting detections into feature space.
pub const HZ_PER_MHZ: f64 = 1_000_000.0;

/// Result type for sweep processing operations
pub type SweepResult<T> = Result<T, SweepError>;

/// Errors that can occur while detecting and clustering sweeps
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SweepError {
    /// The input record could not be framed. Fatal for the pipeline.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Not enough points to run a clustering pass. Recovered by skipping the pass.
    #[error("Insufficient data: need more than {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Invalid runtime parameter (epsilon, neighbor count, ...)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A published message could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Publishing a message failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// The hand-off queue was closed
    #[error("Hand-off queue closed")]
    QueueClosed,

    /// A live sweep stream reached end of output
    #[error("Sweep stream ended: {0}")]
    StreamEnded(String),

    /// Underlying I/O failure (stream read, process pipe)
    #[error("I/O error: {0}")]
    Io(String),
}

impl SweepError {
    /// Whether the pipeline must stop when this error is raised.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SweepError::InsufficientData { .. })
    }
}

impl From<std::io::Error> for SweepError {
    fn from(e: std::io::Error) -> Self {
        SweepError::Io(e.to_string())
    }
}

/// One classified power reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Bin frequency in Hz
    pub frequency_hz: u64,
    /// Measured power in dBm
    pub power_dbm: f64,
}

impl Sample {
    pub fn new(frequency_hz: u64, power_dbm: f64) -> Self {
        Self {
            frequency_hz,
            power_dbm,
        }
    }
}

/// Detections of one sweep, kept as parallel frequency/power lists.
///
/// The lists always have the same length; use [`SweepDetections::push`] to
/// keep them aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepDetections {
    frequencies_hz: Vec<u64>,
    powers_dbm: Vec<f64>,
}

impl SweepDetections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from detections in sweep order.
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut detections = Self::new();
        for s in samples {
            detections.push(*s);
        }
        detections
    }

    /// Append one detection.
    pub fn push(&mut self, sample: Sample) {
        self.frequencies_hz.push(sample.frequency_hz);
        self.powers_dbm.push(sample.power_dbm);
    }

    pub fn len(&self) -> usize {
        self.frequencies_hz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies_hz.is_empty()
    }

    pub fn frequencies_hz(&self) -> &[u64] {
        &self.frequencies_hz
    }

    pub fn powers_dbm(&self) -> &[f64] {
        &self.powers_dbm
    }

    /// Iterate detections as samples, in sweep order.
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.frequencies_hz
            .iter()
            .zip(self.powers_dbm.iter())
            .map(|(&f, &p)| Sample::new(f, p))
    }
}

/// A detection projected into clustering feature space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    /// Frequency in MHz
    pub frequency_mhz: f64,
    /// Power in dBm
    pub power_dbm: f64,
    /// Position of the owning sweep in the history window (0 = oldest)
    pub sweep_age: usize,
}

impl FeaturePoint {
    pub fn new(frequency_mhz: f64, power_dbm: f64, sweep_age: usize) -> Self {
        Self {
            frequency_mhz,
            power_dbm,
            sweep_age,
        }
    }

    /// Coordinates in feature space.
    #[inline]
    pub fn coords(&self) -> [f64; 3] {
        [self.frequency_mhz, self.power_dbm, self.sweep_age as f64]
    }

    /// Euclidean distance in feature space.
    #[inline]
    pub fn distance(&self, other: &FeaturePoint) -> f64 {
        euclidean(&self.coords(), &other.coords())
    }
}

/// Euclidean distance between two 3-D coordinates.
#[inline]
pub fn euclidean(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Compact description of one clustered signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    /// Mean member frequency (MHz)
    pub center_frequency_mhz: f64,
    /// Frequency extent of the cluster (MHz)
    pub bandwidth_mhz: f64,
    /// Distinct sweep ages over the maximum present age, as a percentage
    pub continuity_percent: f64,
    /// Power extent of the cluster (dB)
    pub power_spread_dbm: f64,
}
