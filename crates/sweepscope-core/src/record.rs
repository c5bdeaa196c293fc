//! Sweep record framing
//!
//! The external sweep producer emits one text line per record, with fields
//! separated by `", "`:
//!
//! ```text
//! [0] date  [1] time  [2] hz_low  [3] hz_high  [4] bin_width_hz  [5] num_samples  [6..=10] dBm × 5
//! 2024-03-01, 12:00:00.123456, 433000000, 433500000, 100000.00, 20, -71.2, -69.8, -40.5, -70.1, -72.0
//! ```
//!
//! Only fields 2, 4 and 6–10 are used. The i-th power reading belongs to the
//! bin at `hz_low + i × round(bin_width_hz)`.

use crate::types::{Sample, SweepError, SweepResult};

/// Separator between fields of one record.
pub const FIELD_SEPARATOR: &str = ", ";
/// Minimum number of fields for a well-formed record.
pub const MIN_FIELDS: usize = 11;
/// Power readings carried by one record.
pub const READINGS_PER_RECORD: usize = 5;

const START_FIELD: usize = 2;
const BIN_WIDTH_FIELD: usize = 4;
const FIRST_POWER_FIELD: usize = 6;

/// One parsed line of sweep output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRecord {
    /// Frequency of the first bin in Hz
    pub start_hz: u64,
    /// Bin width in Hz
    pub bin_width_hz: f64,
    /// Five adjacent power readings in dBm
    pub powers_dbm: [f64; READINGS_PER_RECORD],
}

impl SweepRecord {
    /// Parse one record line.
    ///
    /// A line with fewer than [`MIN_FIELDS`] fields, with a consumed field
    /// that is not a number, or with an unusable bin width is a framing error.
    pub fn parse(line: &str) -> SweepResult<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() < MIN_FIELDS {
            return Err(SweepError::Framing(format!(
                "expected at least {} fields, got {}: {:?}",
                MIN_FIELDS,
                fields.len(),
                line
            )));
        }

        let start_hz = fields[START_FIELD]
            .trim()
            .parse::<u64>()
            .map_err(|e| field_error(START_FIELD, fields[START_FIELD], e))?;
        let bin_width_hz = fields[BIN_WIDTH_FIELD]
            .trim()
            .parse::<f64>()
            .map_err(|e| field_error(BIN_WIDTH_FIELD, fields[BIN_WIDTH_FIELD], e))?;
        if !bin_width_hz.is_finite() || bin_width_hz <= 0.0 {
            return Err(field_error(
                BIN_WIDTH_FIELD,
                fields[BIN_WIDTH_FIELD],
                "bin width must be finite and positive",
            ));
        }
        // Highest bin edge must be representable
        let step = bin_width_hz.round();
        let last_edge = (step < u64::MAX as f64)
            .then(|| (step as u64).checked_mul(READINGS_PER_RECORD as u64))
            .flatten()
            .and_then(|span| start_hz.checked_add(span));
        if last_edge.is_none() {
            return Err(field_error(
                BIN_WIDTH_FIELD,
                fields[BIN_WIDTH_FIELD],
                "bin frequencies overflow",
            ));
        }

        let mut powers_dbm = [0.0; READINGS_PER_RECORD];
        for (i, slot) in powers_dbm.iter_mut().enumerate() {
            let idx = FIRST_POWER_FIELD + i;
            *slot = fields[idx]
                .trim()
                .parse::<f64>()
                .map_err(|e| field_error(idx, fields[idx], e))?;
        }

        Ok(Self {
            start_hz,
            bin_width_hz,
            powers_dbm,
        })
    }

    /// Frequency of the i-th reading.
    #[inline]
    pub fn bin_frequency(&self, i: usize) -> u64 {
        let step = self.bin_width_hz.round().max(0.0) as u64;
        self.start_hz.saturating_add((i as u64).saturating_mul(step))
    }

    /// The record's readings as samples, lowest frequency first.
    pub fn samples(&self) -> [Sample; READINGS_PER_RECORD] {
        let mut out = [Sample::new(0, 0.0); READINGS_PER_RECORD];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = Sample::new(self.bin_frequency(i), self.powers_dbm[i]);
        }
        out
    }

    /// Whether this record opens a new sweep.
    #[inline]
    pub fn is_sweep_start(&self, sweep_start_hz: u64) -> bool {
        self.start_hz == sweep_start_hz
    }

    /// Render the record back into the producer's line format.
    ///
    /// Date and time fields are placeholders; nothing downstream reads them.
    pub fn to_line(&self) -> String {
        let hz_high = self.bin_frequency(READINGS_PER_RECORD);
        let mut line = format!(
            "1970-01-01, 00:00:00.000000, {}, {}, {:.2}, {}",
            self.start_hz,
            hz_high,
            self.bin_width_hz,
            READINGS_PER_RECORD * 4
        );
        for p in &self.powers_dbm {
            line.push_str(FIELD_SEPARATOR);
            line.push_str(&format!("{:.2}", p));
        }
        line
    }
}

fn field_error(index: usize, raw: &str, e: impl std::fmt::Display) -> SweepError {
    SweepError::Framing(format!("field [{}] {:?}: {}", index, raw, e))
}
