//! Synthetic sweep generator
//!
//! Produces records in the sweep tool's line format without hardware: a
//! Gaussian noise floor across the whole range plus a set of carriers, each
//! present in a given fraction of sweeps.
//!
//! ```rust
//! use std::io::BufRead;
//! use sweepscope_sim::{SyntheticConfig, SyntheticSweep};
//!
//! let config = SyntheticConfig { seed: Some(7), ..SyntheticConfig::small() };
//! let sweep = SyntheticSweep::new(config).unwrap();
//! let per_sweep = sweep.records_per_sweep();
//!
//! let lines: Vec<String> = sweep.into_reader(Some(2)).lines().map(|l| l.unwrap()).collect();
//! assert_eq!(lines.len() as u64, 2 * per_sweep);
//! ```

use std::io::{BufRead, Read};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use sweepscope_core::record::{SweepRecord, READINGS_PER_RECORD};
use sweepscope_core::types::HZ_PER_MHZ;

use crate::source::{SourceError, SourceResult, SweepSource};

/// A transmitter visible in the synthetic spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Carrier {
    pub frequency_hz: u64,
    pub power_dbm: f64,
    /// Probability of being on the air in any one sweep
    pub duty: f64,
}

impl Carrier {
    pub fn new(frequency_mhz: f64, power_dbm: f64, duty: f64) -> Self {
        Self {
            frequency_hz: (frequency_mhz * HZ_PER_MHZ).round() as u64,
            power_dbm,
            duty,
        }
    }
}

/// Synthetic spectrum parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub min_freq_mhz: u32,
    pub max_freq_mhz: u32,
    pub bin_size_hz: u32,
    pub noise_floor_dbm: f64,
    /// Standard deviation of every reading (dB)
    pub noise_std_db: f64,
    pub carriers: Vec<Carrier>,
    /// Fixed seed for reproducible output
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            min_freq_mhz: 400,
            max_freq_mhz: 1000,
            bin_size_hz: 100_000,
            noise_floor_dbm: -80.0,
            noise_std_db: 1.5,
            carriers: vec![
                Carrier::new(433.92, -35.0, 1.0),
                Carrier::new(868.3, -50.0, 0.7),
                Carrier::new(915.0, -42.0, 0.4),
            ],
            seed: None,
        }
    }
}

impl SyntheticConfig {
    /// 10 MHz around 433 MHz: 100 bins, 20 records per sweep.
    pub fn small() -> Self {
        Self {
            min_freq_mhz: 430,
            max_freq_mhz: 440,
            carriers: vec![Carrier::new(433.92, -20.0, 1.0)],
            ..Default::default()
        }
    }
}

/// Sweep-by-sweep record generator.
#[derive(Debug)]
pub struct SyntheticSweep {
    config: SyntheticConfig,
    rng: StdRng,
    noise: Normal<f64>,
    sweeps: u64,
}

impl SyntheticSweep {
    pub fn new(config: SyntheticConfig) -> SourceResult<Self> {
        if config.min_freq_mhz >= config.max_freq_mhz {
            return Err(SourceError::Config(
                "min_freq_mhz must be below max_freq_mhz".to_string(),
            ));
        }
        if config.bin_size_hz == 0 {
            return Err(SourceError::Config("bin_size_hz must be > 0".to_string()));
        }
        let noise = Normal::new(0.0, config.noise_std_db)
            .map_err(|e| SourceError::Config(format!("noise_std_db: {}", e)))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            rng,
            noise,
            sweeps: 0,
        })
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn min_hz(&self) -> u64 {
        self.config.min_freq_mhz as u64 * HZ_PER_MHZ as u64
    }

    fn bins(&self) -> u64 {
        let span_mhz = (self.config.max_freq_mhz - self.config.min_freq_mhz) as u64;
        let span_hz = span_mhz * HZ_PER_MHZ as u64;
        span_hz.div_ceil(self.config.bin_size_hz as u64)
    }

    pub fn records_per_sweep(&self) -> u64 {
        self.bins().div_ceil(READINGS_PER_RECORD as u64)
    }

    /// Sweeps generated so far.
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Generate the records of the next sweep, lowest frequency first.
    pub fn next_sweep(&mut self) -> Vec<SweepRecord> {
        let bin_hz = self.config.bin_size_hz as u64;
        let min_hz = self.min_hz();

        let mut powers: Vec<f64> = (0..self.records_per_sweep() * READINGS_PER_RECORD as u64)
            .map(|_| self.config.noise_floor_dbm + self.noise.sample(&mut self.rng))
            .collect();

        for carrier in &self.config.carriers {
            if carrier.frequency_hz < min_hz || !self.rng.gen_bool(carrier.duty.clamp(0.0, 1.0)) {
                continue;
            }
            let bin = ((carrier.frequency_hz - min_hz) / bin_hz) as usize;
            if let Some(p) = powers.get_mut(bin) {
                let level = carrier.power_dbm + self.noise.sample(&mut self.rng);
                *p = p.max(level);
            }
        }

        self.sweeps += 1;
        powers
            .chunks_exact(READINGS_PER_RECORD)
            .enumerate()
            .map(|(r, chunk)| {
                let mut powers_dbm = [0.0; READINGS_PER_RECORD];
                powers_dbm.copy_from_slice(chunk);
                SweepRecord {
                    start_hz: min_hz + (r * READINGS_PER_RECORD) as u64 * bin_hz,
                    bin_width_hz: bin_hz as f64,
                    powers_dbm,
                }
            })
            .collect()
    }

    /// Line reader producing `sweeps` sweeps, or sweeps forever with `None`.
    pub fn into_reader(self, sweeps: Option<u64>) -> SyntheticReader {
        SyntheticReader {
            generator: self,
            remaining: sweeps,
            buffer: Vec::new(),
            pos: 0,
        }
    }
}

/// Lazily generated record lines, one sweep at a time.
#[derive(Debug)]
pub struct SyntheticReader {
    generator: SyntheticSweep,
    remaining: Option<u64>,
    buffer: Vec<u8>,
    pos: usize,
}

impl SyntheticReader {
    fn refill(&mut self) {
        match self.remaining {
            Some(0) => return,
            Some(ref mut n) => *n -= 1,
            None => {}
        }
        self.buffer.clear();
        self.pos = 0;
        for record in self.generator.next_sweep() {
            self.buffer.extend_from_slice(record.to_line().as_bytes());
            self.buffer.push(b'\n');
        }
    }
}

impl Read for SyntheticReader {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for SyntheticReader {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        if self.pos >= self.buffer.len() {
            self.refill();
        }
        Ok(&self.buffer[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buffer.len());
    }
}

/// Synthetic sweeps as a [`SweepSource`].
#[derive(Debug)]
pub struct SyntheticSource {
    reader: Option<SyntheticReader>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig, sweeps: Option<u64>) -> SourceResult<Self> {
        Ok(Self {
            reader: Some(SyntheticSweep::new(config)?.into_reader(sweeps)),
        })
    }
}

impl SweepSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn take_reader(&mut self) -> SourceResult<Box<dyn BufRead + Send>> {
        let reader = self.reader.take().ok_or(SourceError::OutputTaken)?;
        Ok(Box::new(reader))
    }

    fn stop(&mut self) -> SourceResult<()> {
        self.reader = None;
        Ok(())
    }
}
