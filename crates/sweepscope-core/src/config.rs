//! # Configuration System
//!
//! YAML configuration for the sweep detector:
//!
//! - Sweep range and receiver gains (handed to the sweep process)
//! - Detector floors and offset
//! - Clustering parameters and history length
//! - Hand-off queue sizing and overflow policy
//! - Logging and publish targets
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `SWEEPSCOPE_CONFIG` environment variable
//! 2. `./sweepscope.yaml` (current directory)
//! 3. `~/.config/sweepscope/config.yaml` (user config)
//! 4. `/etc/sweepscope/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! sweep:
//!   min_freq_mhz: 400
//!   max_freq_mhz: 1000
//!   amp_enable: 1
//!   lna_gain_db: 32
//!   vga_gain_db: 20
//!   bin_size_hz: 100000
//!   dbm_adjust: 3.0
//!
//! clustering:
//!   min_points: 10
//!
//! pipeline:
//!   overflow_policy: drop_oldest
//!
//! publish:
//!   scan_targets: ["127.0.0.1:47001"]
//!   signal_targets: ["127.0.0.1:47002", "10.0.0.5:47002"]
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::classifier::{NoiseFloorTiers, DEFAULT_FLOORS_DBM};
use crate::dbscan::DEFAULT_MIN_POINTS;
use crate::epsilon::DEFAULT_NEIGHBOR_K;
use crate::handoff::{OverflowPolicy, DEFAULT_HANDOFF_CAPACITY};
use crate::history::{DEFAULT_CLUSTER_HISTORY, DEFAULT_MIN_FEATURE_POINTS};
use crate::observe::LogConfig;
use crate::publish::MAX_UDP_PAYLOAD;
use crate::types::HZ_PER_MHZ;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SWEEPSCOPE_CONFIG";

/// Highest frequency the receiver tunes to.
pub const MAX_FREQ_MHZ: u32 = 6000;

/// Error type for configuration operations.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found
    NotFound(String),
    /// Failed to read or write a configuration file
    ReadError(String),
    /// Failed to parse configuration
    ParseError(String),
    /// Invalid configuration value
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(msg) => write!(f, "config not found: {}", msg),
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Sweep range and receiver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Lowest swept frequency (MHz). Also the sweep-boundary frequency.
    pub min_freq_mhz: u32,
    /// Highest swept frequency (MHz)
    pub max_freq_mhz: u32,
    /// RF amplifier. Accepts a bool or an integer, non-zero meaning on.
    #[serde(deserialize_with = "deserialize_flag")]
    pub amp_enable: bool,
    /// LNA (IF) gain, 0-40 dB
    pub lna_gain_db: u32,
    /// VGA (baseband) gain, 0-62 dB
    pub vga_gain_db: u32,
    /// FFT bin width (Hz)
    pub bin_size_hz: u32,
    /// Offset added to the tightest tier when deciding detections
    pub dbm_adjust: f64,
    /// Sweeps kept in the clustering window
    pub cluster_history: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_freq_mhz: 1,
            max_freq_mhz: MAX_FREQ_MHZ,
            amp_enable: true,
            lna_gain_db: 40,
            vga_gain_db: 30,
            bin_size_hz: 100_000,
            dbm_adjust: 0.0,
            cluster_history: DEFAULT_CLUSTER_HISTORY,
        }
    }
}

impl SweepConfig {
    /// Record start frequency that marks a new sweep.
    pub fn sweep_start_hz(&self) -> u64 {
        (self.min_freq_mhz as f64 * HZ_PER_MHZ) as u64
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// Threshold classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Floors in force until the first sweep completes, loosest tier first.
    /// The number of entries sets the number of tiers.
    pub initial_floors_dbm: Vec<f64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            initial_floors_dbm: DEFAULT_FLOORS_DBM.to_vec(),
        }
    }
}

impl DetectorConfig {
    pub fn tiers(&self) -> NoiseFloorTiers {
        NoiseFloorTiers::new(self.initial_floors_dbm.clone())
    }
}

/// Clustering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// DBSCAN core-point neighborhood size
    pub min_points: usize,
    /// Neighbor rank used for the k-distance curve
    pub neighbor_k: usize,
    /// A pass runs only with more feature points than this
    pub min_feature_points: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_points: DEFAULT_MIN_POINTS,
            neighbor_k: DEFAULT_NEIGHBOR_K,
            min_feature_points: DEFAULT_MIN_FEATURE_POINTS,
        }
    }
}

/// Producer / worker hand-off settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Finalized sweeps that may wait for the clustering worker (1-2)
    pub handoff_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            handoff_capacity: DEFAULT_HANDOFF_CAPACITY,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

/// Subscriber addresses for the two topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Receivers of raw per-sweep detections
    pub scan_targets: Vec<String>,
    /// Receivers of clustered signal descriptors
    pub signal_targets: Vec<String>,
    /// Largest datagram payload in bytes
    pub max_datagram: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            scan_targets: vec!["127.0.0.1:47001".to_string()],
            signal_targets: vec!["127.0.0.1:47002".to_string()],
            max_datagram: MAX_UDP_PAYLOAD,
        }
    }
}

impl PublishConfig {
    pub fn scan_addrs(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        parse_addrs(&self.scan_targets)
    }

    pub fn signal_addrs(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        parse_addrs(&self.signal_targets)
    }
}

fn parse_addrs(targets: &[String]) -> Result<Vec<SocketAddr>, ConfigError> {
    targets
        .iter()
        .map(|t| {
            t.parse::<SocketAddr>()
                .map_err(|e| ConfigError::ValidationError(format!("publish target '{}': {}", t, e)))
        })
        .collect()
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepScopeConfig {
    pub sweep: SweepConfig,
    pub detector: DetectorConfig,
    pub clustering: ClusteringConfig,
    pub pipeline: PipelineConfig,
    pub logging: LogConfig,
    pub publish: PublishConfig,
}

impl Default for SweepScopeConfig {
    fn default() -> Self {
        Self {
            sweep: SweepConfig::default(),
            detector: DetectorConfig::default(),
            clustering: ClusteringConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LogConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl SweepScopeConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns defaults when no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            return Self::load_from(&path);
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./sweepscope.yaml")];
        if let Some(dirs) = directories::ProjectDirs::from("", "", "sweepscope") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }
        paths.push(PathBuf::from("/etc/sweepscope/config.yaml"));
        paths
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));
        let sweep = &self.sweep;

        if sweep.min_freq_mhz >= sweep.max_freq_mhz {
            return invalid("min_freq_mhz must be below max_freq_mhz");
        }
        if sweep.max_freq_mhz > MAX_FREQ_MHZ {
            return invalid("max_freq_mhz must be at most 6000");
        }
        if sweep.lna_gain_db > 40 {
            return invalid("lna_gain_db must be 0-40");
        }
        if sweep.vga_gain_db > 62 {
            return invalid("vga_gain_db must be 0-62");
        }
        if sweep.bin_size_hz == 0 {
            return invalid("bin_size_hz must be > 0");
        }
        if !sweep.dbm_adjust.is_finite() {
            return invalid("dbm_adjust must be finite");
        }
        if sweep.cluster_history == 0 {
            return invalid("cluster_history must be > 0");
        }

        let floors = &self.detector.initial_floors_dbm;
        if floors.is_empty() || floors.iter().any(|f| !f.is_finite()) {
            return invalid("initial_floors_dbm needs at least one finite value");
        }

        if self.clustering.min_points == 0 {
            return invalid("min_points must be > 0");
        }
        if self.clustering.neighbor_k == 0 {
            return invalid("neighbor_k must be > 0");
        }

        if !(1..=2).contains(&self.pipeline.handoff_capacity) {
            return invalid("handoff_capacity must be 1 or 2");
        }

        self.publish.scan_addrs()?;
        self.publish.signal_addrs()?;
        Ok(())
    }

    /// Example configuration as YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            sweep: SweepConfig {
                min_freq_mhz: 400,
                max_freq_mhz: 1000,
                lna_gain_db: 32,
                vga_gain_db: 20,
                dbm_adjust: 3.0,
                ..Default::default()
            },
            ..Default::default()
        };
        serde_yaml::to_string(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SweepScopeConfig::default();
        assert_eq!(config.sweep.min_freq_mhz, 1);
        assert_eq!(config.sweep.max_freq_mhz, 6000);
        assert!(config.sweep.amp_enable);
        assert_eq!(config.sweep.cluster_history, 60);
        assert_eq!(config.clustering.min_points, 10);
        assert_eq!(config.pipeline.handoff_capacity, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
sweep:
  min_freq_mhz: 400
  max_freq_mhz: 1000
  amp_enable: 0
  lna_gain_db: 24
  dbm_adjust: -2.5
detector:
  initial_floors_dbm: [-60.0, -45.0]
pipeline:
  handoff_capacity: 1
  overflow_policy: block
"#;
        let config = SweepScopeConfig::parse(yaml).unwrap();
        assert_eq!(config.sweep.min_freq_mhz, 400);
        assert!(!config.sweep.amp_enable);
        assert_eq!(config.sweep.lna_gain_db, 24);
        assert_eq!(config.sweep.dbm_adjust, -2.5);
        assert_eq!(config.sweep.sweep_start_hz(), 400_000_000);
        assert_eq!(config.detector.tiers().len(), 2);
        assert_eq!(config.pipeline.overflow_policy, OverflowPolicy::Block);
        // Untouched sections keep defaults
        assert_eq!(config.sweep.vga_gain_db, 30);
        assert_eq!(config.clustering.neighbor_k, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_amp_enable_normalization() {
        let cases = [
            ("1", true),
            ("7", true),
            ("-1", true),
            ("0", false),
            ("true", true),
            ("false", false),
        ];
        for (text, expected) in cases {
            let yaml = format!("sweep:\n  amp_enable: {}\n", text);
            let config = SweepScopeConfig::parse(&yaml).unwrap();
            assert_eq!(config.sweep.amp_enable, expected, "amp_enable: {}", text);
        }
    }

    #[test]
    fn test_validation_errors() {
        let mut config = SweepScopeConfig::default();
        config.sweep.min_freq_mhz = 2000;
        config.sweep.max_freq_mhz = 1000;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = SweepScopeConfig::default();
        config.pipeline.handoff_capacity = 3;
        assert!(config.validate().is_err());

        let mut config = SweepScopeConfig::default();
        config.detector.initial_floors_dbm.clear();
        assert!(config.validate().is_err());

        let mut config = SweepScopeConfig::default();
        config.publish.signal_targets.push("not-an-address".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SweepScopeConfig::parse("sweep: [1, 2"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweepscope.yaml");

        let mut config = SweepScopeConfig::default();
        config.sweep.dbm_adjust = 4.0;
        config.publish.scan_targets = vec!["192.168.1.20:9000".to_string()];
        config.save(&path).unwrap();

        let loaded = SweepScopeConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.publish.scan_addrs().unwrap(),
            vec!["192.168.1.20:9000".parse::<SocketAddr>().unwrap()]
        );
    }

    #[test]
    fn test_example_yaml_parses() {
        let yaml = SweepScopeConfig::example_yaml();
        let config = SweepScopeConfig::parse(&yaml).unwrap();
        assert_eq!(config.sweep.min_freq_mhz, 400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_search_paths() {
        let paths = SweepScopeConfig::config_search_paths();
        assert_eq!(paths[0], PathBuf::from("./sweepscope.yaml"));
        assert_eq!(
            paths.last().unwrap(),
            &PathBuf::from("/etc/sweepscope/config.yaml")
        );
    }
}
