//! # Sweep Detection and Temporal Clustering
//!
//! Turns the text output of a wideband spectrum sweep into two message
//! streams: the raw detections of every sweep, and compact descriptors of
//! signals that persist across sweeps.
//!
//! ## Overview
//!
//! - **Framing**: one text record per line, five power bins each
//! - **Classification**: nested noise floors that re-calibrate every sweep
//! - **History**: sliding window of recent sweeps in frequency/power/age space
//! - **Clustering**: DBSCAN with its radius picked from the k-distance knee
//! - **Summaries**: center, bandwidth, continuity and power spread per cluster
//!
//! ## Signal Flow
//!
//! ```text
//! line → SweepRecord → classifier → SweepDetections ─┬─► scan message
//!                                                    └─► HistoryWindow → epsilon → DBSCAN → summaries → signal message
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::io::BufReader;
//! use std::sync::Arc;
//! use sweepscope_core::{BroadcastHub, PipelineSettings, SweepPipeline, Topic};
//!
//! let hub = Arc::new(BroadcastHub::new());
//! let signals = hub.subscribe(Topic::Signal);
//!
//! let input = BufReader::new(std::io::stdin());
//! let report = SweepPipeline::new(PipelineSettings::default(), hub.clone())
//!     .run(input)
//!     .unwrap();
//! println!("{} sweeps, {} signal messages", report.sweeps_completed, signals.try_iter().count());
//! ```

pub mod classifier;
pub mod codec;
pub mod config;
pub mod dbscan;
pub mod epsilon;
pub mod handoff;
pub mod history;
pub mod observe;
pub mod pipeline;
pub mod publish;
pub mod record;
pub mod summary;
pub mod types;

pub use classifier::{
    AdaptiveThresholdClassifier, ClassifierEvent, CompletedSweep, NoiseFloorTiers, Verdict,
};
pub use codec::{decode_scan, decode_signals, encode_scan, encode_signals};
pub use config::{ConfigError, SweepScopeConfig};
pub use dbscan::{Clustering, DensityClusterer};
pub use epsilon::EpsilonSelector;
pub use handoff::{HandoffQueue, OverflowPolicy};
pub use history::HistoryWindow;
pub use pipeline::{
    ClusterWorker, EndOfInput, PipelineReport, PipelineSettings, SweepPhase, SweepPipeline,
    SweepProducer,
};
pub use publish::{BroadcastHub, Publisher, Topic, UdpPublisher};
pub use record::SweepRecord;
pub use summary::summarize;
pub use types::{FeaturePoint, Sample, SignalSummary, SweepDetections, SweepError, SweepResult};
