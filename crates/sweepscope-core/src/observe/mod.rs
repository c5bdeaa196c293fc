//! # Observability
//!
//! - **Logging**: structured logs via `tracing`, configured once at startup
//! - **Metrics**: atomic counters and gauges shared by the producer and the
//!   clustering worker, exportable as Prometheus text
//!
//! ```rust,ignore
//! use sweepscope_core::observe::{init, LogConfig};
//!
//! let metrics = init(&LogConfig::default());
//! metrics.sweeps_completed.inc();
//! tracing::info!(sweeps = metrics.sweeps_completed.get(), "running");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use metrics::{Counter, Gauge, Histogram, Metrics, MetricsSnapshot};

/// Set up logging and create a fresh metrics instance.
pub fn init(log_config: &LogConfig) -> Metrics {
    init_logging(log_config);
    Metrics::new()
}
