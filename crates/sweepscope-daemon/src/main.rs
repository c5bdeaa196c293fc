//! sweepscope - adaptive spectrum sweep detector
//!
//! ```text
//! sweepscope [CONFIG.yaml]                 run against hackrf_sweep
//! sweepscope --replay FILE [CONFIG.yaml]   run against recorded sweep lines ("-" for stdin)
//! sweepscope --synthetic [CONFIG.yaml]     run against generated sweeps, no hardware
//! sweepscope --example-config              print a commented configuration
//! ```
//!
//! Without a config path the search order is `$SWEEPSCOPE_CONFIG`,
//! `./sweepscope.yaml`, the user config directory, then `/etc/sweepscope/`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use sweepscope_core::config::{ConfigError, SweepScopeConfig};
use sweepscope_core::observe;
use sweepscope_core::pipeline::{PipelineSettings, SweepPipeline};
use sweepscope_core::publish::{Publisher, UdpPublisher};
use sweepscope_sim::{
    HackrfArgs, HackrfSweep, LineSource, SweepSource, SyntheticConfig, SyntheticSource,
};
use tracing::{debug, error, info};

const USAGE: &str = "usage: sweepscope [--replay FILE | --synthetic] [CONFIG.yaml]
       sweepscope --example-config";

enum Input {
    Hackrf,
    Replay(PathBuf),
    Synthetic,
}

struct Cli {
    input: Input,
    config: Option<PathBuf>,
    example_config: bool,
}

fn parse_args() -> Result<Cli, String> {
    let mut cli = Cli {
        input: Input::Hackrf,
        config: None,
        example_config: false,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--replay" => {
                let path = args.next().ok_or("--replay needs a file")?;
                cli.input = Input::Replay(PathBuf::from(path));
            }
            "--synthetic" => cli.input = Input::Synthetic,
            "--example-config" => cli.example_config = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with('-') && flag != "-" => {
                return Err(format!("unknown option: {}", flag))
            }
            path => {
                if cli.config.replace(PathBuf::from(path)).is_some() {
                    return Err("only one config path may be given".to_string());
                }
            }
        }
    }
    Ok(cli)
}

fn load_config(path: Option<&PathBuf>) -> Result<SweepScopeConfig, ConfigError> {
    let config = match path {
        Some(path) => SweepScopeConfig::load_from(path)?,
        None => SweepScopeConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

fn open_source(input: &Input, config: &SweepScopeConfig) -> Result<Box<dyn SweepSource>, String> {
    let source: Box<dyn SweepSource> = match input {
        Input::Hackrf => Box::new(
            HackrfSweep::spawn(&HackrfArgs::from(&config.sweep)).map_err(|e| e.to_string())?,
        ),
        Input::Replay(path) if path.as_os_str() == "-" => Box::new(LineSource::stdin()),
        Input::Replay(path) => Box::new(LineSource::open(path).map_err(|e| e.to_string())?),
        Input::Synthetic => {
            let synthetic = SyntheticConfig {
                min_freq_mhz: config.sweep.min_freq_mhz,
                max_freq_mhz: config.sweep.max_freq_mhz,
                bin_size_hz: config.sweep.bin_size_hz,
                ..SyntheticConfig::default()
            };
            Box::new(SyntheticSource::new(synthetic, None).map_err(|e| e.to_string())?)
        }
    };
    Ok(source)
}

fn publisher(config: &SweepScopeConfig) -> Result<Arc<dyn Publisher>, String> {
    let addrs = |r: Result<Vec<SocketAddr>, ConfigError>| r.map_err(|e| e.to_string());
    let udp = UdpPublisher::bind(
        addrs(config.publish.scan_addrs())?,
        addrs(config.publish.signal_addrs())?,
        config.publish.max_datagram,
    )
    .map_err(|e| e.to_string())?;
    Ok(Arc::new(udp))
}

fn main() -> ExitCode {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::from(2);
        }
    };

    if cli.example_config {
        print!("{}", SweepScopeConfig::example_yaml());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sweepscope: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let metrics = Arc::new(observe::init(&config.logging));
    info!(
        min_mhz = config.sweep.min_freq_mhz,
        max_mhz = config.sweep.max_freq_mhz,
        bin_hz = config.sweep.bin_size_hz,
        tiers = config.detector.initial_floors_dbm.len(),
        "sweepscope starting"
    );

    let publisher = match publisher(&config) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to set up publishers");
            return ExitCode::FAILURE;
        }
    };

    let mut source = match open_source(&cli.input, &config) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open sweep source");
            return ExitCode::FAILURE;
        }
    };
    info!(source = source.name(), "sweep source ready");

    let reader = match source.take_reader() {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "no output from sweep source");
            return ExitCode::FAILURE;
        }
    };

    // A live sweep process closing its output is a failure, not a finished run
    let settings = PipelineSettings {
        end_of_input: source.end_of_input(),
        ..PipelineSettings::from(&config)
    };
    let pipeline = SweepPipeline::with_metrics(settings, publisher, metrics.clone());
    let result = pipeline.run(reader);

    if let Err(e) = source.stop() {
        error!(error = %e, "failed to stop sweep source");
    }
    debug!(metrics = %metrics.to_prometheus(), "final metrics");

    match result {
        Ok(report) => {
            info!(
                records = report.records,
                sweeps = report.sweeps_completed,
                detections = report.detections,
                passes = report.clustering_passes,
                skipped = report.passes_skipped,
                clusters = report.clusters_found,
                dropped = report.handoffs_dropped,
                publish_failures = report.publish_failures,
                "sweep stream ended"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "pipeline stopped");
            ExitCode::FAILURE
        }
    }
}
