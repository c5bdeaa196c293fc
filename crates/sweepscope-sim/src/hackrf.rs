//! `hackrf_sweep` process driver
//!
//! Runs the sweep tool with the configured range and gains and exposes its
//! stdout as the record stream. Its stderr (status chatter) is forwarded to
//! the log from a named thread so the pipe never fills up.
//!
//! ```text
//! hackrf_sweep -g <vga> -l <lna> -a <0|1> -f <min>:<max> -w <bin_hz>
//! ```
//!
//! The child is killed when the driver is stopped or dropped.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;

use sweepscope_core::config::SweepConfig;
use sweepscope_core::pipeline::EndOfInput;
use tracing::{debug, info, warn};

use crate::source::{SourceError, SourceResult, SweepSource};

/// Default program name, resolved through `PATH`.
pub const HACKRF_SWEEP: &str = "hackrf_sweep";

/// Command line for one sweep process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HackrfArgs {
    pub program: PathBuf,
    pub vga_gain_db: u32,
    pub lna_gain_db: u32,
    pub amp_enable: bool,
    pub min_freq_mhz: u32,
    pub max_freq_mhz: u32,
    pub bin_size_hz: u32,
}

impl HackrfArgs {
    /// Arguments after the program name.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-g".to_string(),
            self.vga_gain_db.to_string(),
            "-l".to_string(),
            self.lna_gain_db.to_string(),
            "-a".to_string(),
            if self.amp_enable { "1" } else { "0" }.to_string(),
            "-f".to_string(),
            format!("{}:{}", self.min_freq_mhz, self.max_freq_mhz),
            "-w".to_string(),
            self.bin_size_hz.to_string(),
        ]
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl From<&SweepConfig> for HackrfArgs {
    fn from(config: &SweepConfig) -> Self {
        Self {
            program: PathBuf::from(HACKRF_SWEEP),
            vga_gain_db: config.vga_gain_db,
            lna_gain_db: config.lna_gain_db,
            amp_enable: config.amp_enable,
            min_freq_mhz: config.min_freq_mhz,
            max_freq_mhz: config.max_freq_mhz,
            bin_size_hz: config.bin_size_hz,
        }
    }
}

/// Running sweep process.
#[derive(Debug)]
pub struct HackrfSweep {
    name: String,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl HackrfSweep {
    /// Start the sweep process.
    pub fn spawn(args: &HackrfArgs) -> SourceResult<Self> {
        let program = args.program.display().to_string();
        let mut cmd = Command::new(&args.program);
        cmd.args(args.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| SourceError::Spawn {
            program: program.clone(),
            reason: e.to_string(),
        })?;
        info!(program = %program, args = ?args.args(), pid = child.id(), "sweep process started");

        let stdout = child.stdout.take();
        if let Some(stderr) = child.stderr.take() {
            let spawned = thread::Builder::new()
                .name("sweep-stderr".to_string())
                .spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                        debug!(target: "sweepscope_sim::hackrf", "{}", line);
                    }
                });
            if let Err(e) = spawned {
                warn!(error = %e, "could not start stderr forwarder");
            }
        }

        Ok(Self {
            name: program,
            child: Some(child),
            stdout,
        })
    }

    /// OS process id, while running.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Kill the process and reap it. Idempotent.
    pub fn kill(&mut self) -> SourceResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let pid = child.id();
        // Already exited: kill reports InvalidInput, wait still reaps it
        if let Err(e) = child.kill() {
            debug!(pid, error = %e, "kill on exited sweep process");
        }
        let status = child.wait()?;
        info!(pid, %status, "sweep process stopped");
        Ok(())
    }
}

impl SweepSource for HackrfSweep {
    fn name(&self) -> &str {
        &self.name
    }

    fn take_reader(&mut self) -> SourceResult<Box<dyn BufRead + Send>> {
        let stdout = self.stdout.take().ok_or(SourceError::OutputTaken)?;
        Ok(Box::new(BufReader::new(stdout)))
    }

    fn stop(&mut self) -> SourceResult<()> {
        self.kill()
    }

    /// The tool sweeps until killed; its output closing means it died.
    fn end_of_input(&self) -> EndOfInput {
        EndOfInput::Fatal
    }
}

impl Drop for HackrfSweep {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            warn!(error = %e, "failed to stop sweep process");
        }
    }
}
