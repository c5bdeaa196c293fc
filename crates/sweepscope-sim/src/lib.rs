//! # Sweep Sources
//!
//! Where sweep record lines come from:
//!
//! - [`HackrfSweep`]: the `hackrf_sweep` tool run as a child process
//! - [`LineSource`]: any reader, e.g. a recorded capture or stdin
//! - [`SyntheticSweep`]: generated noise floor with injected carriers
//!
//! Every source hands the pipeline a line reader through [`SweepSource`].

pub mod hackrf;
pub mod source;
pub mod synthetic;

pub use hackrf::{HackrfArgs, HackrfSweep};
pub use source::{LineSource, SourceError, SourceResult, SweepSource};
pub use synthetic::{Carrier, SyntheticConfig, SyntheticReader, SyntheticSource, SyntheticSweep};
