//! Sweep source abstraction

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use sweepscope_core::pipeline::EndOfInput;
use sweepscope_core::types::SweepError;

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised while starting, reading or stopping a source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Source output already taken")]
    OutputTaken,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Io(e.to_string())
    }
}

impl From<SourceError> for SweepError {
    fn from(e: SourceError) -> Self {
        SweepError::Io(e.to_string())
    }
}

/// Producer of sweep record lines.
pub trait SweepSource: Send {
    /// Short description for logs
    fn name(&self) -> &str;

    /// Take the line reader. Can only be taken once.
    fn take_reader(&mut self) -> SourceResult<Box<dyn BufRead + Send>>;

    /// Stop producing. Idempotent.
    fn stop(&mut self) -> SourceResult<()>;

    /// How the pipeline treats the end of this source's output.
    fn end_of_input(&self) -> EndOfInput {
        EndOfInput::Finish
    }
}

/// Source over an existing reader.
pub struct LineSource {
    name: String,
    reader: Option<Box<dyn BufRead + Send>>,
}

impl LineSource {
    pub fn new(name: impl Into<String>, reader: impl BufRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Some(Box::new(reader)),
        }
    }

    /// Replay a recorded capture.
    pub fn open(path: &Path) -> SourceResult<Self> {
        let file = File::open(path)
            .map_err(|e| SourceError::Io(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(path.display().to_string(), BufReader::new(file)))
    }

    /// Read records piped into this process.
    pub fn stdin() -> Self {
        Self::new("stdin", BufReader::new(std::io::stdin()))
    }
}

impl SweepSource for LineSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn take_reader(&mut self) -> SourceResult<Box<dyn BufRead + Send>> {
        self.reader.take().ok_or(SourceError::OutputTaken)
    }

    fn stop(&mut self) -> SourceResult<()> {
        self.reader = None;
        Ok(())
    }
}

impl std::fmt::Debug for LineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSource")
            .field("name", &self.name)
            .field("taken", &self.reader.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_reader_taken_once() {
        let mut source = LineSource::new("memory", Cursor::new("a\nb\n"));
        assert_eq!(source.name(), "memory");
        assert_eq!(source.end_of_input(), EndOfInput::Finish);

        let lines: Vec<String> =
            source.take_reader().unwrap().lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["a", "b"]);
        assert!(matches!(source.take_reader(), Err(SourceError::OutputTaken)));
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "line one").unwrap();

        let mut source = LineSource::open(file.path()).unwrap();
        let mut first = String::new();
        source.take_reader().unwrap().read_line(&mut first).unwrap();
        assert_eq!(first, "line one\n");
    }

    #[test]
    fn test_open_missing_file() {
        let err = LineSource::open(Path::new("/nonexistent/sweeps.csv")).unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[test]
    fn test_into_sweep_error() {
        let err: SweepError = SourceError::OutputTaken.into();
        assert!(matches!(err, SweepError::Io(_)));
        assert!(err.is_fatal());
    }
}
