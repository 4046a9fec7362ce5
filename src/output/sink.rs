//! Event sinks and log destinations.
//!
//! The output log is passed explicitly to every component that reports
//! something, as a `&mut dyn EventSink`. Production runs write lines to the
//! chosen [`OutputTarget`]; tests collect events in a [`MemorySink`].

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ScanEvent;

/// Receives the events of a run.
pub trait EventSink {
    /// Record one event.
    fn emit(&mut self, event: ScanEvent);

    /// Flush buffered output.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the destination cannot be flushed.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Line format of the output log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Where the output log goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
    /// Nowhere
    Discard,
    /// A file, created or truncated
    File(PathBuf),
}

impl FromStr for OutputTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("output destination cannot be empty".to_string()),
            "-" | "stdout" | "/dev/stdout" => Ok(Self::Stdout),
            "stderr" | "/dev/stderr" => Ok(Self::Stderr),
            "null" | "/dev/null" | "/dev/zero" => Ok(Self::Discard),
            other => Ok(Self::File(PathBuf::from(other))),
        }
    }
}

impl std::fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputTarget::Stdout => write!(f, "stdout"),
            OutputTarget::Stderr => write!(f, "stderr"),
            OutputTarget::Discard => write!(f, "null"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Errors opening an output destination.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The log file could not be created.
    #[error("unable to open log file {path}: {source}")]
    Open {
        /// The requested log file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Writes one line per event to any writer.
pub struct WriterSink<W: Write> {
    writer: W,
    format: OutputFormat,
    write_failed: bool,
}

impl<W: Write> WriterSink<W> {
    /// Create a sink over `writer`.
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            write_failed: false,
        }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn render(&self, event: &ScanEvent) -> String {
        match self.format {
            OutputFormat::Text => event.to_string(),
            OutputFormat::Json => serde_json::to_string(event).unwrap_or_else(|e| {
                log::warn!("Failed to serialize event as JSON: {}", e);
                event.to_string()
            }),
        }
    }
}

impl<W: Write> EventSink for WriterSink<W> {
    fn emit(&mut self, event: ScanEvent) {
        log::trace!("event: {}", event);
        let line = self.render(&event);
        if let Err(e) = writeln!(self.writer, "{}", line) {
            // Report once; a broken log destination does not stop the run.
            if !self.write_failed {
                log::error!("Failed to write to output log: {}", e);
                self.write_failed = true;
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Open the sink for a destination.
///
/// # Errors
///
/// Returns [`SinkError::Open`] if a log file cannot be created.
pub fn open_sink(
    target: &OutputTarget,
    format: OutputFormat,
) -> Result<WriterSink<Box<dyn Write>>, SinkError> {
    let writer: Box<dyn Write> = match target {
        OutputTarget::Stdout => Box::new(io::stdout()),
        OutputTarget::Stderr => Box::new(io::stderr()),
        OutputTarget::Discard => Box::new(io::sink()),
        OutputTarget::File(path) => Box::new(BufWriter::new(create_log_file(path)?)),
    };
    Ok(WriterSink::new(writer, format))
}

fn create_log_file(path: &Path) -> Result<File, SinkError> {
    File::create(path).map_err(|source| SinkError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Collects events in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    /// Events in the order they were emitted
    pub events: Vec<ScanEvent>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The (original, candidate) pair of every reported duplicate, in order.
    #[must_use]
    pub fn duplicates(&self) -> Vec<(PathBuf, PathBuf)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ScanEvent::Duplicate {
                    original,
                    candidate,
                } => Some((original.clone(), candidate.clone())),
                _ => None,
            })
            .collect()
    }

    /// Events that report per-file problems.
    #[must_use]
    pub fn errors(&self) -> Vec<&ScanEvent> {
        self.events.iter().filter(|e| e.is_error()).collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: ScanEvent) {
        self.events.push(event);
    }
}
