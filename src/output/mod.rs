//! Output log for run results.
//!
//! This module provides:
//! - [`ScanEvent`]: every reportable outcome of a run
//! - [`EventSink`]: the logging capability passed to the engine
//! - Text and JSON line formats, written to stdout, stderr, a file, or nowhere
//!
//! # Example
//!
//! ```no_run
//! use refdupe::output::{open_sink, EventSink, OutputFormat, OutputTarget, ScanEvent};
//! use std::path::PathBuf;
//!
//! let mut sink = open_sink(&OutputTarget::Stdout, OutputFormat::Text).unwrap();
//! sink.emit(ScanEvent::Duplicate {
//!     original: PathBuf::from("/ref/a.txt"),
//!     candidate: PathBuf::from("/new/b.txt"),
//! });
//! ```

pub mod events;
pub mod sink;

// Re-export main types
pub use events::ScanEvent;
pub use sink::{
    open_sink, EventSink, MemorySink, OutputFormat, OutputTarget, SinkError, WriterSink,
};
