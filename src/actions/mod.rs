//! File actions module.
//!
//! What happens when a candidate file turns out to duplicate a reference
//! file:
//!
//! - [`ReportAction`]: log the pair, leave the file system alone
//! - [`QuarantineAction`]: log the pair and move the candidate into a
//!   quarantine directory
//!
//! The reference file is never touched by either action.
//!
//! ```no_run
//! use refdupe::actions::{DuplicateAction, ReportAction};
//! use refdupe::index::FileRecord;
//! use refdupe::output::MemorySink;
//!
//! let mut sink = MemorySink::new();
//! let original = FileRecord::new("af13", "/ref/a.txt", "a.txt");
//! let candidate = FileRecord::new("af13", "/new/b.txt", "b.txt");
//! ReportAction.apply(&original, &candidate, &mut sink);
//! ```

pub mod quarantine;

use std::path::PathBuf;

use crate::index::FileRecord;
use crate::output::{EventSink, ScanEvent};

// Re-export commonly used types
pub use quarantine::{
    quarantine_destination, QuarantineAction, QuarantineError, Relocator, RenameRelocator,
};

/// Result of acting on one duplicate pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The pair was reported only.
    Reported,
    /// The candidate was moved to the contained path.
    Moved(PathBuf),
    /// The candidate could not be moved and is still in place.
    MoveFailed,
}

/// Acts on a duplicate pair.
pub trait DuplicateAction {
    /// Handle `candidate` as a duplicate of `original`, reporting to `sink`.
    ///
    /// Failures are reported to the sink and reflected in the outcome; they
    /// never abort the run.
    fn apply(
        &mut self,
        original: &FileRecord,
        candidate: &FileRecord,
        sink: &mut dyn EventSink,
    ) -> ActionOutcome;
}

/// Reports duplicates without touching the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAction;

impl DuplicateAction for ReportAction {
    fn apply(
        &mut self,
        original: &FileRecord,
        candidate: &FileRecord,
        sink: &mut dyn EventSink,
    ) -> ActionOutcome {
        sink.emit(ScanEvent::Duplicate {
            original: original.path.clone(),
            candidate: candidate.path.clone(),
        });
        ActionOutcome::Reported
    }
}
