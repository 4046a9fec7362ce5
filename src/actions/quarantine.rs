//! Relocating duplicates into a quarantine directory.
//!
//! # Overview
//!
//! A quarantined duplicate is renamed to `<quarantine root>/<name>`, where
//! `name` is the file's path relative to the candidate root. Intermediate
//! directories are created as needed. An existing file at the destination is
//! never overwritten.
//!
//! Renames are atomic on a single file system; moving across devices fails
//! and leaves the file where it was.
//!
//! # Example
//!
//! ```no_run
//! use refdupe::actions::{DuplicateAction, QuarantineAction};
//! use refdupe::index::FileRecord;
//! use refdupe::output::MemorySink;
//!
//! let mut action = QuarantineAction::new("/tmp/quarantine");
//! let mut sink = MemorySink::new();
//! let original = FileRecord::new("af13", "/ref/a.txt", "a.txt");
//! let candidate = FileRecord::new("af13", "/new/b.txt", "b.txt");
//! action.apply(&original, &candidate, &mut sink);
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use super::{ActionOutcome, DuplicateAction};
use crate::index::FileRecord;
use crate::output::{EventSink, ScanEvent};

/// Error type for quarantine moves.
#[derive(Debug, Error)]
pub enum QuarantineError {
    /// Something already exists at the destination.
    #[error("quarantine target already exists: {0}")]
    TargetExists(PathBuf),

    /// The file to move is gone.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied on the source or destination.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The destination directory could not be created.
    #[error("cannot create quarantine directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The rename itself failed (for example across devices).
    #[error("rename {from} -> {to} failed: {source}")]
    Rename {
        /// Source path
        from: PathBuf,
        /// Destination path
        to: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Moves a file to a new path.
pub trait Relocator {
    /// Move `from` to `to`, creating the parent directories of `to`.
    ///
    /// # Errors
    ///
    /// Returns [`QuarantineError`] if the move did not happen. The source is
    /// left untouched in that case.
    fn relocate(&self, from: &Path, to: &Path) -> Result<(), QuarantineError>;
}

/// [`Relocator`] using `std::fs::rename`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameRelocator;

impl Relocator for RenameRelocator {
    fn relocate(&self, from: &Path, to: &Path) -> Result<(), QuarantineError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|source| QuarantineError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        // rename(2) silently replaces an existing file on Unix.
        if fs::symlink_metadata(to).is_ok() {
            return Err(QuarantineError::TargetExists(to.to_path_buf()));
        }

        fs::rename(from, to).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => QuarantineError::NotFound(from.to_path_buf()),
            io::ErrorKind::PermissionDenied => {
                QuarantineError::PermissionDenied(from.to_path_buf())
            }
            _ => QuarantineError::Rename {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            },
        })
    }
}

/// Destination of `name` under the quarantine `root`.
///
/// Only the normal components of `name` are kept, so the result always stays
/// inside `root`.
#[must_use]
pub fn quarantine_destination(root: &Path, name: &Path) -> PathBuf {
    let relative: PathBuf = name
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    root.join(relative)
}

/// Reports a duplicate and moves the candidate into quarantine.
///
/// A candidate matching several reference files is moved on its first match;
/// later matches are reported only.
#[derive(Debug, Clone)]
pub struct QuarantineAction<R = RenameRelocator> {
    root: PathBuf,
    relocator: R,
    moved: HashSet<PathBuf>,
}

impl QuarantineAction<RenameRelocator> {
    /// Quarantine into `root` using plain renames.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_relocator(root, RenameRelocator)
    }
}

impl<R: Relocator> QuarantineAction<R> {
    /// Quarantine into `root` using a custom relocator.
    pub fn with_relocator(root: impl Into<PathBuf>, relocator: R) -> Self {
        Self {
            root: root.into(),
            relocator,
            moved: HashSet::new(),
        }
    }
}

impl<R: Relocator> DuplicateAction for QuarantineAction<R> {
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

        if self.moved.contains(&candidate.path) {
            return ActionOutcome::Reported;
        }

        let destination = quarantine_destination(&self.root, &candidate.name);
        match self.relocator.relocate(&candidate.path, &destination) {
            Ok(()) => {
                log::debug!(
                    "Moved {} to {}",
                    candidate.path.display(),
                    destination.display()
                );
                sink.emit(ScanEvent::Moved {
                    candidate: candidate.path.clone(),
                    destination: destination.clone(),
                });
                self.moved.insert(candidate.path.clone());
                ActionOutcome::Moved(destination)
            }
            Err(e) => {
                log::debug!("Unable to move {}: {}", candidate.path.display(), e);
                sink.emit(ScanEvent::MoveFailed {
                    candidate: candidate.path.clone(),
                    reason: e.to_string(),
                });
                ActionOutcome::MoveFailed
            }
        }
    }
}
