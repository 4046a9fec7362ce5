//! Events reported by a run.
//!
//! Every user-visible outcome of a run, including per-file errors that do not
//! stop it, is a [`ScanEvent`]. `Display` gives the human-readable log line;
//! `Serialize` gives the JSON object written in `--format json` mode.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

/// One reportable outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// A directory (or entry) could not be read and was skipped.
    SubtreeSkipped {
        /// The skipped path
        #[serde(serialize_with = "lossy_path")]
        path: PathBuf,
        /// Why it was skipped
        reason: String,
    },

    /// A file could not be hashed and was skipped.
    HashFailed {
        /// The file
        #[serde(serialize_with = "lossy_path")]
        path: PathBuf,
        /// Why hashing failed
        reason: String,
    },

    /// A reference record could not be written to the index.
    IndexWriteFailed {
        /// The reference file
        #[serde(serialize_with = "lossy_path")]
        path: PathBuf,
        /// Why the write failed
        reason: String,
    },

    /// An index line could not be decoded and was skipped.
    RecordSkipped {
        /// 1-based line number in the index
        line: usize,
        /// Why the line was rejected
        reason: String,
    },

    /// The index could not be read while matching a candidate.
    IndexUnreadable {
        /// The candidate being matched
        #[serde(serialize_with = "lossy_path")]
        candidate: PathBuf,
        /// The read error
        reason: String,
    },

    /// A candidate file duplicates a reference file.
    Duplicate {
        /// The reference file
        #[serde(serialize_with = "lossy_path")]
        original: PathBuf,
        /// The duplicate
        #[serde(serialize_with = "lossy_path")]
        candidate: PathBuf,
    },

    /// A duplicate was moved into quarantine.
    Moved {
        /// Where the duplicate was
        #[serde(serialize_with = "lossy_path")]
        candidate: PathBuf,
        /// Where it is now
        #[serde(serialize_with = "lossy_path")]
        destination: PathBuf,
    },

    /// A duplicate could not be moved and was left in place.
    MoveFailed {
        /// The duplicate
        #[serde(serialize_with = "lossy_path")]
        candidate: PathBuf,
        /// Why the move failed
        reason: String,
    },
}

impl ScanEvent {
    /// Whether the event reports a per-file problem rather than a result.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Duplicate { .. } | Self::Moved { .. })
    }
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubtreeSkipped { path, reason } => {
                write!(
                    f,
                    "{} will be skipped: {}",
                    OneLine(path.display()),
                    OneLine(reason)
                )
            }
            Self::HashFailed { path, reason } => {
                write!(
                    f,
                    "unable to hash {}: {}",
                    OneLine(path.display()),
                    OneLine(reason)
                )
            }
            Self::IndexWriteFailed { path, reason } => {
                write!(
                    f,
                    "unable to write index record for {}: {}",
                    OneLine(path.display()),
                    OneLine(reason)
                )
            }
            Self::RecordSkipped { line, reason } => {
                write!(f, "skipping index line {}: {}", line, OneLine(reason))
            }
            Self::IndexUnreadable { candidate, reason } => {
                write!(
                    f,
                    "unable to scan index for {}: {}",
                    OneLine(candidate.display()),
                    OneLine(reason)
                )
            }
            Self::Duplicate {
                original,
                candidate,
            } => write!(
                f,
                "{} is duplicate of {}",
                OneLine(candidate.display()),
                OneLine(original.display())
            ),
            Self::Moved {
                candidate,
                destination,
            } => write!(
                f,
                "moved {} to {}",
                OneLine(candidate.display()),
                OneLine(destination.display())
            ),
            Self::MoveFailed { candidate, reason } => {
                write!(
                    f,
                    "unable to move {}: {}",
                    OneLine(candidate.display()),
                    OneLine(reason)
                )
            }
        }
    }
}

/// Renders a value with control characters escaped, so a path holding a
/// line break still yields a single text line.
struct OneLine<T>(T);

impl<T: fmt::Display> fmt::Display for OneLine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.to_string().chars() {
            if c.is_control() {
                write!(f, "{}", c.escape_default())?;
            } else {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

fn lossy_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}
