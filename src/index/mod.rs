//! External index of reference-tree file records.
//!
//! The index is an append-only, ordered sequence of [`FileRecord`]s. It is
//! built once from the reference tree and then scanned from the start for
//! every candidate file, which keeps memory use flat regardless of how many
//! files the reference tree holds.
//!
//! - [`codec`]: one-line text encoding of a record
//! - [`store`]: the [`RecordIndex`] trait with disk and memory backends
//!
//! # Example
//!
//! ```no_run
//! use refdupe::index::{DiskIndex, FileRecord, RecordIndex};
//!
//! let mut index = DiskIndex::create().unwrap();
//! index
//!     .append(&FileRecord::new("af13", "/ref/a.txt", "a.txt"))
//!     .unwrap();
//!
//! for record in index.scan_all().unwrap() {
//!     match record {
//!         Ok(record) => println!("{} {}", record.digest, record.path.display()),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! ```

pub mod codec;
pub mod store;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use codec::DecodeError;
pub use store::{DiskIndex, MemoryIndex, RecordIndex, Records};

/// One observed file: its content digest, where it lives, and its name
/// relative to the root it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Lowercase hex content digest
    pub digest: String,
    /// Absolute path
    pub path: PathBuf,
    /// Path relative to the enumerated root
    pub name: PathBuf,
}

impl FileRecord {
    /// Create a record.
    pub fn new(
        digest: impl Into<String>,
        path: impl Into<PathBuf>,
        name: impl Into<PathBuf>,
    ) -> Self {
        Self {
            digest: digest.into(),
            path: path.into(),
            name: name.into(),
        }
    }
}

/// Errors raised by an index backend.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The temporary backing store could not be created.
    #[error("unable to create index backing store in {dir}: {source}")]
    Create {
        /// Directory the store was to be created in
        dir: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A record was appended after the index was first scanned.
    #[error("index is sealed: records cannot be appended after the first scan")]
    Sealed,

    /// Reading or writing the backing store failed.
    #[error("index I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored line could not be decoded.
    #[error("skipping index line {line}: {source}")]
    Decode {
        /// 1-based line number within the store
        line: usize,
        /// Why the line was rejected
        #[source]
        source: DecodeError,
    },
}
