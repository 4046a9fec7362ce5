//! Index backends.
//!
//! [`DiskIndex`] spills every record to an anonymous temporary file. The file
//! is unlinked as soon as it is created (removed on close on platforms that
//! cannot unlink open files), so it disappears on every exit path, including
//! panics and signals.
//!
//! [`MemoryIndex`] keeps the encoded lines in memory. It shares the codec
//! with the disk backend and is meant for tests and small fixtures.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::codec::{self, DecodeError};
use super::{FileRecord, IndexError};

/// Lazily decoded records, in insertion order.
pub type Records<'a> = Box<dyn Iterator<Item = Result<FileRecord, IndexError>> + 'a>;

/// An append-only, rescannable sequence of [`FileRecord`]s.
///
/// The index is built fully before it is queried: once [`scan_all`] has been
/// called, further appends fail with [`IndexError::Sealed`].
///
/// [`scan_all`]: RecordIndex::scan_all
pub trait RecordIndex {
    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Sealed`] after the first scan, or
    /// [`IndexError::Io`] if the backing store cannot be written.
    fn append(&mut self, record: &FileRecord) -> Result<(), IndexError>;

    /// Rewind and iterate over every record in insertion order.
    ///
    /// Lines that fail to decode are yielded as [`IndexError::Decode`] and
    /// the iteration continues with the next line. An [`IndexError::Io`]
    /// item ends the iteration.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] if the store cannot be flushed or rewound.
    fn scan_all(&mut self) -> Result<Records<'_>, IndexError>;

    /// Number of records appended.
    fn len(&self) -> usize;

    /// Whether no records were appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index backed by an anonymous temporary file.
///
/// A failed append may leave part of its line in the store. The next append
/// then starts with a line break, so the fragment becomes a single bad line
/// and the records around it stay readable.
#[derive(Debug)]
pub struct DiskIndex<F: Write = File> {
    writer: BufWriter<F>,
    records: usize,
    sealed: bool,
    torn: bool,
}

impl DiskIndex {
    /// Create an empty index in the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Create`] if the backing file cannot be created.
    pub fn create() -> Result<Self, IndexError> {
        Self::create_in(&std::env::temp_dir())
    }

    /// Create an empty index whose backing file lives in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Create`] if the backing file cannot be created.
    pub fn create_in(dir: &Path) -> Result<Self, IndexError> {
        let file = tempfile::tempfile_in(dir).map_err(|source| IndexError::Create {
            dir: dir.to_path_buf(),
            source,
        })?;
        log::debug!("Created index backing store in {}", dir.display());

        Ok(Self::with_store(file))
    }
}

impl<F: Read + Write + Seek> DiskIndex<F> {
    fn with_store(store: F) -> Self {
        Self {
            writer: BufWriter::new(store),
            records: 0,
            sealed: false,
            torn: false,
        }
    }
}

impl<F: Read + Write + Seek> RecordIndex for DiskIndex<F> {
    fn append(&mut self, record: &FileRecord) -> Result<(), IndexError> {
        if self.sealed {
            return Err(IndexError::Sealed);
        }

        let mut line = String::new();
        if self.torn {
            line.push('\n');
        }
        line.push_str(&codec::encode(record));
        line.push('\n');

        if let Err(e) = self.writer.write_all(line.as_bytes()) {
            self.torn = true;
            return Err(e.into());
        }
        self.torn = false;
        self.records += 1;
        Ok(())
    }

    fn scan_all(&mut self) -> Result<Records<'_>, IndexError> {
        if !self.sealed {
            self.writer.flush()?;
            self.sealed = true;
            log::debug!("Index sealed with {} records", self.records);
        }

        let store = self.writer.get_mut();
        store.seek(SeekFrom::Start(0))?;

        Ok(Box::new(LineRecords::new(BufReader::new(store))))
    }

    fn len(&self) -> usize {
        self.records
    }
}

/// Decodes one record per line from a buffered reader. Empty lines are
/// skipped but still counted.
struct LineRecords<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
    done: bool,
}

impl<R: BufRead> LineRecords<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LineRecords<R> {
    type Item = Result<FileRecord, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    if self.buf == b"\n" {
                        continue;
                    }
                    let line = self.line;
                    let decoded = std::str::from_utf8(&self.buf)
                        .map_err(|_| DecodeError::NotText)
                        .and_then(codec::decode);
                    return Some(decoded.map_err(|source| IndexError::Decode { line, source }));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(IndexError::Io(e)));
                }
            }
        }
        None
    }
}

/// Index held in memory as encoded lines.
#[derive(Debug, Default, Clone)]
pub struct MemoryIndex {
    lines: Vec<String>,
    sealed: bool,
}

impl MemoryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line verbatim, bypassing the encoder.
    pub fn push_raw_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

impl RecordIndex for MemoryIndex {
    fn append(&mut self, record: &FileRecord) -> Result<(), IndexError> {
        if self.sealed {
            return Err(IndexError::Sealed);
        }
        self.lines.push(codec::encode(record));
        Ok(())
    }

    fn scan_all(&mut self) -> Result<Records<'_>, IndexError> {
        self.sealed = true;
        Ok(Box::new(self.lines.iter().enumerate().map(|(i, line)| {
            codec::decode(line).map_err(|source| IndexError::Decode {
                line: i + 1,
                source,
            })
        })))
    }

    fn len(&self) -> usize {
        self.lines.len()
    }
}
