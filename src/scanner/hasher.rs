//! Content digests for duplicate detection.
//!
//! # Overview
//!
//! A digest is a fixed-length lowercase hex fingerprint of a file's bytes.
//! The [`ContentHasher`] trait keeps the digest function pluggable; the
//! engine only ever compares digests for equality.
//!
//! - [`Blake3Hasher`]: BLAKE3, 64 hex characters (default)
//! - [`Sha256Hasher`]: SHA-256, 64 hex characters
//!
//! # Example
//!
//! ```no_run
//! use refdupe::scanner::{ContentHasher, HashAlgorithm};
//! use std::path::Path;
//!
//! let hasher = HashAlgorithm::Blake3.hasher();
//! let digest = hasher.hash_file(Path::new("photo.jpg")).unwrap();
//! println!("{} ({} bytes)", digest.hex, digest.bytes);
//! ```

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use super::HashError;

/// Read buffer size used when streaming file contents into a hasher.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Digest algorithms available for content fingerprints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 (fast, default)
    #[default]
    Blake3,
    /// SHA-256
    Sha256,
}

impl HashAlgorithm {
    /// Build a hasher for this algorithm.
    #[must_use]
    pub fn hasher(self) -> Box<dyn ContentHasher> {
        match self {
            Self::Blake3 => Box::new(Blake3Hasher),
            Self::Sha256 => Box::new(Sha256Hasher),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Blake3 => write!(f, "blake3"),
            HashAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// A computed digest together with the number of bytes that went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase hex digest
    pub hex: String,
    /// Bytes read from the source
    pub bytes: u64,
}

/// A digest function over a byte stream.
pub trait ContentHasher {
    /// Digest everything readable from `reader`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if reading fails part way.
    fn hash_reader(&self, reader: &mut dyn Read) -> io::Result<FileDigest>;

    /// Digest the contents of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    fn hash_file(&self, path: &Path) -> Result<FileDigest, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        self.hash_reader(&mut reader)
            .map_err(|e| HashError::from_io(path, e))
    }
}

/// BLAKE3 content hasher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn hash_reader(&self, reader: &mut dyn Read) -> io::Result<FileDigest> {
        let mut hasher = blake3::Hasher::new();
        let bytes = io::copy(reader, &mut hasher)?;
        Ok(FileDigest {
            hex: hasher.finalize().to_hex().to_string(),
            bytes,
        })
    }
}

/// SHA-256 content hasher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn hash_reader(&self, reader: &mut dyn Read) -> io::Result<FileDigest> {
        let mut hasher = Sha256::new();
        let bytes = io::copy(reader, &mut hasher)?;
        hasher.flush()?;
        Ok(FileDigest {
            hex: format!("{:x}", hasher.finalize()),
            bytes,
        })
    }
}
