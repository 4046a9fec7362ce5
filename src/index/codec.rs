//! One-line text encoding for [`FileRecord`]s.
//!
//! A record is written as three space-separated fields:
//!
//! ```text
//! <digest> <base64(path)> <base64(name)>
//! ```
//!
//! The path and name are base64 encoded (standard alphabet, padded), so they
//! can never contain the separator or a line break no matter what the file
//! system allows in names. Decoding splits into at most three fields.
//!
//! On Unix the raw bytes of the path are encoded, so names that are not
//! valid UTF-8 round-trip exactly.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

use super::FileRecord;

/// Field separator within an encoded record.
pub const FIELD_SEPARATOR: char = ' ';

/// Number of fields in an encoded record.
pub const FIELD_COUNT: usize = 3;

/// Which encoded field failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    /// The file path
    Path,
    /// The root-relative name
    Name,
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordField::Path => write!(f, "path"),
            RecordField::Name => write!(f, "name"),
        }
    }
}

/// A line that is not a valid encoded record.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The line did not split into exactly three fields.
    #[error("invalid index record: expected 3 fields, found {found}")]
    FieldCount {
        /// Number of fields present
        found: usize,
    },

    /// The digest field is empty.
    #[error("invalid index record: empty digest")]
    EmptyDigest,

    /// A path or name field is not valid base64.
    #[error("invalid index record: bad {field} encoding: {source}")]
    Base64 {
        /// The offending field
        field: RecordField,
        /// The base64 decoder error
        #[source]
        source: base64::DecodeError,
    },

    /// The line itself is not UTF-8 text.
    #[error("invalid index record: line is not valid UTF-8")]
    NotText,

    /// A path or name field is not UTF-8 on a platform that requires it.
    #[error("invalid index record: {field} is not valid UTF-8")]
    NonUtf8 {
        /// The offending field
        field: RecordField,
    },
}

/// Encode a record as a single line, without the line terminator.
#[must_use]
pub fn encode(record: &FileRecord) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        record.digest,
        STANDARD.encode(path_to_bytes(&record.path)),
        STANDARD.encode(path_to_bytes(&record.name)),
        sep = FIELD_SEPARATOR,
    )
}

/// Decode a line produced by [`encode`]. A trailing `\n` or `\r\n` is ignored.
///
/// # Errors
///
/// Returns [`DecodeError`] if the line is not a well-formed record.
pub fn decode(line: &str) -> Result<FileRecord, DecodeError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let fields: Vec<&str> = line.splitn(FIELD_COUNT, FIELD_SEPARATOR).collect();

    let [digest, path, name] = fields[..] else {
        return Err(DecodeError::FieldCount {
            found: fields.len(),
        });
    };

    if digest.is_empty() {
        return Err(DecodeError::EmptyDigest);
    }

    Ok(FileRecord {
        digest: digest.to_string(),
        path: decode_path(path, RecordField::Path)?,
        name: decode_path(name, RecordField::Name)?,
    })
}

fn decode_path(field: &str, which: RecordField) -> Result<PathBuf, DecodeError> {
    let bytes = STANDARD
        .decode(field)
        .map_err(|source| DecodeError::Base64 {
            field: which,
            source,
        })?;
    bytes_to_path(bytes, which)
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn bytes_to_path(bytes: Vec<u8>, _field: RecordField) -> Result<PathBuf, DecodeError> {
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: Vec<u8>, field: RecordField) -> Result<PathBuf, DecodeError> {
    String::from_utf8(bytes)
        .map(|s| PathBuf::from(OsString::from(s)))
        .map_err(|_| DecodeError::NonUtf8 { field })
}
