//! Error taxonomy shared by every CEL backend.
//!
//! Structural failures (bad magic, truncation, dimension or chip-type
//! mismatches) are fatal and abort the current file's read. A short
//! `[INTENSITY]` body in the text formats is deliberately *not* an error:
//! those reads return a partially filled [`crate::ProbeValues`] together
//! with the count of records decoded.

use std::path::{Path, PathBuf};

/// Errors that can occur while classifying or decoding a CEL file.
#[derive(Debug, thiserror::Error)]
pub enum CelError {
    /// The file could not be opened at all.
    #[error("could not open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Leading bytes do not match any CEL encoding's marker.
    #[error("{} does not look like a CEL file", .path.display())]
    NotACelFile { path: PathBuf },

    /// None of text, gzipped text, binary or generic matched.
    #[error("{} was not recognized as a text, gzipped text, binary or generic CEL file", .path.display())]
    UnrecognizedFormat { path: PathBuf },

    /// Header geometry disagrees with what the caller (or the file
    /// itself) declares.
    #[error("{} does not have the expected dimensions: expected {expected}, found {actual}", .path.display())]
    DimensionMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The chip name embedded in the DatHeader does not match the
    /// reference chip type.
    #[error("{} is of chip type {actual}, not the expected {expected}", .path.display())]
    ChipTypeMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// End of input was reached while a structural field or section
    /// marker was still outstanding.
    #[error("{}: end of input while looking for {looking_for}; the file may be truncated", .path.display())]
    TruncatedFile { path: PathBuf, looking_for: String },

    /// A fixed-size binary cell record read short.
    #[error("{} appears to be corrupted: cell record {cell} read short", .path.display())]
    CorruptBinaryRecord { path: PathBuf, cell: usize },

    /// Structural corruption: coordinates outside the grid, offsets
    /// that do not advance, undecodable container fields.
    #[error("{} appears to be corrupted: {detail}", .path.display())]
    Corrupt { path: PathBuf, detail: String },

    /// A gzip member with a compression method other than deflate.
    #[error("{}: gzip member uses unsupported compression method {method}", .path.display())]
    UnsupportedCompression { path: PathBuf, method: u8 },

    /// A required header key or name/value/type entry was absent.
    #[error("{}: required header field {field} is missing", .path.display())]
    MissingField { path: PathBuf, field: String },

    /// A numeric or textual field failed to parse.
    #[error("{}: could not parse {what} from {value:?}", .path.display())]
    Parse {
        path: PathBuf,
        what: String,
        value: String,
    },

    /// The operation only applies to another format (e.g. channel
    /// indexing on a non-generic file).
    #[error("{}: {operation} is not supported for this file's format", .path.display())]
    Unsupported {
        path: PathBuf,
        operation: &'static str,
    },

    /// A batch read was asked for with no files at all.
    #[error("no files were supplied for the batch read")]
    EmptyBatch,
}

impl CelError {
    pub(crate) fn open(path: &Path, source: std::io::Error) -> Self {
        CelError::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn truncated(path: &Path, looking_for: impl Into<String>) -> Self {
        CelError::TruncatedFile {
            path: path.to_path_buf(),
            looking_for: looking_for.into(),
        }
    }

    pub(crate) fn corrupt(path: &Path, detail: impl Into<String>) -> Self {
        CelError::Corrupt {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }

    pub(crate) fn parse(path: &Path, what: impl Into<String>, value: impl Into<String>) -> Self {
        CelError::Parse {
            path: path.to_path_buf(),
            what: what.into(),
            value: value.into(),
        }
    }

    pub(crate) fn missing(path: &Path, field: impl Into<String>) -> Self {
        CelError::MissingField {
            path: path.to_path_buf(),
            field: field.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CelError>;
