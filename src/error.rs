//! ==============================================================================
//! error.rs - error types for the sensor log core
//! ==============================================================================
//!
//! purpose:
//!     one enum per layer: the store (StoreError), the line codec
//!     (MalformedLine), batch validation (ValidationError) and the
//!     coordinator's callers (SubmitError).
//!
//!     a sensor with no log is not an error anywhere; it reads as an
//!     empty batch.
//!
//! ==============================================================================

use std::io;
use std::num::ParseFloatError;
use std::path::PathBuf;

use thiserror::Error;

/// Failure touching a sensor log file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The log could not be opened (or created) for appending.
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing, flushing or syncing appended lines failed. The file may hold
    /// a partial batch; nothing is rolled back.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The log exists but could not be scanned.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A log line that does not decode to a reading.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MalformedLine {
    /// No space separator, so there is no value field.
    #[error("missing value field in line {line:?}")]
    MissingValue { line: String },

    /// The value field is not a float.
    #[error("invalid value {value:?}: {source}")]
    InvalidValue {
        value: String,
        #[source]
        source: ParseFloatError,
    },
}

/// A reading that cannot be written without corrupting the line format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("reading {index}: timestamp is empty")]
    EmptyTimestamp { index: usize },

    #[error("reading {index}: timestamp {timestamp:?} contains whitespace")]
    WhitespaceInTimestamp { index: usize, timestamp: String },
}

/// Error returned to a caller of the coordinator.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The batch could not be appended.
    #[error("write failed: {0}")]
    Write(#[source] StoreError),

    /// The sensor's log exists but could not be read.
    #[error("read failed: {0}")]
    Read(#[source] StoreError),

    /// The storage worker has shut down and no longer accepts requests.
    #[error("storage worker stopped")]
    Stopped,
}

/// Result type for coordinator submissions.
pub type SubmitResult<T> = std::result::Result<T, SubmitError>;
