//! Error types for the data-loader crate.
//!
//! Every variant carries enough context (file, line, field) to point a user
//! at the offending record in a raw event log.

use thiserror::Error;

/// Errors that can occur while reading and parsing raw event logs
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in the log couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A user or item identifier was absent or blank
    #[error("Missing {field} at line {line} in {file}")]
    MissingIdentifier {
        file: String,
        line: usize,
        field: String,
    },

    /// A line had more fields than the format allows
    #[error("Expected at most {expected} fields but found {found} in line {line}")]
    FieldCountMismatch {
        expected: usize,
        found: usize,
        line: usize,
    },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
