//! Cassette format for recording and replaying tracker calls.

pub mod format;
pub mod recorder;
pub mod replayer;

use std::path::PathBuf;

use thiserror::Error;

/// Failures reading, writing or replaying a cassette.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CassetteError {
    /// The cassette file could not be read or written.
    #[error("cassette I/O error at {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    /// The cassette file is not valid YAML for a cassette.
    #[error("failed to parse cassette {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A recorded output does not match the expected shape.
    #[error("malformed recorded output for {port}::{method}: {reason}")]
    Malformed {
        port: String,
        method: String,
        reason: String,
    },

    /// The cassette never recorded this call.
    #[error("no interactions recorded for {port}::{method}; available: [{available}]")]
    Unrecorded {
        port: String,
        method: String,
        available: String,
    },

    /// Every recorded interaction for this call has been served.
    #[error("cassette exhausted: all {consumed} interactions for {port}::{method} consumed")]
    Exhausted {
        port: String,
        method: String,
        consumed: usize,
    },
}
