//! Error types for remote calls, store writes and reconcile passes.
//!
//! `find` returning `None` is the expected "needs creation" signal and is
//! never represented here.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ObjectKey;

/// The remote operation a [`RemoteError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteOp {
    /// Lookup by title.
    Find,
    /// Issue creation.
    Create,
    /// Description edit.
    Edit,
    /// Closing the issue.
    Close,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Find => "find",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// Failures talking to the remote tracker. All are retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("{op} request failed: {reason}")]
    Transport { op: RemoteOp, reason: String },

    /// The tracker answered with a non-success status.
    #[error("{op} rejected with status {status}: {body}")]
    Status {
        op: RemoteOp,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("{op} response could not be decoded: {reason}")]
    Decode { op: RemoteOp, reason: String },

    /// The call did not finish within the configured bound.
    #[error("{op} timed out after {timeout_ms}ms")]
    Timeout { op: RemoteOp, timeout_ms: u64 },

    /// The tracker refused the operation for another reason.
    #[error("{op} failed: {reason}")]
    Rejected { op: RemoteOp, reason: String },
}

impl RemoteError {
    /// The operation that failed.
    #[must_use]
    pub const fn op(&self) -> RemoteOp {
        match self {
            Self::Transport { op, .. }
            | Self::Status { op, .. }
            | Self::Decode { op, .. }
            | Self::Timeout { op, .. }
            | Self::Rejected { op, .. } => *op,
        }
    }

    /// Shorthand for [`RemoteError::Rejected`].
    pub fn rejected(op: RemoteOp, reason: impl Into<String>) -> Self {
        Self::Rejected {
            op,
            reason: reason.into(),
        }
    }
}

/// Failures persisting desired issues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist.
    #[error("object {key} not found")]
    NotFound { key: ObjectKey },

    /// The write was based on a stale resource version.
    #[error("conflict writing {key}: expected version {expected}, found {actual}")]
    Conflict {
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    /// Reading or writing the backing storage failed.
    #[error("store I/O error: {reason}")]
    Io { reason: String },

    /// The key cannot address a stored object.
    #[error("{reason}")]
    InvalidKey { key: ObjectKey, reason: String },

    /// A stored object could not be (de)serialized.
    #[error("store serialization error for {key}: {reason}")]
    Serialization { key: ObjectKey, reason: String },
}

impl StoreError {
    /// Whether this is an optimistic-concurrency rejection.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Why a reconcile pass stopped early.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// A remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Persisting finalizers or status failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The repository identifier is malformed; retrying cannot help.
    #[error("invalid repository '{repo}': {reason}")]
    InvalidRepo { repo: String, reason: String },

    /// The pass was cancelled before it finished.
    #[error("reconcile cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Whether a later pass may succeed where this one failed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRepo { .. })
    }
}

/// Invalid or missing configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("{name} environment variable not set")]
    Missing { name: &'static str },

    /// A variable is set to something unusable.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
