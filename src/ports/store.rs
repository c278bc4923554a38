//! Store port for desired issues, plus the write rules every adapter applies.
//!
//! Writes are guarded by `resource_version`: a write carrying a version other
//! than the stored one is rejected with [`StoreError::Conflict`]. An object
//! whose deletion was requested is removed once its last finalizer is gone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{DesiredIssue, IssueSpec, IssueState, IssueStatus, ObjectKey};

/// Merge patch over [`IssueStatus`]. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPatch {
    /// Version the patch was computed against.
    pub resource_version: u64,
    /// New remote state, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
    /// New remote update time, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_timestamp: Option<DateTime<Utc>>,
}

impl StatusPatch {
    /// Whether the patch asserts nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.state.is_none() && self.last_update_timestamp.is_none()
    }

    /// Merges the asserted fields into `status`.
    pub fn apply_to(&self, status: &mut IssueStatus) {
        if let Some(state) = self.state {
            status.state = Some(state);
        }
        if let Some(ts) = self.last_update_timestamp {
            status.last_update_timestamp = Some(ts);
        }
    }
}

/// Persists desired issues for their owner and for the reconciler.
pub trait IssueStore: Send + Sync {
    /// Lists the keys of every stored object.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be listed.
    fn list(&self) -> Result<Vec<ObjectKey>, StoreError>;

    /// Fetches an object, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be read.
    fn get(&self, key: &ObjectKey) -> Result<Option<DesiredIssue>, StoreError>;

    /// Creates an object or replaces its spec. Owner-side operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be written.
    fn apply(&self, key: &ObjectKey, spec: IssueSpec) -> Result<DesiredIssue, StoreError>;

    /// Writes metadata and spec, checking `resource_version`.
    ///
    /// Returns the object as written. If the write released the last
    /// finalizer of an object under deletion, the object is removed and the
    /// returned value is its final state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a stale version, or another error
    /// if the object is missing or cannot be written.
    fn update(&self, issue: &DesiredIssue) -> Result<DesiredIssue, StoreError>;

    /// Merges a status patch, checking `patch.resource_version`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a stale version, or another error
    /// if the object is missing or cannot be written.
    fn patch_status(&self, key: &ObjectKey, patch: &StatusPatch)
        -> Result<DesiredIssue, StoreError>;

    /// Marks an object for deletion. Objects without finalizers are removed at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is missing or cannot be written.
    fn request_deletion(&self, key: &ObjectKey, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// The outcome of applying a write rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admitted {
    /// Persist this object.
    Store(DesiredIssue),
    /// Remove the object; this was its final state.
    Remove(DesiredIssue),
}

impl Admitted {
    /// The object state the write produced.
    #[must_use]
    pub fn into_inner(self) -> DesiredIssue {
        match self {
            Self::Store(issue) | Self::Remove(issue) => issue,
        }
    }
}

/// Builds the object an `apply` call stores.
#[must_use]
pub fn admit_apply(
    current: Option<&DesiredIssue>,
    key: &ObjectKey,
    spec: IssueSpec,
) -> DesiredIssue {
    match current {
        Some(existing) => {
            let mut next = existing.clone();
            next.spec = spec;
            next.metadata.resource_version += 1;
            next
        }
        None => {
            let mut next = DesiredIssue::new(key, spec);
            next.metadata.resource_version = 1;
            next
        }
    }
}

/// Checks an `update` against the stored object and builds the result.
///
/// Status is carried over from the stored object and a deletion request can
/// never be withdrawn.
///
/// # Errors
///
/// Returns [`StoreError::Conflict`] if the versions differ.
pub fn admit_update(
    current: &DesiredIssue,
    incoming: &DesiredIssue,
) -> Result<Admitted, StoreError> {
    check_version(current, incoming.metadata.resource_version)?;
    let mut next = incoming.clone();
    next.status = current.status.clone();
    next.metadata.deletion_requested =
        current.metadata.deletion_requested.or(incoming.metadata.deletion_requested);
    next.metadata.resource_version = current.metadata.resource_version + 1;
    Ok(settle(next))
}

/// Checks a status patch against the stored object and builds the result.
///
/// # Errors
///
/// Returns [`StoreError::Conflict`] if the versions differ.
pub fn admit_status_patch(
    current: &DesiredIssue,
    patch: &StatusPatch,
) -> Result<DesiredIssue, StoreError> {
    check_version(current, patch.resource_version)?;
    let mut next = current.clone();
    patch.apply_to(&mut next.status);
    next.metadata.resource_version += 1;
    Ok(next)
}

/// Records a deletion request, keeping the earliest one.
#[must_use]
pub fn admit_deletion(current: &DesiredIssue, at: DateTime<Utc>) -> Admitted {
    if current.is_being_deleted() {
        return settle(current.clone());
    }
    let mut next = current.clone();
    next.metadata.deletion_requested = Some(at);
    next.metadata.resource_version += 1;
    settle(next)
}

fn check_version(current: &DesiredIssue, expected: u64) -> Result<(), StoreError> {
    if current.metadata.resource_version == expected {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            key: current.key(),
            expected,
            actual: current.metadata.resource_version,
        })
    }
}

fn settle(issue: DesiredIssue) -> Admitted {
    if issue.is_being_deleted() && issue.metadata.finalizers.is_empty() {
        Admitted::Remove(issue)
    } else {
        Admitted::Store(issue)
    }
}
