//! Mirrors the remote issue onto the desired issue's status.

use crate::error::StoreError;
use crate::model::{DesiredIssue, IssueStatus, RemoteIssue};
use crate::ports::{IssueStore, StatusPatch};

/// The status a desired issue should carry for `remote`.
#[must_use]
pub fn desired_status(remote: &RemoteIssue) -> IssueStatus {
    IssueStatus {
        state: Some(remote.state),
        last_update_timestamp: Some(remote.updated_at),
    }
}

/// Builds a merge patch holding only the fields of `desired` that differ from
/// `observed`. Returns `None` when nothing changed.
#[must_use]
pub fn diff(
    observed: &IssueStatus,
    desired: &IssueStatus,
    resource_version: u64,
) -> Option<StatusPatch> {
    let patch = StatusPatch {
        resource_version,
        state: desired.state.filter(|s| observed.state != Some(*s)),
        last_update_timestamp: desired
            .last_update_timestamp
            .filter(|ts| observed.last_update_timestamp != Some(*ts)),
    };
    (!patch.is_empty()).then_some(patch)
}

/// Projects `remote` onto the status of `current`.
///
/// The diff is taken against `snapshot`, the object as loaded at the start of
/// the pass. The patch is guarded by the version of `current`, the object as
/// last persisted in this pass. Returns the patched object, or `None` when no
/// write was needed.
///
/// # Errors
///
/// Propagates the store's error, including version conflicts.
pub fn project_status(
    store: &dyn IssueStore,
    snapshot: &DesiredIssue,
    current: &DesiredIssue,
    remote: &RemoteIssue,
) -> Result<Option<DesiredIssue>, StoreError> {
    let Some(patch) =
        diff(&snapshot.status, &desired_status(remote), current.metadata.resource_version)
    else {
        return Ok(None);
    };
    store.patch_status(&current.key(), &patch).map(Some)
}
