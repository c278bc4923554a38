//! The engine's finalizer marker and the writes that add or release it.
//!
//! While the marker is present the store keeps the object around even after
//! deletion was requested, which gives the engine a chance to close the
//! remote issue first.

use crate::error::StoreError;
use crate::model::DesiredIssue;
use crate::ports::IssueStore;

/// Marker the engine places on every desired issue it manages.
pub const FINALIZER: &str = "sync.finalizer";

/// Whether the engine's marker is present.
#[must_use]
pub fn has_marker(issue: &DesiredIssue) -> bool {
    issue.metadata.finalizers.iter().any(|f| f == FINALIZER)
}

/// Adds the marker and persists the object.
///
/// Returns the object as written. If the marker is already present nothing
/// is written.
///
/// # Errors
///
/// Propagates the store's error, including version conflicts.
pub fn add_marker(
    store: &dyn IssueStore,
    issue: &DesiredIssue,
) -> Result<DesiredIssue, StoreError> {
    if has_marker(issue) {
        return Ok(issue.clone());
    }
    let mut next = issue.clone();
    next.metadata.finalizers.push(FINALIZER.to_string());
    store.update(&next)
}

/// Removes the marker and persists the object.
///
/// Other finalizers are left alone. When this releases the last finalizer of
/// an object under deletion the store removes it.
///
/// # Errors
///
/// Propagates the store's error, including version conflicts.
pub fn remove_marker(
    store: &dyn IssueStore,
    issue: &DesiredIssue,
) -> Result<DesiredIssue, StoreError> {
    if !has_marker(issue) {
        return Ok(issue.clone());
    }
    let mut next = issue.clone();
    next.metadata.finalizers.retain(|f| f != FINALIZER);
    store.update(&next)
}
