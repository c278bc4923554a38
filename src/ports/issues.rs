//! Issue tracker port for the remote side of the sync.

use std::future::Future;
use std::pin::Pin;

use crate::error::RemoteError;
use crate::model::{RemoteIssue, RepoRef, Token};

/// Boxed future returned by [`IssueTracker`] methods, keeping the trait dyn-compatible.
pub type TrackerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Finds, creates, edits and closes issues in an external tracker.
///
/// Every call is a side effect against a system with no transactions: an
/// error does not prove the change was not applied. Callers recover by
/// running `find` again on the next pass.
pub trait IssueTracker: Send + Sync {
    /// Looks up an issue by exact title among open and closed issues.
    ///
    /// Returns `Ok(None)` when no issue carries the title. With duplicate
    /// titles the first one in listing order wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the issues cannot be listed.
    fn find<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        title: &'a str,
    ) -> TrackerFuture<'a, Option<RemoteIssue>>;

    /// Opens a new issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker rejects the issue or the request fails.
    fn create<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        title: &'a str,
        description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue>;

    /// Rewrites the title and description of an existing issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker rejects the edit or the request fails.
    fn edit<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        number: u64,
        title: &'a str,
        description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue>;

    /// Edits an issue with its state forced to closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker rejects the close or the request fails.
    fn close<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        number: u64,
        title: &'a str,
        description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue>;
}
