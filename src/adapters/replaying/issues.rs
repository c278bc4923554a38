//! Replaying adapter for the `IssueTracker` port.

use std::sync::Mutex;

use super::replay_result;
use crate::cassette::replayer::CassetteReplayer;
use crate::error::{RemoteError, RemoteOp};
use crate::model::{RemoteIssue, RepoRef, Token};
use crate::ports::{IssueTracker, TrackerFuture};

/// Serves recorded tracker results from a cassette.
///
/// Arguments are ignored; calls are answered in recorded order per method.
/// A missing or exhausted recording surfaces as a [`RemoteError`].
pub struct ReplayingIssueTracker {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingIssueTracker {
    /// Create a replaying tracker backed by the given replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self {
            replayer: Mutex::new(replayer),
        }
    }

    fn next<T: serde::de::DeserializeOwned>(&self, op: RemoteOp) -> Result<T, RemoteError> {
        match replay_result::<T, RemoteError>(&self.replayer, "issues", &op.to_string()) {
            Ok(recorded) => recorded,
            Err(e) => Err(RemoteError::rejected(op, e.to_string())),
        }
    }
}

impl IssueTracker for ReplayingIssueTracker {
    fn find<'a>(
        &'a self,
        _token: &'a Token,
        _repo: &'a RepoRef,
        _title: &'a str,
    ) -> TrackerFuture<'a, Option<RemoteIssue>> {
        let result = self.next(RemoteOp::Find);
        Box::pin(async move { result })
    }

    fn create<'a>(
        &'a self,
        _token: &'a Token,
        _repo: &'a RepoRef,
        _title: &'a str,
        _description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue> {
        let result = self.next(RemoteOp::Create);
        Box::pin(async move { result })
    }

    fn edit<'a>(
        &'a self,
        _token: &'a Token,
        _repo: &'a RepoRef,
        _number: u64,
        _title: &'a str,
        _description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue> {
        let result = self.next(RemoteOp::Edit);
        Box::pin(async move { result })
    }

    fn close<'a>(
        &'a self,
        _token: &'a Token,
        _repo: &'a RepoRef,
        _number: u64,
        _title: &'a str,
        _description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue> {
        let result = self.next(RemoteOp::Close);
        Box::pin(async move { result })
    }
}
