//! Recording adapter for the `IssueTracker` port.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::model::{RemoteIssue, RepoRef, Token};
use crate::ports::{IssueTracker, TrackerFuture};

/// Records tracker calls while delegating to an inner implementation.
///
/// Tokens are never written to the cassette.
pub struct RecordingIssueTracker {
    inner: Arc<dyn IssueTracker>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingIssueTracker {
    /// Creates a recording tracker wrapping the given implementation.
    pub fn new(inner: Arc<dyn IssueTracker>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
struct FindInput<'a> {
    repo: &'a RepoRef,
    title: &'a str,
}

#[derive(Serialize)]
struct CreateInput<'a> {
    repo: &'a RepoRef,
    title: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct WriteInput<'a> {
    repo: &'a RepoRef,
    number: u64,
    title: &'a str,
    description: &'a str,
}

impl IssueTracker for RecordingIssueTracker {
    fn find<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        title: &'a str,
    ) -> TrackerFuture<'a, Option<RemoteIssue>> {
        Box::pin(async move {
            let result = self.inner.find(token, repo, title).await;
            record_result(&self.recorder, "issues", "find", &FindInput { repo, title }, &result);
            result
        })
    }

    fn create<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        title: &'a str,
        description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let result = self.inner.create(token, repo, title, description).await;
            let input = CreateInput {
                repo,
                title,
                description,
            };
            record_result(&self.recorder, "issues", "create", &input, &result);
            result
        })
    }

    fn edit<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        number: u64,
        title: &'a str,
        description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let result = self.inner.edit(token, repo, number, title, description).await;
            let input = WriteInput {
                repo,
                number,
                title,
                description,
            };
            record_result(&self.recorder, "issues", "edit", &input, &result);
            result
        })
    }

    fn close<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        number: u64,
        title: &'a str,
        description: &'a str,
    ) -> TrackerFuture<'a, RemoteIssue> {
        Box::pin(async move {
            let result = self.inner.close(token, repo, number, title, description).await;
            let input = WriteInput {
                repo,
                number,
                title,
                description,
            };
            record_result(&self.recorder, "issues", "close", &input, &result);
            result
        })
    }
}
