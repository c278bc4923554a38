//! In-memory adapter for the `IssueTracker` port.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{RemoteError, RemoteOp};
use crate::model::{IssueState, RemoteIssue, RepoRef, Token};
use crate::ports::{IssueTracker, TrackerFuture};

/// How an injected failure behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Reject the call without touching any issue.
    Before,
    /// Apply the change, then report a lost response.
    AfterApply,
}

#[derive(Default)]
struct TrackerState {
    repos: HashMap<RepoRef, Vec<RemoteIssue>>,
    failures: HashMap<RemoteOp, FailureMode>,
    calls: Vec<RemoteOp>,
    tokens: HashSet<String>,
    ticks: i64,
    delay: Option<Duration>,
}

impl TrackerState {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        Utc.timestamp_opt(1_622_447_368 + self.ticks, 0).single().unwrap_or_default()
    }

    fn issues_mut(&mut self, repo: &RepoRef) -> &mut Vec<RemoteIssue> {
        self.repos.entry(repo.clone()).or_default()
    }
}

/// Issue tracker kept entirely in memory, with failure injection.
///
/// Issues are numbered per repository starting at 1, and every mutation
/// advances a synthetic clock so `updated_at` changes deterministically.
#[derive(Default)]
pub struct InMemoryIssueTracker {
    state: Mutex<TrackerState>,
}

impl InMemoryIssueTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an issue directly, bypassing failure injection, and returns it.
    pub fn seed(&self, repo: &RepoRef, title: &str, body: &str, state: IssueState) -> RemoteIssue {
        let mut guard = self.lock();
        let updated_at = guard.next_timestamp();
        let issues = guard.issues_mut(repo);
        let issue = RemoteIssue {
            number: issues.len() as u64 + 1,
            title: title.to_string(),
            body: Some(body.to_string()),
            state,
            updated_at,
        };
        issues.push(issue.clone());
        issue
    }

    /// Snapshot of every issue in `repo`, in creation order.
    #[must_use]
    pub fn issues(&self, repo: &RepoRef) -> Vec<RemoteIssue> {
        self.lock().repos.get(repo).cloned().unwrap_or_default()
    }

    /// Makes every later call to `op` fail in the given mode.
    pub fn fail_on(&self, op: RemoteOp, mode: FailureMode) {
        self.lock().failures.insert(op, mode);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Delays every call by `delay` before it runs.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// Every operation invoked so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteOp> {
        self.lock().calls.clone()
    }

    /// How many times `op` was invoked.
    #[must_use]
    pub fn call_count(&self, op: RemoteOp) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// Distinct raw tokens the tracker has been called with.
    #[must_use]
    pub fn seen_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.lock().tokens.iter().cloned().collect();
        tokens.sort();
        tokens
    }

    async fn enter(&self, op: RemoteOp, token: &Token) -> Option<FailureMode> {
        let delay = {
            let mut guard = self.lock();
            guard.calls.push(op);
            guard.tokens.insert(token.expose().to_string());
            guard.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.lock().failures.get(&op).copied()
    }

    fn write(
        &self,
        op: RemoteOp,
        repo: &RepoRef,
        number: u64,
        title: &str,
        description: &str,
        state: Option<IssueState>,
    ) -> Result<RemoteIssue, RemoteError> {
        let mut guard = self.lock();
        let updated_at = guard.next_timestamp();
        let issue = guard
            .issues_mut(repo)
            .iter_mut()
            .find(|issue| issue.number == number)
            .ok_or_else(|| RemoteError::Status {
                op,
                status: 404,
                body: "Not Found".into(),
            })?;
        issue.title = title.to_string();
        issue.body = Some(description.to_string());
        if let Some(state) = state {
            issue.state = state;
        }
        issue.updated_at = updated_at;
        Ok(issue.clone())
    }
}

fn injected(op: RemoteOp, mode: FailureMode) -> RemoteError {
    match mode {
        FailureMode::Before => RemoteError::rejected(op, "injected failure"),
        FailureMode::AfterApply => RemoteError::Transport {
            op,
            reason: "connection reset after apply".into(),
        },
    }
}

impl IssueTracker for InMemoryIssueTracker {
    fn find<'a>(
        &'a self,
        token: &'a Token,
        repo: &'a RepoRef,
        title: &'a str,
    ) -> TrackerFuture<'a, Option<RemoteIssue>> {
        Box::pin(async move {
            if let Some(mode) = self.enter(RemoteOp::Find, token).await {
                return Err(injected(RemoteOp::Find, mode));
            }
            Ok(self.issues(repo).into_iter().find(|issue| issue.title == title))
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
            let failure = self.enter(RemoteOp::Create, token).await;
            if failure == Some(FailureMode::Before) {
                return Err(injected(RemoteOp::Create, FailureMode::Before));
            }
            let issue = self.seed(repo, title, description, IssueState::Open);
            match failure {
                Some(mode) => Err(injected(RemoteOp::Create, mode)),
                None => Ok(issue),
            }
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
            let failure = self.enter(RemoteOp::Edit, token).await;
            if failure == Some(FailureMode::Before) {
                return Err(injected(RemoteOp::Edit, FailureMode::Before));
            }
            let issue = self.write(RemoteOp::Edit, repo, number, title, description, None)?;
            match failure {
                Some(mode) => Err(injected(RemoteOp::Edit, mode)),
                None => Ok(issue),
            }
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
            let failure = self.enter(RemoteOp::Close, token).await;
            if failure == Some(FailureMode::Before) {
                return Err(injected(RemoteOp::Close, FailureMode::Before));
            }
            let issue = self.write(
                RemoteOp::Close,
                repo,
                number,
                title,
                description,
                Some(IssueState::Closed),
            )?;
            match failure {
                Some(mode) => Err(injected(RemoteOp::Close, mode)),
                None => Ok(issue),
            }
        })
    }
}
