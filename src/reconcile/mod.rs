//! The reconciliation engine.
//!
//! Each pass is level-triggered: it loads the desired issue, looks up its
//! remote counterpart by title and drives both toward convergence. Passes
//! hold no state between invocations and contain no retry loop; the
//! [`Outcome`] tells the caller whether and when to come back.

pub mod finalizer;
pub mod status;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ReconcileError, RemoteError, RemoteOp};
use crate::model::{ObjectKey, RepoRef, Token};
use crate::ports::{IssueStore, IssueTracker};

pub use finalizer::FINALIZER;

/// Tuning for a [`Reconciler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Upper bound on every remote call.
    pub call_timeout: Duration,
    /// Delay suggested to the caller after a retryable failure.
    pub retry_after: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            retry_after: Duration::from_secs(5),
        }
    }
}

/// A single change made during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The finalizer was added to the desired issue.
    FinalizerAdded,
    /// A remote issue was created.
    Created { number: u64 },
    /// The remote description was brought in line.
    Edited { number: u64 },
    /// The remote issue was closed for a deletion.
    Closed { number: u64 },
    /// Deletion found no remote issue to close.
    CloseSkipped,
    /// The finalizer was released.
    FinalizerRemoved,
    /// The status mirror was updated.
    StatusPatched,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FinalizerAdded => f.write_str("finalizer added"),
            Self::Created { number } => write!(f, "created issue #{number}"),
            Self::Edited { number } => write!(f, "edited issue #{number}"),
            Self::Closed { number } => write!(f, "closed issue #{number}"),
            Self::CloseSkipped => f.write_str("no remote issue to close"),
            Self::FinalizerRemoved => f.write_str("finalizer removed"),
            Self::StatusPatched => f.write_str("status patched"),
        }
    }
}

/// What a successful pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// The object reconciled.
    pub key: ObjectKey,
    /// Changes in the order they were made.
    pub changes: Vec<Change>,
}

impl Report {
    fn new(key: &ObjectKey) -> Self {
        Self {
            key: key.clone(),
            changes: Vec::new(),
        }
    }

    /// Whether the pass found everything already converged.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Result of one reconcile pass, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The pass completed.
    Done(Report),
    /// The pass failed in a way a later pass may fix.
    RetryAfter(Duration),
    /// The object cannot be reconciled until it changes.
    Fatal(ReconcileError),
}

/// Drives desired issues toward their remote counterparts.
pub struct Reconciler {
    tracker: Arc<dyn IssueTracker>,
    store: Arc<dyn IssueStore>,
    token: Token,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Creates an engine over the given tracker and store.
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        store: Arc<dyn IssueStore>,
        token: Token,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            tracker,
            store,
            token,
            config,
        }
    }

    /// The tuning this engine runs with.
    #[must_use]
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Runs one pass for `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> Outcome {
        let result = self.try_reconcile(key).await;
        self.outcome(key, result)
    }

    /// Runs one pass for `key`, abandoning it as soon as `cancel` turns true.
    ///
    /// A cancelled pass drops its in-flight remote call and is reported as
    /// retryable.
    pub async fn reconcile_until(
        &self,
        key: &ObjectKey,
        mut cancel: watch::Receiver<bool>,
    ) -> Outcome {
        let result = tokio::select! {
            biased;
            () = cancelled(&mut cancel) => Err(ReconcileError::Cancelled),
            result = self.try_reconcile(key) => result,
        };
        self.outcome(key, result)
    }

    /// Runs one pass for `key` and returns the raw result.
    ///
    /// # Errors
    ///
    /// Returns the first remote or store failure, or
    /// [`ReconcileError::InvalidRepo`] when the repository cannot be parsed.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn try_reconcile(&self, key: &ObjectKey) -> Result<Report, ReconcileError> {
        let mut report = Report::new(key);
        let Some(snapshot) = self.store.get(key)? else {
            debug!("object no longer exists");
            return Ok(report);
        };
        let repo = RepoRef::parse(&snapshot.spec.repo)?;
        let title = snapshot.spec.title.as_str();
        let description = snapshot.spec.description.as_str();

        let found = self.call(RemoteOp::Find, self.tracker.find(&self.token, &repo, title)).await?;

        if snapshot.is_being_deleted() {
            if !finalizer::has_marker(&snapshot) {
                debug!("deletion requested, finalizer already released");
                return Ok(report);
            }
            match &found {
                Some(remote) => {
                    let close =
                        self.tracker.close(&self.token, &repo, remote.number, title, description);
                    let closed = self.call(RemoteOp::Close, close).await?;
                    info!(issue = closed.number, "closed remote issue");
                    report.changes.push(Change::Closed {
                        number: closed.number,
                    });
                }
                None => {
                    info!("no remote issue to close");
                    report.changes.push(Change::CloseSkipped);
                }
            }
            finalizer::remove_marker(self.store.as_ref(), &snapshot)?;
            info!("finalizer removed");
            report.changes.push(Change::FinalizerRemoved);
            return Ok(report);
        }

        let mut current = snapshot.clone();
        if !finalizer::has_marker(&current) {
            current = finalizer::add_marker(self.store.as_ref(), &current)?;
            info!("finalizer added");
            report.changes.push(Change::FinalizerAdded);
        }

        let mut remote = match found {
            Some(remote) => remote,
            None => {
                let create = self.tracker.create(&self.token, &repo, title, description);
                let created = self.call(RemoteOp::Create, create).await?;
                info!(issue = created.number, "created remote issue");
                report.changes.push(Change::Created {
                    number: created.number,
                });
                created
            }
        };

        if remote.description() != description {
            remote = self
                .call(
                    RemoteOp::Edit,
                    self.tracker.edit(&self.token, &repo, remote.number, title, description),
                )
                .await?;
            info!(issue = remote.number, "corrected remote description");
            report.changes.push(Change::Edited {
                number: remote.number,
            });
        }

        if status::project_status(self.store.as_ref(), &snapshot, &current, &remote)?.is_some() {
            debug!(issue = remote.number, state = %remote.state, "status patched");
            report.changes.push(Change::StatusPatched);
        }

        Ok(report)
    }

    async fn call<T>(
        &self,
        op: RemoteOp,
        fut: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout {
                op,
                timeout_ms: u64::try_from(self.config.call_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn outcome(&self, key: &ObjectKey, result: Result<Report, ReconcileError>) -> Outcome {
        match result {
            Ok(report) => {
                if report.is_noop() {
                    debug!(key = %key, "already converged");
                } else {
                    info!(key = %key, changes = report.changes.len(), "reconciled");
                }
                Outcome::Done(report)
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    key = %key,
                    error = %e,
                    retry_in_ms = self.config.retry_after.as_millis(),
                    "reconcile failed, will retry"
                );
                Outcome::RetryAfter(self.config.retry_after)
            }
            Err(e) => {
                error!(key = %key, error = %e, "reconcile failed permanently");
                Outcome::Fatal(e)
            }
        }
    }
}

/// Resolves once `cancel` reads true. Never resolves if the sender is gone.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
